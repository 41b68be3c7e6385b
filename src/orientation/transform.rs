//! Integer orientation transforms of voxel-grid-aligned images.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::frame::{AnatomicalVector, VoxelVector};

fn non_orthogonal(reason: String) -> Error {
    Error::NonOrthogonalTransform { path: None, reason }
}

/// Rotational part of an image transform, rounded to a signed permutation.
///
/// Rows index anatomical axes and columns index voxel axes, so
/// `anatomical[i] = Σ_j rows[i][j] * voxel[j]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OrientationTransform {
    rows: [[i32; 3]; 3],
}

impl OrientationTransform {
    /// The identity transform (voxel axes already RAS).
    pub const IDENTITY: Self = Self {
        rows: [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
    };

    /// Build from integer rows, validating the signed-permutation property.
    pub fn from_rows(rows: [[i32; 3]; 3]) -> Result<Self> {
        let transform = Self { rows };
        transform.validate()?;
        Ok(transform)
    }

    /// Round a real-valued rotation to integers and validate it.
    pub fn from_linear(linear: [[f64; 3]; 3]) -> Result<Self> {
        let mut rows = [[0i32; 3]; 3];
        for (i, row) in linear.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                if !value.is_finite() {
                    return Err(non_orthogonal(format!(
                        "entry [{}][{}] is not finite ({})",
                        i, j, value
                    )));
                }
                rows[i][j] = value.round() as i32;
            }
        }
        Self::from_rows(rows)
    }

    /// Like [`from_linear`](Self::from_linear) but first divides each column
    /// by its norm, removing voxel sizes carried by a scanner affine.
    pub fn from_scaled_linear(linear: [[f64; 3]; 3]) -> Result<Self> {
        let mut unit = linear;
        for col in 0..3 {
            let norm = (0..3).map(|row| linear[row][col].powi(2)).sum::<f64>().sqrt();
            if !norm.is_finite() || norm == 0.0 {
                return Err(non_orthogonal(format!(
                    "column {} has degenerate norm {}",
                    col, norm
                )));
            }
            for row in unit.iter_mut() {
                row[col] /= norm;
            }
        }
        Self::from_linear(unit)
    }

    /// Parse rows of numbers separated by whitespace and/or commas.
    ///
    /// Accepts 3x3, 3x4 or 4x4 text (as printed by `mrinfo -transform`); only
    /// the leading 3x3 block is used. Unreadable text is reported as a corrupt
    /// transform of `path`, and a non-permutation names `path` as well.
    pub fn parse_text(text: &str, path: &Path) -> Result<Self> {
        let corrupt = |reason: String| Error::CorruptTransform {
            path: path.to_path_buf(),
            reason,
        };

        let mut linear = [[0.0f64; 3]; 3];
        let mut rows_read = 0;
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if rows_read == 3 {
                break;
            }
            let values = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<f64>()
                        .map_err(|_| corrupt(format!("'{}' is not a number", s)))
                })
                .collect::<Result<Vec<_>>>()?;
            if values.len() < 3 {
                return Err(corrupt(format!(
                    "row {} has {} values, need at least 3",
                    rows_read,
                    values.len()
                )));
            }
            linear[rows_read].copy_from_slice(&values[..3]);
            rows_read += 1;
        }
        if rows_read < 3 {
            return Err(corrupt(format!("expected 3 rows, found {}", rows_read)));
        }
        Self::from_linear(linear).map_err(|e| e.at_path(path))
    }

    /// Integer rows.
    pub fn rows(&self) -> &[[i32; 3]; 3] {
        &self.rows
    }

    /// Determinant; +1 or -1 for any valid transform.
    pub fn determinant(&self) -> i32 {
        let m = &self.rows;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Project a voxel-space direction into anatomical space.
    pub fn project(&self, voxel: VoxelVector) -> AnatomicalVector {
        let mut out = [0i32; 3];
        for (i, row) in self.rows.iter().enumerate() {
            out[i] = row.iter().zip(voxel).map(|(&t, v)| t * v).sum();
        }
        out
    }

    /// Project a real-valued voxel-space direction into anatomical space.
    pub fn project_f64(&self, voxel: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0f64; 3];
        for (i, row) in self.rows.iter().enumerate() {
            out[i] = row.iter().zip(voxel).map(|(&t, v)| f64::from(t) * v).sum();
        }
        out
    }

    /// Undo the FSL voxel convention: FSL stores vectors as if the image had
    /// a negative-determinant (radiological) layout, so the first component
    /// is inverted whenever the actual transform has positive determinant.
    pub fn fsl_to_voxel(&self, stored: [f64; 3]) -> [f64; 3] {
        let mut v = stored;
        if self.determinant() > 0 {
            v[0] = -v[0];
        }
        v
    }

    fn validate(&self) -> Result<()> {
        let unit = |v: i32| v == 1 || v == -1;
        for (i, row) in self.rows.iter().enumerate() {
            let nonzero: Vec<i32> = row.iter().copied().filter(|&v| v != 0).collect();
            if nonzero.len() != 1 || !unit(nonzero[0]) {
                return Err(non_orthogonal(format!(
                    "row {} of {} must hold exactly one entry of magnitude 1",
                    i, self
                )));
            }
        }
        for col in 0..3 {
            let nonzero = self.rows.iter().filter(|row| row[col] != 0).count();
            if nonzero != 1 {
                return Err(non_orthogonal(format!(
                    "column {} of {} must hold exactly one nonzero entry",
                    col, self
                )));
            }
        }
        Ok(())
    }
}

impl Default for OrientationTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for OrientationTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.rows;
        write!(
            f,
            "[[{}, {}, {}], [{}, {}, {}], [{}, {}, {}]]",
            r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1], r[2][2]
        )
    }
}
