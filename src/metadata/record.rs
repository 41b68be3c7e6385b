//! Normalized metadata records.
//!
//! Every format variant is decoded into one [`DwiMetadata`] so that the
//! verifier never needs to know where a value came from.

use std::path::{Path, PathBuf};

use ndarray::{s, Array2};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::frame::VoxelVector;
use crate::metadata::tables;
use crate::mrtrix::MrtrixHeader;
use crate::orientation::OrientationTransform;

/// Fields read from a BIDS-style JSON sidecar.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JsonSidecar {
    /// Phase-encoding direction code.
    #[serde(rename = "PhaseEncodingDirection", default)]
    pub phase_encoding_direction: Option<String>,
    /// Slice-encoding direction code.
    #[serde(rename = "SliceEncodingDirection", default)]
    pub slice_encoding_direction: Option<String>,
    /// Slice acquisition times in seconds.
    #[serde(rename = "SliceTiming", default)]
    pub slice_timing: Option<Vec<f64>>,
    /// Gradient table, if one was (wrongly) duplicated into the sidecar.
    #[serde(default)]
    pub dw_scheme: Option<serde_json::Value>,
}

impl JsonSidecar {
    /// Decode sidecar text; `path` is used for diagnostics.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Decode {
            what: "JSON sidecar",
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Where key/value metadata was read from.
#[derive(Debug, Clone)]
pub enum KeyValueSource {
    /// MRtrix image header.
    Header(MrtrixHeader),
    /// JSON sidecar.
    Json(JsonSidecar),
}

impl KeyValueSource {
    /// `PhaseEncodingDirection`, if present.
    pub fn phase_encoding_direction(&self) -> Option<&str> {
        match self {
            Self::Header(header) => header.first("PhaseEncodingDirection"),
            Self::Json(json) => json.phase_encoding_direction.as_deref(),
        }
    }

    /// `SliceEncodingDirection`, if present.
    pub fn slice_encoding_direction(&self) -> Option<&str> {
        match self {
            Self::Header(header) => header.first("SliceEncodingDirection"),
            Self::Json(json) => json.slice_encoding_direction.as_deref(),
        }
    }

    /// `SliceTiming`, decoding the comma-separated header form if needed.
    pub fn slice_timing(&self, path: &Path) -> Result<Option<Vec<f64>>> {
        match self {
            Self::Header(header) => header
                .first("SliceTiming")
                .map(|value| tables::parse_csv_row(value, "SliceTiming", path))
                .transpose(),
            Self::Json(json) => Ok(json.slice_timing.clone()),
        }
    }

    /// Whether a `dw_scheme` entry is present.
    pub fn has_dw_scheme(&self) -> bool {
        match self {
            Self::Header(header) => header.contains("dw_scheme"),
            Self::Json(json) => json.dw_scheme.is_some(),
        }
    }
}

/// Diffusion gradient table in one of two layouts.
#[derive(Debug, Clone, PartialEq)]
pub enum GradientScheme {
    /// One row per volume: direction in scanner space followed by b-value (N x 4).
    BMatrix(Array2<f64>),
    /// FSL bvecs: one column per volume, directions in FSL voxel convention (3 x N).
    Fsl(Array2<f64>),
}

impl GradientScheme {
    /// Number of volumes described.
    pub fn volumes(&self) -> usize {
        match self {
            Self::BMatrix(table) => table.nrows(),
            Self::Fsl(bvecs) => bvecs.ncols(),
        }
    }

    /// Directions of volumes 1..=3, one per row, as stored.
    ///
    /// Returns `None` if fewer than four volumes are present.
    pub fn fiducial_directions(&self) -> Option<[[f64; 3]; 3]> {
        if self.volumes() < 4 {
            return None;
        }
        let view = match self {
            Self::BMatrix(table) => table.slice(s![1..4, 0..3]).to_owned(),
            Self::Fsl(bvecs) => bvecs.slice(s![.., 1..4]).t().to_owned(),
        };
        let mut out = [[0.0; 3]; 3];
        for ((i, j), &value) in view.indexed_iter() {
            out[i][j] = value;
        }
        Some(out)
    }
}

/// Phase-encoding information in whichever form the format carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseEncoding {
    /// Direction code (`PhaseEncodingDirection`).
    Code {
        /// Code as written.
        code: String,
        /// Sidecar or header the code was read from.
        origin: PathBuf,
    },
    /// Voxel-space row of an MRtrix phase-encoding table.
    Table(VoxelVector),
    /// Voxel-space row of a topup table, still in FSL convention.
    Topup(VoxelVector),
    /// Voxel-space row of an eddy config, still in FSL convention.
    Eddy(VoxelVector),
}

impl PhaseEncoding {
    /// Label used when reporting the observed value.
    pub fn label(&self) -> String {
        match self {
            Self::Code { code, .. } => code.clone(),
            Self::Table(v) => format!("petable {:?}", v),
            Self::Topup(v) => format!("topup {:?}", v),
            Self::Eddy(v) => format!("eddy {:?}", v),
        }
    }
}

/// Slice-encoding information.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceEncoding {
    /// `SliceEncodingDirection`, if the source carried it.
    pub code: Option<String>,
    /// `SliceTiming`, if the source carried it.
    pub slice_timing: Option<Vec<f64>>,
    /// File the values were read from.
    pub origin: PathBuf,
}

impl SliceEncoding {
    /// True if slices were acquired against the encoding direction.
    pub fn is_reversed(&self) -> bool {
        match self.slice_timing.as_deref() {
            Some([first, .., last]) => first > last,
            _ => false,
        }
    }
}

/// Everything extracted for one acquisition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DwiMetadata {
    /// Gradient table, when the gradient test is enabled.
    pub gradients: Option<GradientScheme>,
    /// Phase encoding, when the phase-encoding test is enabled.
    pub phase_encoding: Option<PhaseEncoding>,
    /// Slice encoding, when the slice-encoding test is enabled.
    pub slice_encoding: Option<SliceEncoding>,
    /// Transform stored in an MRtrix header that was read for metadata.
    pub embedded_transform: Option<OrientationTransform>,
}
