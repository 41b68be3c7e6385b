//! Parsers for the plain-text numeric tables written by conversion tools.

use std::path::Path;

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::frame::VoxelVector;

fn decode_error(what: &'static str, path: &Path, reason: String) -> Error {
    Error::Decode {
        what,
        path: path.to_path_buf(),
        reason,
    }
}

fn parse_value(token: &str, what: &'static str, path: &Path) -> Result<f64> {
    token
        .parse::<f64>()
        .map_err(|_| decode_error(what, path, format!("'{}' is not a number", token)))
}

/// Parse one comma-separated row of numbers (MRtrix header values).
pub fn parse_csv_row(text: &str, what: &'static str, path: &Path) -> Result<Vec<f64>> {
    text.split(',')
        .map(str::trim)
        .map(|token| parse_value(token, what, path))
        .collect()
}

/// Parse a whitespace-separated table.
///
/// Blank lines and lines starting with `#` are skipped. Every row must have
/// the same number of columns.
pub fn parse_table(text: &str, what: &'static str, path: &Path) -> Result<Array2<f64>> {
    let mut values = Vec::new();
    let mut ncols = None;
    let mut nrows = 0;
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|token| parse_value(token, what, path))
            .collect::<Result<Vec<_>>>()?;
        match ncols {
            None => ncols = Some(row.len()),
            Some(n) if n != row.len() => {
                return Err(decode_error(
                    what,
                    path,
                    format!("row {} has {} columns, expected {}", nrows, row.len(), n),
                ))
            }
            Some(_) => {}
        }
        values.extend(row);
        nrows += 1;
    }
    let ncols = ncols.ok_or_else(|| decode_error(what, path, "file holds no rows".into()))?;
    Array2::from_shape_vec((nrows, ncols), values)
        .map_err(|e| decode_error(what, path, e.to_string()))
}

/// MRtrix `.grad` b-matrix: N rows of `x y z b`.
pub fn parse_bmatrix(text: &str, path: &Path) -> Result<Array2<f64>> {
    let table = parse_table(text, "gradient table", path)?;
    if table.ncols() != 4 {
        return Err(decode_error(
            "gradient table",
            path,
            format!("rows have {} values, expected 4", table.ncols()),
        ));
    }
    Ok(table)
}

/// MRtrix header `dw_scheme` entries, one comma-separated row each.
pub fn parse_header_scheme(rows: &[String], path: &Path) -> Result<Array2<f64>> {
    let mut values = Vec::with_capacity(rows.len() * 4);
    for (index, row) in rows.iter().enumerate() {
        let parsed = parse_csv_row(row, "dw_scheme", path)?;
        if parsed.len() != 4 {
            return Err(decode_error(
                "dw_scheme",
                path,
                format!("row {} has {} values, expected 4", index, parsed.len()),
            ));
        }
        values.extend(parsed);
    }
    Array2::from_shape_vec((rows.len(), 4), values)
        .map_err(|e| decode_error("dw_scheme", path, e.to_string()))
}

/// FSL bvecs: exactly three rows of equal length.
pub fn parse_bvecs(text: &str, path: &Path) -> Result<Array2<f64>> {
    let table = parse_table(text, "bvecs", path)?;
    if table.nrows() != 3 {
        return Err(decode_error(
            "bvecs",
            path,
            format!("expected 3 rows, found {}", table.nrows()),
        ));
    }
    Ok(table)
}

/// The leading three columns of a table whose rows must all be identical.
pub fn uniform_row(table: &Array2<f64>, what: &'static str, path: &Path) -> Result<[f64; 3]> {
    let invariant = |reason: String| Error::Invariant {
        what,
        path: path.to_path_buf(),
        reason,
    };
    if table.ncols() < 3 {
        return Err(invariant(format!("rows have {} columns, need at least 3", table.ncols())));
    }
    let first = table.row(0);
    if let Some(index) = table.rows().into_iter().position(|row| row != first) {
        return Err(invariant(format!("row {} differs from row 0", index)));
    }
    Ok([first[0], first[1], first[2]])
}

/// Validate a voxel-space direction with exactly one nonzero entry of magnitude 1.
pub fn voxel_unit_vector(row: [f64; 3], what: &'static str, path: &Path) -> Result<VoxelVector> {
    let nonzero = row.iter().filter(|&&v| v != 0.0).count();
    if nonzero != 1 || row.iter().any(|&v| v != 0.0 && v.abs() != 1.0) {
        return Err(Error::Invariant {
            what,
            path: path.to_path_buf(),
            reason: format!("{:?} is not a unit vector along one image axis", row),
        });
    }
    Ok(row.map(|v| v as i32))
}

/// FSL eddy config: the single row of the acquisition parameters file.
pub fn eddy_config_row(text: &str, path: &Path) -> Result<[f64; 3]> {
    let table = parse_table(text, "eddy config", path)?;
    if table.nrows() != 1 {
        return Err(Error::Invariant {
            what: "eddy config",
            path: path.to_path_buf(),
            reason: format!("expected exactly one row, found {}", table.nrows()),
        });
    }
    uniform_row(&table, "eddy config", path)
}

/// FSL eddy index file: every volume must reference config row 1.
///
/// Returns the number of volumes indexed.
pub fn check_eddy_indices(text: &str, path: &Path) -> Result<usize> {
    let mut count = 0;
    for token in text.split_whitespace() {
        let index = token.parse::<i64>().map_err(|_| {
            decode_error("eddy index", path, format!("'{}' is not an integer", token))
        })?;
        if index != 1 {
            return Err(Error::Invariant {
                what: "eddy index",
                path: path.to_path_buf(),
                reason: format!("volume {} references config row {}", count, index),
            });
        }
        count += 1;
    }
    if count == 0 {
        return Err(decode_error("eddy index", path, "file holds no indices".into()));
    }
    Ok(count)
}
