//! MRtrix image headers.

pub mod header;

pub use header::MrtrixHeader;

use std::path::Path;

/// True if `path` names an MRtrix image (`.mih` or `.mif`).
pub fn is_mrtrix_path(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "mih" || e == "mif")
}
