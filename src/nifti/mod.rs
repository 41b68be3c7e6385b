//! `NIfTI` header support.
//!
//! `NIfTI` (Neuroimaging Informatics Technology Initiative) is the image format
//! written by dcm2niix and consumed by FSL. Only the header matters here: it
//! carries the affine from which the image orientation is derived.

pub(crate) mod header;
pub mod io;

pub use header::{NiftiHeader, NiftiVersion};
pub use io::{is_nifti_path, load_header, save_header};
