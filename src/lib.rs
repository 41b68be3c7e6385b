//! # dwimeta
//!
//! Verification of diffusion-weighted imaging (DWI) orientation metadata.
//!
//! Conversion tools (dcm2niix, MRtrix3, FSL) each encode phase-encoding
//! direction, slice-encoding direction and gradient tables in their own
//! conventions. `dwimeta` takes a directory of conversion outputs for the
//! standard synthetic acquisition space and checks that every label still
//! agrees with the orientation the acquisition physically implies.
//!
//! ## Modules
//!
//! - [`frame`]: canonical anatomical constants (plane normals, phase-encoding
//!   vectors, gradient fiducials)
//! - [`acquisition`]: the 24 ground-truth acquisitions
//! - [`orientation`]: signed-permutation transforms and direction codes
//! - [`source`]: reading image transforms from headers or `mrinfo`
//! - [`metadata`]: file formats and metadata extraction
//! - [`verify`]: comparison, aggregation and full runs
//!
//! ## Example
//!
//! ```no_run
//! use dwimeta::{verify_directory, FileFormat, HeaderTransformSource, VerifyConfig};
//!
//! let format = FileFormat::by_name("niibvecbvaljson")?;
//! let config = VerifyConfig::default().default_slice_encoding("k");
//! let report = verify_directory(
//!     "dcm2niix",
//!     "out/dcm2niix".as_ref(),
//!     &format,
//!     &config,
//!     &HeaderTransformSource,
//! )?;
//! report.emit();
//! # Ok::<(), dwimeta::Error>(())
//! ```

#![warn(missing_docs)]

pub mod acquisition;
pub mod error;
pub mod frame;
pub mod metadata;
pub mod mrtrix;
pub mod nifti;
pub mod orientation;
pub mod source;
pub mod verify;

pub use acquisition::{AcquisitionId, AcquisitionSpace};
pub use error::{Error, FailureClass, Result};
pub use frame::{AnatomicalVector, CanonicalFrame, PhaseEncodeDir, Plane, SliceOrder};
pub use metadata::{DwiMetadata, FileFormat, MetadataExtractor, MetadataTests, FILE_FORMATS};
pub use orientation::{DirectionCode, DirectionResolver, OrientationTransform};
pub use source::{HeaderTransformSource, MrinfoTransformSource, TransformSource};
pub use verify::{
    verify_acquisition, verify_directory, GradientOutcome, Mismatch, MismatchCategory,
    MismatchReport, Verifier, VerifyConfig,
};
