//! Acquisition of image orientation transforms.
//!
//! The verifier only depends on [`TransformSource`]. The default
//! implementation reads headers natively; [`MrinfoTransformSource`] defers to
//! MRtrix3's `mrinfo` for parity with tool-chain behavior.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{Error, Result};
use crate::mrtrix::{is_mrtrix_path, MrtrixHeader};
use crate::nifti::{is_nifti_path, load_header};
use crate::orientation::OrientationTransform;

/// Anything that can report the orientation of an image on disk.
pub trait TransformSource {
    /// Orientation of the image at `image`.
    ///
    /// Fails with [`Error::NotFound`] if the image is absent,
    /// [`Error::CorruptTransform`] if it exists but yields no readable
    /// transform, and [`Error::NonOrthogonalTransform`] if the rounded
    /// transform is not a signed permutation.
    fn transform(&self, image: &Path) -> Result<OrientationTransform>;
}

impl<T: TransformSource + ?Sized> TransformSource for &T {
    fn transform(&self, image: &Path) -> Result<OrientationTransform> {
        (**self).transform(image)
    }
}

fn image_not_found(image: &Path) -> Error {
    Error::NotFound {
        artifact: "image",
        path: image.to_path_buf(),
        context: "transform query".to_string(),
    }
}

/// Reads transforms straight from NIfTI and MRtrix headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderTransformSource;

impl TransformSource for HeaderTransformSource {
    fn transform(&self, image: &Path) -> Result<OrientationTransform> {
        if !image.exists() {
            return Err(image_not_found(image));
        }
        let corrupt = |e: Error| match e {
            e @ Error::NonOrthogonalTransform { .. } => e.at_path(image),
            e @ Error::CorruptTransform { .. } => e,
            other => Error::CorruptTransform {
                path: image.to_path_buf(),
                reason: other.to_string(),
            },
        };

        let transform = if is_nifti_path(image) {
            load_header(image)
                .and_then(|header| header.orientation())
                .map_err(corrupt)?
        } else if is_mrtrix_path(image) {
            MrtrixHeader::read(image)
                .and_then(|header| header.transform(image))
                .map_err(corrupt)?
        } else {
            return Err(Error::InvalidFileFormat(format!(
                "cannot read a transform from \"{}\" (expected .nii, .nii.gz, .mih or .mif)",
                image.display()
            )));
        };
        debug!(image = %image.display(), %transform, "read header transform");
        Ok(transform)
    }
}

/// Queries `mrinfo -transform` with transform realignment disabled.
#[derive(Debug, Clone)]
pub struct MrinfoTransformSource {
    program: PathBuf,
}

impl Default for MrinfoTransformSource {
    fn default() -> Self {
        Self {
            program: PathBuf::from("mrinfo"),
        }
    }
}

impl MrinfoTransformSource {
    /// Use a specific `mrinfo` executable.
    pub fn with_program<P: AsRef<Path>>(program: P) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }

    /// Executable that will be run.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl TransformSource for MrinfoTransformSource {
    fn transform(&self, image: &Path) -> Result<OrientationTransform> {
        let output = Command::new(&self.program)
            .arg(image)
            .args(["-transform", "-config", "RealignTransform", "false", "-quiet"])
            .output()
            .map_err(|e| Error::Configuration(format!(
                "failed to run \"{}\": {}",
                self.program.display(),
                e
            )))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            if !image.exists() {
                return Err(image_not_found(image));
            }
            return Err(Error::CorruptTransform {
                path: image.to_path_buf(),
                reason: format!(
                    "{} printed no transform ({})",
                    self.program.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        let transform = OrientationTransform::parse_text(&stdout, image)?;
        debug!(image = %image.display(), %transform, "read mrinfo transform");
        Ok(transform)
    }
}
