//! Error types for metadata verification.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Triage class of a fatal failure.
///
/// Mismatches between expected and observed orientation are not errors and
/// never appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureClass {
    /// A required artifact does not exist.
    NotFound,
    /// An artifact exists but could not be interpreted.
    Decode,
    /// An artifact was readable but contradicts itself.
    Invariant,
    /// Invalid run configuration.
    Configuration,
    /// Underlying I/O failure other than a missing file.
    Io,
}

fn located(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" in \"{}\"", path.display()),
        None => String::new(),
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::NotFound => "not-found",
            Self::Decode => "decode",
            Self::Invariant => "invariant",
            Self::Configuration => "configuration",
            Self::Io => "io",
        };
        f.write_str(label)
    }
}

/// Errors raised while extracting or interpreting orientation metadata.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required artifact is absent.
    #[error("{artifact} not found at \"{}\" ({context})", path.display())]
    NotFound {
        /// Kind of artifact that was expected (e.g. "JSON sidecar").
        artifact: &'static str,
        /// Where it was expected.
        path: PathBuf,
        /// Test or operation that required it.
        context: String,
    },

    /// The image exists but its transform could not be read.
    #[error("unable to read transform from \"{}\": {reason}", path.display())]
    CorruptTransform {
        /// Image path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The rounded transform is not a signed permutation matrix.
    #[error("transform{} is not a signed permutation after rounding: {reason}", located(path))]
    NonOrthogonalTransform {
        /// Image the transform belongs to, once known.
        path: Option<PathBuf>,
        /// Which row or column is at fault.
        reason: String,
    },

    /// A direction code matched neither the anatomical nor the axis table.
    #[error("unexpected orientation encoding identifier \"{code}\"{}", located(path))]
    UnknownDirectionCode {
        /// Code as written.
        code: String,
        /// Artifact the code was read from, once known.
        path: Option<PathBuf>,
    },

    /// Malformed content in a metadata artifact.
    #[error("malformed {what} in \"{}\": {reason}", path.display())]
    Decode {
        /// Which piece of metadata.
        what: &'static str,
        /// File being decoded.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A required field is absent from otherwise valid metadata.
    #[error("expected \"{field}\" missing from \"{}\"", path.display())]
    MissingField {
        /// Field name as it appears in the artifact.
        field: &'static str,
        /// Artifact that should have carried it.
        path: PathBuf,
    },

    /// The input contradicts itself.
    #[error("inconsistent {what} in \"{}\": {reason}", path.display())]
    Invariant {
        /// Which piece of metadata.
        what: &'static str,
        /// File involved.
        path: PathBuf,
        /// Description of the contradiction.
        reason: String,
    },

    /// Invalid NIfTI magic bytes.
    #[error("invalid NIfTI magic bytes: {0:?}")]
    InvalidMagic([u8; 4]),

    /// Invalid image dimensions in a header.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Unrecognized or unsupported file format.
    #[error("invalid file format: {0}")]
    InvalidFileFormat(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failure while evaluating one acquisition of a run.
    #[error("{acquisition} in \"{}\": {source}", dir.display())]
    Acquisition {
        /// Rendered acquisition identifier.
        acquisition: String,
        /// Directory under test.
        dir: PathBuf,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Classify this error for triage.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::NotFound { .. } => FailureClass::NotFound,
            Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound => FailureClass::NotFound,
            Self::Io(_) => FailureClass::Io,
            Self::CorruptTransform { .. }
            | Self::NonOrthogonalTransform { .. }
            | Self::UnknownDirectionCode { .. }
            | Self::Decode { .. }
            | Self::MissingField { .. }
            | Self::InvalidMagic(_)
            | Self::InvalidDimensions(_)
            | Self::InvalidFileFormat(_) => FailureClass::Decode,
            Self::Invariant { .. } => FailureClass::Invariant,
            Self::Configuration(_) => FailureClass::Configuration,
            Self::Acquisition { source, .. } => source.class(),
        }
    }

    /// Fill in the file for errors raised before it was known.
    ///
    /// Only [`Error::NonOrthogonalTransform`] and
    /// [`Error::UnknownDirectionCode`] are raised without a path; every
    /// other error is returned unchanged.
    pub fn at_path(self, file: &Path) -> Self {
        match self {
            Self::NonOrthogonalTransform { path: None, reason } => Self::NonOrthogonalTransform {
                path: Some(file.to_path_buf()),
                reason,
            },
            Self::UnknownDirectionCode { code, path: None } => Self::UnknownDirectionCode {
                code,
                path: Some(file.to_path_buf()),
            },
            other => other,
        }
    }

    /// Attach acquisition and directory context.
    pub(crate) fn in_acquisition(self, acquisition: String, dir: PathBuf) -> Self {
        Self::Acquisition {
            acquisition,
            dir,
            source: Box::new(self),
        }
    }
}
