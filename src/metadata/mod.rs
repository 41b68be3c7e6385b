//! Extraction of orientation metadata from conversion outputs.

use std::fmt;

use serde::Serialize;

pub mod extract;
pub mod format;
pub mod record;
pub mod tables;

pub use extract::MetadataExtractor;
pub use format::{FileFormat, GradType, KeyvalueType, PeType, FILE_FORMATS};
pub use record::{
    DwiMetadata, GradientScheme, JsonSidecar, KeyValueSource, PhaseEncoding, SliceEncoding,
};

/// Which checks a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MetadataTests {
    /// Check the gradient table fiducials.
    pub gradtable: bool,
    /// Check the phase-encoding direction.
    pub phase_encoding: bool,
    /// Check the slice-encoding direction.
    pub slice_encoding: bool,
}

impl Default for MetadataTests {
    fn default() -> Self {
        Self::all()
    }
}

impl MetadataTests {
    /// Every check enabled.
    pub const fn all() -> Self {
        Self {
            gradtable: true,
            phase_encoding: true,
            slice_encoding: true,
        }
    }

    /// Every check disabled.
    pub const fn none() -> Self {
        Self {
            gradtable: false,
            phase_encoding: false,
            slice_encoding: false,
        }
    }

    /// True if no check is enabled.
    pub fn is_empty(&self) -> bool {
        !(self.gradtable || self.phase_encoding || self.slice_encoding)
    }

    /// The subset of these checks that `format` carries data for.
    pub fn supported_by(&self, format: &FileFormat) -> Self {
        Self {
            gradtable: self.gradtable && format.grad_type != GradType::None,
            phase_encoding: self.phase_encoding && format.pe_type != PeType::None,
            slice_encoding: self.slice_encoding && format.keyvalue_type != KeyvalueType::None,
        }
    }
}

impl fmt::Display for MetadataTests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.gradtable {
            names.push("gradtable");
        }
        if self.phase_encoding {
            names.push("phase-encoding");
        }
        if self.slice_encoding {
            names.push("slice-encoding");
        }
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(", "))
        }
    }
}
