//! Descriptors of how each output format carries DWI metadata.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};

/// Where the diffusion gradient table lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradType {
    /// `dw_scheme` entries in the image header.
    Header,
    /// FSL `.bvec` / `.bval` pair.
    Fsl,
    /// MRtrix `.grad` b-matrix file.
    B,
    /// Not carried.
    None,
}

/// Where key/value metadata (slice encoding, slice timing) lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyvalueType {
    /// Image header text.
    Header,
    /// JSON sidecar.
    Json,
    /// Not carried.
    None,
}

/// Where phase-encoding information lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeType {
    /// `PhaseEncodingDirection` in the image header.
    Header,
    /// `PhaseEncodingDirection` in the JSON sidecar.
    Json,
    /// MRtrix per-volume phase-encoding table (`.petable`).
    Table,
    /// FSL topup table (`.topup`).
    Topup,
    /// FSL eddy config and index files (`.eddycfg`, `.eddyidx`).
    Eddy,
    /// Not carried.
    None,
}

/// One file-format variant under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FileFormat {
    /// Human-readable description.
    pub description: &'static str,
    /// Short name, also used on the command line.
    pub symbolic_name: &'static str,
    /// Extension of the image file.
    pub image_extension: &'static str,
    /// Gradient table encoding.
    pub grad_type: GradType,
    /// Key/value metadata encoding.
    pub keyvalue_type: KeyvalueType,
    /// Phase-encoding encoding.
    pub pe_type: PeType,
}

/// Every supported format variant.
pub const FILE_FORMATS: [FileFormat; 6] = [
    FileFormat {
        description: "NIfTI w. bvecs/bvals and JSON",
        symbolic_name: "niibvecbvaljson",
        image_extension: "nii",
        grad_type: GradType::Fsl,
        keyvalue_type: KeyvalueType::Json,
        pe_type: PeType::Json,
    },
    FileFormat {
        description: "NIfTI w. FSL eddy phase-encoding files",
        symbolic_name: "niieddy",
        image_extension: "nii",
        grad_type: GradType::None,
        keyvalue_type: KeyvalueType::None,
        pe_type: PeType::Eddy,
    },
    FileFormat {
        description: "NIfTI w. full topup phase-encoding table",
        symbolic_name: "niitopup",
        image_extension: "nii",
        grad_type: GradType::None,
        keyvalue_type: KeyvalueType::None,
        pe_type: PeType::Topup,
    },
    FileFormat {
        description: "MIH format w. all read from header",
        symbolic_name: "mih",
        image_extension: "mih",
        grad_type: GradType::Header,
        keyvalue_type: KeyvalueType::Header,
        pe_type: PeType::Header,
    },
    FileFormat {
        description: "MIF format w. external metadata",
        symbolic_name: "mifjsongrad",
        image_extension: "mif",
        grad_type: GradType::B,
        keyvalue_type: KeyvalueType::Json,
        pe_type: PeType::Json,
    },
    FileFormat {
        description: "MIF format w. external phase encoding table",
        symbolic_name: "mifpetable",
        image_extension: "mif",
        grad_type: GradType::None,
        keyvalue_type: KeyvalueType::None,
        pe_type: PeType::Table,
    },
];

impl FileFormat {
    /// Look up a format by its symbolic name.
    pub fn by_name(name: &str) -> Result<Self> {
        FILE_FORMATS
            .iter()
            .copied()
            .find(|f| f.symbolic_name == name)
            .ok_or_else(|| {
                let known: Vec<&str> = FILE_FORMATS.iter().map(|f| f.symbolic_name).collect();
                Error::Configuration(format!(
                    "unknown file format '{}' (expected one of: {})",
                    name,
                    known.join(", ")
                ))
            })
    }

    /// Whether the image header itself carries key/value metadata.
    pub fn reads_header(&self) -> bool {
        self.keyvalue_type == KeyvalueType::Header || self.pe_type == PeType::Header
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbolic_name, self.description)
    }
}

impl FromStr for FileFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::by_name(s)
    }
}
