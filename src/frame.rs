//! Canonical anatomical frame and the fixed acquisition vocabulary.
//!
//! All vectors are expressed in RAS: +x Right, +y Anterior, +z Superior.
//!
//! Diffusion gradients are applied in the device coordinate system, which for
//! a head-first supine patient maps +X to Left, +Y to Anterior and +Z to
//! Inferior. Image encoding (planes, phase encoding) follows the patient
//! coordinate system, independent of patient bedding: Sag+ is Left, Cor+ is
//! Posterior and Tra+ is Superior. Both conventions are folded into the
//! tables below so that every comparison happens in RAS.

use std::fmt;

use serde::{Serialize, Serializer};

/// Integer direction in the anatomical (RAS) frame.
pub type AnatomicalVector = [i32; 3];

/// Direction relative to the voxel grid of an image.
pub type VoxelVector = [i32; 3];

/// One expected anatomical direction per gradient fiducial, row-wise.
pub type FiducialMatrix = [[i32; 3]; 3];

/// Imaging plane of an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Plane {
    /// Transverse (axial).
    Tra,
    /// Coronal.
    Cor,
    /// Sagittal.
    Sag,
}

impl Plane {
    /// All planes in enumeration order.
    pub const ALL: [Self; 3] = [Self::Tra, Self::Cor, Self::Sag];

    /// Symbolic code.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Tra => "Tra",
            Self::Cor => "Cor",
            Self::Sag => "Sag",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Temporal order in which slices were acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SliceOrder {
    /// Ascending along the plane normal.
    Asc,
    /// Descending along the plane normal.
    Des,
}

impl SliceOrder {
    /// All slice orders in enumeration order.
    pub const ALL: [Self; 2] = [Self::Asc, Self::Des];

    /// Symbolic code.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Asc => "Asc",
            Self::Des => "Des",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Anatomical phase-encoding direction, named "from-to".
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhaseEncodeDir {
    /// Right to left.
    RL,
    /// Left to right.
    LR,
    /// Anterior to posterior.
    AP,
    /// Posterior to anterior.
    PA,
    /// Head to foot.
    HF,
    /// Foot to head.
    FH,
}

impl PhaseEncodeDir {
    /// All phase-encoding directions in enumeration order.
    pub const ALL: [Self; 6] = [Self::RL, Self::LR, Self::AP, Self::PA, Self::HF, Self::FH];

    /// Symbolic code; doubles as the anatomical direction code.
    pub const fn code(self) -> &'static str {
        match self {
            Self::RL => "RL",
            Self::LR => "LR",
            Self::AP => "AP",
            Self::PA => "PA",
            Self::HF => "HF",
            Self::FH => "FH",
        }
    }

    /// Look up an anatomical code.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|pe| pe.code() == code)
    }

    const fn index(self) -> usize {
        self as usize
    }
}

macro_rules! impl_code_traits {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.code())
            }
        }
    };
}

impl_code_traits!(Plane);
impl_code_traits!(SliceOrder);
impl_code_traits!(PhaseEncodeDir);

/// Axis-relative direction codes (BIDS `i`/`j`/`k` convention).
const AXIS_CODES: [(&str, VoxelVector); 6] = [
    ("i-", [-1, 0, 0]),
    ("i", [1, 0, 0]),
    ("j-", [0, -1, 0]),
    ("j", [0, 1, 0]),
    ("k-", [0, 0, -1]),
    ("k", [0, 0, 1]),
];

/// Immutable table of every ground-truth constant used by the engine.
///
/// Built once per process and shared by reference; see [`CanonicalFrame::standard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalFrame {
    plane_normals: [AnatomicalVector; 3],
    slice_signs: [i32; 2],
    phase_encode_vectors: [AnatomicalVector; 6],
    axis_codes: [(&'static str, VoxelVector); 6],
    fiducials: FiducialMatrix,
}

static STANDARD: CanonicalFrame = CanonicalFrame::build();

impl CanonicalFrame {
    const fn build() -> Self {
        Self {
            // Tra, Cor, Sag
            plane_normals: [[0, 0, 1], [0, -1, 0], [-1, 0, 0]],
            // Asc, Des
            slice_signs: [1, -1],
            // RL, LR, AP, PA, HF, FH
            phase_encode_vectors: [
                [-1, 0, 0],
                [1, 0, 0],
                [0, -1, 0],
                [0, 1, 0],
                [0, 0, -1],
                [0, 0, 1],
            ],
            axis_codes: AXIS_CODES,
            // Device +X, +Y, +Z for a head-first supine patient
            fiducials: [[-1, 0, 0], [0, 1, 0], [0, 0, -1]],
        }
    }

    /// The process-wide frame.
    pub fn standard() -> &'static Self {
        &STANDARD
    }

    /// Anatomical normal of an imaging plane.
    pub fn plane_normal(&self, plane: Plane) -> AnatomicalVector {
        self.plane_normals[plane.index()]
    }

    /// +1 for ascending, -1 for descending.
    pub fn slice_sign(&self, order: SliceOrder) -> i32 {
        self.slice_signs[order.index()]
    }

    /// Anatomical vector of a phase-encoding direction.
    pub fn phase_encode_vector(&self, pe: PhaseEncodeDir) -> AnatomicalVector {
        self.phase_encode_vectors[pe.index()]
    }

    /// Anatomical vector for an anatomical direction code, if it is one.
    pub fn anatomical_code(&self, code: &str) -> Option<AnatomicalVector> {
        PhaseEncodeDir::from_code(code).map(|pe| self.phase_encode_vector(pe))
    }

    /// Voxel-space vector for an axis-relative code, if it is one.
    pub fn axis_code(&self, code: &str) -> Option<VoxelVector> {
        self.axis_entry(code).map(|(_, v)| v)
    }

    /// Table entry (static code text and voxel vector) for an axis-relative code.
    pub fn axis_entry(&self, code: &str) -> Option<(&'static str, VoxelVector)> {
        self.axis_codes.iter().copied().find(|(name, _)| *name == code)
    }

    /// Expected anatomical direction of each gradient fiducial.
    pub fn fiducials(&self) -> &FiducialMatrix {
        &self.fiducials
    }

    /// Slice-encoding direction implied by plane and slice order.
    pub fn expected_slice_encoding(&self, plane: Plane, order: SliceOrder) -> AnatomicalVector {
        let sign = self.slice_sign(order);
        self.plane_normal(plane).map(|c| c * sign)
    }
}

/// True if both vectors are nonzero along at least one common axis.
pub fn shares_axis(a: &[i32; 3], b: &[i32; 3]) -> bool {
    a.iter().zip(b).any(|(&x, &y)| x != 0 && y != 0)
}

/// Componentwise negation.
pub fn negated(v: AnatomicalVector) -> AnatomicalVector {
    v.map(|c| -c)
}
