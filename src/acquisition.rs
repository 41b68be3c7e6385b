//! Enumeration of the synthetic acquisition space.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::frame::{shares_axis, AnatomicalVector, CanonicalFrame, Plane, PhaseEncodeDir, SliceOrder};

/// Identity of one synthetic acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AcquisitionId {
    /// Imaging plane.
    pub plane: Plane,
    /// Slice acquisition order.
    pub slice_order: SliceOrder,
    /// Phase-encoding direction.
    pub phase_encode: PhaseEncodeDir,
}

impl AcquisitionId {
    /// Create an identifier without checking physical validity.
    pub const fn new(plane: Plane, slice_order: SliceOrder, phase_encode: PhaseEncodeDir) -> Self {
        Self {
            plane,
            slice_order,
            phase_encode,
        }
    }

    /// Canonical rendering, used both for display and as the artifact file stem.
    pub fn stem(&self) -> String {
        format!(
            "DWI_{}_{}_{}",
            self.plane.code(),
            self.slice_order.code(),
            self.phase_encode.code()
        )
    }

    /// Path of the artifact with extension `ext` for this acquisition in `dir`.
    pub fn artifact_path(&self, dir: &Path, ext: &str) -> PathBuf {
        dir.join(format!("{}.{}", self.stem(), ext))
    }

    /// Slice-encoding direction implied by plane and slice order.
    pub fn expected_slice_encoding(&self, frame: &CanonicalFrame) -> AnatomicalVector {
        frame.expected_slice_encoding(self.plane, self.slice_order)
    }

    /// Phase-encoding direction implied by the acquisition.
    pub fn expected_phase_encoding(&self, frame: &CanonicalFrame) -> AnatomicalVector {
        frame.phase_encode_vector(self.phase_encode)
    }

    /// Whether a scanner could run this combination.
    pub fn is_physical(&self, frame: &CanonicalFrame) -> bool {
        !shares_axis(
            &frame.plane_normal(self.plane),
            &frame.phase_encode_vector(self.phase_encode),
        )
    }
}

impl fmt::Display for AcquisitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem())
    }
}

/// The complete, ordered set of physically valid acquisitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionSpace {
    acquisitions: Vec<AcquisitionId>,
}

impl AcquisitionSpace {
    /// Enumerate plane × phase-encoding × slice order, keeping only
    /// combinations whose plane normal and phase-encoding axis differ.
    ///
    /// The order is stable: plane-major, then phase encoding, then slice order.
    pub fn generate(frame: &CanonicalFrame) -> Self {
        let mut acquisitions = Vec::new();
        for plane in Plane::ALL {
            for phase_encode in PhaseEncodeDir::ALL {
                for slice_order in SliceOrder::ALL {
                    let acq = AcquisitionId::new(plane, slice_order, phase_encode);
                    if acq.is_physical(frame) {
                        acquisitions.push(acq);
                    }
                }
            }
        }
        Self { acquisitions }
    }

    /// Number of acquisitions.
    pub fn len(&self) -> usize {
        self.acquisitions.len()
    }

    /// True if the space is empty.
    pub fn is_empty(&self) -> bool {
        self.acquisitions.is_empty()
    }

    /// Iterate in generation order.
    pub fn iter(&self) -> std::slice::Iter<'_, AcquisitionId> {
        self.acquisitions.iter()
    }

    /// Acquisitions as a slice.
    pub fn as_slice(&self) -> &[AcquisitionId] {
        &self.acquisitions
    }
}

impl<'a> IntoIterator for &'a AcquisitionSpace {
    type Item = &'a AcquisitionId;
    type IntoIter = std::slice::Iter<'a, AcquisitionId>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
