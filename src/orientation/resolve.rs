//! Resolution of symbolic direction codes to anatomical vectors.

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::frame::{AnatomicalVector, CanonicalFrame, PhaseEncodeDir, VoxelVector};
use crate::orientation::transform::OrientationTransform;

/// A direction code under one of the two supported conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectionCode {
    /// Anatomical code such as `LR`; already final.
    Anatomical(PhaseEncodeDir),
    /// Axis-relative code such as `j-`; needs the image transform.
    Axis {
        /// Code as written.
        code: &'static str,
        /// Unit vector along a voxel axis.
        voxel: VoxelVector,
    },
}

impl DirectionCode {
    /// Classify `code`, trying the anatomical convention first.
    pub fn parse(code: &str, frame: &CanonicalFrame) -> Result<Self> {
        if let Some(pe) = PhaseEncodeDir::from_code(code) {
            return Ok(Self::Anatomical(pe));
        }
        match frame.axis_entry(code) {
            Some((code, voxel)) => Ok(Self::Axis { code, voxel }),
            None => Err(Error::UnknownDirectionCode {
                code: code.to_string(),
                path: None,
            }),
        }
    }

    /// Symbolic code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anatomical(pe) => pe.code(),
            Self::Axis { code, .. } => *code,
        }
    }

    /// Anatomical direction, projecting axis codes through `transform`.
    ///
    /// Anatomical codes never pass through the transform.
    pub fn to_anatomical(
        &self,
        frame: &CanonicalFrame,
        transform: &OrientationTransform,
    ) -> AnatomicalVector {
        match *self {
            Self::Anatomical(pe) => frame.phase_encode_vector(pe),
            Self::Axis { voxel, .. } => transform.project(voxel),
        }
    }
}

impl fmt::Display for DirectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DirectionCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Resolves direction codes against an injected frame.
#[derive(Debug, Clone, Copy)]
pub struct DirectionResolver<'f> {
    frame: &'f CanonicalFrame,
}

impl<'f> DirectionResolver<'f> {
    /// Resolver over `frame`.
    pub fn new(frame: &'f CanonicalFrame) -> Self {
        Self { frame }
    }

    /// Frame this resolver reads from.
    pub fn frame(&self) -> &'f CanonicalFrame {
        self.frame
    }

    /// Resolve `code` to an anatomical vector.
    pub fn resolve(&self, code: &str, transform: &OrientationTransform) -> Result<AnatomicalVector> {
        Ok(DirectionCode::parse(code, self.frame)?.to_anatomical(self.frame, transform))
    }
}
