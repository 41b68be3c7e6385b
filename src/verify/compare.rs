//! Comparison of extracted metadata against the ground truth of an acquisition.
//!
//! Everything here is pure: no file access, no logging.

use serde::Serialize;

use crate::acquisition::AcquisitionId;
use crate::error::{Error, Result};
use crate::frame::{negated, AnatomicalVector, CanonicalFrame, VoxelVector};
use crate::metadata::{DwiMetadata, GradientScheme, MetadataTests, PhaseEncoding, SliceEncoding};
use crate::orientation::{DirectionResolver, OrientationTransform};
use crate::verify::report::{Mismatch, MismatchDetail};

/// Result of comparing gradient fiducials with the device axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GradientOutcome {
    /// Every fiducial matches.
    Match,
    /// Every fiducial is exactly reversed.
    Antipodal,
    /// Anything else.
    Mismatch,
}

/// Round anatomical fiducials and classify them against `frame`.
pub fn classify_fiducials(observed: &[[f64; 3]; 3], frame: &CanonicalFrame) -> GradientOutcome {
    let rounded = observed.map(|row| row.map(|v| v.round() as i32));
    let expected = frame.fiducials();
    if rounded == *expected {
        GradientOutcome::Match
    } else if rounded.map(negated) == *expected {
        GradientOutcome::Antipodal
    } else {
        GradientOutcome::Mismatch
    }
}

fn fsl_voxel(transform: &OrientationTransform, stored: VoxelVector) -> VoxelVector {
    transform
        .fsl_to_voxel(stored.map(f64::from))
        .map(|c| c as i32)
}

/// Compares metadata with the orientation an acquisition physically implies.
#[derive(Debug, Clone)]
pub struct Verifier<'f> {
    resolver: DirectionResolver<'f>,
    default_slice_encoding: Option<String>,
}

impl<'f> Verifier<'f> {
    /// Verifier over `frame`.
    pub fn new(frame: &'f CanonicalFrame) -> Self {
        Self {
            resolver: DirectionResolver::new(frame),
            default_slice_encoding: None,
        }
    }

    /// Slice-encoding code assumed when metadata omits it.
    pub fn default_slice_encoding(mut self, code: Option<String>) -> Self {
        self.default_slice_encoding = code;
        self
    }

    /// Frame used for ground truth.
    pub fn frame(&self) -> &'f CanonicalFrame {
        self.resolver.frame()
    }

    /// Run every enabled check.
    ///
    /// A transform embedded in the metadata takes precedence over `transform`.
    /// Mismatches are returned in slice, phase, gradient order. An enabled
    /// check whose metadata is absent is a configuration error, not a pass.
    pub fn verify(
        &self,
        acquisition: &AcquisitionId,
        metadata: &DwiMetadata,
        transform: &OrientationTransform,
        tests: MetadataTests,
    ) -> Result<Vec<Mismatch>> {
        let transform = metadata.embedded_transform.as_ref().unwrap_or(transform);
        let absent = |what: &str| {
            Error::Configuration(format!(
                "{} check is enabled but no {} was extracted for {}",
                what, what, acquisition
            ))
        };
        let mut mismatches = Vec::new();
        if tests.slice_encoding {
            let slice = metadata
                .slice_encoding
                .as_ref()
                .ok_or_else(|| absent("slice encoding"))?;
            mismatches.extend(self.check_slice_encoding(acquisition, slice, transform)?);
        }
        if tests.phase_encoding {
            let pe = metadata
                .phase_encoding
                .as_ref()
                .ok_or_else(|| absent("phase encoding"))?;
            mismatches.extend(self.check_phase_encoding(acquisition, pe, transform)?);
        }
        if tests.gradtable {
            let scheme = metadata
                .gradients
                .as_ref()
                .ok_or_else(|| absent("gradient table"))?;
            mismatches.extend(self.check_gradients(acquisition, scheme, transform)?);
        }
        Ok(mismatches)
    }

    /// Resolved slice-encoding direction, reversed when slice timing descends.
    pub fn slice_encoding_vector(
        &self,
        slice: &SliceEncoding,
        transform: &OrientationTransform,
    ) -> Result<(String, AnatomicalVector)> {
        let code = slice
            .code
            .as_deref()
            .or(self.default_slice_encoding.as_deref())
            .ok_or_else(|| Error::MissingField {
                field: "SliceEncodingDirection",
                path: slice.origin.clone(),
            })?;
        let mut vector = self
            .resolver
            .resolve(code, transform)
            .map_err(|e| e.at_path(&slice.origin))?;
        if slice.is_reversed() {
            vector = negated(vector);
        }
        Ok((code.to_string(), vector))
    }

    /// Compare the slice-encoding direction.
    pub fn check_slice_encoding(
        &self,
        acquisition: &AcquisitionId,
        slice: &SliceEncoding,
        transform: &OrientationTransform,
    ) -> Result<Option<Mismatch>> {
        let (code, observed) = self.slice_encoding_vector(slice, transform)?;
        let expected = acquisition.expected_slice_encoding(self.frame());
        if observed == expected {
            return Ok(None);
        }
        Ok(Some(Mismatch {
            acquisition: *acquisition,
            transform: *transform,
            detail: MismatchDetail::SliceEncoding {
                code,
                reversed: slice.is_reversed(),
                observed,
                plane: acquisition.plane,
                order: acquisition.slice_order,
                expected,
            },
        }))
    }

    /// Anatomical phase-encoding direction of `pe` under `transform`.
    pub fn phase_encoding_vector(
        &self,
        pe: &PhaseEncoding,
        transform: &OrientationTransform,
    ) -> Result<AnatomicalVector> {
        Ok(match pe {
            PhaseEncoding::Code { code, origin } => self
                .resolver
                .resolve(code, transform)
                .map_err(|e| e.at_path(origin))?,
            PhaseEncoding::Table(voxel) => transform.project(*voxel),
            PhaseEncoding::Topup(voxel) | PhaseEncoding::Eddy(voxel) => {
                transform.project(fsl_voxel(transform, *voxel))
            }
        })
    }

    /// Compare the phase-encoding direction.
    pub fn check_phase_encoding(
        &self,
        acquisition: &AcquisitionId,
        pe: &PhaseEncoding,
        transform: &OrientationTransform,
    ) -> Result<Option<Mismatch>> {
        let observed = self.phase_encoding_vector(pe, transform)?;
        let expected = acquisition.expected_phase_encoding(self.frame());
        if observed == expected {
            return Ok(None);
        }
        Ok(Some(Mismatch {
            acquisition: *acquisition,
            transform: *transform,
            detail: MismatchDetail::PhaseEncoding {
                observed_label: pe.label(),
                observed,
                expected_code: acquisition.phase_encode,
                expected,
            },
        }))
    }

    /// Fiducial directions in anatomical space, before rounding.
    ///
    /// b-matrix rows are already in scanner space; FSL bvecs are corrected
    /// for the FSL voxel convention and projected through `transform`.
    pub fn gradient_fiducials(
        &self,
        scheme: &GradientScheme,
        transform: &OrientationTransform,
    ) -> Result<[[f64; 3]; 3]> {
        let stored = scheme.fiducial_directions().ok_or_else(|| {
            Error::InvalidDimensions(format!(
                "gradient table has {} volumes, need at least 4",
                scheme.volumes()
            ))
        })?;
        Ok(match scheme {
            GradientScheme::BMatrix(_) => stored,
            GradientScheme::Fsl(_) => {
                stored.map(|v| transform.project_f64(transform.fsl_to_voxel(v)))
            }
        })
    }

    /// Compare the gradient fiducials.
    pub fn check_gradients(
        &self,
        acquisition: &AcquisitionId,
        scheme: &GradientScheme,
        transform: &OrientationTransform,
    ) -> Result<Option<Mismatch>> {
        let observed = self.gradient_fiducials(scheme, transform)?;
        let antipodal = match classify_fiducials(&observed, self.frame()) {
            GradientOutcome::Match => return Ok(None),
            GradientOutcome::Antipodal => true,
            GradientOutcome::Mismatch => false,
        };
        Ok(Some(Mismatch {
            acquisition: *acquisition,
            transform: *transform,
            detail: MismatchDetail::GradientTable {
                observed,
                antipodal,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{PhaseEncodeDir, Plane, SliceOrder};
    use ndarray::array;
    use std::path::PathBuf;

    fn frame() -> &'static CanonicalFrame {
        CanonicalFrame::standard()
    }

    fn tra_asc_lr() -> AcquisitionId {
        AcquisitionId::new(Plane::Tra, SliceOrder::Asc, PhaseEncodeDir::LR)
    }

    fn slice(code: Option<&str>, timing: Vec<f64>) -> SliceEncoding {
        SliceEncoding {
            code: code.map(str::to_string),
            slice_timing: Some(timing),
            origin: PathBuf::from("a.json"),
        }
    }

    fn code(code: &str) -> PhaseEncoding {
        PhaseEncoding::Code {
            code: code.to_string(),
            origin: PathBuf::from("/out/DWI_Tra_Asc_LR.json"),
        }
    }

    fn device_bmatrix() -> GradientScheme {
        GradientScheme::BMatrix(array![
            [0.0, 0.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0, 1000.0],
            [0.0, 1.0, 0.0, 1000.0],
            [0.0, 0.0, -1.0, 1000.0],
        ])
    }

    #[test]
    fn test_matching_metadata_has_no_mismatches() {
        let verifier = Verifier::new(frame());
        let metadata = DwiMetadata {
            gradients: Some(device_bmatrix()),
            phase_encoding: Some(code("i")),
            slice_encoding: Some(slice(Some("k"), vec![0.0, 0.5, 1.0])),
            embedded_transform: None,
        };
        let mismatches = verifier
            .verify(&tra_asc_lr(), &metadata, &OrientationTransform::IDENTITY, MetadataTests::all())
            .unwrap();
        assert!(mismatches.is_empty());
    }

    #[test]
    fn test_reversed_slice_timing() {
        let verifier = Verifier::new(frame());
        let t = OrientationTransform::IDENTITY;
        let (_, v) = verifier
            .slice_encoding_vector(&slice(Some("k"), vec![1.0, 0.5, 0.0]), &t)
            .unwrap();
        assert_eq!(v, [0, 0, -1]);

        let mismatch = verifier
            .check_slice_encoding(&tra_asc_lr(), &slice(Some("k"), vec![1.0, 0.0]), &t)
            .unwrap()
            .unwrap();
        assert!(matches!(
            mismatch.detail,
            MismatchDetail::SliceEncoding { reversed: true, observed: [0, 0, -1], .. }
        ));
    }

    #[test]
    fn test_default_slice_code() {
        let t = OrientationTransform::IDENTITY;
        let s = slice(None, vec![0.0, 1.0]);
        let err = Verifier::new(frame()).check_slice_encoding(&tra_asc_lr(), &s, &t);
        assert!(matches!(err, Err(Error::MissingField { field: "SliceEncodingDirection", .. })));

        let verifier = Verifier::new(frame()).default_slice_encoding(Some("k".into()));
        assert!(verifier.check_slice_encoding(&tra_asc_lr(), &s, &t).unwrap().is_none());
    }

    #[test]
    fn test_unknown_code_names_its_file() {
        let verifier = Verifier::new(frame());
        let t = OrientationTransform::IDENTITY;
        let err = verifier
            .check_phase_encoding(&tra_asc_lr(), &code("x+"), &t)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownDirectionCode { path: Some(_), .. }));
        assert!(err.to_string().contains("/out/DWI_Tra_Asc_LR.json"));

        let err = verifier
            .check_slice_encoding(&tra_asc_lr(), &slice(Some("z"), vec![0.0, 1.0]), &t)
            .unwrap_err();
        assert!(err.to_string().contains("a.json"));
    }

    #[test]
    fn test_enabled_check_without_metadata_is_error() {
        let verifier = Verifier::new(frame());
        let metadata = DwiMetadata {
            phase_encoding: Some(code("i")),
            ..Default::default()
        };
        let err = verifier
            .verify(&tra_asc_lr(), &metadata, &OrientationTransform::IDENTITY, MetadataTests::all())
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(ref msg) if msg.contains("slice encoding")));

        let phase_only = MetadataTests {
            gradtable: false,
            phase_encoding: true,
            slice_encoding: false,
        };
        let mismatches = verifier
            .verify(&tra_asc_lr(), &metadata, &OrientationTransform::IDENTITY, phase_only)
            .unwrap();
        assert!(mismatches.is_empty());
    }

    #[test]
    fn test_topup_correction() {
        let verifier = Verifier::new(frame());
        // det = +1: stored first component is inverted
        let t = OrientationTransform::IDENTITY;
        let v = verifier
            .phase_encoding_vector(&PhaseEncoding::Topup([-1, 0, 0]), &t)
            .unwrap();
        assert_eq!(v, [1, 0, 0]);
        // det = -1: stored as-is
        let flip = OrientationTransform::from_rows([[-1, 0, 0], [0, 1, 0], [0, 0, 1]]).unwrap();
        let v = verifier
            .phase_encoding_vector(&PhaseEncoding::Eddy([-1, 0, 0]), &flip)
            .unwrap();
        assert_eq!(v, [1, 0, 0]);
        // petable rows are not in FSL convention
        let v = verifier
            .phase_encoding_vector(&PhaseEncoding::Table([1, 0, 0]), &t)
            .unwrap();
        assert_eq!(v, [1, 0, 0]);
    }

    #[test]
    fn test_fsl_bvec_correction() {
        let verifier = Verifier::new(frame());
        let t = OrientationTransform::from_rows([[0, 0, 1], [1, 0, 0], [0, 1, 0]]).unwrap();
        assert!(t.determinant() > 0);
        let stored = GradientScheme::Fsl(array![
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let uncorrected = GradientScheme::BMatrix(array![
            [0.0, 0.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ]);
        let fiducials = verifier.gradient_fiducials(&stored, &t).unwrap();
        let direct = uncorrected
            .fiducial_directions()
            .unwrap()
            .map(|v| t.project_f64(v));
        assert_eq!(fiducials, direct);
    }

    #[test]
    fn test_antipodal_gradients() {
        let verifier = Verifier::new(frame());
        let flipped = GradientScheme::BMatrix(array![
            [0.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 1000.0],
            [0.0, -1.0, 0.0, 1000.0],
            [0.0, 0.0, 1.0, 1000.0],
        ]);
        let mismatch = verifier
            .check_gradients(&tra_asc_lr(), &flipped, &OrientationTransform::IDENTITY)
            .unwrap()
            .unwrap();
        assert!(matches!(
            mismatch.detail,
            MismatchDetail::GradientTable { antipodal: true, .. }
        ));

        let partial = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, -1.0]];
        assert_eq!(classify_fiducials(&partial, frame()), GradientOutcome::Mismatch);
        let near = [[-0.98, 0.02, 0.0], [0.0, 0.97, 0.1], [0.0, 0.0, -1.0]];
        assert_eq!(classify_fiducials(&near, frame()), GradientOutcome::Match);
    }

    #[test]
    fn test_embedded_transform_takes_precedence() {
        let verifier = Verifier::new(frame());
        let flip = OrientationTransform::from_rows([[-1, 0, 0], [0, 1, 0], [0, 0, 1]]).unwrap();
        let metadata = DwiMetadata {
            phase_encoding: Some(code("i-")),
            embedded_transform: Some(flip),
            ..Default::default()
        };
        let tests = MetadataTests {
            gradtable: false,
            phase_encoding: true,
            slice_encoding: false,
        };
        let mismatches = verifier
            .verify(&tra_asc_lr(), &metadata, &OrientationTransform::IDENTITY, tests)
            .unwrap();
        assert!(mismatches.is_empty());
    }
}
