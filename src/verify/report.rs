//! Mismatch records and per-run aggregation.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::acquisition::AcquisitionId;
use crate::error::{Error, FailureClass};
use crate::frame::{AnatomicalVector, PhaseEncodeDir, Plane, SliceOrder};
use crate::metadata::MetadataTests;
use crate::orientation::OrientationTransform;

/// Check that produced a mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MismatchCategory {
    /// Slice-encoding direction.
    SliceEncoding,
    /// Phase-encoding direction.
    PhaseEncoding,
    /// Gradient table fiducials.
    GradientTable,
}

impl MismatchCategory {
    /// All categories in reporting order.
    pub const ALL: [Self; 3] = [Self::SliceEncoding, Self::PhaseEncoding, Self::GradientTable];

    /// Human-readable name used in summaries.
    pub const fn label(self) -> &'static str {
        match self {
            Self::SliceEncoding => "slice encoding direction",
            Self::PhaseEncoding => "phase encoding direction",
            Self::GradientTable => "gradient table",
        }
    }
}

/// Observed versus expected values of a failed comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category", rename_all = "kebab-case")]
pub enum MismatchDetail {
    /// Slice-encoding direction disagreed with plane and slice order.
    SliceEncoding {
        /// Code read from metadata.
        code: String,
        /// Whether slice timing reversed the code.
        reversed: bool,
        /// Resolved anatomical direction.
        observed: AnatomicalVector,
        /// Plane of the acquisition.
        plane: Plane,
        /// Slice order of the acquisition.
        order: SliceOrder,
        /// Direction implied by plane and order.
        expected: AnatomicalVector,
    },
    /// Phase-encoding direction disagreed with the acquisition.
    PhaseEncoding {
        /// Code or table row read from metadata.
        observed_label: String,
        /// Resolved anatomical direction.
        observed: AnatomicalVector,
        /// Phase-encoding direction of the acquisition.
        expected_code: PhaseEncodeDir,
        /// Its anatomical vector.
        expected: AnatomicalVector,
    },
    /// Gradient fiducials disagreed with the device axes.
    GradientTable {
        /// Fiducial directions in anatomical space, one per row.
        observed: [[f64; 3]; 3],
        /// True if every fiducial is exactly reversed.
        antipodal: bool,
    },
}

/// One failed comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    /// Acquisition under test.
    pub acquisition: AcquisitionId,
    /// Transform the comparison was made under.
    pub transform: OrientationTransform,
    /// What disagreed.
    #[serde(flatten)]
    pub detail: MismatchDetail,
}

impl Mismatch {
    /// Category this mismatch is reported under.
    pub fn category(&self) -> MismatchCategory {
        match self.detail {
            MismatchDetail::SliceEncoding { .. } => MismatchCategory::SliceEncoding,
            MismatchDetail::PhaseEncoding { .. } => MismatchCategory::PhaseEncoding,
            MismatchDetail::GradientTable { .. } => MismatchCategory::GradientTable,
        }
    }
}

fn fmt_rows(f: &mut fmt::Formatter<'_>, rows: &[[f64; 3]; 3]) -> fmt::Result {
    f.write_str("[")?;
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "[{} {} {}]", row[0], row[1], row[2])?;
    }
    f.write_str("]")
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            MismatchDetail::SliceEncoding {
                code,
                reversed,
                observed,
                plane,
                order,
                expected,
            } => write!(
                f,
                "{}: \"{}\" x {}; transform: {} = {:?} != \"{}\" x {} = {:?}",
                self.acquisition,
                code,
                if *reversed { -1 } else { 1 },
                self.transform,
                observed,
                plane,
                order,
                expected
            ),
            MismatchDetail::PhaseEncoding {
                observed_label,
                observed,
                expected_code,
                expected,
            } => write!(
                f,
                "{}: \"{}\"; transform: {} = {:?} != \"{}\" = {:?}",
                self.acquisition, observed_label, self.transform, observed, expected_code, expected
            ),
            MismatchDetail::GradientTable { antipodal: true, .. } => {
                write!(f, "{}: ANTIPODAL", self.acquisition)
            }
            MismatchDetail::GradientTable { observed, .. } => {
                write!(f, "{}: ", self.acquisition)?;
                fmt_rows(f, observed)
            }
        }
    }
}

/// An acquisition that could not be verified at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquisitionFailure {
    /// Acquisition under test.
    pub acquisition: AcquisitionId,
    /// Triage class of the error.
    pub class: FailureClass,
    /// Rendered error.
    pub message: String,
}

impl fmt::Display for AcquisitionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}] {}", self.acquisition, self.class, self.message)
    }
}

/// Outcome of verifying one output directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MismatchReport {
    /// Name of the test run.
    pub test_name: String,
    /// Directory that was verified.
    pub directory: PathBuf,
    /// Symbolic name of the file format.
    pub format: &'static str,
    /// Checks that were performed.
    pub tests: MetadataTests,
    /// Number of acquisitions in the run, failed ones included.
    pub acquisitions: usize,
    slice_encoding: Vec<Mismatch>,
    phase_encoding: Vec<Mismatch>,
    gradient_table: Vec<Mismatch>,
    failures: Vec<AcquisitionFailure>,
}

impl MismatchReport {
    /// Empty report.
    pub fn new(
        test_name: impl Into<String>,
        directory: impl Into<PathBuf>,
        format: &'static str,
        tests: MetadataTests,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            directory: directory.into(),
            format,
            tests,
            acquisitions: 0,
            slice_encoding: Vec::new(),
            phase_encoding: Vec::new(),
            gradient_table: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Append a mismatch under its category.
    pub fn push(&mut self, mismatch: Mismatch) {
        match mismatch.category() {
            MismatchCategory::SliceEncoding => self.slice_encoding.push(mismatch),
            MismatchCategory::PhaseEncoding => self.phase_encoding.push(mismatch),
            MismatchCategory::GradientTable => self.gradient_table.push(mismatch),
        }
    }

    /// Record an acquisition that could not be evaluated.
    pub fn record_failure(&mut self, acquisition: AcquisitionId, error: &Error) {
        let message = match error {
            Error::Acquisition { source, .. } => source.to_string(),
            other => other.to_string(),
        };
        self.failures.push(AcquisitionFailure {
            acquisition,
            class: error.class(),
            message,
        });
    }

    /// Mismatches in one category, in acquisition order.
    pub fn mismatches(&self, category: MismatchCategory) -> &[Mismatch] {
        match category {
            MismatchCategory::SliceEncoding => &self.slice_encoding,
            MismatchCategory::PhaseEncoding => &self.phase_encoding,
            MismatchCategory::GradientTable => &self.gradient_table,
        }
    }

    /// Acquisitions that failed to evaluate.
    pub fn failures(&self) -> &[AcquisitionFailure] {
        &self.failures
    }

    /// Total number of mismatches across categories.
    pub fn total_mismatches(&self) -> usize {
        MismatchCategory::ALL
            .iter()
            .map(|&c| self.mismatches(c).len())
            .sum()
    }

    /// Gradient-table mismatches that are exact antipodes.
    pub fn antipodal_count(&self) -> usize {
        self.gradient_table
            .iter()
            .filter(|m| matches!(m.detail, MismatchDetail::GradientTable { antipodal: true, .. }))
            .count()
    }

    /// True if nothing disagreed and nothing failed.
    pub fn is_clean(&self) -> bool {
        self.total_mismatches() == 0 && self.failures.is_empty()
    }

    /// Whether `category` was part of this run.
    pub fn checked(&self, category: MismatchCategory) -> bool {
        match category {
            MismatchCategory::SliceEncoding => self.tests.slice_encoding,
            MismatchCategory::PhaseEncoding => self.tests.phase_encoding,
            MismatchCategory::GradientTable => self.tests.gradtable,
        }
    }

    fn nothing_evaluated(&self) -> bool {
        self.failures.len() >= self.acquisitions
    }

    /// Summary of a category with no mismatches.
    ///
    /// Only claims "no errors" if the check ran on at least one acquisition.
    fn clean_line(&self, category: MismatchCategory) -> String {
        if !self.checked(category) {
            format!("{} not checked for {}", category.label(), self.format)
        } else if self.nothing_evaluated() {
            format!(
                "{} not verified: no acquisition could be evaluated",
                category.label()
            )
        } else {
            format!("No {} errors", category.label())
        }
    }

    /// Log the summary: `info!` for clean categories, `warn!` otherwise.
    pub fn emit(&self) {
        info!(test = %self.test_name, format = self.format, "Results for {}:", self.test_name);
        for category in MismatchCategory::ALL {
            let mismatches = self.mismatches(category);
            if mismatches.is_empty() {
                let line = self.clean_line(category);
                if self.checked(category) && self.nothing_evaluated() {
                    warn!(test = %self.test_name, "{}", line);
                } else {
                    info!(test = %self.test_name, "{}", line);
                }
                continue;
            }
            warn!(
                test = %self.test_name,
                count = mismatches.len(),
                "{} errors in {} for {}:",
                mismatches.len(),
                category.label(),
                self.test_name
            );
            for mismatch in mismatches {
                warn!(test = %self.test_name, "  {}", mismatch);
            }
        }
        if !self.failures.is_empty() {
            warn!(
                test = %self.test_name,
                count = self.failures.len(),
                "{} acquisitions could not be verified for {}:",
                self.failures.len(),
                self.test_name
            );
            for failure in &self.failures {
                warn!(test = %self.test_name, class = %failure.class, "  {}", failure);
            }
        }
    }
}

impl fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Results for {}:", self.test_name)?;
        for category in MismatchCategory::ALL {
            let mismatches = self.mismatches(category);
            if mismatches.is_empty() {
                writeln!(f, "{}", self.clean_line(category))?;
                continue;
            }
            writeln!(
                f,
                "{} errors in {} for {}:",
                mismatches.len(),
                category.label(),
                self.test_name
            )?;
            for mismatch in mismatches {
                writeln!(f, "  {}", mismatch)?;
            }
        }
        if !self.failures.is_empty() {
            writeln!(
                f,
                "{} acquisitions could not be verified for {}:",
                self.failures.len(),
                self.test_name
            )?;
            for failure in &self.failures {
                writeln!(f, "  {}", failure)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acq() -> AcquisitionId {
        AcquisitionId::new(Plane::Tra, SliceOrder::Asc, PhaseEncodeDir::LR)
    }

    fn report() -> MismatchReport {
        let mut r = MismatchReport::new("dcm2niix", "/out", "niibvecbvaljson", MetadataTests::all());
        r.acquisitions = 24;
        r
    }

    #[test]
    fn test_empty_report() {
        let r = report();
        assert!(r.is_clean());
        let text = r.to_string();
        assert!(text.contains("No slice encoding direction errors"));
        assert!(text.contains("No phase encoding direction errors"));
        assert!(text.contains("No gradient table errors"));
    }

    #[test]
    fn test_disabled_categories_are_not_checked() {
        let tests = MetadataTests {
            gradtable: false,
            phase_encoding: true,
            slice_encoding: false,
        };
        let mut r = MismatchReport::new("eddy", "/out", "niieddy", tests);
        r.acquisitions = 24;
        let text = r.to_string();
        assert!(text.contains("slice encoding direction not checked for niieddy"));
        assert!(text.contains("gradient table not checked for niieddy"));
        assert!(text.contains("No phase encoding direction errors"));
        assert!(!text.contains("No gradient table errors"));
    }

    #[test]
    fn test_no_clean_claim_when_every_acquisition_failed() {
        let tests = MetadataTests {
            phase_encoding: true,
            ..MetadataTests::none()
        };
        let mut r = MismatchReport::new("t", "/out", "niitopup", tests);
        r.acquisitions = 1;
        let err = Error::NotFound {
            artifact: "image",
            path: PathBuf::from("/out/DWI_Tra_Asc_LR.nii"),
            context: "transform query".into(),
        };
        r.record_failure(acq(), &err);
        let text = r.to_string();
        assert!(text.contains("phase encoding direction not verified"));
        assert!(!text.contains("No phase encoding direction errors"));
        assert!(text.contains("/out/DWI_Tra_Asc_LR.nii"));
    }

    #[test]
    fn test_routing_and_rendering() {
        let mut r = report();
        r.push(Mismatch {
            acquisition: acq(),
            transform: OrientationTransform::IDENTITY,
            detail: MismatchDetail::GradientTable {
                observed: [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]],
                antipodal: true,
            },
        });
        r.push(Mismatch {
            acquisition: acq(),
            transform: OrientationTransform::IDENTITY,
            detail: MismatchDetail::PhaseEncoding {
                observed_label: "i-".into(),
                observed: [-1, 0, 0],
                expected_code: PhaseEncodeDir::LR,
                expected: [1, 0, 0],
            },
        });
        assert_eq!(r.mismatches(MismatchCategory::GradientTable).len(), 1);
        assert_eq!(r.mismatches(MismatchCategory::PhaseEncoding).len(), 1);
        assert_eq!(r.total_mismatches(), 2);
        assert_eq!(r.antipodal_count(), 1);

        let text = r.to_string();
        assert!(text.contains("DWI_Tra_Asc_LR: ANTIPODAL"));
        assert!(text.contains(
            "DWI_Tra_Asc_LR: \"i-\"; transform: [[1, 0, 0], [0, 1, 0], [0, 0, 1]] = [-1, 0, 0] != \"LR\" = [1, 0, 0]"
        ));
        assert!(text.contains("No slice encoding direction errors"));
    }

    #[test]
    fn test_failure_unwraps_context() {
        let mut r = report();
        let err = Error::MissingField {
            field: "SliceEncodingDirection",
            path: PathBuf::from("/out/DWI_Tra_Asc_LR.json"),
        }
        .in_acquisition(acq().stem(), PathBuf::from("/out"));
        r.record_failure(acq(), &err);
        assert!(!r.is_clean());
        assert_eq!(r.failures()[0].class, FailureClass::Decode);
        assert!(r.failures()[0].message.starts_with("expected \"SliceEncodingDirection\""));
    }

    #[test]
    fn test_serialize() {
        let mut r = report();
        r.push(Mismatch {
            acquisition: acq(),
            transform: OrientationTransform::IDENTITY,
            detail: MismatchDetail::SliceEncoding {
                code: "k".into(),
                reversed: true,
                observed: [0, 0, -1],
                plane: Plane::Tra,
                order: SliceOrder::Asc,
                expected: [0, 0, 1],
            },
        });
        let json = serde_json::to_value(&r).unwrap();
        let entry = &json["slice_encoding"][0];
        assert_eq!(entry["category"], "slice-encoding");
        assert_eq!(entry["acquisition"]["plane"], "Tra");
        assert_eq!(entry["observed"], serde_json::json!([0, 0, -1]));
        assert_eq!(entry["transform"], serde_json::json!([[1, 0, 0], [0, 1, 0], [0, 0, 1]]));
    }
}
