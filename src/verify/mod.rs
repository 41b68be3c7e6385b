//! Verification runs over one conversion output directory.
//!
//! A run enumerates the acquisition space, extracts metadata for each
//! acquisition, queries its transform and compares the two. Mismatches are
//! collected into a [`MismatchReport`]; acquisitions whose artifacts are
//! missing or malformed are recorded as failures and the run continues.

use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::acquisition::{AcquisitionId, AcquisitionSpace};
use crate::error::{Error, Result};
use crate::frame::CanonicalFrame;
use crate::metadata::{FileFormat, MetadataExtractor, MetadataTests};
use crate::orientation::DirectionCode;
use crate::source::TransformSource;

pub mod compare;
pub mod report;

pub use compare::{classify_fiducials, GradientOutcome, Verifier};
pub use report::{AcquisitionFailure, Mismatch, MismatchCategory, MismatchDetail, MismatchReport};

/// Configuration of a verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyConfig {
    /// Checks to perform.
    pub tests: MetadataTests,
    /// Slice-encoding code assumed when metadata omits it (dcm2niix implies `k`).
    pub default_slice_encoding: Option<String>,
    /// Evaluate acquisitions on the rayon thread pool.
    pub parallel: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            tests: MetadataTests::all(),
            default_slice_encoding: None,
            parallel: false,
        }
    }
}

impl VerifyConfig {
    /// Set the checks to perform.
    pub fn tests(mut self, tests: MetadataTests) -> Self {
        self.tests = tests;
        self
    }

    /// Assume `code` when `SliceEncodingDirection` is absent.
    pub fn default_slice_encoding(mut self, code: &str) -> Self {
        self.default_slice_encoding = Some(code.to_string());
        self
    }

    /// Evaluate acquisitions in parallel.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Skip the gradient table check.
    pub fn skip_gradients(mut self) -> Self {
        self.tests.gradtable = false;
        self
    }

    /// Skip the phase-encoding check.
    pub fn skip_phase_encoding(mut self) -> Self {
        self.tests.phase_encoding = false;
        self
    }

    /// Skip the slice-encoding check.
    pub fn skip_slice_encoding(mut self) -> Self {
        self.tests.slice_encoding = false;
        self
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.tests.is_empty() {
            return Err(Error::Configuration("all metadata tests are disabled".into()));
        }
        if let Some(code) = &self.default_slice_encoding {
            DirectionCode::parse(code, CanonicalFrame::standard()).map_err(|_| {
                Error::Configuration(format!("invalid default slice encoding code '{}'", code))
            })?;
        }
        Ok(())
    }
}

/// Extract, query and compare one acquisition.
pub fn verify_acquisition<S: TransformSource + ?Sized>(
    acquisition: &AcquisitionId,
    dir: &Path,
    extractor: &MetadataExtractor,
    verifier: &Verifier<'_>,
    source: &S,
) -> Result<Vec<Mismatch>> {
    let transform = source.transform(&extractor.image_path(dir, acquisition))?;
    let metadata = extractor.extract(dir, acquisition)?;
    verifier.verify(acquisition, &metadata, &transform, extractor.tests())
}

/// Verify every acquisition of the standard space stored in `dir`.
///
/// Checks the format does not carry are dropped from the run. Configuration
/// problems are returned as errors; everything else lands in the report.
pub fn verify_directory<S: TransformSource + Sync + ?Sized>(
    test_name: &str,
    dir: &Path,
    format: &FileFormat,
    config: &VerifyConfig,
    source: &S,
) -> Result<MismatchReport> {
    config.validate()?;
    let tests = config.tests.supported_by(format);
    if tests != config.tests {
        info!(
            test = test_name,
            format = format.symbolic_name,
            requested = %config.tests,
            running = %tests,
            "format does not carry every requested field"
        );
    }
    if tests.is_empty() {
        return Err(Error::Configuration(format!(
            "format {} carries none of the requested metadata ({})",
            format.symbolic_name, config.tests
        )));
    }

    let frame = CanonicalFrame::standard();
    let space = AcquisitionSpace::generate(frame);
    let extractor = MetadataExtractor::new(*format, tests);
    let verifier = Verifier::new(frame).default_slice_encoding(config.default_slice_encoding.clone());
    let evaluate = |acquisition: &AcquisitionId| {
        debug!(test = test_name, acquisition = %acquisition, "verifying");
        verify_acquisition(acquisition, dir, &extractor, &verifier, source)
            .map_err(|e| e.in_acquisition(acquisition.stem(), dir.to_path_buf()))
    };

    let outcomes: Vec<Result<Vec<Mismatch>>> = if config.parallel {
        space.as_slice().par_iter().map(evaluate).collect()
    } else {
        space.iter().map(evaluate).collect()
    };

    let mut report = MismatchReport::new(test_name, dir, format.symbolic_name, tests);
    report.acquisitions = space.len();
    for (acquisition, outcome) in space.iter().zip(outcomes) {
        match outcome {
            Ok(mismatches) => mismatches.into_iter().for_each(|m| report.push(m)),
            Err(e) => {
                debug!(test = test_name, acquisition = %acquisition, error = %e, "acquisition failed");
                report.record_failure(*acquisition, &e);
            }
        }
    }
    Ok(report)
}
