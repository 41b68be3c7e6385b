//! Reading the artifacts of one acquisition into a [`DwiMetadata`] record.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::acquisition::AcquisitionId;
use crate::error::{Error, Result};
use crate::metadata::format::{FileFormat, GradType, KeyvalueType, PeType};
use crate::metadata::record::{
    DwiMetadata, GradientScheme, JsonSidecar, KeyValueSource, PhaseEncoding, SliceEncoding,
};
use crate::metadata::{tables, MetadataTests};
use crate::mrtrix::MrtrixHeader;

/// Fewest volumes that still hold a b=0 volume plus the three fiducials.
const MIN_GRADIENT_VOLUMES: usize = 4;

fn read_artifact(path: &Path, artifact: &'static str, context: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound {
            artifact,
            path: path.to_path_buf(),
            context: context.to_string(),
        },
        _ => Error::Io(e),
    })
}

/// Reads the artifacts a [`FileFormat`] stores for each acquisition.
///
/// Only the files needed by the enabled tests are opened.
#[derive(Debug, Clone, Copy)]
pub struct MetadataExtractor {
    format: FileFormat,
    tests: MetadataTests,
}

impl MetadataExtractor {
    /// Extractor for `format` limited to `tests`.
    pub fn new(format: FileFormat, tests: MetadataTests) -> Self {
        Self { format, tests }
    }

    /// Format being read.
    pub fn format(&self) -> &FileFormat {
        &self.format
    }

    /// Tests the extracted record must serve.
    pub fn tests(&self) -> MetadataTests {
        self.tests
    }

    /// Path of the image of `acquisition` in `dir`.
    pub fn image_path(&self, dir: &Path, acquisition: &AcquisitionId) -> PathBuf {
        acquisition.artifact_path(dir, self.format.image_extension)
    }

    /// Read and normalize everything the enabled tests need.
    pub fn extract(&self, dir: &Path, acquisition: &AcquisitionId) -> Result<DwiMetadata> {
        let keyvalue = self.read_keyvalue(dir, acquisition)?;

        let mut metadata = DwiMetadata::default();
        if let Some((KeyValueSource::Header(header), path)) = &keyvalue {
            metadata.embedded_transform = Some(header.transform(path)?);
        }
        if self.tests.gradtable {
            metadata.gradients = self.read_gradients(dir, acquisition, keyvalue.as_ref())?;
        }
        if self.tests.phase_encoding {
            metadata.phase_encoding = self.read_phase_encoding(dir, acquisition, keyvalue.as_ref())?;
        }
        if self.tests.slice_encoding {
            if let Some((source, path)) = &keyvalue {
                metadata.slice_encoding = Some(SliceEncoding {
                    code: source.slice_encoding_direction().map(str::to_string),
                    slice_timing: source.slice_timing(path)?,
                    origin: path.clone(),
                });
            }
        }
        debug!(
            acquisition = %acquisition,
            format = self.format.symbolic_name,
            gradients = metadata.gradients.is_some(),
            phase_encoding = metadata.phase_encoding.is_some(),
            slice_encoding = metadata.slice_encoding.is_some(),
            "extracted metadata"
        );
        Ok(metadata)
    }

    fn read_keyvalue(
        &self,
        dir: &Path,
        acquisition: &AcquisitionId,
    ) -> Result<Option<(KeyValueSource, PathBuf)>> {
        let (tests, format) = (self.tests, &self.format);
        let wants_json = (tests.phase_encoding && format.pe_type == PeType::Json)
            || (tests.slice_encoding && format.keyvalue_type == KeyvalueType::Json);
        let wants_header = (tests.phase_encoding && format.pe_type == PeType::Header)
            || (tests.slice_encoding && format.keyvalue_type == KeyvalueType::Header)
            || (tests.gradtable && format.grad_type == GradType::Header);

        if wants_json {
            let path = acquisition.artifact_path(dir, "json");
            let text = read_artifact(&path, "JSON sidecar", &self.context())?;
            let sidecar = JsonSidecar::parse(&text, &path)?;
            return Ok(Some((KeyValueSource::Json(sidecar), path)));
        }
        if wants_header {
            let path = self.image_path(dir, acquisition);
            let header = MrtrixHeader::read(&path).map_err(|e| match e {
                Error::Io(err) if err.kind() == io::ErrorKind::NotFound => Error::NotFound {
                    artifact: "image header",
                    path: path.clone(),
                    context: self.context(),
                },
                other => other,
            })?;
            return Ok(Some((KeyValueSource::Header(header), path)));
        }
        Ok(None)
    }

    fn read_gradients(
        &self,
        dir: &Path,
        acquisition: &AcquisitionId,
        keyvalue: Option<&(KeyValueSource, PathBuf)>,
    ) -> Result<Option<GradientScheme>> {
        let context = "gradient table test";
        let (scheme, path) = match self.format.grad_type {
            GradType::None => return Ok(None),
            GradType::Header => {
                let Some((KeyValueSource::Header(header), path)) = keyvalue else {
                    return Err(Error::Configuration(format!(
                        "format {} stores gradients in a header that was not read",
                        self.format.symbolic_name
                    )));
                };
                let rows = header.get("dw_scheme").ok_or_else(|| Error::MissingField {
                    field: "dw_scheme",
                    path: path.clone(),
                })?;
                let table = tables::parse_header_scheme(rows, path)?;
                (GradientScheme::BMatrix(table), path.clone())
            }
            GradType::B => {
                if let Some((source, json_path)) = keyvalue {
                    if source.has_dw_scheme() {
                        return Err(Error::Invariant {
                            what: "gradient table",
                            path: json_path.clone(),
                            reason: "dw_scheme present alongside a .grad file".to_string(),
                        });
                    }
                }
                let path = acquisition.artifact_path(dir, "grad");
                let text = read_artifact(&path, "MRtrix gradient table", context)?;
                (GradientScheme::BMatrix(tables::parse_bmatrix(&text, &path)?), path)
            }
            GradType::Fsl => {
                let path = acquisition.artifact_path(dir, "bvec");
                let text = read_artifact(&path, "FSL bvecs", context)?;
                (GradientScheme::Fsl(tables::parse_bvecs(&text, &path)?), path)
            }
        };
        if scheme.volumes() < MIN_GRADIENT_VOLUMES {
            return Err(Error::Decode {
                what: "gradient table",
                path,
                reason: format!(
                    "{} volumes, need at least {}",
                    scheme.volumes(),
                    MIN_GRADIENT_VOLUMES
                ),
            });
        }
        Ok(Some(scheme))
    }

    fn read_phase_encoding(
        &self,
        dir: &Path,
        acquisition: &AcquisitionId,
        keyvalue: Option<&(KeyValueSource, PathBuf)>,
    ) -> Result<Option<PhaseEncoding>> {
        let context = "phase encoding test";
        let read_row = |ext: &str, artifact: &'static str| -> Result<[i32; 3]> {
            let path = acquisition.artifact_path(dir, ext);
            let text = read_artifact(&path, artifact, context)?;
            let table = tables::parse_table(&text, artifact, &path)?;
            let row = tables::uniform_row(&table, artifact, &path)?;
            tables::voxel_unit_vector(row, artifact, &path)
        };

        let encoding = match self.format.pe_type {
            PeType::None => return Ok(None),
            PeType::Header | PeType::Json => {
                let Some((source, path)) = keyvalue else {
                    return Err(Error::Configuration(format!(
                        "format {} stores phase encoding in metadata that was not read",
                        self.format.symbolic_name
                    )));
                };
                let code = source
                    .phase_encoding_direction()
                    .ok_or_else(|| Error::MissingField {
                        field: "PhaseEncodingDirection",
                        path: path.clone(),
                    })?;
                PhaseEncoding::Code {
                    code: code.to_string(),
                    origin: path.clone(),
                }
            }
            PeType::Table => PhaseEncoding::Table(read_row("petable", "phase encoding table")?),
            PeType::Topup => PhaseEncoding::Topup(read_row("topup", "topup table")?),
            PeType::Eddy => {
                let config_path = acquisition.artifact_path(dir, "eddycfg");
                let text = read_artifact(&config_path, "eddy config", context)?;
                let row = tables::eddy_config_row(&text, &config_path)?;
                let voxel = tables::voxel_unit_vector(row, "eddy config", &config_path)?;

                let index_path = acquisition.artifact_path(dir, "eddyidx");
                let text = read_artifact(&index_path, "eddy index", context)?;
                tables::check_eddy_indices(&text, &index_path)?;
                PhaseEncoding::Eddy(voxel)
            }
        };
        Ok(Some(encoding))
    }

    fn context(&self) -> String {
        format!("{} tests on {}", self.tests, self.format.symbolic_name)
    }
}
