//! dwimeta CLI - DWI orientation metadata verification
//!
//! # Commands
//!
//! - `acquisitions` - List the synthetic acquisition space
//! - `formats` - List supported file-format variants
//! - `verify` - Verify a directory of conversion outputs

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dwimeta::{
    error::Result, verify_directory, AcquisitionSpace, CanonicalFrame, FileFormat,
    HeaderTransformSource, MetadataTests, MrinfoTransformSource, VerifyConfig, FILE_FORMATS,
};
use tracing_subscriber::EnvFilter;

/// dwimeta - verify DWI orientation metadata across file formats
#[derive(Parser)]
#[command(name = "dwimeta")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log per-acquisition progress
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the acquisition stems every output directory must contain
    Acquisitions,
    /// List the supported file-format variants
    Formats,
    /// Verify the metadata of one conversion output directory
    ///
    /// Examples:
    ///   dwimeta verify out/dcm2niix --format niibvecbvaljson --default-slice-code k
    ///   dwimeta verify out/mrconvert --format mih --mrinfo
    Verify {
        /// Directory holding `DWI_<plane>_<order>_<pe>.*` artifacts
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// File-format variant (see `dwimeta formats`)
        #[arg(short, long)]
        format: String,

        /// Test name used in the report (defaults to the directory name)
        #[arg(short, long)]
        name: Option<String>,

        /// Skip the gradient table check
        #[arg(long)]
        skip_gradients: bool,

        /// Skip the phase-encoding check
        #[arg(long)]
        skip_phase: bool,

        /// Skip the slice-encoding check
        #[arg(long)]
        skip_slice: bool,

        /// Slice-encoding code assumed when metadata omits it
        #[arg(long, value_name = "CODE")]
        default_slice_code: Option<String>,

        /// Query transforms with MRtrix3 `mrinfo` instead of reading headers
        #[arg(long, value_name = "BIN", num_args = 0..=1, default_missing_value = "mrinfo")]
        mrinfo: Option<PathBuf>,

        /// Evaluate acquisitions in parallel
        #[arg(short, long)]
        parallel: bool,

        /// Print the report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[allow(clippy::too_many_arguments)]
fn run_verify(
    dir: PathBuf,
    format: &str,
    name: Option<String>,
    tests: MetadataTests,
    default_slice_code: Option<String>,
    mrinfo: Option<PathBuf>,
    parallel: bool,
    json: bool,
) -> Result<()> {
    let format = FileFormat::by_name(format)?;
    let mut config = VerifyConfig::default().tests(tests).parallel(parallel);
    if let Some(code) = &default_slice_code {
        config = config.default_slice_encoding(code);
    }
    let name = name.unwrap_or_else(|| {
        dir.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string())
    });

    let report = match mrinfo {
        Some(program) => verify_directory(
            &name,
            &dir,
            &format,
            &config,
            &MrinfoTransformSource::with_program(program),
        )?,
        None => verify_directory(&name, &dir, &format, &config, &HeaderTransformSource)?,
    };
    report.emit();
    if json {
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| dwimeta::Error::Configuration(format!("cannot serialize report: {}", e)))?;
        println!("{}", text);
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Acquisitions => {
            for acquisition in &AcquisitionSpace::generate(CanonicalFrame::standard()) {
                println!("{}", acquisition);
            }
            Ok(())
        }
        Commands::Formats => {
            for format in FILE_FORMATS {
                println!("{:<16} {}", format.symbolic_name, format.description);
            }
            Ok(())
        }
        Commands::Verify {
            dir,
            format,
            name,
            skip_gradients,
            skip_phase,
            skip_slice,
            default_slice_code,
            mrinfo,
            parallel,
            json,
        } => {
            let tests = MetadataTests {
                gradtable: !skip_gradients,
                phase_encoding: !skip_phase,
                slice_encoding: !skip_slice,
            };
            run_verify(dir, &format, name, tests, default_slice_code, mrinfo, parallel, json)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
