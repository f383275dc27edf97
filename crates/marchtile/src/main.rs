//! marchtile: stamp marching-squares contour tiles onto an image.
//!
//! Loads `<INPUT>`, downscales it to the working resolution when it is
//! larger on both axes, classifies a lattice of sample points by
//! luminance, and writes `<OUTPUT>` with one contour tile per grid cell.
//! The tiles are read from `<contours>/0.ppm` .. `<contours>/15.ppm`.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin marchtile -- [OPTIONS] <INPUT> <OUTPUT> <WORKERS>
//! ```
//!
//! Diagnostics go to stdout (a table, or JSON with `--json`); log events
//! go to stderr.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use marchtile_pipeline::{PipelineConfig, PipelineError};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Stamp marching-squares contour tiles onto an image.
///
/// The output has the working resolution when the input was downscaled,
/// otherwise the input's own size.
#[derive(Parser)]
#[command(name = "marchtile", version)]
struct Cli {
    /// Image to annotate (PPM, PNG, BMP, JPEG).
    input: PathBuf,

    /// Where to write the annotated image; the extension picks the format.
    output: PathBuf,

    /// Number of worker threads.
    #[arg(value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    workers: usize,

    /// Directory holding the contour tiles `0.ppm` .. `15.ppm`.
    #[arg(long, default_value = marchtile_io::DEFAULT_CONTOURS_DIR)]
    contours: PathBuf,

    /// Working resolution width.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_TARGET_WIDTH, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    target_width: u32,

    /// Working resolution height.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_TARGET_HEIGHT, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    target_height: u32,

    /// Pixels between grid sample points; must equal the tile size.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_STEP, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    step: u32,

    /// Luminance at or below which a sample point counts as dark.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, `--target-width`, `--target-height`, `--step` and
    /// `--threshold` are ignored. Missing fields take their defaults. The
    /// worker count always comes from `<WORKERS>`.
    #[arg(long)]
    config_json: Option<String>,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Maximum level of log events written to stderr.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

/// Log verbosity selection.
#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}

/// Fatal errors of a CLI run.
#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("error parsing --config-json: {0}")]
    ConfigJson(#[source] serde_json::Error),

    #[error("error serializing diagnostics: {0}")]
    Diagnostics(#[source] serde_json::Error),

    #[error(transparent)]
    Io(#[from] marchtile_io::IoError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, Error> {
    let config = match cli.config_json {
        Some(ref json) => serde_json::from_str(json).map_err(Error::ConfigJson)?,
        None => PipelineConfig {
            target_width: cli.target_width,
            target_height: cli.target_height,
            step: cli.step,
            threshold: cli.threshold,
            ..PipelineConfig::default()
        },
    };
    Ok(PipelineConfig {
        workers: cli.workers,
        ..config
    })
}

/// Load, process and save. The output file is only written once the
/// pipeline has succeeded.
fn run(cli: &Cli) -> Result<(), Error> {
    let config = config_from_cli(cli)?;
    config.validate()?;
    info!(?config, "configuration");

    let palette = marchtile_io::load_palette(&cli.contours)?;
    let source = marchtile_io::load_raster(&cli.input)?;
    let (output, diagnostics) =
        marchtile_pipeline::process_with_diagnostics(source, &palette, &config)?;
    marchtile_io::save_raster(&output, &cli.output)?;
    info!(path = %cli.output.display(), "output written");

    if cli.json {
        let json = serde_json::to_string_pretty(&diagnostics).map_err(Error::Diagnostics)?;
        println!("{json}");
    } else {
        println!("{}", diagnostics.report());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::from(cli.log_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error installing log subscriber: {e}");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
