//! Command-line interface for running the homescore pipeline against an
//! SQLite score database.
#![forbid(unsafe_code)]

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use homescore_core::SqliteScoreStore;
use serde::Serialize;

mod archive;
mod error;
mod fs;
mod import;
mod pipeline;
mod report;
mod summary;

pub use error::CliError;

use archive::ArchiveArgs;
use import::ImportArgs;
use pipeline::{PipelineArgs, Stages};
use summary::SummaryArgs;

const ARG_DATABASE: &str = "database";
const ARG_BATCH_SIZE: &str = "batch-size";
const ARG_MAX_RETRIES: &str = "max-retries";
const ARG_INITIAL_BACKOFF_MS: &str = "initial-backoff-ms";
const ARG_MAX_BACKOFF_MS: &str = "max-backoff-ms";
const ARG_PARK_SCORE_TYPE: &str = "park-score-type";
const ARG_PARK_RADIUS_M: &str = "park-radius-m";
const ARG_PARK_DISTANCE_WEIGHT: &str = "park-distance-weight";
const ARG_PARK_COVERAGE_WEIGHT: &str = "park-coverage-weight";
const ARG_PARK_TARGET_AREA_SQ_M: &str = "park-target-area-sq-m";
const ARG_PARK_NORMALIZE: &str = "park-normalize";
const ARG_TRANSIT_SCORE_TYPE: &str = "transit-score-type";
const ARG_TRANSIT_RADIUS_M: &str = "transit-radius-m";
const ARG_TRANSIT_CAP: &str = "transit-cap";
const ARG_TRANSIT_NORMALIZE: &str = "transit-normalize";
const ARG_LISTING: &str = "listing";
const ARG_EXCLUDE: &str = "exclude";
const ARG_IMPORT_PATH: &str = "path";
const ENV_LISTING: &str = "HOMESCORE_CMDS_SUMMARY_LISTING";
const ENV_IMPORT_PATH: &str = "HOMESCORE_CMDS_IMPORT_PATH";

/// Database used when no path is configured.
const DEFAULT_DATABASE: &str = "homescore.db";

/// Run the homescore CLI with the current process arguments and environment,
/// writing reports to standard output.
///
/// # Errors
/// Returns [`CliError`] when arguments or configuration are invalid, the
/// database cannot be used, or a stage does not complete.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    dispatch(cli.command, &mut stdout)
}

/// Run the CLI with explicit arguments, writing reports to `writer`.
///
/// The first argument is the program name, as with [`std::env::args`].
///
/// # Errors
/// As for [`run`].
pub fn run_with<I, T>(args: I, writer: &mut dyn Write) -> Result<(), CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).map_err(CliError::ArgumentParsing)?;
    dispatch(cli.command, writer)
}

fn dispatch(command: Command, writer: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Score(args) => pipeline::run_stages(args, Stages::RawScoring, writer),
        Command::Normalize(args) => pipeline::run_stages(args, Stages::Normalization, writer),
        Command::Run(args) => pipeline::run_stages(args, Stages::Both, writer),
        Command::Archive(args) => archive::run_archive(args, writer),
        Command::Summary(args) => summary::run_summary(args, writer),
        Command::Import(args) => import::run_import(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "homescore",
    about = "Score real-estate listings by proximity to amenities",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute raw scores for every listing.
    Score(PipelineArgs),
    /// Rescale the stored raw scores of every active score type.
    Normalize(PipelineArgs),
    /// Compute raw scores, then normalize them.
    Run(PipelineArgs),
    /// Move the live scores into the snapshot table.
    Archive(ArchiveArgs),
    /// Print the headline score and strongest factors of one listing.
    Summary(SummaryArgs),
    /// Load listings, amenities and score types from a JSON document.
    Import(ImportArgs),
}

fn resolve_database(database: Option<Utf8PathBuf>) -> Utf8PathBuf {
    database.unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE))
}

/// Open an existing score database.
fn open_existing_store(path: &Utf8Path) -> Result<SqliteScoreStore, CliError> {
    fs::require_file(path, ARG_DATABASE)?;
    Ok(SqliteScoreStore::open(path.as_std_path())?)
}

fn write_json<T: Serialize>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerializeReport)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteReport)?;
    writer.write_all(b"\n").map_err(CliError::WriteReport)
}

#[cfg(test)]
mod tests;
