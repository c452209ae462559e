//! `archive` command implementation.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use homescore_core::ScoreStore;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{ARG_DATABASE, CliError, open_existing_store, resolve_database, write_json};

/// CLI arguments for the `archive` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "archive",
    long_about = "Move every live score into the snapshot table so the next \
                 run starts from an empty score set. Archived rows keep their \
                 raw and normalized values.",
    about = "Archive the live scores"
)]
#[ortho_config(prefix = "HOMESCORE")]
pub(crate) struct ArchiveArgs {
    /// Path to the SQLite score database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

#[derive(Debug, Serialize)]
struct ArchiveSummary {
    archived: usize,
}

pub(crate) fn run_archive(args: ArchiveArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let database = resolve_database(merged.database);
    let store = open_existing_store(&database)?;
    let archived = store.archive_current_scores()?;
    log::info!("archived {archived} scores from {database}");
    write_json(writer, &ArchiveSummary { archived })
}
