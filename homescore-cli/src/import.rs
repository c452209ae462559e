//! `import` command implementation.

use std::io::{BufReader, Write};

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use homescore_core::{Amenity, Listing, ScoreType, SqliteScoreStore};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATABASE, ARG_IMPORT_PATH, CliError, ENV_IMPORT_PATH, fs, resolve_database, write_json,
};

/// CLI arguments for the `import` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "import",
    long_about = "Upsert listings, amenities and score types from a JSON \
                 document with optional `listings`, `amenities` and \
                 `score_types` arrays. The database is created when missing.",
    about = "Import listings, amenities and score types"
)]
#[ortho_config(prefix = "HOMESCORE")]
pub(crate) struct ImportArgs {
    /// Path to the JSON document.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) path: Option<Utf8PathBuf>,
    /// Path to the SQLite score database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

/// Records accepted by `import`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ImportDocument {
    #[serde(default)]
    pub(crate) listings: Vec<Listing>,
    #[serde(default)]
    pub(crate) amenities: Vec<Amenity>,
    #[serde(default)]
    pub(crate) score_types: Vec<ScoreType>,
}

#[derive(Debug, Serialize)]
struct ImportSummary {
    listings: usize,
    amenities: usize,
    score_types: usize,
}

/// Decode an import document from disk.
pub(crate) fn load_import_document(path: &Utf8Path) -> Result<ImportDocument, CliError> {
    let file = fs::open_file(path).map_err(|source| CliError::OpenImport {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CliError::ParseImport {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn run_import(args: ImportArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let path = merged.path.ok_or(CliError::MissingArgument {
        field: ARG_IMPORT_PATH,
        env: ENV_IMPORT_PATH,
    })?;
    let database = resolve_database(merged.database);
    fs::require_file(&path, ARG_IMPORT_PATH)?;
    let document = load_import_document(&path)?;

    fs::ensure_parent_dir(&database)?;
    let store = SqliteScoreStore::open(database.as_std_path())?;
    let summary = ImportSummary {
        score_types: store.upsert_score_types(&document.score_types)?,
        amenities: store.upsert_amenities(&document.amenities)?,
        listings: store.upsert_listings(&document.listings)?,
    };
    log::info!(
        "imported {} listings, {} amenities and {} score types into {database}",
        summary.listings,
        summary.amenities,
        summary.score_types
    );
    write_json(writer, &summary)
}
