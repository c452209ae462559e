//! `summary` command implementation.

use std::collections::BTreeSet;
use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use homescore_core::{ListingId, ScoreTypeId};
use homescore_scorer::ScoreSummary;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATABASE, ARG_EXCLUDE, ARG_LISTING, CliError, ENV_LISTING, open_existing_store,
    resolve_database, write_json,
};

/// CLI arguments for the `summary` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "summary",
    long_about = "Print a listing's headline score, the rounded mean of its \
                 normalized scores, together with its three strongest \
                 factors. Score types can be left out with --exclude.",
    about = "Summarize the scores of one listing"
)]
#[ortho_config(prefix = "HOMESCORE")]
pub(crate) struct SummaryArgs {
    /// Listing to summarize.
    #[arg(value_name = "listing")]
    #[serde(default)]
    pub(crate) listing: Option<u64>,
    /// Path to the SQLite score database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Score type ids left out of the summary; repeat for several.
    #[arg(long = ARG_EXCLUDE, value_name = "id")]
    #[serde(default)]
    pub(crate) exclude: Vec<u64>,
}

/// Resolved `summary` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SummaryConfig {
    pub(crate) listing: ListingId,
    pub(crate) database: Utf8PathBuf,
    pub(crate) excluded: BTreeSet<ScoreTypeId>,
}

impl TryFrom<SummaryArgs> for SummaryConfig {
    type Error = CliError;

    fn try_from(args: SummaryArgs) -> Result<Self, Self::Error> {
        let listing = args.listing.ok_or(CliError::MissingArgument {
            field: ARG_LISTING,
            env: ENV_LISTING,
        })?;
        Ok(Self {
            listing: ListingId(listing),
            database: resolve_database(args.database),
            excluded: args.exclude.into_iter().map(ScoreTypeId).collect(),
        })
    }
}

#[derive(Debug, Serialize)]
struct FactorLine {
    score_type_id: u64,
    score: f64,
}

#[derive(Debug, Serialize)]
struct SummaryLine {
    listing_id: u64,
    total: Option<f64>,
    top_factors: Vec<FactorLine>,
}

impl From<&ScoreSummary> for SummaryLine {
    fn from(summary: &ScoreSummary) -> Self {
        Self {
            listing_id: summary.listing_id.0,
            total: summary.total,
            top_factors: summary
                .top_factors
                .iter()
                .map(|factor| FactorLine {
                    score_type_id: factor.score_type_id.0,
                    score: factor.score,
                })
                .collect(),
        }
    }
}

pub(crate) fn run_summary(args: SummaryArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = SummaryConfig::try_from(merged)?;
    let store = open_existing_store(&config.database)?;
    let summary = ScoreSummary::load(&store, config.listing, &config.excluded)?;
    write_json(writer, &SummaryLine::from(&summary))
}
