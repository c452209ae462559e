//! Error types emitted by the homescore CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use homescore_core::StoreError;
use thiserror::Error;

/// Errors emitted by the homescore CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Option name.
        field: &'static str,
        /// Environment variable that can supply it.
        env: &'static str,
    },
    /// A numeric option was outside its accepted range.
    #[error("{field} must be {expected}, got {value}")]
    InvalidArgument {
        /// Option name.
        field: &'static str,
        /// Accepted range.
        expected: &'static str,
        /// Rejected value.
        value: String,
    },
    /// A referenced input path does not exist on disk or is not a file.
    #[error("{field} path {path:?} does not exist or is not a file")]
    MissingSourceFile {
        /// Option name.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Option name.
        field: &'static str,
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// The parent directory of the database could not be created.
    #[error("failed to prepare database directory for {path:?}: {source}")]
    PrepareDatabase {
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// Opening or querying the score database failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Opening the import file failed.
    #[error("failed to open import file at {path:?}: {source}")]
    OpenImport {
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// Import JSON could not be decoded.
    #[error("failed to parse import JSON at {path:?}: {source}")]
    ParseImport {
        /// Offending path.
        path: Utf8PathBuf,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// A stage stopped before processing every input.
    #[error("{stage} ended {state}; see the report for details")]
    StageIncomplete {
        /// Stage that stopped.
        stage: &'static str,
        /// Terminal state it reached.
        state: String,
    },
    /// Serializing a report failed.
    #[error("failed to serialize report: {0}")]
    SerializeReport(#[source] serde_json::Error),
    /// Writing a report failed.
    #[error("failed to write report: {0}")]
    WriteReport(#[source] std::io::Error),
}
