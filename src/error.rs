//! Error types shared across the scan lifecycle engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the scan lifecycle engine.
///
/// Scanner failures and timeouts are recorded on the manifest entry of the
/// scanner that produced them and never abort a run; the remaining variants
/// are fatal to the requesting command.
#[derive(Debug, Error)]
pub enum VigilError {
    /// Unknown profile, unknown scanner, or invalid configuration.
    /// Raised before any scanner runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// A scanner exited non-zero or reported an internal error.
    #[error("scanner {scanner} failed: {message}")]
    ScannerFailure { scanner: String, message: String },

    /// A scanner exceeded its wall-clock budget and was terminated.
    #[error("scanner {scanner} timed out after {seconds}s")]
    ScannerTimeout { scanner: String, seconds: u64 },

    /// A scan reference (`latest`, `latest~N`, scan id, commit prefix)
    /// did not resolve against the repository's history.
    #[error("scan not found: {0}")]
    HistoryNotFound(String),

    /// The target repository is missing or not a directory.
    #[error("repository not found at {0}")]
    RepoNotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl VigilError {
    /// Process exit code for this error when it escapes to the CLI.
    ///
    /// 1 = operational error, 2 = invalid profile/arguments.
    pub fn exit_code(&self) -> i32 {
        match self {
            VigilError::Config(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, VigilError>;
