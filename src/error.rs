//! Typed error channels for each pipeline operation.
//!
//! Backend plumbing (SQLite, filesystem) reports `anyhow::Error`; these
//! enums are the boundary types that tell a caller whether to abort,
//! retry after an ingest, or carry on.

use thiserror::Error;

/// Configuration problems. Always fatal, raised before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required config key: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Failures of the bulk table replace. Fatal for the ingest run.
#[derive(Debug, Error)]
pub enum WriteFailure {
    #[error("row {row} ({filename}) has a {len}-char cell, above the {limit}-char cell limit")]
    CellTooLarge {
        row: usize,
        filename: String,
        len: usize,
        limit: usize,
    },
    #[error("store rejected bulk write: {0}")]
    Rejected(#[from] anyhow::Error),
    #[error("write verification failed: expected {expected} rows, found {actual}")]
    VerificationMismatch { expected: usize, actual: usize },
}

/// Failures of the payload read path.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("store table '{table}' does not exist; run ingest first")]
    MissingStore { table: String },
    #[error("store table '{table}' holds no data rows; run ingest first")]
    EmptyStore { table: String },
    #[error("store read failed: {0}")]
    Store(#[from] anyhow::Error),
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl FetchError {
    /// True when the caller can fix this by running an ingest.
    pub fn is_prerequisite(&self) -> bool {
        matches!(
            self,
            FetchError::MissingStore { .. } | FetchError::EmptyStore { .. }
        )
    }
}

/// Cache failures. Never fatal to a read.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache entry '{key}' is {size} bytes, above the {max}-byte entry limit")]
    EntryTooLarge { key: String, size: usize, max: usize },
    #[error("cache backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Fatal outcomes of an ingest run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not invalidate cached payload before writing: {0}")]
    CacheInvalidate(anyhow::Error),
    #[error("source scan failed: {0}")]
    Source(anyhow::Error),
    #[error(transparent)]
    Write(#[from] WriteFailure),
}
