//! Error taxonomy shared across the pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::table::CommentRecord;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Raised while loading the vectorizer/classifier artifacts. Fatal at startup.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("incompatible model artifacts: {0}")]
    Incompatible(String),
    #[error("unknown class label {0:?}")]
    UnknownLabel(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("comment must not be empty")]
    EmptyComment,
}

/// CSV encode/decode failures for the comment table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: invalid {column} value {value:?}")]
    InvalidCell {
        row: usize,
        column: &'static str,
        value: String,
    },
    #[error("table content is not valid utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Error)]
pub enum StoreFetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("remote returned status {status}")]
    Status { status: u16 },
    #[error("unexpected response: {0}")]
    Malformed(String),
    #[error("remote content could not be decoded: {0}")]
    Table(#[from] TableError),
}

#[derive(Debug, Error)]
pub enum StoreCommitError {
    #[error("no version token available; refusing to overwrite blindly")]
    MissingVersionToken,
    #[error("version token is stale; another submission was committed first")]
    Conflict,
    #[error("remote rejected the write with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to encode table: {0}")]
    Encode(#[from] TableError),
}

/// A commit that did not persist. Carries the record so the caller can report it.
#[derive(Debug, Error)]
#[error("comment from {} was not saved: {reason}", .record.user_id)]
pub struct CommitFailure {
    pub record: Box<CommentRecord>,
    #[source]
    pub reason: StoreCommitError,
}
