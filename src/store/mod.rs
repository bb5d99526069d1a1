//! Append-only comment log on top of a versioned remote blob.
//!
//! The remote blob's conditional write is the only concurrency control: every
//! commit carries the version token returned by the fetch that preceded it, and a
//! stale token is rejected instead of overwriting the other writer's rows.

pub mod github;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{CommitFailure, StoreCommitError, StoreFetchError, TableError};
use crate::table::{CommentRecord, CommentTable};

/// Opaque revision identifier of the remote blob (the git blob SHA for GitHub).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct RemoteBlob {
    pub content: Vec<u8>,
    pub version: VersionToken,
}

/// A versioned document reachable over the network.
#[async_trait]
pub trait BlobApi: Send + Sync {
    /// `Ok(None)` when the document does not exist yet.
    async fn get(&self) -> Result<Option<RemoteBlob>, StoreFetchError>;

    /// Replaces the document only if its current version is `expected`.
    /// Returns the new version on success, or `None` when the write landed but
    /// the remote did not say which version it produced.
    async fn put(
        &self,
        content: &[u8],
        expected: &VersionToken,
        message: &str,
    ) -> Result<Option<VersionToken>, StoreCommitError>;
}

/// Table snapshot plus the token needed to write it back.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub table: CommentTable,
    pub version: Option<VersionToken>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            table: CommentTable::new(),
            version: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitReceipt {
    /// `None` when the commit landed but its new version is unknown; the next
    /// fetch picks it up.
    pub version: Option<VersionToken>,
    pub rows: usize,
}

#[derive(Clone)]
pub struct CommentStore {
    blob: Arc<dyn BlobApi>,
}

impl CommentStore {
    pub fn new(blob: Arc<dyn BlobApi>) -> Self {
        Self { blob }
    }

    /// Never fails: any fetch problem degrades to an empty table with no token,
    /// which in turn blocks the next commit.
    pub async fn fetch(&self) -> Snapshot {
        match self.try_fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "comment table fetch failed, continuing with an empty table");
                Snapshot::empty()
            }
        }
    }

    async fn try_fetch(&self) -> Result<Snapshot, StoreFetchError> {
        let Some(blob) = self.blob.get().await? else {
            info!("comment table does not exist remotely yet");
            return Ok(Snapshot::empty());
        };
        let text = String::from_utf8(blob.content).map_err(TableError::from)?;
        let table = CommentTable::decode(&text)?;
        if !table.extra_columns().is_empty() {
            debug!(columns = ?table.extra_columns(), "carrying unrecognized columns through");
        }
        Ok(Snapshot {
            table,
            version: Some(blob.version),
        })
    }

    /// Appends `record` to `table` and writes the whole table back, guarded by
    /// `version`. Nothing is sent when there is no token.
    pub async fn append_and_commit(
        &self,
        mut table: CommentTable,
        record: CommentRecord,
        version: Option<&VersionToken>,
    ) -> Result<CommitReceipt, CommitFailure> {
        let Some(version) = version else {
            return Err(CommitFailure {
                record: Box::new(record),
                reason: StoreCommitError::MissingVersionToken,
            });
        };

        table.append(record.clone());
        let encoded = match table.encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                return Err(CommitFailure {
                    record: Box::new(record),
                    reason: e.into(),
                })
            }
        };

        let message = format!("Update comments {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.6f"));
        match self.blob.put(encoded.as_bytes(), version, &message).await {
            Ok(new_version) => {
                info!(rows = table.len(), version = ?new_version, "comment table committed");
                Ok(CommitReceipt {
                    version: new_version,
                    rows: table.len(),
                })
            }
            Err(reason) => {
                warn!(error = %reason, expected = %version, "comment table commit failed");
                Err(CommitFailure {
                    record: Box::new(record),
                    reason,
                })
            }
        }
    }
}
