//! In-process versioned blob, used for local runs (`STORE_BACKEND=memory`).

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{BlobApi, RemoteBlob, VersionToken};
use crate::error::{StoreCommitError, StoreFetchError, TableError};
use crate::table::CommentTable;

struct State {
    content: Option<Vec<u8>>,
    version: u64,
}

pub struct MemoryBlob {
    state: Mutex<State>,
}

impl MemoryBlob {
    /// A blob that exists and holds `content`, at version 1.
    pub fn with_content(content: Vec<u8>) -> Self {
        Self {
            state: Mutex::new(State {
                content: Some(content),
                version: 1,
            }),
        }
    }

    /// An existing blob holding a header-only table.
    pub fn empty_table() -> Result<Self, TableError> {
        Ok(Self::with_content(CommentTable::new().encode()?.into_bytes()))
    }

    /// A blob that has never been written.
    #[cfg(test)]
    pub fn missing() -> Self {
        Self {
            state: Mutex::new(State {
                content: None,
                version: 0,
            }),
        }
    }
}

fn token(version: u64) -> VersionToken {
    VersionToken::new(format!("mem-{}", version))
}

#[async_trait]
impl BlobApi for MemoryBlob {
    async fn get(&self) -> Result<Option<RemoteBlob>, StoreFetchError> {
        let state = self.state.lock().await;
        Ok(state.content.as_ref().map(|content| RemoteBlob {
            content: content.clone(),
            version: token(state.version),
        }))
    }

    async fn put(
        &self,
        content: &[u8],
        expected: &VersionToken,
        _message: &str,
    ) -> Result<Option<VersionToken>, StoreCommitError> {
        let mut state = self.state.lock().await;
        if state.content.is_none() || *expected != token(state.version) {
            return Err(StoreCommitError::Conflict);
        }
        state.version += 1;
        state.content = Some(content.to_vec());
        Ok(Some(token(state.version)))
    }
}
