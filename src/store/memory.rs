//! In-memory [`TableStore`] implementation for tests and embedding.
//!
//! Holds the table behind a `tokio::sync::RwLock`. Rows can be seeded
//! verbatim (ragged rows included) with [`MemoryTableStore::with_rows`].

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::WriteFailure;

use super::TableStore;

/// In-memory chunk table.
pub struct MemoryTableStore {
    name: String,
    rows: RwLock<Option<Vec<Vec<String>>>>,
    reject_writes: bool,
}

impl MemoryTableStore {
    /// A store whose table does not exist yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: RwLock::new(None),
            reject_writes: false,
        }
    }

    /// A store whose table already holds `rows` (header included).
    pub fn with_rows(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            rows: RwLock::new(Some(rows)),
            reject_writes: false,
        }
    }

    /// Make every subsequent `replace_rows` fail without touching the table.
    pub fn rejecting_writes(mut self) -> Self {
        self.reject_writes = true;
        self
    }

    /// Snapshot of the current table.
    pub async fn snapshot(&self) -> Option<Vec<Vec<String>>> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    fn table_name(&self) -> &str {
        &self.name
    }

    async fn read_rows(&self) -> Result<Option<Vec<Vec<String>>>> {
        Ok(self.rows.read().await.clone())
    }

    async fn replace_rows(&self, rows: &[Vec<String>]) -> Result<(), WriteFailure> {
        if self.reject_writes {
            return Err(WriteFailure::Rejected(anyhow!(
                "table '{}' is read-only",
                self.name
            )));
        }
        let mut guard = self.rows.write().await;
        *guard = Some(rows.to_vec());
        Ok(())
    }
}
