//! The external resources one invocation works against: chunk table,
//! result cache and access log.

use anyhow::Result;
use std::sync::Arc;

use crate::access_log::{AccessLogger, MemoryAccessLog, SqliteAccessLog};
use crate::cache::{MemoryCache, ResultCache, SqliteCache};
use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::store::memory::MemoryTableStore;
use crate::store::sqlite::SqliteTableStore;
use crate::store::TableStore;

#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn TableStore>,
    pub cache: Arc<dyn ResultCache>,
    pub log: Arc<dyn AccessLogger>,
}

impl Backends {
    /// Open the SQLite-backed resources named by the config.
    ///
    /// Fails on a missing `db.path` or `store.table` before connecting.
    pub async fn open(config: &Config) -> Result<Self> {
        let db_path = config.require_db_path()?;
        let table = config.require_table()?;

        let pool = db::connect(db_path).await?;
        migrate::ensure_schema(&pool).await?;

        Ok(Self {
            store: Arc::new(SqliteTableStore::new(pool.clone(), table)?),
            cache: Arc::new(SqliteCache::new(
                pool.clone(),
                config.cache.max_entry_bytes,
            )),
            log: Arc::new(SqliteAccessLog::new(pool, config.access_log.max_records)),
        })
    }

    /// Process-local resources with no table yet.
    pub fn in_memory(config: &Config) -> Self {
        let table = config.store.table.as_deref().unwrap_or("readiness_chunks");
        Self {
            store: Arc::new(MemoryTableStore::new(table)),
            cache: Arc::new(MemoryCache::new(config.cache.max_entry_bytes)),
            log: Arc::new(MemoryAccessLog::new(config.access_log.max_records)),
        }
    }
}
