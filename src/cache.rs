//! Versioned, TTL-bounded result cache in front of the reassembler.
//!
//! The cache key embeds [`PAYLOAD_SCHEMA_VERSION`]; bumping it when the
//! payload shape changes orphans every older entry, which then ages out.
//! Entries above the configured size limit are refused with
//! [`CacheError::EntryTooLarge`]; callers treat that as non-fatal.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::CacheError;

/// Bump whenever [`ReassembledPayload`](crate::models::ReassembledPayload)
/// changes shape.
pub const PAYLOAD_SCHEMA_VERSION: &str = "v6";

/// The single versioned key the payload is cached under.
pub fn payload_cache_key(prefix: &str) -> String {
    format!("{}_{}", prefix, PAYLOAD_SCHEMA_VERSION)
}

/// What the cache currently holds for a key, for operator output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    Absent,
    Expired,
    Live {
        bytes: usize,
        expires_at: DateTime<Utc>,
    },
}

#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Live entry for `key`, or `None` on miss or expiry.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `payload` under `key` for `ttl`.
    async fn put(&self, key: &str, payload: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Drop the entry for `key`. Dropping an absent key is not an error.
    async fn invalidate(&self, key: &str) -> Result<()>;

    async fn entry_state(&self, key: &str) -> Result<EntryState>;
}

fn check_size(key: &str, payload: &str, max: usize) -> Result<(), CacheError> {
    if payload.len() > max {
        return Err(CacheError::EntryTooLarge {
            key: key.to_string(),
            size: payload.len(),
            max,
        });
    }
    Ok(())
}

fn expiry_from_now(ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// ============ SQLite ============

/// Cache entries in the `cache_entries` table of the feed database.
pub struct SqliteCache {
    pool: SqlitePool,
    max_entry_bytes: usize,
}

impl SqliteCache {
    pub fn new(pool: SqlitePool, max_entry_bytes: usize) -> Self {
        Self {
            pool,
            max_entry_bytes,
        }
    }
}

#[async_trait]
impl ResultCache for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT payload, expires_at FROM cache_entries WHERE cache_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            debug!(key, "cache miss");
            return Ok(None);
        };

        let expires_at: i64 = row.get("expires_at");
        if expires_at <= Utc::now().timestamp_millis() {
            debug!(key, "cache entry expired");
            return Ok(None);
        }

        debug!(key, "cache hit");
        Ok(Some(row.get("payload")))
    }

    async fn put(&self, key: &str, payload: &str, ttl: Duration) -> Result<(), CacheError> {
        check_size(key, payload, self.max_entry_bytes)?;
        let expires_at = expiry_from_now(ttl).timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO cache_entries (cache_key, payload, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(cache_key) DO UPDATE SET payload = excluded.payload, expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(payload)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(e.into()))?;

        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE cache_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn entry_state(&self, key: &str) -> Result<EntryState> {
        let row = sqlx::query(
            "SELECT LENGTH(CAST(payload AS BLOB)) AS bytes, expires_at FROM cache_entries WHERE cache_key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(EntryState::Absent);
        };
        let expires_ms: i64 = row.get("expires_at");
        if expires_ms <= Utc::now().timestamp_millis() {
            return Ok(EntryState::Expired);
        }
        let bytes: i64 = row.get("bytes");
        Ok(EntryState::Live {
            bytes: bytes as usize,
            expires_at: DateTime::from_timestamp_millis(expires_ms)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        })
    }
}

// ============ In-memory ============

/// Process-local cache for tests and embedding.
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
    max_entry_bytes: usize,
}

impl MemoryCache {
    pub fn new(max_entry_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entry_bytes,
        }
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(payload, _)| payload.clone()))
    }

    async fn put(&self, key: &str, payload: &str, ttl: Duration) -> Result<(), CacheError> {
        check_size(key, payload, self.max_entry_bytes)?;
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), (payload.to_string(), expiry_from_now(ttl)));
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn entry_state(&self, key: &str) -> Result<EntryState> {
        let entries = self.entries.lock().await;
        Ok(match entries.get(key) {
            None => EntryState::Absent,
            Some((_, expires_at)) if *expires_at <= Utc::now() => EntryState::Expired,
            Some((payload, expires_at)) => EntryState::Live {
                bytes: payload.len(),
                expires_at: *expires_at,
            },
        })
    }
}
