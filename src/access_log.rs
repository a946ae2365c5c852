//! Access logging for ingest and fetch invocations.
//!
//! [`AccessLogger::record`] never fails: backend errors are reported via
//! `tracing::warn!` and dropped. Retention is bounded; the same call that
//! appends a record prunes everything older than the newest `max_records`.

use std::collections::VecDeque;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;
use tracing::warn;

use crate::models::format_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Ingest,
    FetchPayload,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Ingest => "ingest",
            Operation::FetchPayload => "fetch_payload",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    CacheHit,
    NoData,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::CacheHit => "cache_hit",
            Outcome::NoData => "no_data",
            Outcome::Failure => "failure",
        }
    }
}

/// One invocation outcome to be recorded.
#[derive(Debug, Clone)]
pub struct AccessEvent {
    pub operation: Operation,
    pub outcome: Outcome,
    pub detail: String,
}

impl AccessEvent {
    pub fn new(operation: Operation, outcome: Outcome, detail: impl Into<String>) -> Self {
        Self {
            operation,
            outcome,
            detail: detail.into(),
        }
    }
}

/// A stored record, as listed by `feed log`.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub id: i64,
    pub recorded_at: String,
    pub operation: String,
    pub outcome: String,
    pub detail: String,
}

#[async_trait]
pub trait AccessLogger: Send + Sync {
    /// Append an event and prune old records. Infallible by contract.
    async fn record(&self, event: AccessEvent);

    /// Newest records first.
    async fn recent(&self, limit: usize) -> Result<Vec<LogRecord>>;
}

// ============ SQLite ============

pub struct SqliteAccessLog {
    pool: SqlitePool,
    max_records: usize,
}

impl SqliteAccessLog {
    pub fn new(pool: SqlitePool, max_records: usize) -> Self {
        Self {
            pool,
            max_records: max_records.max(1),
        }
    }

    async fn try_record(&self, event: &AccessEvent) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO access_log (recorded_at, operation, outcome, detail) VALUES (?, ?, ?, ?)",
        )
        .bind(format_timestamp(&Utc::now()))
        .bind(event.operation.as_str())
        .bind(event.outcome.as_str())
        .bind(&event.detail)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM access_log WHERE id NOT IN (SELECT id FROM access_log ORDER BY id DESC LIMIT ?)",
        )
        .bind(self.max_records as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl AccessLogger for SqliteAccessLog {
    async fn record(&self, event: AccessEvent) {
        if let Err(e) = self.try_record(&event).await {
            warn!(
                operation = event.operation.as_str(),
                outcome = event.outcome.as_str(),
                error = %e,
                "access log write failed"
            );
        }
    }

    async fn recent(&self, limit: usize) -> Result<Vec<LogRecord>> {
        let rows = sqlx::query(
            "SELECT id, recorded_at, operation, outcome, detail FROM access_log ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| LogRecord {
                id: row.get("id"),
                recorded_at: row.get("recorded_at"),
                operation: row.get("operation"),
                outcome: row.get("outcome"),
                detail: row.get("detail"),
            })
            .collect())
    }
}

// ============ In-memory ============

pub struct MemoryAccessLog {
    /// Next id and the retained records, under one lock so ids are appended
    /// in order.
    state: Mutex<(i64, VecDeque<LogRecord>)>,
    max_records: usize,
}

impl MemoryAccessLog {
    pub fn new(max_records: usize) -> Self {
        Self {
            state: Mutex::new((1, VecDeque::new())),
            max_records: max_records.max(1),
        }
    }
}

#[async_trait]
impl AccessLogger for MemoryAccessLog {
    async fn record(&self, event: AccessEvent) {
        let mut state = self.state.lock().await;
        let (next_id, records) = &mut *state;
        records.push_back(LogRecord {
            id: *next_id,
            recorded_at: format_timestamp(&Utc::now()),
            operation: event.operation.as_str().to_string(),
            outcome: event.outcome.as_str().to_string(),
            detail: event.detail,
        });
        *next_id += 1;
        while records.len() > self.max_records {
            records.pop_front();
        }
    }

    async fn recent(&self, limit: usize) -> Result<Vec<LogRecord>> {
        let state = self.state.lock().await;
        Ok(state.1.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};
    use tempfile::TempDir;

    async fn fill(log: &dyn AccessLogger, n: usize) {
        for i in 0..n {
            log.record(AccessEvent::new(
                Operation::FetchPayload,
                Outcome::Success,
                format!("call {}", i),
            ))
            .await;
        }
    }

    #[tokio::test]
    async fn test_memory_log_prunes_oldest() {
        let log = MemoryAccessLog::new(3);
        fill(&log, 5).await;
        let recent = log.recent(10).await.unwrap();
        let details: Vec<&str> = recent.iter().map(|r| r.detail.as_str()).collect();
        assert_eq!(details, vec!["call 4", "call 3", "call 2"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_memory_log_concurrent_records_stay_newest_first() {
        let log = std::sync::Arc::new(MemoryAccessLog::new(1000));
        let mut handles = Vec::new();
        for task in 0..8 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    log.record(AccessEvent::new(
                        Operation::FetchPayload,
                        Outcome::CacheHit,
                        format!("task {} call {}", task, i),
                    ))
                    .await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let recent = log.recent(1000).await.unwrap();
        assert_eq!(recent.len(), 400);
        assert!(recent.windows(2).all(|w| w[0].id > w[1].id));
        assert_eq!(recent[0].id, 400);
    }

    #[tokio::test]
    async fn test_sqlite_log_prunes_oldest() {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect(&tmp.path().join("feed.sqlite")).await.unwrap();
        migrate::ensure_schema(&pool).await.unwrap();
        let log = SqliteAccessLog::new(pool, 4);

        fill(&log, 10).await;
        let recent = log.recent(100).await.unwrap();
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].detail, "call 9");
        assert_eq!(recent[3].detail, "call 6");
        assert_eq!(recent[0].operation, "fetch_payload");
        assert_eq!(recent[0].outcome, "success");
    }

    #[tokio::test]
    async fn test_sqlite_log_failure_is_swallowed() {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect(&tmp.path().join("feed.sqlite")).await.unwrap();
        // No schema: every insert fails.
        let log = SqliteAccessLog::new(pool, 4);
        log.record(AccessEvent::new(Operation::Ingest, Outcome::Failure, "x"))
            .await;
        assert!(log.recent(1).await.is_err());
    }
}
