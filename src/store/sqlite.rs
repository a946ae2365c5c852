//! SQLite-backed [`TableStore`].
//!
//! The chunk table keeps one SQLite row per table line. Cells live in six
//! positional nullable `TEXT` columns and `row_no` fixes line order; the
//! header line is `row_no = 0`. A line's width is its number of cells up to
//! the last non-NULL one, so a truncated line reads back short.
//!
//! `replace_rows` runs delete, insert and count verification inside one
//! transaction, so readers see either the old table or the new one.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::config::is_valid_table_name;
use crate::error::WriteFailure;

use super::TableStore;

const COLUMNS: [&str; 6] = [
    "filename",
    "category",
    "key",
    "chunk_index",
    "content",
    "last_updated",
];

pub struct SqliteTableStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteTableStore {
    pub fn new(pool: SqlitePool, table: &str) -> Result<Self> {
        if !is_valid_table_name(table) {
            bail!("invalid table name: '{}'", table);
        }
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    fn quoted_table(&self) -> String {
        format!("\"{}\"", self.table)
    }

    fn column_list() -> String {
        COLUMNS
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    async fn table_exists(&self) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name = ?",
        )
        .bind(&self.table)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

fn rejected(err: sqlx::Error) -> WriteFailure {
    WriteFailure::Rejected(err.into())
}

#[async_trait]
impl TableStore for SqliteTableStore {
    fn table_name(&self) -> &str {
        &self.table
    }

    async fn read_rows(&self) -> Result<Option<Vec<Vec<String>>>> {
        if !self.table_exists().await? {
            return Ok(None);
        }

        let sql = format!(
            "SELECT {} FROM {} ORDER BY row_no ASC",
            Self::column_list(),
            self.quoted_table()
        );
        let records = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut rows = Vec::with_capacity(records.len());
        for record in &records {
            let mut cells: Vec<Option<String>> = Vec::with_capacity(COLUMNS.len());
            for i in 0..COLUMNS.len() {
                cells.push(record.try_get::<Option<String>, _>(i)?);
            }
            while matches!(cells.last(), Some(None)) {
                cells.pop();
            }
            rows.push(cells.into_iter().map(Option::unwrap_or_default).collect());
        }

        Ok(Some(rows))
    }

    async fn replace_rows(&self, rows: &[Vec<String>]) -> Result<(), WriteFailure> {
        let table = self.quoted_table();
        let mut tx = self.pool.begin().await.map_err(rejected)?;

        let create = format!(
            "CREATE TABLE IF NOT EXISTS {} (row_no INTEGER PRIMARY KEY, {})",
            table,
            COLUMNS
                .iter()
                .map(|c| format!("\"{}\" TEXT", c))
                .collect::<Vec<_>>()
                .join(", ")
        );
        sqlx::query(&create)
            .execute(&mut *tx)
            .await
            .map_err(rejected)?;

        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *tx)
            .await
            .map_err(rejected)?;

        let insert = format!(
            "INSERT INTO {} (row_no, {}) VALUES (?, ?, ?, ?, ?, ?, ?)",
            table,
            Self::column_list()
        );
        for (row_no, row) in rows.iter().enumerate() {
            if row.len() > COLUMNS.len() {
                return Err(WriteFailure::Rejected(anyhow!(
                    "row {} has {} cells, table has {} columns",
                    row_no,
                    row.len(),
                    COLUMNS.len()
                )));
            }
            let mut query = sqlx::query(&insert).bind(row_no as i64);
            for i in 0..COLUMNS.len() {
                query = query.bind(row.get(i).map(String::as_str));
            }
            query.execute(&mut *tx).await.map_err(rejected)?;
        }

        let actual: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&mut *tx)
            .await
            .map_err(rejected)?;
        if actual as usize != rows.len() {
            // Dropping the transaction rolls back to the previous table.
            return Err(WriteFailure::VerificationMismatch {
                expected: rows.len(),
                actual: actual as usize,
            });
        }

        tx.commit().await.map_err(rejected)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::TempDir;

    async fn open(tmp: &TempDir) -> SqliteTableStore {
        let pool = db::connect(&tmp.path().join("feed.sqlite")).await.unwrap();
        SqliteTableStore::new(pool, "chunks").unwrap()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_missing_table_reads_none() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        assert!(store.read_rows().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_then_read_preserves_order() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let rows = vec![
            row(&["Filename", "Category", "Key", "ChunkIndex", "Content", "LastUpdated"]),
            row(&["b.txt", "data", "b", "0", "B", "t"]),
            row(&["a.txt", "config", "a", "0", "", "t"]),
        ];
        store.replace_rows(&rows).await.unwrap();
        assert_eq!(store.read_rows().await.unwrap(), Some(rows.clone()));

        // A second replace drops everything from the first.
        let smaller = vec![rows[0].clone()];
        store.replace_rows(&smaller).await.unwrap();
        assert_eq!(store.read_rows().await.unwrap(), Some(smaller));
    }

    #[tokio::test]
    async fn test_short_rows_read_back_short() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        store
            .replace_rows(&[row(&["h1", "h2"]), row(&["x", "", "z"])])
            .await
            .unwrap();
        let read = store.read_rows().await.unwrap().unwrap();
        assert_eq!(read[0], row(&["h1", "h2"]));
        assert_eq!(read[1], row(&["x", "", "z"]));
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_contents() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let good = vec![row(&["h"]), row(&["keep"])];
        store.replace_rows(&good).await.unwrap();

        let too_wide = vec![row(&["h"]), row(&["1", "2", "3", "4", "5", "6", "7"])];
        let err = store.replace_rows(&too_wide).await.unwrap_err();
        assert!(matches!(err, WriteFailure::Rejected(_)));
        assert_eq!(store.read_rows().await.unwrap(), Some(good));
    }

    #[tokio::test]
    async fn test_rejects_invalid_table_name() {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect(&tmp.path().join("x.sqlite")).await.unwrap();
        assert!(SqliteTableStore::new(pool, "bad name").is_err());
    }
}
