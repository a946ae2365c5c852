//! Store writer: one atomic bulk replace per ingest run.

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::WriteFailure;
use crate::models::{ChunkRow, TABLE_HEADER};
use crate::store::TableStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The table now holds the header plus `rows` data rows.
    Written { rows: usize, digest: String },
    /// Nothing to write; the previous table was left as it was.
    NoData,
}

/// Replace the whole table with the header plus `rows`, in the given order.
///
/// An empty `rows` leaves the store untouched. Cells over
/// `max_cell_chars` fail the write before the store is touched.
pub async fn replace_all(
    store: &dyn TableStore,
    rows: &[ChunkRow],
    max_cell_chars: usize,
) -> Result<WriteOutcome, WriteFailure> {
    if rows.is_empty() {
        warn!(
            table = store.table_name(),
            "no rows to write, keeping previous table contents"
        );
        return Ok(WriteOutcome::NoData);
    }

    let mut table: Vec<Vec<String>> = Vec::with_capacity(rows.len() + 1);
    table.push(TABLE_HEADER.iter().map(|h| h.to_string()).collect());

    for (i, row) in rows.iter().enumerate() {
        let cells = row.to_cells();
        if let Some(len) = cells
            .iter()
            .map(|c| c.chars().count())
            .find(|len| *len > max_cell_chars)
        {
            return Err(WriteFailure::CellTooLarge {
                row: i + 1,
                filename: row.filename.clone(),
                len,
                limit: max_cell_chars,
            });
        }
        table.push(cells);
    }

    store.replace_rows(&table).await?;

    let digest = table_digest(&table);
    info!(
        table = store.table_name(),
        rows = rows.len(),
        digest = %digest,
        "chunk table replaced"
    );
    Ok(WriteOutcome::Written {
        rows: rows.len(),
        digest,
    })
}

/// SHA-256 over every cell, for comparing tables across runs.
pub fn table_digest(table: &[Vec<String>]) -> String {
    let mut hasher = Sha256::new();
    for row in table {
        for cell in row {
            hasher.update((cell.len() as u64).to_le_bytes());
            hasher.update(cell.as_bytes());
        }
        hasher.update([0xff]);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::store::memory::MemoryTableStore;
    use chrono::{TimeZone, Utc};

    fn row(file: &str, key: &str, index: u64, content: &str) -> ChunkRow {
        ChunkRow {
            filename: file.into(),
            category: Category::Data,
            key: key.into(),
            chunk_index: index,
            content: content.into(),
            last_updated: Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_writes_header_then_rows_in_order() {
        let store = MemoryTableStore::new("t");
        let rows = vec![row("a", "k", 0, "x"), row("a", "k", 1, "y")];
        let outcome = replace_all(&store, &rows, 100).await.unwrap();
        assert!(matches!(outcome, WriteOutcome::Written { rows: 2, .. }));

        let table = store.snapshot().await.unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table[0], TABLE_HEADER.to_vec());
        assert_eq!(table[1][3], "0");
        assert_eq!(table[2][3], "1");
        assert_eq!(table[2][5], "2026-05-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_empty_rows_keep_previous_table() {
        let previous = vec![vec!["old".to_string()]];
        let store = MemoryTableStore::with_rows("t", previous.clone());
        let outcome = replace_all(&store, &[], 100).await.unwrap();
        assert_eq!(outcome, WriteOutcome::NoData);
        assert_eq!(store.snapshot().await, Some(previous));
    }

    #[tokio::test]
    async fn test_oversized_cell_fails_before_touching_store() {
        let previous = vec![vec!["old".to_string()]];
        let store = MemoryTableStore::with_rows("t", previous.clone());
        // Limit sits above the 20-char timestamp cell every row carries.
        let long = "x".repeat(30);
        let rows = vec![row("a", "k", 0, "ok"), row("b", "k", 0, &long)];
        let err = replace_all(&store, &rows, 25).await.unwrap_err();
        match err {
            WriteFailure::CellTooLarge {
                row, filename, len, ..
            } => {
                assert_eq!(row, 2);
                assert_eq!(filename, "b");
                assert_eq!(len, 30);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.snapshot().await, Some(previous));
    }

    #[tokio::test]
    async fn test_store_rejection_is_reported() {
        let store = MemoryTableStore::new("t").rejecting_writes();
        let err = replace_all(&store, &[row("a", "k", 0, "x")], 100)
            .await
            .unwrap_err();
        assert!(matches!(err, WriteFailure::Rejected(_)));
    }

    #[test]
    fn test_digest_distinguishes_cell_boundaries() {
        let a = vec![vec!["ab".to_string(), "c".to_string()]];
        let b = vec![vec!["a".to_string(), "bc".to_string()]];
        assert_ne!(table_digest(&a), table_digest(&b));
        assert_eq!(table_digest(&a), table_digest(&a.clone()));
    }
}
