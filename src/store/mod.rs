//! Storage abstraction for the chunk table.
//!
//! The [`TableStore`] trait models a cell-limited tabular medium: a named
//! table of rows of string cells, with the header as the first row. Rows
//! may be ragged (a row's width is its number of cells), which is how a
//! malformed line shows up to the reassembler.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::WriteFailure;

/// Abstract backing store for the chunk table.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`read_rows`](TableStore::read_rows) | Read every row, header first |
/// | [`replace_rows`](TableStore::replace_rows) | Atomically replace the whole table |
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Name of the backing table, used in diagnostics.
    fn table_name(&self) -> &str;

    /// Read every row in store order, header included.
    ///
    /// Returns `Ok(None)` when the table does not exist at all.
    async fn read_rows(&self) -> Result<Option<Vec<Vec<String>>>>;

    /// Clear the table and write `rows` (header included) as one
    /// all-or-nothing unit.
    ///
    /// Implementations verify the written row count before making the new
    /// contents visible and leave the previous contents in place on any
    /// failure.
    async fn replace_rows(&self, rows: &[Vec<String>]) -> Result<(), WriteFailure>;
}
