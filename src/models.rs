//! Core data models used throughout the feed pipeline.
//!
//! These types represent the source files, stored fragment rows, and the
//! reassembled payload that flow through ingestion and retrieval.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Header row of the persisted chunk table. Bit-exact.
pub const TABLE_HEADER: [&str; 6] = [
    "Filename",
    "Category",
    "Key",
    "ChunkIndex",
    "Content",
    "LastUpdated",
];

/// Which half of the payload a key lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Config,
    Data,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Config => "config",
            Category::Data => "data",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "config" => Some(Category::Config),
            "data" => Some(Category::Data),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A flat file from the export folder. Read-only to the pipeline.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub raw_content: String,
}

/// A source file paired with the rule it resolved to.
#[derive(Debug, Clone)]
pub struct ClassifiedFile {
    pub file: SourceFile,
    pub rule: &'static crate::rules::ClassificationRule,
}

/// One fragment of one file, as written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRow {
    pub filename: String,
    pub category: Category,
    pub key: String,
    pub chunk_index: u64,
    pub content: String,
    pub last_updated: DateTime<Utc>,
}

impl ChunkRow {
    /// Cell values in [`TABLE_HEADER`] order.
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.filename.clone(),
            self.category.as_str().to_string(),
            self.key.clone(),
            self.chunk_index.to_string(),
            self.content.clone(),
            format_timestamp(&self.last_updated),
        ]
    }
}

/// The structured object served to the dashboard.
///
/// Values are opaque strings; parsing nested file formats is the
/// consumer's job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReassembledPayload {
    pub config: BTreeMap<String, String>,
    pub data: BTreeMap<String, String>,
    pub meta: PayloadMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMeta {
    pub last_updated: String,
}

/// Timestamp format used in the `LastUpdated` column.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
