//! Store reader and reassembler.
//!
//! Reads the chunk table back, drops malformed rows, groups fragments by
//! compound key (`category|key`), orders them by chunk index and
//! concatenates them into a [`ReassembledPayload`].
//!
//! Each compound key collects into a `BTreeMap<u64, String>`: a later row
//! with an index already seen replaces the earlier fragment, and missing
//! indices contribute nothing to the concatenation.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::error::FetchError;
use crate::models::{Category, ReassembledPayload};
use crate::store::TableStore;

/// Compound keys the dashboard cannot render without. Absence is logged,
/// not fatal.
pub const REQUIRED_KEYS: &[(Category, &str)] = &[
    (Category::Config, "paths"),
    (Category::Config, "units"),
    (Category::Data, "roster"),
    (Category::Data, "members"),
];

/// Cells a row needs for category, key, index and content.
const MIN_CELLS: usize = 5;
const LAST_UPDATED_CELL: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// Position in the table, header = 0.
    pub row_number: usize,
    pub reason: String,
}

/// A payload plus what was tolerated while building it.
#[derive(Debug, Clone)]
pub struct Reassembly {
    pub payload: ReassembledPayload,
    pub skipped: Vec<SkippedRow>,
    /// Required compound keys absent from the payload, as `category|key`.
    pub missing_required: Vec<String>,
    /// Fragments replaced by a later row with the same key and index.
    pub overwritten: usize,
}

/// Read the store and rebuild the payload.
pub async fn reassemble(store: &dyn TableStore) -> Result<Reassembly, FetchError> {
    let table = store.table_name().to_string();
    match store.read_rows().await? {
        None => Err(FetchError::MissingStore { table }),
        Some(rows) => reassemble_rows(&table, &rows),
    }
}

/// Rebuild the payload from raw table rows (header first).
pub fn reassemble_rows(table: &str, rows: &[Vec<String>]) -> Result<Reassembly, FetchError> {
    if rows.len() <= 1 {
        return Err(FetchError::EmptyStore {
            table: table.to_string(),
        });
    }

    let mut groups: HashMap<(Category, String), BTreeMap<u64, String>> = HashMap::new();
    let mut skipped = Vec::new();
    let mut overwritten = 0;

    for (row_number, row) in rows.iter().enumerate().skip(1) {
        let (category, key, index, content) = match parse_row(row) {
            Ok(parsed) => parsed,
            Err(reason) => {
                warn!(table, row = row_number, %reason, "skipping malformed row");
                skipped.push(SkippedRow { row_number, reason });
                continue;
            }
        };

        let fragments = groups.entry((category, key.to_string())).or_default();
        if fragments.insert(index, content.to_string()).is_some() {
            overwritten += 1;
            warn!(
                table,
                row = row_number,
                compound_key = %format!("{}|{}", category, key),
                index,
                "duplicate chunk index, later row wins"
            );
        }
    }

    let mut payload = ReassembledPayload::default();
    payload.meta.last_updated = rows[1]
        .get(LAST_UPDATED_CELL)
        .cloned()
        .unwrap_or_default();

    for ((category, key), fragments) in groups {
        let value: String = fragments.into_values().collect();
        match category {
            Category::Config => payload.config.insert(key, value),
            Category::Data => payload.data.insert(key, value),
        };
    }

    let missing_required: Vec<String> = REQUIRED_KEYS
        .iter()
        .filter(|(category, key)| {
            let section = match category {
                Category::Config => &payload.config,
                Category::Data => &payload.data,
            };
            !section.contains_key(*key)
        })
        .map(|(category, key)| format!("{}|{}", category, key))
        .collect();

    if !missing_required.is_empty() {
        warn!(table, missing = ?missing_required, "required keys absent from payload");
    }

    Ok(Reassembly {
        payload,
        skipped,
        missing_required,
        overwritten,
    })
}

fn parse_row(row: &[String]) -> Result<(Category, &str, u64, &str), String> {
    if row.len() < MIN_CELLS {
        return Err(format!(
            "expected at least {} cells, found {}",
            MIN_CELLS,
            row.len()
        ));
    }
    let category = Category::parse(&row[1])
        .ok_or_else(|| format!("unknown category '{}'", row[1]))?;
    let key = row[2].as_str();
    if key.is_empty() {
        return Err("missing key".to_string());
    }
    let index: u64 = row[3]
        .trim()
        .parse()
        .map_err(|_| format!("invalid chunk index '{}'", row[3]))?;
    Ok((category, key, index, row[4].as_str()))
}
