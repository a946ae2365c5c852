//! Store, cache and access-log overview.
//!
//! Gives a quick summary of what the last ingest left behind: row counts,
//! fragments per compound key, the shared timestamp, and whether a cached
//! payload is currently live. Used by `feed status`.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::backends::Backends;
use crate::cache::{payload_cache_key, EntryState};
use crate::config::Config;

/// Fragment and byte counts for one compound key.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyStats {
    pub fragments: usize,
    pub chars: usize,
}

/// Per-key breakdown of the data rows in a table (header excluded).
/// Rows too short to carry a key are counted under `malformed`.
pub fn key_breakdown(rows: &[Vec<String>]) -> (BTreeMap<String, KeyStats>, usize) {
    let mut by_key: BTreeMap<String, KeyStats> = BTreeMap::new();
    let mut malformed = 0;
    for row in rows.iter().skip(1) {
        if row.len() < 5 {
            malformed += 1;
            continue;
        }
        let stats = by_key.entry(format!("{}|{}", row[1], row[2])).or_default();
        stats.fragments += 1;
        stats.chars += row[4].chars().count();
    }
    (by_key, malformed)
}

/// Run the status command: query the backends and print a summary.
pub async fn run_status(config: &Config) -> Result<()> {
    let backends = Backends::open(config).await?;
    let table = backends.store.table_name().to_string();

    println!("Readiness Feed — Status");
    println!("=======================");
    println!();
    println!("  Database:    {}", config.require_db_path()?.display());
    println!("  Table:       {}", table);

    match backends.store.read_rows().await? {
        None => println!("  Rows:        (table missing, run ingest)"),
        Some(rows) => {
            let data_rows = rows.len().saturating_sub(1);
            println!("  Rows:        {} (+ header)", data_rows);
            if let Some(ts) = rows.get(1).and_then(|r| r.get(5)) {
                println!("  Updated:     {}", ts);
            }

            let (by_key, malformed) = key_breakdown(&rows);
            if malformed > 0 {
                println!("  Malformed:   {}", malformed);
            }
            if !by_key.is_empty() {
                println!();
                println!("  {:<36} {:>9} {:>12}", "KEY", "FRAGMENTS", "CHARS");
                println!("  {}", "-".repeat(59));
                for (key, stats) in &by_key {
                    println!("  {:<36} {:>9} {:>12}", key, stats.fragments, stats.chars);
                }
            }
        }
    }

    println!();
    let key = payload_cache_key(&config.cache.key_prefix);
    let cache_line = match backends.cache.entry_state(&key).await? {
        EntryState::Absent => "absent".to_string(),
        EntryState::Expired => "expired".to_string(),
        EntryState::Live { bytes, expires_at } => format!(
            "live, {} bytes, expires {}",
            bytes,
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
    };
    println!("  Cache key:   {}", key);
    println!("  Cache:       {}", cache_line);

    let recent = backends.log.recent(1).await?;
    match recent.first() {
        Some(r) => println!(
            "  Last access: {} {} {} ({})",
            r.recorded_at, r.operation, r.outcome, r.detail
        ),
        None => println!("  Last access: never"),
    }
    println!();

    Ok(())
}

/// Print the newest access-log records, newest first.
pub async fn run_log(config: &Config, limit: usize) -> Result<()> {
    let backends = Backends::open(config).await?;
    let records = backends.log.recent(limit).await?;

    if records.is_empty() {
        println!("No access records.");
        return Ok(());
    }

    println!(
        "{:>6}  {:<20}  {:<13}  {:<9}  DETAIL",
        "ID", "RECORDED", "OPERATION", "OUTCOME"
    );
    for r in &records {
        println!(
            "{:>6}  {:<20}  {:<13}  {:<9}  {}",
            r.id, r.recorded_at, r.operation, r.outcome, r.detail
        );
    }
    Ok(())
}
