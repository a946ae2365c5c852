//! Ingestion pipeline orchestration.
//!
//! One run: invalidate the cached payload → scan the export folder →
//! classify → chunk → replace the whole chunk table. The cache is cleared
//! before anything else so a run that later fails leaves readers on the
//! store, never on a stale cached payload. Unreadable and unmatched files
//! are skipped; only configuration, cache invalidation, scan and write
//! failures abort the run.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::access_log::{AccessEvent, Operation, Outcome};
use crate::backends::Backends;
use crate::cache::payload_cache_key;
use crate::chunk::chunk_file;
use crate::classify::classify_files;
use crate::config::Config;
use crate::error::IngestError;
use crate::models::{format_timestamp, ChunkRow};
use crate::source::{FeedSource, FileFailure, FolderSource};
use crate::writer::{replace_all, WriteOutcome};

/// Summary of one ingest run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub files_seen: usize,
    /// Matched files in write order, with their fragment counts.
    pub matched: Vec<(String, String, usize)>,
    pub unmatched: Vec<String>,
    pub failed: Vec<FileFailure>,
    /// Compound keys fed by more than one matched file.
    pub shared_keys: Vec<SharedKey>,
    pub outcome: WriteOutcome,
}

/// Several matched files resolving to one compound key. Their fragments
/// overlap by index, so only the last file's survive reassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedKey {
    pub compound_key: String,
    pub files: Vec<String>,
}

/// Files and rows an ingest would produce, without side effects.
#[derive(Debug, Clone)]
pub struct IngestPlan {
    pub files_seen: usize,
    pub matched: Vec<(String, String, usize)>,
    pub unmatched: Vec<String>,
    pub failed: Vec<FileFailure>,
    pub shared_keys: Vec<SharedKey>,
    pub rows: Vec<ChunkRow>,
}

/// Scan, classify and chunk. Shared by the real run and `--dry-run`.
pub async fn plan(
    config: &Config,
    source: &dyn FeedSource,
    now: DateTime<Utc>,
) -> Result<IngestPlan, IngestError> {
    let scan = source.scan().await.map_err(IngestError::Source)?;
    let files_seen = scan.files.len() + scan.failures.len();
    let classification = classify_files(scan.files);

    let mut rows = Vec::new();
    let mut matched = Vec::with_capacity(classification.matched.len());
    for classified in &classification.matched {
        let file_rows = chunk_file(classified, config.store.max_fragment_chars, now);
        matched.push((
            classified.file.name.clone(),
            classified.rule.compound_key(),
            file_rows.len(),
        ));
        rows.extend(file_rows);
    }

    let shared_keys = shared_keys(&matched);
    for shared in &shared_keys {
        warn!(
            compound_key = %shared.compound_key,
            files = %shared.files.join(", "),
            "several files share one key; the last file's fragments win"
        );
    }

    Ok(IngestPlan {
        files_seen,
        matched,
        unmatched: classification.unmatched,
        failed: scan.failures,
        shared_keys,
        rows,
    })
}

fn shared_keys(matched: &[(String, String, usize)]) -> Vec<SharedKey> {
    let mut by_key: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (name, compound_key, _) in matched {
        by_key.entry(compound_key.as_str()).or_default().push(name.clone());
    }
    by_key
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|(compound_key, files)| SharedKey {
            compound_key: compound_key.to_string(),
            files,
        })
        .collect()
}

/// Run one ingest against the given backends and source.
pub async fn ingest(
    config: &Config,
    backends: &Backends,
    source: &dyn FeedSource,
) -> Result<IngestReport, IngestError> {
    let run_id = Uuid::new_v4().to_string();
    let started_at = Utc::now();

    let result = ingest_inner(config, backends, source, &run_id, started_at).await;

    let event = match &result {
        Ok(report) => match &report.outcome {
            WriteOutcome::Written { rows, digest } => AccessEvent::new(
                Operation::Ingest,
                Outcome::Success,
                format!("run {} wrote {} rows, digest {}", run_id, rows, digest),
            ),
            WriteOutcome::NoData => AccessEvent::new(
                Operation::Ingest,
                Outcome::NoData,
                format!(
                    "run {} found no matching files in {}",
                    run_id,
                    source.location()
                ),
            ),
        },
        Err(e) => {
            error!(run_id = %run_id, error = %e, "ingest failed");
            AccessEvent::new(
                Operation::Ingest,
                Outcome::Failure,
                format!("run {}: {}", run_id, e),
            )
        }
    };
    backends.log.record(event).await;

    result
}

async fn ingest_inner(
    config: &Config,
    backends: &Backends,
    source: &dyn FeedSource,
    run_id: &str,
    started_at: DateTime<Utc>,
) -> Result<IngestReport, IngestError> {
    let cache_key = payload_cache_key(&config.cache.key_prefix);
    backends
        .cache
        .invalidate(&cache_key)
        .await
        .map_err(IngestError::CacheInvalidate)?;
    info!(run_id, cache_key = %cache_key, "cached payload invalidated");

    let plan = plan(config, source, started_at).await?;
    info!(
        run_id,
        files = plan.files_seen,
        matched = plan.matched.len(),
        unmatched = plan.unmatched.len(),
        failed = plan.failed.len(),
        rows = plan.rows.len(),
        "source classified"
    );

    let outcome = replace_all(
        backends.store.as_ref(),
        &plan.rows,
        config.store.max_cell_chars,
    )
    .await?;

    Ok(IngestReport {
        run_id: run_id.to_string(),
        started_at,
        files_seen: plan.files_seen,
        matched: plan.matched,
        unmatched: plan.unmatched,
        failed: plan.failed,
        shared_keys: plan.shared_keys,
        outcome,
    })
}

/// CLI entry point for `feed ingest`.
pub async fn run_ingest(config: &Config, dry_run: bool) -> Result<()> {
    // A dry run never opens the database, so only the source is required.
    if !dry_run {
        config.require_ingest_keys()?;
    }
    let source = FolderSource::new(config.require_source_root()?, &config.source);

    if dry_run {
        let plan = plan(config, &source, Utc::now()).await?;
        println!("ingest {} (dry-run)", source.location());
        println!("  files found: {}", plan.files_seen);
        print_files(&plan.matched, &plan.unmatched, &plan.failed, &plan.shared_keys);
        println!("  estimated rows: {}", plan.rows.len());
        return Ok(());
    }

    let backends = Backends::open(config).await?;
    let report = ingest(config, &backends, &source).await?;

    println!("ingest {}", source.location());
    println!("  run: {}", report.run_id);
    println!("  timestamp: {}", format_timestamp(&report.started_at));
    println!("  files found: {}", report.files_seen);
    print_files(
        &report.matched,
        &report.unmatched,
        &report.failed,
        &report.shared_keys,
    );
    match &report.outcome {
        WriteOutcome::Written { rows, digest } => {
            println!("  rows written: {}", rows);
            println!("  digest: {}", digest);
            println!("ok");
        }
        WriteOutcome::NoData => {
            println!("  rows written: 0");
            println!("no data: previous table left unchanged");
        }
    }

    Ok(())
}

fn print_files(
    matched: &[(String, String, usize)],
    unmatched: &[String],
    failed: &[FileFailure],
    shared_keys: &[SharedKey],
) {
    println!("  matched: {}", matched.len());
    for (name, compound_key, fragments) in matched {
        println!("    {:<40} {:<28} {} fragment(s)", name, compound_key, fragments);
    }
    println!("  unmatched: {}", unmatched.len());
    for name in unmatched {
        println!("    {}", name);
    }
    if !failed.is_empty() {
        println!("  unreadable: {}", failed.len());
        for f in failed {
            println!("    {} ({})", f.name, f.reason);
        }
    }
    for shared in shared_keys {
        println!(
            "  warning: {} shared by {} (last file wins)",
            shared.compound_key,
            shared.files.join(", ")
        );
    }
}
