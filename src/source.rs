//! Source folder scanning.
//!
//! Walks the export folder, applies include/exclude globs and reads every
//! remaining file as UTF-8 text. A file that cannot be read is recorded as a
//! [`FileFailure`] and the scan carries on.

use anyhow::{bail, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::SourceConfig;
use crate::models::SourceFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub name: String,
    pub reason: String,
}

/// Files read in one scan, plus the ones that could not be read.
#[derive(Debug, Default)]
pub struct SourceScan {
    pub files: Vec<SourceFile>,
    pub failures: Vec<FileFailure>,
}

/// Where an ingest run gets its files from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Human-readable location, for reports.
    fn location(&self) -> String;

    async fn scan(&self) -> Result<SourceScan>;
}

/// The export folder on local disk.
pub struct FolderSource {
    root: PathBuf,
    include_globs: Vec<String>,
    exclude_globs: Vec<String>,
    follow_symlinks: bool,
    recursive: bool,
}

impl FolderSource {
    pub fn new(root: &Path, config: &SourceConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            include_globs: config.include_globs.clone(),
            exclude_globs: config.exclude_globs.clone(),
            follow_symlinks: config.follow_symlinks,
            recursive: config.recursive,
        }
    }
}

#[async_trait]
impl FeedSource for FolderSource {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    async fn scan(&self) -> Result<SourceScan> {
        let root = self.root.clone();
        let include = self.include_globs.clone();
        let exclude = self.exclude_globs.clone();
        let follow = self.follow_symlinks;
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        tokio::task::spawn_blocking(move || {
            scan_folder(&root, &include, &exclude, follow, max_depth)
        })
        .await?
    }
}

fn scan_folder(
    root: &Path,
    include_globs: &[String],
    exclude_globs: &[String],
    follow_symlinks: bool,
    max_depth: usize,
) -> Result<SourceScan> {
    if !root.is_dir() {
        bail!("source root does not exist: {}", root.display());
    }

    let include_set = build_globset(include_globs)?;

    let mut default_excludes = vec!["**/.*".to_string(), "**/.*/**".to_string()];
    default_excludes.extend(exclude_globs.iter().cloned());
    let exclude_set = build_globset(&default_excludes)?;

    let mut scan = SourceScan::default();

    let walker = WalkDir::new(root)
        .follow_links(follow_symlinks)
        .max_depth(max_depth);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let name = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                warn!(file = %name, error = %e, "could not walk entry");
                scan.failures.push(FileFailure {
                    name,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        match std::fs::read_to_string(path) {
            Ok(raw_content) => scan.files.push(SourceFile { name, raw_content }),
            Err(e) => {
                warn!(file = %rel_str, error = %e, "could not read source file, skipping");
                scan.failures.push(FileFailure {
                    name,
                    reason: e.to_string(),
                });
            }
        }
    }

    // Sort for deterministic ordering
    scan.files.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(scan)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Fixed in-memory file list, for tests and embedding.
pub struct StaticSource {
    files: Vec<SourceFile>,
}

impl StaticSource {
    pub fn new(files: Vec<SourceFile>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl FeedSource for StaticSource {
    fn location(&self) -> String {
        "<memory>".to_string()
    }

    async fn scan(&self) -> Result<SourceScan> {
        Ok(SourceScan {
            files: self.files.clone(),
            failures: Vec::new(),
        })
    }
}
