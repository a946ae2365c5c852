//! Fixed-width content chunker.
//!
//! Splits file content into fragments of at most `max_fragment_chars`
//! characters so each fragment fits in one store cell. Splits ignore the
//! content's own structure; concatenating fragments in index order gives
//! back the original string exactly.

use chrono::{DateTime, Utc};

use crate::models::{ChunkRow, ClassifiedFile};

/// Split content into ordered fragments.
///
/// Empty content yields a single empty fragment so the file's presence is
/// still recorded. Sizes count `char`s, so a split never lands inside a
/// UTF-8 sequence. A size of 0 is treated as 1.
pub fn chunk(content: &str, max_fragment_chars: usize) -> Vec<String> {
    let size = max_fragment_chars.max(1);

    if content.is_empty() {
        return vec![String::new()];
    }

    let mut fragments = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in content.char_indices() {
        if count == size {
            fragments.push(content[start..offset].to_string());
            start = offset;
            count = 0;
        }
        count += 1;
    }
    fragments.push(content[start..].to_string());

    fragments
}

/// Chunk a classified file into store rows with contiguous indices from 0.
pub fn chunk_file(
    classified: &ClassifiedFile,
    max_fragment_chars: usize,
    last_updated: DateTime<Utc>,
) -> Vec<ChunkRow> {
    chunk(&classified.file.raw_content, max_fragment_chars)
        .into_iter()
        .enumerate()
        .map(|(index, content)| ChunkRow {
            filename: classified.file.name.clone(),
            category: classified.rule.category,
            key: classified.rule.key.to_string(),
            chunk_index: index as u64,
            content,
            last_updated,
        })
        .collect()
}
