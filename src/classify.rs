//! Filename classification against the static rule table.

use tracing::info;

use crate::models::{ClassifiedFile, SourceFile};
use crate::rules::{ClassificationRule, RULES};

/// Resolve a filename against [`RULES`].
pub fn classify(filename: &str) -> Option<&'static ClassificationRule> {
    classify_with(RULES, filename)
}

/// Resolve a filename against an explicit rule list.
///
/// Scans in list order and returns the first rule that matches without
/// being voided by one of its exclude tokens. An excluded rule does not
/// stop the scan.
pub fn classify_with<'a>(
    rules: &'a [ClassificationRule],
    filename: &str,
) -> Option<&'a ClassificationRule> {
    rules.iter().find(|rule| rule.matches(filename))
}

/// Result of classifying one scan's worth of files.
#[derive(Debug, Default)]
pub struct Classification {
    /// Matched files, in write order: rule priority, then filename.
    pub matched: Vec<ClassifiedFile>,
    pub unmatched: Vec<String>,
}

/// Classify every file, dropping unmatched ones with a diagnostic.
pub fn classify_files(files: Vec<SourceFile>) -> Classification {
    let mut out = Classification::default();

    for file in files {
        match classify(&file.name) {
            Some(rule) => out.matched.push(ClassifiedFile { file, rule }),
            None => {
                info!(file = %file.name, "no classification rule matched, skipping");
                out.unmatched.push(file.name);
            }
        }
    }

    out.matched.sort_by(|a, b| {
        a.rule
            .priority
            .cmp(&b.rule.priority)
            .then_with(|| a.file.name.cmp(&b.file.name))
    });
    out.unmatched.sort();
    out
}
