//! Token budgeting for candidate files.
//!
//! Each candidate is counted with the model's tokenizer and either becomes a
//! [`WorkItem`] or is excluded: a zero count means the file is empty or
//! unreadable as text, and a count over the configured ceiling is a policy
//! skip. Neither exclusion is an error. The surviving items keep their
//! traversal order, which the pipeline uses as its dispatch order.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, warn};

/// Counts tokens the way the target model's tokenizer would.
///
/// This is the seam to the external tokenizer; tests substitute a trivial
/// implementation.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> Result<usize>;
}

/// Token counter backed by a pretrained tokenizer file (`tokenizer.json`).
pub struct HfTokenCounter {
    tokenizer: tokenizers::Tokenizer,
}

impl HfTokenCounter {
    pub fn from_file(path: &Path) -> Result<Self> {
        let tokenizer = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer {}: {e}", path.display()))?;
        Ok(Self { tokenizer })
    }
}

impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;
        Ok(encoding.get_ids().len())
    }
}

/// A single source file selected and budgeted for extraction.
///
/// Immutable once created; consumed exactly once by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Absolute path of the file on disk.
    pub path: PathBuf,
    /// Path relative to the repository root.
    pub relative_path: PathBuf,
    /// Token count as computed at selection time.
    pub tokens: usize,
}

/// Builds the ordered work list from candidate files.
///
/// A tokenizer or read failure is fatal only for that one file; the rest of
/// the candidates are still considered.
pub fn select_work_items(
    files: &[PathBuf],
    root: &Path,
    counter: &dyn TokenCounter,
    token_limit: Option<usize>,
) -> Vec<WorkItem> {
    let mut items = Vec::new();

    for path in files {
        let code = match std::fs::read_to_string(path) {
            Ok(code) => code,
            Err(e) => {
                warn!("skipping {}: {e}", path.display());
                continue;
            }
        };
        let tokens = match counter.count(&code) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("skipping {}: {e}", path.display());
                continue;
            }
        };
        if tokens == 0 {
            debug!("skipping {}: zero tokens", path.display());
            continue;
        }
        if let Some(limit) = token_limit {
            if tokens > limit {
                info!(
                    "skipping {} with {tokens} tokens, exceeding the limit of {limit}",
                    path.display()
                );
                continue;
            }
        }

        let relative_path = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        items.push(WorkItem {
            path: path.clone(),
            relative_path,
            tokens,
        });
    }

    items
}

/// Per-file token counts sorted descending, plus the total.
pub fn token_report(items: &[WorkItem]) -> (Vec<(PathBuf, usize)>, usize) {
    let mut rows: Vec<(PathBuf, usize)> = items
        .iter()
        .map(|item| (item.relative_path.clone(), item.tokens))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));
    let total = items.iter().map(|item| item.tokens).sum();
    (rows, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    /// Counts whitespace-separated words; empty files count zero.
    struct WhitespaceCounter;

    impl TokenCounter for WhitespaceCounter {
        fn count(&self, text: &str) -> Result<usize> {
            Ok(text.split_whitespace().count())
        }
    }

    #[test]
    fn excludes_zero_and_over_limit_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        let empty = root.join("empty.py");
        let small = root.join("small.py");
        let large = root.join("large.py");
        fs::write(&empty, "").unwrap();
        fs::write(&small, "def main(): pass").unwrap();
        fs::write(&large, "word ".repeat(100)).unwrap();

        let files = vec![empty, small.clone(), large];
        let items = select_work_items(&files, root, &WhitespaceCounter, Some(10));

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].relative_path, PathBuf::from("small.py"));
        assert!(items[0].tokens > 0 && items[0].tokens <= 10);
    }

    #[test]
    fn no_limit_keeps_all_nonempty_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        let a = root.join("a.py");
        let b = root.join("b.py");
        fs::write(&a, "one two").unwrap();
        fs::write(&b, "word ".repeat(1000)).unwrap();

        let items = select_work_items(&[a, b], root, &WhitespaceCounter, None);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn unreadable_file_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        let missing = root.join("missing.py");
        let present = root.join("present.py");
        fs::write(&present, "x = 1").unwrap();

        let items = select_work_items(&[missing, present], root, &WhitespaceCounter, None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].relative_path, PathBuf::from("present.py"));
    }

    #[test]
    fn dispatch_order_matches_input_order() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        let names = ["z.py", "a.py", "m.py"];
        let mut files = Vec::new();
        for name in names {
            let path = root.join(name);
            fs::write(&path, "content here").unwrap();
            files.push(path);
        }

        let items = select_work_items(&files, root, &WhitespaceCounter, None);
        let got: Vec<_> = items
            .iter()
            .map(|i| i.relative_path.to_string_lossy().into_owned())
            .collect();
        assert_eq!(got, vec!["z.py", "a.py", "m.py"]);
    }

    #[test]
    fn report_is_sorted_descending_with_total() {
        let items = vec![
            WorkItem {
                path: PathBuf::from("/r/a.py"),
                relative_path: PathBuf::from("a.py"),
                tokens: 5,
            },
            WorkItem {
                path: PathBuf::from("/r/b.py"),
                relative_path: PathBuf::from("b.py"),
                tokens: 20,
            },
        ];

        let (rows, total) = token_report(&items);
        assert_eq!(total, 25);
        assert_eq!(rows[0], (PathBuf::from("b.py"), 20));
        assert_eq!(rows[1], (PathBuf::from("a.py"), 5));
    }
}
