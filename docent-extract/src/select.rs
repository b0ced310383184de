//! Source-file discovery and extension-based classification.
//!
//! Walks a repository checkout and buckets files into source files (fed to the
//! extraction pipeline), general configuration/documentation files, and files
//! matched by exact name. Test directories and generated-file suffixes are
//! skipped outright. Traversal is sorted by file name so the resulting order,
//! which becomes the pipeline's dispatch order, is deterministic.

use std::path::{Path, PathBuf};

use anyhow::Result;
use ignore::WalkBuilder;
use tracing::{debug, warn};

/// Extensions classified as source code.
pub const SOURCE_FILE_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "java", "go", "rs", "kt", "kts", "scala", "sc",
];

/// Extensions classified as general project files (scripts, config, docs).
pub const GENERAL_FILE_EXTENSIONS: &[&str] = &[
    "sh", "bash", "zsh", "sql", "md", "tf", "toml", "txt", "yaml", "yml", "json",
];

/// Files selected by exact name regardless of extension.
pub const FULL_FILE_NAMES: &[&str] = &["Dockerfile"];

/// Suffixes of generated or minified files that are never selected.
pub const IGNORED_SUFFIXES: &[&str] = &[".min.js", ".bundle.js"];

const TEST_DIR_NAMES: &[&str] = &["test", "tests", "spec", "specs"];

/// Files found under a repository root, classified by kind.
#[derive(Debug, Default)]
pub struct SourceFiles {
    pub source: Vec<PathBuf>,
    pub general: Vec<PathBuf>,
    pub full: Vec<PathBuf>,
}

/// Walks `root` and classifies every regular file, pruning test directories.
pub fn scan_source_files(root: &Path) -> Result<SourceFiles> {
    let mut files = SourceFiles::default();

    let mut builder = WalkBuilder::new(root);
    builder
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                return true;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if TEST_DIR_NAMES.contains(&name.as_str()) {
                debug!("skipping test directory {}", entry.path().display());
                false
            } else {
                true
            }
        });

    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.into_path();
        match classify(&path) {
            Some(FileKind::Source) => files.source.push(path),
            Some(FileKind::General) => files.general.push(path),
            Some(FileKind::Full) => files.full.push(path),
            None => {}
        }
    }

    Ok(files)
}

enum FileKind {
    Source,
    General,
    Full,
}

fn classify(path: &Path) -> Option<FileKind> {
    let file_name = path.file_name()?.to_str()?;

    if IGNORED_SUFFIXES.iter().any(|s| file_name.ends_with(s)) {
        debug!("skipping {} due to ignored suffix", path.display());
        return None;
    }

    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        if SOURCE_FILE_EXTENSIONS.contains(&extension) {
            return Some(FileKind::Source);
        }
        if GENERAL_FILE_EXTENSIONS.contains(&extension) {
            return Some(FileKind::General);
        }
    }

    if FULL_FILE_NAMES.contains(&file_name) {
        return Some(FileKind::Full);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "content").unwrap();
    }

    #[test]
    fn classifies_by_extension_and_name() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        touch(&root.join("src/main.py"));
        touch(&root.join("src/lib.rs"));
        touch(&root.join("config.yaml"));
        touch(&root.join("Dockerfile"));
        touch(&root.join("image.png"));

        let files = scan_source_files(root).unwrap();
        assert_eq!(files.source.len(), 2);
        assert_eq!(files.general.len(), 1);
        assert_eq!(files.full.len(), 1);
    }

    #[test]
    fn skips_test_directories_and_generated_suffixes() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        touch(&root.join("app/handler.py"));
        touch(&root.join("tests/test_handler.py"));
        touch(&root.join("app/Spec/fixture.py"));
        touch(&root.join("dist/app.min.js"));
        touch(&root.join("dist/vendor.bundle.js"));

        let files = scan_source_files(root).unwrap();
        assert_eq!(files.source, vec![root.join("app/handler.py")]);
    }

    #[test]
    fn traversal_order_is_deterministic() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        touch(&root.join("b.py"));
        touch(&root.join("a.py"));
        touch(&root.join("c.py"));

        let first = scan_source_files(root).unwrap();
        let second = scan_source_files(root).unwrap();
        assert_eq!(first.source, second.source);
        assert_eq!(
            first.source,
            vec![root.join("a.py"), root.join("b.py"), root.join("c.py")]
        );
    }
}
