//! Durable JSON sidecar storage for extracted records.
//!
//! One source file yields up to two artifacts under the output root:
//!
//! ```text
//! <root>/<group>/<repo>/<relative path>.function.json   array of FunctionRecord
//! <root>/<group>/<repo>/<relative path>.file.json       single FileRecord
//! ```
//!
//! Writes create any missing directories and overwrite what was there, which
//! is what makes re-running the pipeline over an unchanged repository
//! idempotent at file granularity: the latest run always wins, and nothing is
//! ever deleted implicitly. Reads walk the whole tree back into a [`Corpus`];
//! an artifact that fails to parse is logged and skipped without aborting the
//! walk, and no de-duplication is applied.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::records::{FileRecord, FunctionRecord, Provenance};

/// Suffix of artifacts holding an array of function records.
pub const FUNCTION_SUFFIX: &str = ".function.json";
/// Suffix of artifacts holding a single file record.
pub const FILE_SUFFIX: &str = ".file.json";

/// Writer/reader for per-file artifacts under one output root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

/// Aggregate of every record read back from the artifact tree.
///
/// Rebuilt fully on each read; there is no incremental diffing.
#[derive(Debug, Default, Clone)]
pub struct Corpus {
    pub file_records: Vec<FileRecord>,
    pub function_records: Vec<FunctionRecord>,
}

impl Corpus {
    pub fn is_empty(&self) -> bool {
        self.file_records.is_empty() && self.function_records.is_empty()
    }
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_base(&self, provenance: &Provenance) -> PathBuf {
        self.root
            .join(&provenance.group_name)
            .join(&provenance.repo_name)
            .join(&provenance.filepath)
    }

    fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
        let mut name = base.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Persists the function-record list for one source file, even when empty.
    /// Returns the artifact path.
    pub async fn write_function_records(
        &self,
        provenance: &Provenance,
        records: &[FunctionRecord],
    ) -> Result<PathBuf> {
        let path = Self::with_suffix(&self.artifact_base(provenance), FUNCTION_SUFFIX);
        self.write_json(&path, &serde_json::to_vec_pretty(records)?)
            .await?;
        Ok(path)
    }

    /// Persists the file-level record for one source file. Returns the
    /// artifact path.
    pub async fn write_file_record(
        &self,
        provenance: &Provenance,
        record: &FileRecord,
    ) -> Result<PathBuf> {
        let path = Self::with_suffix(&self.artifact_base(provenance), FILE_SUFFIX);
        self.write_json(&path, &serde_json::to_vec_pretty(record)?)
            .await?;
        Ok(path)
    }

    async fn write_json(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Walks the output tree and rebuilds the full corpus.
    pub async fn read_corpus(&self) -> Result<Corpus> {
        let mut corpus = Corpus::default();
        if !self.root.exists() {
            return Ok(corpus);
        }

        let mut dir_stack = vec![self.root.clone()];
        while let Some(dir) = dir_stack.pop() {
            let mut read_dir = match tokio::fs::read_dir(&dir).await {
                Ok(read_dir) => read_dir,
                Err(e) => {
                    warn!("failed to read directory {}: {e}", dir.display());
                    continue;
                }
            };

            while let Some(entry) = read_dir.next_entry().await? {
                let path = entry.path();
                let file_type = match entry.file_type().await {
                    Ok(file_type) => file_type,
                    Err(e) => {
                        warn!("failed to stat {}: {e}", path.display());
                        continue;
                    }
                };
                if file_type.is_dir() {
                    dir_stack.push(path);
                    continue;
                }

                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default();
                if name.ends_with(FUNCTION_SUFFIX) {
                    match read_json::<Vec<FunctionRecord>>(&path).await {
                        Ok(records) => corpus.function_records.extend(records),
                        Err(e) => warn!("skipping artifact {}: {e:#}", path.display()),
                    }
                } else if name.ends_with(FILE_SUFFIX) {
                    match read_json::<FileRecord>(&path).await {
                        Ok(record) => corpus.file_records.push(record),
                        Err(e) => warn!("skipping artifact {}: {e:#}", path.display()),
                    }
                } else {
                    debug!("ignoring non-artifact file {}", path.display());
                }
            }
        }

        Ok(corpus)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn provenance(filepath: &str) -> Provenance {
        Provenance {
            filepath: filepath.to_string(),
            repository_url: "https://example.com/acme/widget.git".to_string(),
            group_name: "acme".to_string(),
            repo_name: "widget".to_string(),
        }
    }

    fn function_record(name: &str, prov: &Provenance) -> FunctionRecord {
        FunctionRecord {
            file_name: prov.file_name(),
            function_name: name.to_string(),
            class_name: String::new(),
            arguments: Vec::new(),
            return_type: "None".to_string(),
            functionality: "Does a thing.".to_string(),
            tags: vec!["thing".to_string()],
            filepath: prov.filepath.clone(),
            repository_url: prov.repository_url.clone(),
            group_name: prov.group_name.clone(),
            repo_name: prov.repo_name.clone(),
        }
    }

    fn file_record(prov: &Provenance) -> FileRecord {
        FileRecord {
            file_name: prov.file_name(),
            overall_purpose_and_domain: "Test fixtures.".to_string(),
            primary_responsibilities: vec!["Provides fixtures.".to_string()],
            tags: vec!["testing".to_string()],
            filepath: prov.filepath.clone(),
            repository_url: prov.repository_url.clone(),
            group_name: prov.group_name.clone(),
            repo_name: prov.repo_name.clone(),
        }
    }

    #[tokio::test]
    async fn writes_under_group_repo_and_reads_back() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let prov = provenance("src/util/helpers.py");

        let records = vec![function_record("alpha", &prov), function_record("beta", &prov)];
        let path = store.write_function_records(&prov, &records).await.unwrap();
        assert_eq!(
            path,
            dir.path()
                .join("acme/widget/src/util/helpers.py.function.json")
        );

        store.write_file_record(&prov, &file_record(&prov)).await.unwrap();

        let corpus = store.read_corpus().await.unwrap();
        assert_eq!(corpus.function_records.len(), 2);
        assert_eq!(corpus.file_records.len(), 1);
        assert_eq!(corpus.function_records[0].function_name, "alpha");
        assert_eq!(corpus.file_records[0].filepath, "src/util/helpers.py");
    }

    #[tokio::test]
    async fn rewriting_identical_records_is_byte_identical() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let prov = provenance("main.py");
        let records = vec![function_record("main", &prov)];

        let path = store.write_function_records(&prov, &records).await.unwrap();
        let first = tokio::fs::read(&path).await.unwrap();

        store.write_function_records(&prov, &records).await.unwrap();
        let second = tokio::fs::read(&path).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_record_list_still_produces_an_artifact() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let prov = provenance("empty.py");

        let path = store.write_function_records(&prov, &[]).await.unwrap();
        assert!(path.exists());

        let corpus = store.read_corpus().await.unwrap();
        assert!(corpus.function_records.is_empty());
    }

    #[tokio::test]
    async fn corrupt_artifacts_are_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let prov = provenance("good.py");
        store
            .write_file_record(&prov, &file_record(&prov))
            .await
            .unwrap();

        let bad = dir.path().join("acme/widget/bad.py.file.json");
        tokio::fs::write(&bad, b"{not json").await.unwrap();
        let stray = dir.path().join("acme/widget/notes.txt");
        tokio::fs::write(&stray, b"unrelated").await.unwrap();

        let corpus = store.read_corpus().await.unwrap();
        assert_eq!(corpus.file_records.len(), 1);
        assert_eq!(corpus.file_records[0].filepath, "good.py");
    }

    #[tokio::test]
    async fn missing_root_yields_an_empty_corpus() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("never-written"));
        let corpus = store.read_corpus().await.unwrap();
        assert!(corpus.is_empty());
    }
}
