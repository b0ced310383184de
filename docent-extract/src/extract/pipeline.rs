//! Bounded-concurrency orchestration of per-file extraction tasks.
//!
//! One task is dispatched per work item, all up front, and every task must
//! hold one admission slot for its entire duration:
//!
//! ```text
//! WorkItems ──dispatch──► [task] [task] [task] ...   (≤ concurrency in flight)
//!                            │
//!                            ├─ function-level extraction ─► .function.json
//!                            └─ file-level extraction ─────► .file.json
//! ```
//!
//! Because a task keeps its slot across both model calls, the number of
//! outstanding remote requests is bounded by the concurrency limit, not twice
//! it. Failures are contained at the task boundary: a file that exhausts its
//! retries, fails validation, or cannot be written is logged and counted, and
//! its siblings run to completion regardless. The run terminates only when
//! every dispatched task has finished.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::client::ExtractionClient;
use super::prompt;
use crate::artifact::ArtifactStore;
use crate::records::{FileRecord, FunctionRecord, Provenance};
use crate::repo::Repository;
use crate::tokens::WorkItem;

/// Default number of files processed concurrently.
pub const DEFAULT_CONCURRENCY: usize = 50;

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum number of files in flight; each file holds one slot across both
    /// of its model calls.
    pub concurrency: usize,
    /// Optional cap on how many work items are dispatched, applied in
    /// work-list order.
    pub max_files: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_files: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_files(mut self, max_files: Option<usize>) -> Self {
        self.max_files = max_files;
        self
    }
}

/// Outcome counters for one pipeline run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Work items actually dispatched (after the max-files cap).
    pub files_dispatched: usize,
    /// Function-record artifacts written, including empty ones.
    pub function_artifacts: usize,
    /// File-record artifacts written.
    pub file_artifacts: usize,
    /// Individual records that passed validation.
    pub records_kept: usize,
    /// Individual records dropped by validation.
    pub records_dropped: usize,
    /// Extraction or persistence steps that failed outright.
    pub failed_steps: usize,
    /// Sum of token counts over dispatched items.
    pub total_tokens: usize,
}

#[derive(Debug, Default)]
struct TaskOutcome {
    function_artifact: bool,
    file_artifact: bool,
    kept: usize,
    dropped: usize,
    failed_steps: usize,
}

impl PipelineSummary {
    fn absorb(&mut self, outcome: TaskOutcome) {
        self.function_artifacts += usize::from(outcome.function_artifact);
        self.file_artifacts += usize::from(outcome.file_artifact);
        self.records_kept += outcome.kept;
        self.records_dropped += outcome.dropped;
        self.failed_steps += outcome.failed_steps;
    }
}

/// Fans work items out to extraction tasks under one admission semaphore.
pub struct ExtractionPipeline {
    client: Arc<ExtractionClient>,
    store: Arc<ArtifactStore>,
    config: PipelineConfig,
}

impl ExtractionPipeline {
    pub fn new(client: ExtractionClient, store: ArtifactStore, config: PipelineConfig) -> Self {
        Self {
            client: Arc::new(client),
            store: Arc::new(store),
            config,
        }
    }

    /// Processes every work item for `repo`, waiting for all tasks regardless
    /// of individual success or failure. Per-item errors never propagate.
    pub async fn run(&self, repo: &Repository, items: Vec<WorkItem>) -> PipelineSummary {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut summary = PipelineSummary::default();
        let mut handles = Vec::new();

        for item in items {
            if let Some(max_files) = self.config.max_files {
                if summary.files_dispatched >= max_files {
                    info!("reached the {max_files}-file dispatch cap, skipping remaining files");
                    break;
                }
            }
            summary.files_dispatched += 1;
            summary.total_tokens += item.tokens;

            let provenance = repo.provenance(&item.relative_path);
            let task = ProcessFile {
                item,
                provenance,
                client: Arc::clone(&self.client),
                store: Arc::clone(&self.store),
            };
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move { task.run(semaphore).await }));
        }
        info!(
            "dispatched {} extraction tasks ({} input tokens)",
            summary.files_dispatched, summary.total_tokens
        );

        for handle in handles {
            match handle.await {
                Ok(outcome) => summary.absorb(outcome),
                Err(e) => {
                    error!("extraction task panicked: {e}");
                    summary.failed_steps += 1;
                }
            }
        }

        summary
    }
}

/// All state one extraction task needs; runs the two model calls for a single
/// file while holding one admission slot.
struct ProcessFile {
    item: WorkItem,
    provenance: Provenance,
    client: Arc<ExtractionClient>,
    store: Arc<ArtifactStore>,
}

impl ProcessFile {
    async fn run(self, semaphore: Arc<Semaphore>) -> TaskOutcome {
        let mut outcome = TaskOutcome::default();
        let _permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("admission semaphore closed: {e}");
                outcome.failed_steps += 1;
                return outcome;
            }
        };
        debug!("processing {}", self.item.path.display());

        let code = match tokio::fs::read_to_string(&self.item.path).await {
            Ok(code) => code,
            Err(e) => {
                error!("failed to read {}: {e}", self.item.path.display());
                outcome.failed_steps += 1;
                return outcome;
            }
        };

        // The two passes share the admission slot but not a failure domain:
        // a failed function pass still lets the file pass run.
        self.function_pass(&code, &mut outcome).await;
        self.file_pass(&code, &mut outcome).await;
        outcome
    }

    async fn function_pass(&self, code: &str, outcome: &mut TaskOutcome) {
        let filepath = &self.provenance.filepath;
        let value = match self
            .client
            .extract(&prompt::function_description_prompt(code))
            .await
        {
            Ok(value) => value,
            Err(e) => {
                error!("function extraction failed for {filepath}: {e}");
                outcome.failed_steps += 1;
                return;
            }
        };

        let elements = match value.as_array() {
            Some(elements) => elements.as_slice(),
            None => {
                warn!("function analysis for {filepath} was not an array, treating as empty");
                &[]
            }
        };

        let mut records = Vec::new();
        for element in elements {
            match FunctionRecord::from_model_value(element, &self.provenance) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("dropping function description for {filepath}: {e} (payload: {element})");
                    outcome.dropped += 1;
                }
            }
        }
        outcome.kept += records.len();

        match self
            .store
            .write_function_records(&self.provenance, &records)
            .await
        {
            Ok(path) => {
                info!("function analysis for {filepath} saved to {}", path.display());
                outcome.function_artifact = true;
            }
            Err(e) => {
                error!("failed to write function artifact for {filepath}: {e:#}");
                outcome.failed_steps += 1;
            }
        }
    }

    async fn file_pass(&self, code: &str, outcome: &mut TaskOutcome) {
        let filepath = &self.provenance.filepath;
        let value = match self
            .client
            .extract(&prompt::file_description_prompt(code))
            .await
        {
            Ok(value) => value,
            Err(e) => {
                error!("file extraction failed for {filepath}: {e}");
                outcome.failed_steps += 1;
                return;
            }
        };

        let record = match FileRecord::from_model_value(&value, &self.provenance) {
            Ok(record) => record,
            Err(e) => {
                warn!("dropping file description for {filepath}: {e} (payload: {value})");
                outcome.dropped += 1;
                return;
            }
        };

        match self.store.write_file_record(&self.provenance, &record).await {
            Ok(path) => {
                info!("file analysis for {filepath} saved to {}", path.display());
                outcome.file_artifact = true;
            }
            Err(e) => {
                error!("failed to write file artifact for {filepath}: {e:#}");
                outcome.failed_steps += 1;
            }
        }
    }
}
