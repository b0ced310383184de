//! docent-extract: concurrent code-description extraction pipeline
//!
//! This crate turns source repositories into per-file and per-function
//! natural-language descriptions by querying a language model, bounded by an
//! admission semaphore and tolerant of per-file failure. Results are persisted
//! as JSON sidecar artifacts and aggregated back into a corpus for downstream
//! embedding and search (see the `docent-index` crate).
//!
//! ## Pipeline Flow
//!
//! ```text
//! RepositoryPath → select → tokens → ExtractionPipeline → ArtifactStore
//!                                          │                    │
//!                                   ExtractionClient       read_corpus
//!                                    (retry + parse)            │
//!                                                            Corpus
//! ```
//!
//! ## Key Modules
//!
//! - **[`repo`]**: repository identity, metadata registry, and git sync
//! - **[`select`]**: extension-based source-file discovery
//! - **[`tokens`]**: token budgeting and work-list construction
//! - **[`extract`]**: prompts, the retried model client, and the orchestrator
//! - **[`records`]**: typed records and their validation builders
//! - **[`artifact`]**: durable JSON sidecars and corpus aggregation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docent_extract::extract::client::{ExtractionClient, HttpChatBackend};
//! use docent_extract::extract::pipeline::{ExtractionPipeline, PipelineConfig};
//! use docent_extract::artifact::ArtifactStore;
//! use std::sync::Arc;
//!
//! # fn example() -> anyhow::Result<()> {
//! let backend = HttpChatBackend::new("http://localhost:8000/v1", "my-model")?;
//! let client = ExtractionClient::new(Arc::new(backend));
//! let store = ArtifactStore::new("./output");
//! let pipeline = ExtractionPipeline::new(client, store, PipelineConfig::default());
//! # let _ = pipeline;
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod config;
pub mod extract;
pub mod records;
pub mod repo;
pub mod select;
pub mod tokens;
