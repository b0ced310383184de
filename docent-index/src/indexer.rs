//! Loads the aggregated corpus into the record store and serves queries.
//!
//! Documents are rendered with `to_vector_string()` and embedded in batches;
//! documents and queries carry the asymmetric `search_document:` /
//! `search_query:` prefixes the embedding models expect.

use std::sync::Arc;

use tracing::{debug, info};

use docent_extract::artifact::Corpus;

use crate::error::Result;
use crate::provider::EmbeddingProvider;
use crate::store::{FileHit, FunctionHit, RecordStore};

/// Number of documents embedded per provider call.
pub const EMBED_BATCH_SIZE: usize = 64;

const DOCUMENT_PREFIX: &str = "search_document: ";
const QUERY_PREFIX: &str = "search_query: ";

/// Counters for one corpus load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub function_records: usize,
    pub file_records: usize,
    pub dimension: usize,
}

/// Embeds and stores a corpus, then answers nearest-neighbor queries over it.
pub struct VectorIndex {
    store: RecordStore,
    provider: Arc<dyn EmbeddingProvider>,
}

impl VectorIndex {
    pub fn new(store: RecordStore, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, provider }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Rebuilds the index from `corpus`: clears existing rows, embeds every
    /// record, and inserts the result.
    pub async fn load_corpus(&self, corpus: &Corpus) -> Result<LoadSummary> {
        self.store.clear().await?;

        let function_texts: Vec<String> = corpus
            .function_records
            .iter()
            .map(|record| format!("{DOCUMENT_PREFIX}{}", record.to_vector_string()))
            .collect();
        let function_vectors = self.embed_batched(&function_texts).await?;
        let function_rows: Vec<_> = corpus
            .function_records
            .iter()
            .cloned()
            .zip(function_texts)
            .zip(function_vectors)
            .map(|((record, text), vector)| (record, text, vector))
            .collect();
        self.store.insert_function_records(&function_rows).await?;
        info!(
            "loaded {} function records via the {} provider",
            function_rows.len(),
            self.provider.provider_name()
        );

        let file_texts: Vec<String> = corpus
            .file_records
            .iter()
            .map(|record| format!("{DOCUMENT_PREFIX}{}", record.to_vector_string()))
            .collect();
        let file_vectors = self.embed_batched(&file_texts).await?;
        let file_rows: Vec<_> = corpus
            .file_records
            .iter()
            .cloned()
            .zip(file_texts)
            .zip(file_vectors)
            .map(|((record, text), vector)| (record, text, vector))
            .collect();
        self.store.insert_file_records(&file_rows).await?;
        info!("loaded {} file records", file_rows.len());

        Ok(LoadSummary {
            function_records: function_rows.len(),
            file_records: file_rows.len(),
            dimension: self.provider.dimension(),
        })
    }

    async fn embed_batched(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let embedded = self.provider.embed_texts(batch).await?;
            debug!("embedded batch of {}", embedded.len());
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    /// Top-`limit` function descriptions for a natural-language query.
    pub async fn search_functions(&self, query: &str, limit: usize) -> Result<Vec<FunctionHit>> {
        let Some(vector) = self.embed_query(query).await? else {
            return Ok(Vec::new());
        };
        self.store.search_functions(&vector, limit, None).await
    }

    /// Top-`limit` file descriptions for a natural-language query.
    pub async fn search_files(&self, query: &str, limit: usize) -> Result<Vec<FileHit>> {
        let Some(vector) = self.embed_query(query).await? else {
            return Ok(Vec::new());
        };
        self.store.search_files(&vector, limit, None).await
    }

    async fn embed_query(&self, query: &str) -> Result<Option<Vec<f32>>> {
        let embedded = self
            .provider
            .embed_texts(&[format!("{QUERY_PREFIX}{query}")])
            .await?;
        Ok(embedded.into_iter().next())
    }
}
