//! docent-index: embedding and nearest-neighbor search over extracted records
//!
//! Consumes the corpus produced by `docent-extract`, renders each record into
//! a paragraph document, embeds it through an [`provider::EmbeddingProvider`],
//! and stores the result in SQLite for brute-force cosine search.
//!
//! ```text
//! Corpus → to_vector_string → EmbeddingProvider → RecordStore → search
//! ```

pub mod error;
pub mod indexer;
pub mod provider;
pub mod store;
