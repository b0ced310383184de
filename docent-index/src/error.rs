//! Error types for the indexing crate.

/// Result type for indexing operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Failures while embedding records or operating the store.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The embedding endpoint could not be reached.
    #[error("embedding request failed: {source}")]
    EmbeddingRequest {
        #[from]
        source: reqwest::Error,
    },

    /// The embedding endpoint answered with a non-success status.
    #[error("embedding endpoint returned {status}: {body}")]
    EmbeddingEndpoint {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The endpoint returned a different number of vectors than requested.
    #[error("embedding count mismatch: expected {expected}, got {actual}")]
    EmbeddingCount { expected: usize, actual: usize },

    /// Database failures from the record store.
    #[error("database error: {source}")]
    Database {
        #[from]
        source: sqlx::Error,
    },

    /// Generic errors from other libraries.
    #[error("external error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}
