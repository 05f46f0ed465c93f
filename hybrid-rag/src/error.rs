//! Error types for the `hybrid-rag` crate.

use thiserror::Error;

/// Errors that can occur in retrieval operations.
///
/// Chunking and lexical scoring never fail on valid input; every runtime
/// failure originates at the embedding provider or document store boundary.
#[derive(Debug, Error)]
pub enum RagError {
    /// Chunker or pipeline parameters are invalid. Raised before any work begins.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The embedding provider failed or returned malformed data.
    #[error("Embedding unavailable ({provider}): {message}")]
    EmbeddingUnavailable {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the document store backend.
    #[error("Document store error ({backend}): {message}")]
    DocumentStore {
        /// The store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A multi-chunk ingest failed part way through.
    #[error("Ingest failed for document '{document_id}' after {committed} committed chunk(s): {message}")]
    IngestFailed {
        /// The document being ingested.
        document_id: String,
        /// Number of chunks written to both the store and the lexical index.
        committed: usize,
        /// A description of the failure.
        message: String,
    },

    /// The query could not be evaluated.
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl RagError {
    /// Number of chunks already committed when an ingest failed.
    ///
    /// Returns `None` for every variant other than [`RagError::IngestFailed`].
    pub fn committed_chunks(&self) -> Option<usize> {
        match self {
            Self::IngestFailed { committed, .. } => Some(*committed),
            _ => None,
        }
    }
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
