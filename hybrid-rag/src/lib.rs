//! Hybrid lexical + vector retrieval core.
//!
//! This crate provides:
//! - Word-window and character-budget chunking
//! - A BM25 lexical index with a lazily maintained IDF cache
//! - A bounded-concurrency gateway in front of any [`EmbeddingProvider`]
//! - A [`DocumentStore`] abstraction with an in-memory backend
//! - Hybrid ranking that merges BM25 and cosine similarity scores
//! - The [`RetrievalPipeline`] orchestrating ingestion and queries
//!
//! # Feature flags
//!
//! - `openai` – [`openai::OpenAIEmbeddingProvider`] for OpenAI-compatible endpoints

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod lexical;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod ranking;
pub mod store;

pub use chunking::{CharBudgetChunker, Chunker, WordWindowChunker, chunk_words};
pub use config::{RetrievalConfig, RetrievalConfigBuilder};
pub use document::{Chunk, Document, IngestReport, Metadata, MetadataValue, ScoredChunk};
pub use embedding::{EmbeddingGateway, EmbeddingProvider};
pub use error::{RagError, Result};
pub use lexical::{Bm25Params, LexicalHit, LexicalIndex};
pub use pipeline::{RetrievalPipeline, RetrievalPipelineBuilder};
pub use ranking::{HybridRanker, ScopeFilter, cosine_similarity};
pub use store::{DocumentStore, InMemoryDocumentStore};
