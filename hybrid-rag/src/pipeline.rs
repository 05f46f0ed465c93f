//! Retrieval pipeline orchestrator.
//!
//! The [`RetrievalPipeline`] coordinates ingestion and query execution by
//! composing a [`Chunker`], an [`EmbeddingGateway`] over an
//! [`EmbeddingProvider`], a [`LexicalIndex`], a [`DocumentStore`], and a
//! [`HybridRanker`].
//!
//! # Example
//!
//! ```rust,ignore
//! use hybrid_rag::{InMemoryDocumentStore, RetrievalConfig, RetrievalPipeline};
//!
//! let pipeline = RetrievalPipeline::builder()
//!     .config(RetrievalConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .document_store(Arc::new(InMemoryDocumentStore::new()))
//!     .build()?;
//!
//! pipeline.ingest(&document).await?;
//! let results = pipeline.query("search query", Some("session-1")).await?;
//! ```
//!
//! # Cancellation
//!
//! Dropping an `ingest` or `query` future cancels it and any embedding
//! requests in flight. The lexical index lock is never held across an
//! `.await`, so an index update is applied either fully or not at all.
//!
//! Ingests and removals run concurrently with each other;
//! [`RetrievalPipeline::rebuild_index`] waits for them and excludes them while
//! it replaces the index.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::chunking::{Chunker, WordWindowChunker};
use crate::config::RetrievalConfig;
use crate::document::{Chunk, Document, IngestReport, ScoredChunk};
use crate::embedding::{EmbeddingGateway, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::lexical::{Bm25Params, LexicalIndex};
use crate::ranking::{HybridRanker, ScopeFilter};
use crate::store::DocumentStore;

/// The retrieval orchestrator.
///
/// Ingest runs chunk → embed → store → index per chunk, in document order.
/// Query runs embed → lexical search → vector similarity → merge → scope
/// filter → truncate. Construct one via [`RetrievalPipeline::builder()`].
pub struct RetrievalPipeline {
    config: RetrievalConfig,
    gateway: EmbeddingGateway,
    store: Arc<dyn DocumentStore>,
    chunker: Arc<dyn Chunker>,
    index: RwLock<LexicalIndex>,
    // Shared by ingest and removal, exclusive for rebuild.
    gate: tokio::sync::RwLock<()>,
    ranker: HybridRanker,
}

impl RetrievalPipeline {
    /// Create a new [`RetrievalPipelineBuilder`].
    pub fn builder() -> RetrievalPipelineBuilder {
        RetrievalPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Return a reference to the embedding gateway.
    pub fn embedding_gateway(&self) -> &EmbeddingGateway {
        &self.gateway
    }

    /// Return a reference to the document store.
    pub fn document_store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Number of chunks currently in the lexical index.
    pub fn indexed_chunk_count(&self) -> usize {
        self.index.read().len()
    }

    /// Run `f` against the lexical index under a shared lock.
    pub fn with_index<R>(&self, f: impl FnOnce(&LexicalIndex) -> R) -> R {
        f(&self.index.read())
    }

    /// Ingest a single document: chunk → embed → store → index.
    ///
    /// Embeddings are requested concurrently (bounded by the configured
    /// limit) but chunks are committed strictly in document order. A chunk is
    /// committed once it is both stored and indexed.
    ///
    /// Chunks of this document already in the lexical index are skipped and
    /// count as committed, so calling `ingest` again after an
    /// [`RagError::IngestFailed`] resumes with the remainder.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IngestFailed`] if an embedding or store write
    /// fails. The error carries the number of the document's chunks committed
    /// so far, including those committed by earlier attempts; ingest again to
    /// resume or call [`remove_document`](Self::remove_document) to discard them.
    pub async fn ingest(&self, document: &Document) -> Result<IngestReport> {
        let _gate = self.gate.read().await;
        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            info!(document.id = %document.id, chunk_count = 0, "ingested document (empty)");
            return Ok(IngestReport { document_id: document.id.clone(), chunk_ids: Vec::new() });
        }

        let (done, pending): (Vec<Chunk>, Vec<Chunk>) = {
            let index = self.index.read();
            chunks.into_iter().partition(|c| index.contains(&c.id))
        };
        let mut chunk_ids: Vec<String> = done.into_iter().map(|c| c.id).collect();
        if !chunk_ids.is_empty() {
            debug!(
                document.id = %document.id,
                skipped = chunk_ids.len(),
                "resuming ingest past indexed chunks"
            );
        }

        let texts: Vec<String> = pending.iter().map(|c| c.text.clone()).collect();
        let mut pending = pending.into_iter();
        let mut batches = std::pin::pin!(self.gateway.embed_stream(&texts));

        while let Some(batch) = batches.next().await {
            let vectors = batch.map_err(|e| {
                error!(
                    document.id = %document.id,
                    committed = chunk_ids.len(),
                    error = %e,
                    "embedding failed during ingestion"
                );
                ingest_failed(document, chunk_ids.len(), format!("embedding failed: {e}"))
            })?;

            for (vector, mut chunk) in vectors.into_iter().zip(pending.by_ref()) {
                chunk.embedding = Some(vector);
                let id = self.store.insert(&chunk).await.map_err(|e| {
                    error!(
                        document.id = %document.id,
                        chunk.index = chunk.sequence_index,
                        error = %e,
                        "store write failed during ingestion"
                    );
                    ingest_failed(
                        document,
                        chunk_ids.len(),
                        format!("store write failed for chunk {}: {e}", chunk.sequence_index),
                    )
                })?;
                self.index.write().add_chunk(id.clone(), &chunk.text);
                chunk_ids.push(id);
            }
        }

        info!(document.id = %document.id, chunk_count = chunk_ids.len(), "ingested document");
        Ok(IngestReport { document_id: document.id.clone(), chunk_ids })
    }

    /// Ingest multiple documents in order.
    ///
    /// # Errors
    ///
    /// Returns the [`RagError::IngestFailed`] of the first document that
    /// fails; earlier documents stay ingested.
    pub async fn ingest_batch(&self, documents: &[Document]) -> Result<Vec<IngestReport>> {
        let mut reports = Vec::with_capacity(documents.len());
        for document in documents {
            reports.push(self.ingest(document).await?);
        }
        Ok(reports)
    }

    /// Query with the configured `top_k`.
    ///
    /// See [`query_top_k`](Self::query_top_k).
    pub async fn query(&self, text: &str, scope: Option<&str>) -> Result<Vec<ScoredChunk>> {
        self.query_top_k(text, self.config.top_k, scope).await
    }

    /// Query the pipeline: embed → search → merge → filter by scope → truncate.
    ///
    /// IDF and average length always come from the full corpus; `scope` only
    /// filters the ranked output. An empty result is a valid "no match".
    ///
    /// # Errors
    ///
    /// Returns [`RagError::QueryFailed`] if the query embedding fails and
    /// lexical fallback is disabled, or if the store snapshot cannot be read.
    pub async fn query_top_k(
        &self,
        text: &str,
        top_k: usize,
        scope: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let query_vector = match self.gateway.embed(text).await {
            Ok(vector) => Some(vector),
            Err(e) if self.config.lexical_fallback => {
                warn!(error = %e, "query embedding failed, ranking lexically");
                None
            }
            Err(e) => {
                error!(error = %e, "embedding failed during query");
                return Err(RagError::QueryFailed(format!("query embedding failed: {e}")));
            }
        };

        let corpus = self.store.list_all(None).await.map_err(|e| {
            error!(error = %e, "corpus snapshot failed during query");
            RagError::QueryFailed(format!("corpus snapshot failed: {e}"))
        })?;

        let hits = self.index.read().search_all(text);
        let filter = scope.map(|scope| ScopeFilter { field: &self.config.scope_field, scope });
        let mut results = self.ranker.rank(hits, &corpus, query_vector.as_deref(), filter);
        results.truncate(top_k);

        info!(result_count = results.len(), top_k, scoped = scope.is_some(), "query completed");
        Ok(results)
    }

    /// Remove every chunk of a document from the store and the lexical index.
    ///
    /// Returns the number of chunks removed.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DocumentStore`] if the store cannot be read or
    /// written; the lexical index is left untouched in that case.
    pub async fn remove_document(&self, document_id: &str) -> Result<usize> {
        let _gate = self.gate.read().await;
        let chunks = self.store.list_all(None).await?;
        let ids: Vec<&str> = chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .map(|c| c.id.as_str())
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        self.store.delete(&ids).await.map_err(|e| {
            error!(document.id = document_id, error = %e, "store delete failed");
            e
        })?;
        {
            let mut index = self.index.write();
            for id in &ids {
                index.remove_chunk(id);
            }
        }

        info!(document.id = document_id, chunk_count = ids.len(), "removed document");
        Ok(ids.len())
    }

    /// Rebuild the lexical index from the document store's contents.
    ///
    /// Waits for in-flight ingests and removals to finish and holds them off
    /// until the new index is installed. Returns the number of chunks indexed.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DocumentStore`] if the store cannot be read; the
    /// current index is kept in that case.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let _gate = self.gate.write().await;
        let chunks = self.store.list_all(None).await?;
        let mut rebuilt = LexicalIndex::with_params(self.index.read().params());
        for chunk in &chunks {
            rebuilt.add_chunk(chunk.id.clone(), &chunk.text);
        }
        *self.index.write() = rebuilt;
        info!(chunk_count = chunks.len(), "rebuilt lexical index");
        Ok(chunks.len())
    }
}

fn ingest_failed(document: &Document, committed: usize, message: String) -> RagError {
    RagError::IngestFailed { document_id: document.id.clone(), committed, message }
}

/// Builder for constructing a [`RetrievalPipeline`].
///
/// `config`, `embedding_provider`, and `document_store` are required. The
/// chunker defaults to a [`WordWindowChunker`] using the config's
/// `window_size` and `overlap`.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RetrievalPipeline::builder()
///     .config(RetrievalConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .document_store(Arc::new(store))
///     .chunker(Arc::new(CharBudgetChunker::new(800)?))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RetrievalPipelineBuilder {
    config: Option<RetrievalConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    document_store: Option<Arc<dyn DocumentStore>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RetrievalPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RetrievalConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the document store backend.
    pub fn document_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.document_store = Some(store);
        self
    }

    /// Replace the default word-window chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`RetrievalPipeline`], validating the config and that all
    /// required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if a required field is
    /// missing, the config is invalid, or the provider reports zero
    /// dimensions.
    pub fn build(self) -> Result<RetrievalPipeline> {
        let config = self
            .config
            .ok_or_else(|| RagError::InvalidConfiguration("config is required".to_string()))?;
        config.validate()?;
        let provider = self.embedding_provider.ok_or_else(|| {
            RagError::InvalidConfiguration("embedding_provider is required".to_string())
        })?;
        if provider.dimensions() == 0 {
            return Err(RagError::InvalidConfiguration(format!(
                "embedding provider '{}' reports zero dimensions",
                provider.name()
            )));
        }
        let store = self.document_store.ok_or_else(|| {
            RagError::InvalidConfiguration("document_store is required".to_string())
        })?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(WordWindowChunker::new(config.window_size, config.overlap)?),
        };

        let index = LexicalIndex::with_params(Bm25Params { k1: config.k1, b: config.b });
        let gateway = EmbeddingGateway::new(
            provider,
            config.max_concurrent_embeddings,
            config.embedding_batch_size,
        );
        let ranker = HybridRanker::new(config.lexical_weight, config.vector_weight);

        Ok(RetrievalPipeline {
            config,
            gateway,
            store,
            chunker,
            index: RwLock::new(index),
            gate: tokio::sync::RwLock::new(()),
            ranker,
        })
    }
}
