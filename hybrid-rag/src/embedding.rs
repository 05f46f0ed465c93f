//! Embedding provider trait and the gateway that shapes requests to it.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (OpenAI, local models,
/// etc.) behind a unified async interface. The default
/// [`embed_batch`](EmbeddingProvider::embed_batch) implementation calls
/// [`embed`](EmbeddingProvider::embed) sequentially; backends that support
/// native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use hybrid_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding for better throughput.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Name used in logs and error messages.
    fn name(&self) -> &str {
        "custom"
    }
}

/// Wraps an [`EmbeddingProvider`] with batching, a concurrency limit, and
/// error translation.
///
/// Every failure surfaces as [`RagError::EmbeddingUnavailable`], including
/// vectors of the wrong dimensionality and responses with the wrong number of
/// vectors. The gateway never caches and never retries: each call reaches the
/// provider exactly once.
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    semaphore: Semaphore,
    max_concurrent: usize,
    batch_size: usize,
}

impl EmbeddingGateway {
    /// Create a gateway allowing `max_concurrent` in-flight requests of up to
    /// `batch_size` texts each. Zero values are raised to one.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, max_concurrent: usize, batch_size: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            provider,
            semaphore: Semaphore::new(max_concurrent),
            max_concurrent,
            batch_size: batch_size.max(1),
        }
    }

    /// Dimensionality every returned vector must have.
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Permits not currently held by an in-flight request.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingUnavailable`] if the provider fails or
    /// returns a vector of the wrong dimensionality.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_group(&[text]).await?;
        vectors.pop().ok_or_else(|| self.unavailable("provider returned no vector".to_string()))
    }

    /// Embed `texts`, preserving order. The result has one vector per input.
    ///
    /// # Errors
    ///
    /// Returns the first [`RagError::EmbeddingUnavailable`] in input order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut batches = std::pin::pin!(self.embed_stream(texts));
        let mut vectors = Vec::with_capacity(texts.len());
        while let Some(batch) = batches.next().await {
            vectors.extend(batch?);
        }
        Ok(vectors)
    }

    /// Embed `texts` in groups of [`batch_size`](Self::batch_size), running up
    /// to [`max_concurrent`](Self::max_concurrent) groups at once.
    ///
    /// Yields one item per group in input order, so callers can commit
    /// earlier groups before a later one fails. Dropping the stream cancels
    /// every request still in flight.
    pub fn embed_stream<'a>(
        &'a self,
        texts: &'a [String],
    ) -> impl Stream<Item = Result<Vec<Vec<f32>>>> + 'a {
        debug!(
            provider = self.provider.name(),
            text_count = texts.len(),
            batch_size = self.batch_size,
            "embedding texts"
        );
        stream::iter(texts.chunks(self.batch_size))
            .map(move |group| async move {
                let refs: Vec<&str> = group.iter().map(String::as_str).collect();
                self.embed_group(&refs).await
            })
            .buffered(self.max_concurrent)
    }

    async fn embed_group(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| self.unavailable(format!("semaphore error: {e}")))?;

        let result = match texts {
            [text] => self.provider.embed(text).await.map(|v| vec![v]),
            _ => self.provider.embed_batch(texts).await,
        };

        let vectors = result.map_err(|e| {
            error!(provider = self.provider.name(), error = %e, "embedding request failed");
            match e {
                RagError::EmbeddingUnavailable { .. } => e,
                other => self.unavailable(other.to_string()),
            }
        })?;

        if vectors.len() != texts.len() {
            error!(
                provider = self.provider.name(),
                expected = texts.len(),
                actual = vectors.len(),
                "provider returned wrong number of vectors"
            );
            return Err(self.unavailable(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }

        let dimensions = self.provider.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            error!(
                provider = self.provider.name(),
                expected = dimensions,
                actual = bad.len(),
                "provider returned vector of wrong dimensionality"
            );
            return Err(self.unavailable(format!(
                "expected {dimensions}-dimensional vectors, got {}",
                bad.len()
            )));
        }

        Ok(vectors)
    }

    fn unavailable(&self, message: String) -> RagError {
        RagError::EmbeddingUnavailable { provider: self.provider.name().to_string(), message }
    }
}
