//! Configuration for the retrieval pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for chunking, scoring, and ranking.
///
/// Deserializing fills missing fields with their defaults, so a partial
/// JSON document is a valid configuration source. Deserialized values are
/// not validated; pass them through [`RetrievalConfig::validate`] or build
/// with [`RetrievalConfig::builder`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of words per chunk window.
    pub window_size: usize,
    /// Number of words shared between consecutive windows.
    pub overlap: usize,
    /// Number of ranked results returned by a query.
    pub top_k: usize,
    /// BM25 term-frequency saturation.
    pub k1: f32,
    /// BM25 length normalization.
    pub b: f32,
    /// Multiplier applied to the lexical score when combining.
    pub lexical_weight: f32,
    /// Multiplier applied to the vector score when combining.
    pub vector_weight: f32,
    /// Maximum number of embedding requests in flight at once.
    pub max_concurrent_embeddings: usize,
    /// Number of texts sent to the provider per embedding request.
    pub embedding_batch_size: usize,
    /// Metadata key compared against the caller's scope.
    pub scope_field: String,
    /// Rank lexically when the query embedding fails instead of failing the query.
    pub lexical_fallback: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            window_size: 200,
            overlap: 40,
            top_k: 5,
            k1: 1.5,
            b: 0.75,
            lexical_weight: 1.0,
            vector_weight: 1.0,
            max_concurrent_embeddings: 5,
            embedding_batch_size: 1,
            scope_field: "scope".to_string(),
            lexical_fallback: false,
        }
    }
}

impl RetrievalConfig {
    /// Create a new builder for constructing a [`RetrievalConfig`].
    pub fn builder() -> RetrievalConfigBuilder {
        RetrievalConfigBuilder::default()
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if:
    /// - `window_size == 0` or `overlap >= window_size`
    /// - `top_k == 0`
    /// - `k1` is negative or not finite, or `b` is outside `[0, 1]`
    /// - either combination weight is not finite
    /// - `max_concurrent_embeddings == 0` or `embedding_batch_size == 0`
    /// - `scope_field` is empty
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(invalid("window_size must be greater than zero"));
        }
        if self.overlap >= self.window_size {
            return Err(RagError::InvalidConfiguration(format!(
                "overlap ({}) must be less than window_size ({})",
                self.overlap, self.window_size
            )));
        }
        if self.top_k == 0 {
            return Err(invalid("top_k must be greater than zero"));
        }
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(RagError::InvalidConfiguration(format!(
                "k1 ({}) must be a non-negative number",
                self.k1
            )));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(RagError::InvalidConfiguration(format!(
                "b ({}) must be within [0, 1]",
                self.b
            )));
        }
        if !self.lexical_weight.is_finite() || !self.vector_weight.is_finite() {
            return Err(invalid("combination weights must be finite"));
        }
        if self.max_concurrent_embeddings == 0 {
            return Err(invalid("max_concurrent_embeddings must be greater than zero"));
        }
        if self.embedding_batch_size == 0 {
            return Err(invalid("embedding_batch_size must be greater than zero"));
        }
        if self.scope_field.is_empty() {
            return Err(invalid("scope_field must not be empty"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> RagError {
    RagError::InvalidConfiguration(message.to_string())
}

/// Builder for constructing a validated [`RetrievalConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetrievalConfigBuilder {
    config: RetrievalConfig,
}

impl RetrievalConfigBuilder {
    /// Set the number of words per chunk window.
    pub fn window_size(mut self, size: usize) -> Self {
        self.config.window_size = size;
        self
    }

    /// Set the number of words shared between consecutive windows.
    pub fn overlap(mut self, overlap: usize) -> Self {
        self.config.overlap = overlap;
        self
    }

    /// Set the number of ranked results returned by a query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the BM25 parameters.
    pub fn bm25(mut self, k1: f32, b: f32) -> Self {
        self.config.k1 = k1;
        self.config.b = b;
        self
    }

    /// Set the lexical and vector combination weights.
    pub fn weights(mut self, lexical: f32, vector: f32) -> Self {
        self.config.lexical_weight = lexical;
        self.config.vector_weight = vector;
        self
    }

    /// Set the maximum number of in-flight embedding requests.
    pub fn max_concurrent_embeddings(mut self, max: usize) -> Self {
        self.config.max_concurrent_embeddings = max;
        self
    }

    /// Set the number of texts per embedding request.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Set the metadata key used for scope filtering.
    pub fn scope_field(mut self, field: impl Into<String>) -> Self {
        self.config.scope_field = field.into();
        self
    }

    /// Rank lexically when the query embedding fails.
    pub fn lexical_fallback(mut self, enabled: bool) -> Self {
        self.config.lexical_fallback = enabled;
        self
    }

    /// Build the [`RetrievalConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RetrievalConfig::validate`].
    pub fn build(self) -> Result<RetrievalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
