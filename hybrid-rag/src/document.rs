//! Data types for documents, chunks, and ranked results.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar metadata value attached to a document or chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    /// A boolean flag.
    Bool(bool),
    /// A signed integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    String(String),
}

impl MetadataValue {
    /// Return the string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Return the integer payload, if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Metadata mapping shared by documents and chunks.
pub type Metadata = HashMap<String, MetadataValue>;

/// A source document: already-extracted plain text plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The extracted text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document with empty metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: Metadata::new() }
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A window of a [`Document`], the unit of indexing and retrieval.
///
/// Chunks are created once during ingest and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Position of this chunk within its document.
    pub sequence_index: usize,
    /// The embedding vector, absent until the pipeline attaches it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Metadata inherited from the parent document plus chunk-specific fields.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    /// Whether the metadata entry `field` renders as `scope`.
    pub fn in_scope(&self, field: &str, scope: &str) -> bool {
        self.metadata.get(field).is_some_and(|value| value.to_string() == scope)
    }
}

/// A chunk ranked for one query. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    /// The ranked chunk's identifier.
    pub chunk_id: String,
    /// The ranked chunk's text.
    pub text: String,
    /// BM25 score against the query.
    pub lexical_score: f32,
    /// Cosine similarity to the query embedding, when both vectors exist.
    pub vector_score: Option<f32>,
    /// Weighted sum of the lexical and vector scores.
    pub combined_score: f32,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    /// The ingested document.
    pub document_id: String,
    /// Store identifiers of the committed chunks, in document order.
    pub chunk_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_deserializes_scalars() {
        let metadata: Metadata =
            serde_json::from_str(r#"{"scope":"s1","page":3,"score":0.5,"draft":true}"#).unwrap();
        assert_eq!(metadata["scope"], MetadataValue::String("s1".into()));
        assert_eq!(metadata["page"], MetadataValue::Integer(3));
        assert_eq!(metadata["score"], MetadataValue::Float(0.5));
        assert_eq!(metadata["draft"], MetadataValue::Bool(true));
    }

    #[test]
    fn scope_matches_rendered_value() {
        let mut chunk = Chunk {
            id: "d_0".into(),
            document_id: "d".into(),
            text: "text".into(),
            sequence_index: 0,
            embedding: None,
            metadata: Metadata::new(),
        };
        assert!(!chunk.in_scope("scope", "s1"));
        chunk.metadata.insert("scope".into(), "s1".into());
        assert!(chunk.in_scope("scope", "s1"));
        assert!(!chunk.in_scope("scope", "s2"));
        chunk.metadata.insert("session".into(), 42i64.into());
        assert!(chunk.in_scope("session", "42"));
    }
}
