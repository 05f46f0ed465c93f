//! Document store trait and an in-memory implementation.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::RetrievalConfig;
use crate::document::Chunk;
use crate::error::{RagError, Result};

/// A persistence backend for chunks and their embeddings.
///
/// The retrieval core only inserts, lists, and deletes; durability and
/// indexing inside the backend are the implementation's concern.
///
/// # Example
///
/// ```rust,ignore
/// use hybrid_rag::{DocumentStore, InMemoryDocumentStore};
///
/// let store = InMemoryDocumentStore::new();
/// let id = store.insert(&chunk).await?;
/// let all = store.list_all(None).await?;
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a chunk and return the identifier it is stored under.
    async fn insert(&self, chunk: &Chunk) -> Result<String>;

    /// Return every stored chunk, optionally restricted to one scope.
    ///
    /// Each returned chunk's `id` must equal the identifier `insert` returned
    /// for it; the lexical index refers to chunks by that identifier.
    async fn list_all(&self, scope: Option<&str>) -> Result<Vec<Chunk>>;

    /// Delete chunks by their IDs. Unknown IDs are ignored.
    async fn delete(&self, ids: &[&str]) -> Result<()>;
}

/// An in-memory [`DocumentStore`] keeping chunks in insertion order.
///
/// Suitable for development, testing, and small corpora. Chunk IDs must be
/// unique; inserting an existing ID fails.
///
/// `list_all(Some(scope))` filters on the store's own scope field. Build the
/// store with [`for_config`](Self::for_config) to filter on the same field
/// the pipeline's queries use.
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    chunks: RwLock<Vec<Chunk>>,
    scope_field: String,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::with_scope_field("scope")
    }
}

impl InMemoryDocumentStore {
    /// Create a new empty store scoping on the `scope` metadata field.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store scoping on the given metadata field.
    pub fn with_scope_field(field: impl Into<String>) -> Self {
        Self { chunks: RwLock::new(Vec::new()), scope_field: field.into() }
    }

    /// Create a new empty store scoping on `config.scope_field`.
    pub fn for_config(config: &RetrievalConfig) -> Self {
        Self::with_scope_field(config.scope_field.clone())
    }

    /// Metadata key used by scoped listings.
    pub fn scope_field(&self) -> &str {
        &self.scope_field
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, chunk: &Chunk) -> Result<String> {
        let mut chunks = self.chunks.write().await;
        if chunks.iter().any(|c| c.id == chunk.id) {
            return Err(RagError::DocumentStore {
                backend: "InMemory".to_string(),
                message: format!("chunk '{}' already exists", chunk.id),
            });
        }
        chunks.push(chunk.clone());
        debug!(chunk.id = %chunk.id, "stored chunk");
        Ok(chunk.id.clone())
    }

    async fn list_all(&self, scope: Option<&str>) -> Result<Vec<Chunk>> {
        let chunks = self.chunks.read().await;
        Ok(match scope {
            Some(scope) => {
                chunks.iter().filter(|c| c.in_scope(&self.scope_field, scope)).cloned().collect()
            }
            None => chunks.clone(),
        })
    }

    async fn delete(&self, ids: &[&str]) -> Result<()> {
        let mut chunks = self.chunks.write().await;
        chunks.retain(|c| !ids.contains(&c.id.as_str()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;

    fn chunk(id: &str, scope: &str) -> Chunk {
        let mut metadata = Metadata::new();
        metadata.insert("scope".into(), scope.into());
        Chunk {
            id: id.into(),
            document_id: "doc".into(),
            text: format!("text of {id}"),
            sequence_index: 0,
            embedding: Some(vec![1.0, 0.0]),
            metadata,
        }
    }

    #[tokio::test]
    async fn insert_then_list_in_order() {
        let store = InMemoryDocumentStore::new();
        assert_eq!(store.insert(&chunk("b", "s1")).await.unwrap(), "b");
        assert_eq!(store.insert(&chunk("a", "s2")).await.unwrap(), "a");

        let ids: Vec<_> = store.list_all(None).await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn list_filters_by_scope() {
        let store = InMemoryDocumentStore::new();
        store.insert(&chunk("a", "s1")).await.unwrap();
        store.insert(&chunk("b", "s2")).await.unwrap();

        let scoped = store.list_all(Some("s2")).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, "b");
    }

    #[tokio::test]
    async fn scope_field_follows_config() {
        let config = RetrievalConfig::builder().scope_field("session").build().unwrap();
        let store = InMemoryDocumentStore::for_config(&config);
        assert_eq!(store.scope_field(), "session");

        let mut tagged = chunk("a", "other");
        tagged.metadata.insert("session".into(), "s1".into());
        store.insert(&tagged).await.unwrap();
        store.insert(&chunk("b", "s1")).await.unwrap();

        let scoped = store.list_all(Some("s1")).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, "a");
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = InMemoryDocumentStore::new();
        store.insert(&chunk("a", "s1")).await.unwrap();
        let err = store.insert(&chunk("a", "s1")).await.unwrap_err();
        assert!(matches!(err, RagError::DocumentStore { .. }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn delete_removes_listed_ids() {
        let store = InMemoryDocumentStore::new();
        store.insert(&chunk("a", "s1")).await.unwrap();
        store.insert(&chunk("b", "s1")).await.unwrap();
        store.delete(&["a", "missing"]).await.unwrap();

        let remaining = store.list_all(None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "b");
    }
}
