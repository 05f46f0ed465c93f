//! # Hybrid Retrieval Basic Example
//!
//! Ingests a few documents under two scopes, then runs scoped and unscoped
//! queries that combine BM25 with cosine similarity.
//!
//! Uses `InMemoryDocumentStore` and a deterministic `MockEmbeddingProvider`
//! so it runs with **zero API keys**.
//!
//! Run: `cargo run --example hybrid_basic [-- path/to/config.json]`
//! Set `RUST_LOG=hybrid_rag=debug` to watch the pipeline's structured logs.

use std::sync::Arc;

use anyhow::Context;
use hybrid_rag::{
    Document, EmbeddingProvider, InMemoryDocumentStore, RagError, RetrievalConfig,
    RetrievalPipeline,
};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// MockEmbeddingProvider: deterministic hash-based embeddings for demos
// ---------------------------------------------------------------------------

struct MockEmbeddingProvider {
    dimensions: usize,
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> hybrid_rag::Result<Vec<f32>> {
        // Bag of hashed words, so texts sharing vocabulary point the same way.
        let mut emb = vec![0.0f32; self.dimensions];
        for word in text.split_whitespace() {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            emb[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn load_config() -> anyhow::Result<RetrievalConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(RetrievalConfig::builder().window_size(40).overlap(10).top_k(3).build()?);
    };
    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let config: RetrievalConfig =
        serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // -- 1. Configure and build the pipeline ------------------------------
    let config = load_config()?;
    tracing::info!(?config, "loaded configuration");

    let store = Arc::new(InMemoryDocumentStore::for_config(&config));
    let pipeline = RetrievalPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(MockEmbeddingProvider { dimensions: 64 }))
        .document_store(store)
        .build()?;

    // -- 2. Ingest documents under two scopes -----------------------------
    let documents = vec![
        Document::new(
            "rust",
            "Rust is a systems programming language focused on safety, speed, and \
             concurrency. It achieves memory safety without a garbage collector \
             through its ownership system.",
        )
        .with_metadata("scope", "languages"),
        Document::new(
            "python",
            "Python is a high-level, interpreted programming language known for its \
             readability. It manages memory with reference counting and a cycle \
             detecting garbage collector.",
        )
        .with_metadata("scope", "languages"),
        Document::new(
            "rag",
            "Hybrid retrieval combines lexical BM25 scoring with embedding similarity. \
             Documents are chunked, embedded, and stored; at query time both signals \
             are merged into a single ranking.",
        )
        .with_metadata("scope", "retrieval"),
    ];

    let reports = pipeline.ingest_batch(&documents).await?;
    for report in &reports {
        println!("{} → {} chunk(s)", report.document_id, report.chunk_ids.len());
    }

    // -- 3. Query with and without a scope --------------------------------
    let queries: [(&str, Option<&str>); 3] = [
        ("memory safety garbage collector", None),
        ("embedding similarity ranking", None),
        ("programming language readability", Some("languages")),
    ];

    for (query, scope) in queries {
        println!("\nQuery: \"{query}\" (scope: {})", scope.unwrap_or("all"));
        match pipeline.query(query, scope).await {
            Ok(results) if results.is_empty() => println!("  (no results)"),
            Ok(results) => {
                for (i, r) in results.iter().enumerate() {
                    println!(
                        "  {}. [combined={:.4} lexical={:.4} vector={:.4}] {} | {}",
                        i + 1,
                        r.combined_score,
                        r.lexical_score,
                        r.vector_score.unwrap_or(0.0),
                        r.chunk_id,
                        r.text.chars().take(60).collect::<String>(),
                    );
                }
            }
            Err(RagError::QueryFailed(reason)) => println!("  query failed: {reason}"),
            Err(e) => return Err(e.into()),
        }
    }

    // -- 4. Remove a document and query again -----------------------------
    let removed = pipeline.remove_document("python").await?;
    println!("\nRemoved {removed} chunk(s) of 'python'");
    let results = pipeline.query("garbage collector", None).await?;
    for r in &results {
        println!("  [combined={:.4}] {}", r.combined_score, r.chunk_id);
    }

    println!("\nDone.");
    Ok(())
}
