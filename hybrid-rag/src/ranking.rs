//! Hybrid ranking: merges lexical and vector-similarity scores.
//!
//! The combined score is a weighted sum,
//! `lexical_weight * lexical + vector_weight * vector`, with both weights
//! defaulting to `1.0`. The two signals live on different scales and are not
//! normalized before combining.

use std::collections::HashMap;

use crate::document::{Chunk, ScoredChunk};
use crate::lexical::LexicalHit;

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Merges a lexical ranking with vector similarities into one ordered list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridRanker {
    lexical_weight: f32,
    vector_weight: f32,
}

impl Default for HybridRanker {
    fn default() -> Self {
        Self { lexical_weight: 1.0, vector_weight: 1.0 }
    }
}

/// Restricts ranked output to chunks whose metadata field matches a value.
#[derive(Debug, Clone, Copy)]
pub struct ScopeFilter<'a> {
    /// Metadata key to compare.
    pub field: &'a str,
    /// Required value.
    pub scope: &'a str,
}

impl HybridRanker {
    pub fn new(lexical_weight: f32, vector_weight: f32) -> Self {
        Self { lexical_weight, vector_weight }
    }

    /// Merge `lexical` hits with cosine similarities against `query_vector`.
    ///
    /// `corpus` is the snapshot the hits refer to. Every lexical hit whose
    /// chunk is in the snapshot is kept; it gets a vector score only when both
    /// the chunk embedding and `query_vector` exist, and otherwise combines as
    /// if the vector score were zero. Scope filtering happens after scoring.
    ///
    /// Output is ordered by descending combined score; ties keep the lexical
    /// index's insertion order.
    pub fn rank(
        &self,
        lexical: Vec<LexicalHit>,
        corpus: &[Chunk],
        query_vector: Option<&[f32]>,
        scope: Option<ScopeFilter<'_>>,
    ) -> Vec<ScoredChunk> {
        let by_id: HashMap<&str, &Chunk> = corpus.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut ranked: Vec<(u64, ScoredChunk)> = lexical
            .into_iter()
            .filter_map(|hit| {
                let chunk = by_id.get(hit.chunk_id.as_str())?;
                let vector_score = query_vector
                    .zip(chunk.embedding.as_deref())
                    .map(|(query, embedding)| cosine_similarity(query, embedding));
                let combined_score = self.lexical_weight * hit.score
                    + self.vector_weight * vector_score.unwrap_or(0.0);
                Some((
                    hit.ordinal,
                    ScoredChunk {
                        chunk_id: hit.chunk_id,
                        text: chunk.text.clone(),
                        lexical_score: hit.score,
                        vector_score,
                        combined_score,
                    },
                ))
            })
            .collect();

        if let Some(ScopeFilter { field, scope }) = scope {
            ranked.retain(|(_, scored)| {
                by_id.get(scored.chunk_id.as_str()).is_some_and(|c| c.in_scope(field, scope))
            });
        }

        ranked.sort_by(|(a_ord, a), (b_ord, b)| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a_ord.cmp(b_ord))
        });

        ranked.into_iter().map(|(_, scored)| scored).collect()
    }
}
