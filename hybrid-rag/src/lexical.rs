//! In-memory Okapi BM25 index over chunk text.
//!
//! [`LexicalIndex`] keeps per-chunk term counts and corpus-wide statistics
//! (document frequency, chunk count, total length) and scores a free-text
//! query against every indexed chunk.
//!
//! Scoring uses a length-normalized term frequency,
//! `tf = count(term, chunk) / word_count(chunk)`, rather than the raw count of
//! canonical BM25. Expected scores depend on this normalization.
//!
//! Terms are whitespace-separated words, lowercased: `The` and `the` count
//! as the same term in frequencies and document frequencies.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f32,
    /// Length normalization.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// One lexical match: a chunk and its BM25 score.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    /// The scored chunk's identifier.
    pub chunk_id: String,
    /// Insertion ordinal; earlier chunks have smaller ordinals.
    pub ordinal: u64,
    /// BM25 score against the query.
    pub score: f32,
}

#[derive(Debug)]
struct IndexedChunk {
    id: String,
    ordinal: u64,
    length: usize,
    term_counts: HashMap<String, usize>,
}

#[derive(Debug, Clone, Copy)]
struct CachedIdf {
    value: f32,
    chunk_count: usize,
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().map(str::to_lowercase)
}

fn count_terms(text: &str) -> (HashMap<String, usize>, usize) {
    let mut counts = HashMap::new();
    let mut length = 0;
    for term in tokenize(text) {
        *counts.entry(term).or_insert(0) += 1;
        length += 1;
    }
    (counts, length)
}

/// A BM25 index over the chunks added to it.
///
/// Mutations take `&mut self`; share an index between tasks behind a
/// reader-writer lock so writers are exclusive. Cached IDF values are
/// recomputed lazily and are never served for a chunk count or document
/// frequency other than the one they were computed under.
#[derive(Debug, Default)]
pub struct LexicalIndex {
    params: Bm25Params,
    chunks: Vec<IndexedChunk>,
    document_frequency: HashMap<String, usize>,
    total_length: usize,
    next_ordinal: u64,
    idf_cache: Mutex<HashMap<String, CachedIdf>>,
}

impl LexicalIndex {
    /// Create an empty index with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty index with the given parameters.
    pub fn with_params(params: Bm25Params) -> Self {
        Self { params, ..Self::default() }
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether a chunk with this id is indexed.
    pub fn contains(&self, chunk_id: &str) -> bool {
        self.chunks.iter().any(|c| c.id == chunk_id)
    }

    /// Average chunk length in words, or `0.0` for an empty index.
    pub fn average_chunk_length(&self) -> f32 {
        if self.chunks.is_empty() {
            return 0.0;
        }
        self.total_length as f32 / self.chunks.len() as f32
    }

    /// Number of indexed chunks containing `term` at least once.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.document_frequency.get(&term.to_lowercase()).copied().unwrap_or(0)
    }

    /// Append a chunk to the indexed corpus and return its insertion ordinal.
    ///
    /// Updates document frequencies, the chunk count, and the running length
    /// total, and drops cached IDF values for every term in `text`.
    pub fn add_chunk(&mut self, chunk_id: impl Into<String>, text: &str) -> u64 {
        let (term_counts, length) = count_terms(text);
        for term in term_counts.keys() {
            *self.document_frequency.entry(term.clone()).or_insert(0) += 1;
        }
        self.invalidate(term_counts.keys());

        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        self.total_length += length;
        let id = chunk_id.into();
        debug!(chunk.id = %id, ordinal, length, "indexed chunk");
        self.chunks.push(IndexedChunk { id, ordinal, length, term_counts });
        ordinal
    }

    /// Remove the earliest chunk indexed under `chunk_id`.
    ///
    /// Returns `false` if no such chunk exists. Document frequencies that drop
    /// to zero are removed so no orphaned term counts remain.
    pub fn remove_chunk(&mut self, chunk_id: &str) -> bool {
        let Some(position) = self.chunks.iter().position(|c| c.id == chunk_id) else {
            return false;
        };
        let removed = self.chunks.remove(position);
        for term in removed.term_counts.keys() {
            if let Some(count) = self.document_frequency.get_mut(term) {
                *count -= 1;
                if *count == 0 {
                    self.document_frequency.remove(term);
                }
            }
        }
        self.invalidate(removed.term_counts.keys());
        self.total_length -= removed.length;
        debug!(chunk.id = chunk_id, "removed chunk from index");
        true
    }

    /// Drop every chunk and statistic.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.document_frequency.clear();
        self.total_length = 0;
        self.idf_cache.get_mut().clear();
    }

    fn invalidate<'a>(&self, terms: impl Iterator<Item = &'a String>) {
        let mut cache = self.idf_cache.lock();
        for term in terms {
            cache.remove(term);
        }
    }

    /// Inverse document frequency of `term` under the current corpus:
    /// `ln((N - n + 0.5) / (n + 0.5) + 1)`.
    pub fn idf(&self, term: &str) -> f32 {
        let term = term.to_lowercase();
        let chunk_count = self.chunks.len();
        let mut cache = self.idf_cache.lock();
        if let Some(cached) = cache.get(&term).filter(|c| c.chunk_count == chunk_count) {
            return cached.value;
        }

        let n = self.document_frequency.get(&term).copied().unwrap_or(0) as f32;
        let total = chunk_count as f32;
        let value = ((total - n + 0.5) / (n + 0.5) + 1.0).ln();
        cache.insert(term, CachedIdf { value, chunk_count });
        value
    }

    /// BM25 score of `query` against `chunk_text` using the current corpus
    /// statistics. `chunk_text` does not need to be indexed.
    ///
    /// Returns `0.0` when the index is empty.
    pub fn score(&self, query: &str, chunk_text: &str) -> f32 {
        if self.chunks.is_empty() {
            return 0.0;
        }
        let idfs = self.query_idfs(query);
        let (counts, length) = count_terms(chunk_text);
        self.score_counts(&idfs, &counts, length)
    }

    /// Score `query` against every indexed chunk.
    ///
    /// Results are ordered by descending score; equal scores keep insertion
    /// order. Every indexed chunk appears, including those scoring zero.
    pub fn search_all(&self, query: &str) -> Vec<LexicalHit> {
        if self.chunks.is_empty() {
            return Vec::new();
        }
        let idfs = self.query_idfs(query);
        let mut hits: Vec<LexicalHit> = self
            .chunks
            .iter()
            .map(|chunk| LexicalHit {
                chunk_id: chunk.id.clone(),
                ordinal: chunk.ordinal,
                score: self.score_counts(&idfs, &chunk.term_counts, chunk.length),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.ordinal.cmp(&b.ordinal))
        });
        hits
    }

    // One entry per query term occurrence; repeated terms count repeatedly.
    fn query_idfs(&self, query: &str) -> Vec<(String, f32)> {
        tokenize(query)
            .map(|term| {
                let idf = self.idf(&term);
                (term, idf)
            })
            .collect()
    }

    fn score_counts(
        &self,
        idfs: &[(String, f32)],
        counts: &HashMap<String, usize>,
        length: usize,
    ) -> f32 {
        if length == 0 {
            return 0.0;
        }
        let Bm25Params { k1, b } = self.params;
        let average = self.average_chunk_length();
        let relative_length = if average > 0.0 { length as f32 / average } else { 1.0 };
        let norm = k1 * (1.0 - b + b * relative_length);

        idfs.iter()
            .filter_map(|(term, idf)| {
                let count = *counts.get(term)?;
                let tf = count as f32 / length as f32;
                Some(idf * (tf * (k1 + 1.0)) / (tf + norm))
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn cat_and_dog() -> LexicalIndex {
        let mut index = LexicalIndex::new();
        index.add_chunk("a", "The cat sat on the mat");
        index.add_chunk("b", "Dogs are loyal companions");
        index
    }

    #[test]
    fn empty_index_scores_zero() {
        let index = LexicalIndex::new();
        assert_eq!(index.score("cat", "the cat"), 0.0);
        assert!(index.search_all("cat").is_empty());
        assert_eq!(index.average_chunk_length(), 0.0);
    }

    #[test]
    fn single_chunk_without_query_terms_scores_zero() {
        let mut index = LexicalIndex::new();
        index.add_chunk("a", "completely unrelated words");
        assert_eq!(index.score("cat", "completely unrelated words"), 0.0);
        assert_eq!(index.search_all("cat")[0].score, 0.0);
    }

    #[test]
    fn matches_normalized_tf_formula() {
        let index = cat_and_dog();
        // N = 2, n = 1, avg = 5, |a| = 6, tf = 1/6
        let idf = (1.5f32 / 1.5 + 1.0).ln();
        let tf = 1.0f32 / 6.0;
        let expected = idf * (tf * 2.5) / (tf + 1.5 * (0.25 + 0.75 * 6.0 / 5.0));

        let hits = index.search_all("cat");
        assert_eq!(hits[0].chunk_id, "a");
        assert!((hits[0].score - expected).abs() < EPSILON);
        assert!((index.score("cat", "The cat sat on the mat") - expected).abs() < EPSILON);
        assert_eq!(hits[1].chunk_id, "b");
        assert_eq!(hits[1].score, 0.0);
    }

    #[test]
    fn repeated_query_terms_count_per_occurrence() {
        let index = cat_and_dog();
        let once = index.score("cat", "The cat sat on the mat");
        let twice = index.score("cat cat", "The cat sat on the mat");
        assert!((twice - 2.0 * once).abs() < EPSILON);
    }

    #[test]
    fn terms_are_case_insensitive() {
        let index = cat_and_dog();
        assert_eq!(index.document_frequency("THE"), 1);
        assert!(index.search_all("DOGS")[0].score > 0.0);
    }

    #[test]
    fn mixed_case_occurrences_count_as_one_term() {
        let mut index = LexicalIndex::new();
        index.add_chunk("a", "The the cat");
        index.add_chunk("b", "the dog");
        assert_eq!(index.document_frequency("the"), 2);

        // N = 2, n = 2, avg = 2.5, |a| = 3, count("the", a) = 2
        let idf = (0.5f32 / 2.5 + 1.0).ln();
        let tf = 2.0f32 / 3.0;
        let expected = idf * (tf * 2.5) / (tf + 1.5 * (0.25 + 0.75 * 3.0 / 2.5));

        assert!((index.idf("The") - idf).abs() < EPSILON);
        assert!((index.score("THE", "The the cat") - expected).abs() < EPSILON);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut index = LexicalIndex::new();
        index.add_chunk("first", "alpha beta");
        index.add_chunk("second", "alpha beta");
        index.add_chunk("third", "gamma delta");
        let ids: Vec<_> = index.search_all("zeta").into_iter().map(|h| h.chunk_id).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
        let ids: Vec<_> = index.search_all("alpha").into_iter().map(|h| h.chunk_id).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn adding_duplicate_chunk_updates_statistics() {
        let mut index = cat_and_dog();
        index.add_chunk("c", "birds sing at dawn");
        index.add_chunk("d", "birds fly south");
        let before_idf = index.idf("cat");
        let before: Vec<_> =
            index.search_all("birds").into_iter().map(|h| h.chunk_id).collect();

        index.add_chunk("a2", "The cat sat on the mat");
        assert_eq!(index.len(), 5);
        assert_eq!(index.document_frequency("cat"), 2);
        assert!((index.idf("cat") - before_idf).abs() > EPSILON);

        let after: Vec<_> = index
            .search_all("birds")
            .into_iter()
            .map(|h| h.chunk_id)
            .filter(|id| id == "c" || id == "d")
            .collect();
        let before: Vec<_> = before.into_iter().filter(|id| id == "c" || id == "d").collect();
        assert_eq!(before, after);
    }

    #[test]
    fn cached_idf_tracks_chunk_count() {
        let mut index = LexicalIndex::new();
        index.add_chunk("a", "apple");
        let first = index.idf("apple");
        // "pear" does not contain "apple", yet N changed.
        index.add_chunk("b", "pear");
        let second = index.idf("apple");
        let expected = ((2.0f32 - 1.0 + 0.5) / 1.5 + 1.0).ln();
        assert!((second - expected).abs() < EPSILON);
        assert!((first - second).abs() > EPSILON);
    }

    #[test]
    fn remove_chunk_leaves_no_orphaned_counts() {
        let mut index = cat_and_dog();
        assert!(index.remove_chunk("a"));
        assert!(!index.remove_chunk("a"));
        assert_eq!(index.len(), 1);
        assert_eq!(index.document_frequency("cat"), 0);
        assert_eq!(index.average_chunk_length(), 4.0);
        assert_eq!(index.search_all("cat").len(), 1);
        assert_eq!(index.search_all("cat")[0].score, 0.0);
    }

    #[test]
    fn clear_resets_statistics() {
        let mut index = cat_and_dog();
        let _ = index.idf("cat");
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.document_frequency("cat"), 0);
        assert_eq!(index.score("cat", "cat"), 0.0);
    }

    #[test]
    fn custom_parameters_change_scores() {
        let mut flat = LexicalIndex::with_params(Bm25Params { k1: 1.5, b: 0.0 });
        flat.add_chunk("short", "cat");
        flat.add_chunk("long", "cat and many other words here");
        let hits = flat.search_all("cat");
        assert_eq!(flat.params().b, 0.0);
        assert_eq!(hits[0].chunk_id, "short");
    }
}
