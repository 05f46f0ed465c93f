//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`WordWindowChunker`] – overlapping windows of a fixed word count (the default)
//! - [`CharBudgetChunker`] – greedy fill of whole words up to a character budget
//!
//! The two policies produce different chunk boundaries for the same text and
//! are not interchangeable; a pipeline uses exactly one of them.

use crate::document::{Chunk, Document, MetadataValue};
use crate::error::{RagError, Result};

/// A strategy for splitting extracted text into chunks.
///
/// Implementations only decide boundaries; [`chunk`](Chunker::chunk) turns
/// the pieces into [`Chunk`]s without embeddings.
pub trait Chunker: Send + Sync {
    /// Split text into ordered pieces. Empty or whitespace-only text yields no pieces.
    fn split(&self, text: &str) -> Vec<String>;

    /// Split a document into chunks.
    ///
    /// Chunk IDs are generated as `{document_id}_{sequence_index}`. Each chunk
    /// inherits the parent document's metadata plus a `chunk_index` field.
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.split(&document.text)
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let mut metadata = document.metadata.clone();
                metadata.insert("chunk_index".to_string(), MetadataValue::Integer(i as i64));
                Chunk {
                    id: format!("{}_{i}", document.id),
                    document_id: document.id.clone(),
                    text,
                    sequence_index: i,
                    embedding: None,
                    metadata,
                }
            })
            .collect()
    }
}

/// Split `text` on whitespace into windows of `window_size` words, advancing
/// by `window_size - overlap` words per window.
///
/// The final window may be shorter than `window_size`. Words inside a window
/// are joined by a single space.
///
/// # Errors
///
/// Returns [`RagError::InvalidConfiguration`] unless `0 <= overlap < window_size`.
pub fn chunk_words(text: &str, window_size: usize, overlap: usize) -> Result<Vec<String>> {
    validate_window(window_size, overlap)?;
    Ok(windows(text, window_size, overlap))
}

fn validate_window(window_size: usize, overlap: usize) -> Result<()> {
    if overlap >= window_size {
        return Err(RagError::InvalidConfiguration(format!(
            "overlap ({overlap}) must be less than window_size ({window_size})"
        )));
    }
    Ok(())
}

fn windows(text: &str, window_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let step = window_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + window_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Splits text into overlapping windows of a fixed number of words.
///
/// # Example
///
/// ```rust,ignore
/// use hybrid_rag::WordWindowChunker;
///
/// let chunker = WordWindowChunker::new(200, 40)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct WordWindowChunker {
    window_size: usize,
    overlap: usize,
}

impl WordWindowChunker {
    /// Create a new `WordWindowChunker`.
    ///
    /// # Arguments
    ///
    /// * `window_size` – number of words per chunk
    /// * `overlap` – number of words shared by consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] unless `overlap < window_size`.
    pub fn new(window_size: usize, overlap: usize) -> Result<Self> {
        validate_window(window_size, overlap)?;
        Ok(Self { window_size, overlap })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Chunker for WordWindowChunker {
    fn split(&self, text: &str) -> Vec<String> {
        windows(text, self.window_size, self.overlap)
    }
}

/// Packs whole words into chunks of at most `max_chars` characters.
///
/// A word joins the current chunk while
/// `current_len + word_len + 1 <= max_chars`; otherwise the chunk is flushed
/// and the word starts the next one. A word longer than the budget becomes a
/// chunk of its own. There is no overlap between chunks.
#[derive(Debug, Clone)]
pub struct CharBudgetChunker {
    max_chars: usize,
}

impl CharBudgetChunker {
    /// Create a new `CharBudgetChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if `max_chars` is zero.
    pub fn new(max_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(RagError::InvalidConfiguration(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        Ok(Self { max_chars })
    }
}

impl Chunker for CharBudgetChunker {
    fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for word in text.split_whitespace() {
            let word_len = word.chars().count();
            if current.is_empty() {
                current.push_str(word);
                current_len = word_len;
            } else if current_len + word_len + 1 <= self.max_chars {
                current.push(' ');
                current.push_str(word);
                current_len += word_len + 1;
            } else {
                chunks.push(std::mem::take(&mut current));
                current.push_str(word);
                current_len = word_len;
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}
