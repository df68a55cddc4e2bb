//! Sentence-bounded chunking with word overlap.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Trailing words of a closed chunk carried into the next one.
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 500, overlap_words: 50 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.config.chunk_size, self.config.overlap_words)
    }
}

/// Collapse whitespace runs to one space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split whitespace-normalized text after `.`, `!` or `?` followed by a space.
/// The terminating punctuation stays with its sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev_terminal = false;
    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() && prev_terminal {
            if start < i {
                sentences.push(&text[start..i]);
            }
            start = i + ch.len_utf8();
        }
        prev_terminal = matches!(ch, '.' | '!' | '?');
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Chunk `text` into sentence-bounded segments of roughly `target_size`
/// characters. A sentence is never split, so a single sentence longer than
/// `target_size` becomes its own oversized chunk.
pub fn chunk_text(text: &str, target_size: usize, overlap: usize) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(&normalized) {
        let sentence_len = sentence.chars().count();
        if current_len + sentence_len > target_size && !current.is_empty() {
            let closed = current.trim().to_string();
            let seed = trailing_words(&closed, overlap);
            chunks.push(closed);
            current = if seed.is_empty() { sentence.to_string() } else { format!("{seed} {sentence}") };
        } else if current.is_empty() {
            current.push_str(sentence);
        } else {
            current.push(' ');
            current.push_str(sentence);
        }
        current_len = current.chars().count();
    }

    let last = current.trim();
    if !last.is_empty() {
        chunks.push(last.to_string());
    }
    chunks
}

fn trailing_words(chunk: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    let words: Vec<&str> = chunk.split_whitespace().collect();
    let from = words.len().saturating_sub(overlap);
    words[from..].join(" ")
}
