//! Recursive character chunking with provenance carry-over
//!
//! Text is split on the coarsest separator present (paragraph, line, word,
//! character), pieces still too large are split again with the next
//! separator, and small pieces are merged back up to `chunk_size` with up to
//! `overlap` characters carried into the next chunk. Lengths are counted in
//! characters, not bytes.

use std::collections::VecDeque;

use crate::config::ChunkingConfig;
use crate::types::Segment;

/// Text chunker with configurable size and overlap
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Overlap between chunks
    overlap: usize,
    /// Separators, coarsest first; "" means split between characters
    separators: Vec<String>,
}

impl TextChunker {
    /// Create a chunker with the default separator ladder
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self::with_separators(chunk_size, overlap, ChunkingConfig::default().separators)
    }

    /// Create a chunker with custom separators
    pub fn with_separators(chunk_size: usize, overlap: usize, separators: Vec<String>) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size.saturating_sub(1)),
            separators,
        }
    }

    /// Create a chunker from configuration
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::with_separators(config.chunk_size, config.chunk_overlap, config.separators.clone())
    }

    /// Split one segment; children inherit its metadata, in order
    pub fn split(&self, segment: &Segment) -> Vec<Segment> {
        self.split_text(segment.text())
            .into_iter()
            .map(|text| segment.derive(text))
            .collect()
    }

    /// Split a sequence of segments, preserving order
    pub fn split_all(&self, segments: &[Segment]) -> Vec<Segment> {
        segments.iter().flat_map(|s| self.split(s)).collect()
    }

    /// Split raw text into chunks
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, finer) = pick_separator(text, separators);

        let splits: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in splits {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge_splits(&fitting, separator));
                fitting.clear();
            }

            if finer.is_empty() {
                // Indivisible: pass through rather than drop
                let piece = piece.trim();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge_splits(&fitting, separator));
        }

        chunks
    }

    /// Greedily pack pieces up to `chunk_size`, carrying at most `overlap` forward
    fn merge_splits(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);
            let joiner = |window: &VecDeque<&str>| if window.is_empty() { 0 } else { separator_len };

            if total + len + joiner(&window) > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join_trimmed(&window, separator) {
                    chunks.push(chunk);
                }

                while total > self.overlap
                    || (total + len + joiner(&window) > self.chunk_size && total > 0)
                {
                    let Some(first) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(first) + joiner(&window);
                }
            }

            window.push_back(piece);
            total += len + if window.len() > 1 { separator_len } else { 0 };
        }

        if let Some(chunk) = join_trimmed(&window, separator) {
            chunks.push(chunk);
        }

        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

/// The coarsest separator present in `text`, and the finer ones after it
fn pick_separator<'a>(text: &str, separators: &'a [String]) -> (&'a str, &'a [String]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if text.contains(separator.as_str()) {
            return (separator.as_str(), &separators[i + 1..]);
        }
    }

    (separators.last().map(String::as_str).unwrap_or(""), &[])
}

fn join_trimmed(window: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
