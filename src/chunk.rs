//! Overlapping character-window chunker
//!
//! Text is split into windows of at most `chunk_size` characters (Unicode
//! scalar values, not bytes). A window that stops short of the end of the
//! text is pulled back to the last whitespace in its back half, but never
//! below `max(chunk_size / 2, overlap + 1)` characters. The next window
//! starts `overlap` characters before the previous window's end, skipping
//! leading whitespace. Output depends only on the text and the two sizes.
//!
//! Each chunk is keyed by a SHA-256 hash of its whitespace-collapsed text,
//! which makes identical content on a re-crawl map to the same stored entry.

use crate::config::ChunkingConfig;
use sha2::{Digest, Sha256};

/// A bounded segment of page text, the unit of embedding and storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// SHA-256 hex of the whitespace-collapsed text
    pub hash: String,
    /// Page the text came from
    pub source_url: String,
    /// Position within the page, starting at 0
    pub index: usize,
    pub text: String,
    /// Character offset of the first character in the page text
    pub start: usize,
    /// Character offset one past the last character
    pub end: usize,
}

/// Computes the idempotency key for a piece of text
pub fn content_hash(text: &str) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Creates a chunker
    ///
    /// A zero size is raised to 1 and the overlap is clamped below the size,
    /// so every chunker makes forward progress.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits page text into ordered, overlapping chunks
    ///
    /// Empty or whitespace-only text yields no chunks.
    pub fn chunk(&self, source_url: &str, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let min_window = (self.chunk_size / 2).max(self.overlap + 1);

        let mut chunks = Vec::new();
        let mut start = skip_whitespace(&chars, 0);

        while start < len {
            let mut end = (start + self.chunk_size).min(len);

            if end < len {
                let floor = start + min_window;
                if let Some(pos) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                    end = pos;
                }
            }

            let mut text_end = end;
            while text_end > start && chars[text_end - 1].is_whitespace() {
                text_end -= 1;
            }

            let piece: String = chars[start..text_end].iter().collect();
            chunks.push(Chunk {
                hash: content_hash(&piece),
                source_url: source_url.to_string(),
                index: chunks.len(),
                text: piece,
                start,
                end: text_end,
            });

            if end >= len {
                break;
            }
            start = skip_whitespace(&chars, end - self.overlap);
        }

        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

fn skip_whitespace(chars: &[char], mut pos: usize) -> usize {
    while pos < chars.len() && chars[pos].is_whitespace() {
        pos += 1;
    }
    pos
}
