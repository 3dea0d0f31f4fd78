
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A bounded excerpt of the reference corpus, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// The segment text
    pub text: String,
    /// Insertion order within one chunking pass
    pub ordinal: usize,
}

/// Configuration for corpus chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target segment size in characters
    pub target_size: usize,
    /// Characters carried over from the end of one segment into the next
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            target_size: 500,
            overlap: 50,
        }
    }
}

/// Split the corpus into overlapping segments along paragraph boundaries.
///
/// Paragraphs are line-delimited; blank lines are discarded. Paragraphs are
/// never split, so a single paragraph longer than `target_size` becomes one
/// oversized segment on its own.
#[inline]
pub fn chunk_corpus(corpus: &str, config: &ChunkingConfig) -> Vec<Segment> {
    let paragraphs = corpus
        .split(['\n', '\r'])
        .filter(|p| !p.trim().is_empty());

    let mut segments: Vec<Segment> = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0usize;

    for paragraph in paragraphs {
        let paragraph_chars = paragraph.chars().count();

        // Close the buffer before it would grow past the target; the
        // separator counts toward the bound.
        if !buffer.is_empty() && buffer_chars + 1 + paragraph_chars > config.target_size {
            let carried = char_suffix(&buffer, config.overlap);
            segments.push(Segment {
                text: buffer,
                ordinal: segments.len(),
            });
            buffer_chars = carried.chars().count();
            buffer = carried;
        }

        if !buffer.is_empty() {
            buffer.push('\n');
            buffer_chars += 1;
        }
        buffer.push_str(paragraph);
        buffer_chars += paragraph_chars;
    }

    if !buffer.is_empty() {
        segments.push(Segment {
            text: buffer,
            ordinal: segments.len(),
        });
    }

    debug!(
        "Chunked corpus into {} segments (target {} chars, overlap {})",
        segments.len(),
        config.target_size,
        config.overlap
    );

    segments
}

/// Last `n` characters of `s`, the whole string if it is shorter.
fn char_suffix(s: &str, n: usize) -> String {
    let total = s.chars().count();
    s.chars().skip(total.saturating_sub(n)).collect()
}
