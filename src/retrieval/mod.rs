
use tracing::debug;

use crate::embeddings::cache::EmbeddingRecord;

/// A transient ranking result, discarded after prompt assembly
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSegment {
    pub text: String,
    pub similarity: f32,
}

/// Score every cached record against the query vector and return the text
/// of the top `k` matches, best first. Ties keep corpus order. An empty
/// record set yields an empty result; the caller treats that as "no
/// relevant context", not an error.
#[inline]
pub fn rank(query: &[f32], records: &[EmbeddingRecord], k: usize) -> Vec<String> {
    let mut scored: Vec<ScoredSegment> = records
        .iter()
        .map(|record| ScoredSegment {
            text: record.text.clone(),
            similarity: cosine_similarity(query, &record.vector),
        })
        .collect();

    // Stable sort so equal similarities keep corpus order.
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let top: Vec<String> = scored.into_iter().take(k).map(|s| s.text).collect();
    debug!("Ranked {} records, keeping top {}", records.len(), top.len());
    top
}

/// Cosine similarity in [-1, 1]. Exactly 0 when either vector has zero
/// magnitude, so a degenerate record can never divide by zero.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b = b.iter().map(|y| y * y).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot / (magnitude_a * magnitude_b)
}
