//! Cosine similarity and the brute-force ranking used when no vector index is queryable.

use crate::types::{Document, ScoredDocument};

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}

fn norm(v: &[f32]) -> f64 {
    dot(v, v).sqrt()
}

/// `(a·b) / (‖a‖·‖b‖)`, clamped to `[-1, 1]`.
///
/// Returns `None` when either vector has zero norm or the lengths differ:
/// such pairs carry no directional information and are not scored.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let denom = norm(a) * norm(b);
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let sim = (dot(a, b) / denom).clamp(-1.0, 1.0) as f32;
    Some(sim)
}

/// Scores every document carrying an embedding against `query` and returns the best `k`.
///
/// `documents` must be in store insertion order: the sort is stable, so
/// equal similarities keep that order.
pub fn rank_by_similarity(query: &[f32], documents: Vec<Document>, k: usize) -> Vec<ScoredDocument> {
    if k == 0 {
        return Vec::new();
    }
    let mut scored: Vec<ScoredDocument> = documents
        .into_iter()
        .filter_map(|doc| {
            let sim = cosine_similarity(query, doc.embedding.as_deref()?)?;
            Some(ScoredDocument::new(doc, sim))
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    scored
}
