//! Keyword-match scoring used when the full-text index is not available.
//!
//! Tokens are lowercase alphanumeric runs with the same stop words removed as
//! the Tantivy analyzer. A document scores the number of query-term
//! occurrences across its title, body and tags; zero-score documents are
//! dropped.

use std::collections::BTreeSet;

use docsearch_core::types::{Document, ScoredDocument};

use crate::tantivy_utils::STOP_WORDS;

pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
}

pub fn query_terms(query: &str) -> BTreeSet<String> {
    tokenize(query).collect()
}

pub fn keyword_score(terms: &BTreeSet<String>, doc: &Document) -> f32 {
    let fields = std::iter::once(doc.title.as_str())
        .chain(std::iter::once(doc.body.as_str()))
        .chain(doc.tags.iter().map(String::as_str));
    let hits = fields.flat_map(tokenize).filter(|t| terms.contains(t)).count();
    #[allow(clippy::cast_precision_loss)]
    let score = hits as f32;
    score
}

/// Scores `documents` (in store order) and keeps the best `limit`, ties in store order.
pub fn rank_by_keywords(query: &str, documents: Vec<Document>, limit: usize) -> Vec<ScoredDocument> {
    let terms = query_terms(query);
    if terms.is_empty() || limit == 0 {
        return Vec::new();
    }
    let mut scored: Vec<ScoredDocument> = documents
        .into_iter()
        .filter_map(|doc| {
            let score = keyword_score(&terms, &doc);
            (score > 0.0).then(|| ScoredDocument::new(doc, score))
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);
    scored
}
