//! Title similarity scoring for candidate ranking and volume matching.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strsim::{jaro_winkler, normalized_levenshtein};

/// Symmetric title similarity in `[0, 1]`
///
/// Implementations must return the same score for `(a, b)` and `(b, a)`.
pub trait SimilarityScorer: Send + Sync + std::fmt::Debug {
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Normalized Levenshtein distance over normalized titles
#[derive(Debug, Clone, Copy, Default)]
pub struct LevenshteinScorer;

impl SimilarityScorer for LevenshteinScorer {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        normalized_levenshtein(&normalize_title(a), &normalize_title(b))
    }
}

/// Jaro-Winkler similarity over normalized titles
///
/// Jaro-Winkler weights common prefixes, so it is not symmetric for every
/// input; the score is taken as the larger of both orders.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinklerScorer;

impl SimilarityScorer for JaroWinklerScorer {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let a = normalize_title(a);
        let b = normalize_title(b);
        jaro_winkler(&a, &b).max(jaro_winkler(&b, &a))
    }
}

/// Selectable similarity measure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMeasure {
    #[default]
    Levenshtein,
    JaroWinkler,
}

impl SimilarityMeasure {
    /// Build the scorer for this measure
    pub fn scorer(&self) -> Arc<dyn SimilarityScorer> {
        match self {
            SimilarityMeasure::Levenshtein => Arc::new(LevenshteinScorer),
            SimilarityMeasure::JaroWinkler => Arc::new(JaroWinklerScorer),
        }
    }
}

/// Normalize a title for comparison
///
/// Folds full-width ASCII to half-width, lower-cases, and collapses whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .map(fold_full_width)
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Map a full-width ASCII character (or ideographic space) to its half-width form
pub(crate) fn fold_full_width(c: char) -> char {
    match c {
        '\u{3000}' => ' ',
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        _ => c,
    }
}

/// Best similarity between any query title and any subject title
pub fn best_similarity(scorer: &dyn SimilarityScorer, queries: &[&str], titles: &[&str]) -> f64 {
    queries
        .iter()
        .flat_map(|q| titles.iter().map(move |t| scorer.similarity(q, t)))
        .fold(0.0, f64::max)
}
