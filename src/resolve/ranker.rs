//! Candidate scoring and selection.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::CatalogError;
use crate::config::RankingConfig;
use crate::models::{BookFormat, CandidateSubject, MatchConfidence, SearchQuery, SubjectType};
use crate::utils::{best_similarity, SimilarityScorer};

/// A candidate together with its similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub candidate: CandidateSubject,
    pub score: f64,
}

/// Outcome of ranking one search response
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// The selected match
    pub best: RankedCandidate,
    pub confidence: MatchConfidence,
    /// Every surviving candidate, best first
    pub ranked: Vec<RankedCandidate>,
}

/// Scores candidates against a query and picks one
#[derive(Debug, Clone)]
pub struct CandidateRanker {
    scorer: Arc<dyn SimilarityScorer>,
    threshold: f64,
}

impl CandidateRanker {
    pub fn new(scorer: Arc<dyn SimilarityScorer>, threshold: f64) -> Self {
        Self { scorer, threshold }
    }

    pub fn from_config(config: &RankingConfig) -> Self {
        Self::new(config.similarity.scorer(), config.confidence_threshold)
    }

    /// Rank candidates and select the best one
    ///
    /// Order: score (desc), popularity (desc), subject id (asc). Duplicate ids
    /// keep their first occurrence.
    pub fn rank(
        &self,
        query: &SearchQuery,
        candidates: Vec<CandidateSubject>,
    ) -> Result<Selection, CatalogError> {
        let received = candidates.len();
        let queries: Vec<&str> = [query.bare_title(), query.original_title()]
            .into_iter()
            .filter(|q| !q.is_empty())
            .collect();

        let mut seen = HashSet::new();
        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .filter(|c| seen.insert(c.id))
            .filter(|c| accepts(query.format(), c))
            .map(|candidate| {
                let score = best_similarity(self.scorer.as_ref(), &queries, &candidate.titles());
                RankedCandidate { candidate, score }
            })
            .collect();

        ranked.sort_by(compare_ranked);

        tracing::debug!(
            "Ranked {} of {} candidates for '{}'",
            ranked.len(),
            received,
            query.keyword()
        );

        let best = ranked.first().cloned().ok_or_else(|| {
            CatalogError::NotFound(format!("no book candidate matches '{}'", query.keyword()))
        })?;

        let confidence = if best.score >= self.threshold {
            MatchConfidence::High
        } else {
            tracing::info!(
                "Best candidate {} scored {:.3}, below threshold {:.3}",
                best.candidate.id,
                best.score,
                self.threshold
            );
            MatchConfidence::Low
        };

        Ok(Selection {
            best,
            confidence,
            ranked,
        })
    }
}

/// Type and format filter applied before scoring
///
/// Only books pass. A candidate with an unknown platform always passes;
/// otherwise its format must equal the hint, or be comic/novel without one.
fn accepts(hint: Option<BookFormat>, candidate: &CandidateSubject) -> bool {
    if candidate.subject_type != SubjectType::Book {
        return false;
    }
    if candidate.platform.is_none() {
        return true;
    }
    match (hint, candidate.format()) {
        (Some(hint), format) => format == Some(hint),
        (None, format) => format.is_some(),
    }
}

fn compare_ranked(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.candidate.popularity.cmp(&a.candidate.popularity))
        .then_with(|| a.candidate.id.cmp(&b.candidate.id))
}
