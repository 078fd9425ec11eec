//! Combines series-level and volume-level metadata into one record.

use std::cmp::Ordering;
use std::sync::Arc;

use super::IdentifierMapper;
use crate::models::{
    FetchReport, FetchedVolume, MatchConfidence, MetadataRecord, SearchQuery, SubjectDetail,
    VolumeMatch,
};
use crate::utils::{best_similarity, SimilarityScorer};

/// How the main subject was selected
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchQuality {
    pub confidence: MatchConfidence,
    pub score: f64,
}

impl MatchQuality {
    /// A match the host pinned by catalog id
    pub fn exact() -> Self {
        Self {
            confidence: MatchConfidence::High,
            score: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetadataMerger {
    scorer: Arc<dyn SimilarityScorer>,
    threshold: f64,
    mapper: IdentifierMapper,
}

impl MetadataMerger {
    pub fn new(scorer: Arc<dyn SimilarityScorer>, threshold: f64, mapper: IdentifierMapper) -> Self {
        Self {
            scorer,
            threshold,
            mapper,
        }
    }

    /// Merge the main subject with the volume the query asked about
    ///
    /// Authors, tags, rating, publisher, summary and catalog id come from the
    /// main subject. Title, ISBN, release date and cover come from the
    /// matched volume, falling back field by field to the main subject.
    pub fn merge(
        &self,
        main: &SubjectDetail,
        report: &FetchReport,
        query: &SearchQuery,
        quality: MatchQuality,
    ) -> MetadataRecord {
        let matched = self.match_volume(report, query);
        let volume = matched.map(|(v, _)| &v.detail);

        if let Some((v, how)) = matched {
            tracing::info!(
                "Merging volume {} into subject {} (matched by {:?})",
                v.detail.id,
                main.id,
                how
            );
        }

        let wants_volume = query.targets_volume() || query.isbn().is_some();
        let complete = !(report.total() > 0 && report.fetched.is_empty())
            && !(wants_volume && matched.is_none() && !report.failed.is_empty());

        let title = volume.map_or_else(|| main.title(), |v| v.title()).to_string();
        let isbn = volume
            .and_then(|v| v.isbn.clone())
            .or_else(|| main.isbn.clone());

        MetadataRecord {
            title,
            authors: main.authors.clone(),
            tags: main.tags.clone(),
            release_date: volume.and_then(|v| v.release_date).or(main.release_date),
            publisher: main.publisher.clone(),
            summary: main.summary.clone(),
            rating: main.rating,
            identifiers: self.mapper.identifiers(main.id, isbn.as_deref()),
            isbn,
            catalog_id: main.id,
            volume_id: volume.map(|v| v.id),
            volume_match: matched.map(|(_, how)| how),
            cover_url: volume
                .and_then(|v| v.cover_url.clone())
                .or_else(|| main.cover_url.clone()),
            url: self.mapper.subject_url(main.id),
            complete,
            confidence: quality.confidence,
            score: quality.score,
            volumes_total: report.total(),
            volumes_fetched: report.fetched.len(),
            failed_volume_ids: report.failed_ids(),
        }
    }

    /// Pick the fetched volume the query refers to
    ///
    /// An exact ISBN match wins. Otherwise, for a query that targets a
    /// volume, the best title match at or above the threshold; ties prefer
    /// the requested volume number, then the lower ordinal. A volume whose
    /// known ordinal differs from the requested number never matches by title.
    /// A title without a volume annotation keeps the series fields.
    fn match_volume<'a>(
        &self,
        report: &'a FetchReport,
        query: &SearchQuery,
    ) -> Option<(&'a FetchedVolume, VolumeMatch)> {
        if let Some(isbn) = query.isbn() {
            if let Some(v) = report
                .fetched
                .iter()
                .find(|v| v.detail.isbn.as_deref() == Some(isbn))
            {
                return Some((v, VolumeMatch::Isbn));
            }
        }

        if !query.targets_volume() {
            return None;
        }

        let original = [query.original_title()];
        let requested = query.volume_number();

        report
            .fetched
            .iter()
            .filter(|v| match (requested, v.volume.ordinal) {
                (Some(wanted), Some(ordinal)) => wanted == ordinal,
                _ => true,
            })
            .map(|v| {
                let mut titles = v.detail.titles();
                titles.push(v.volume.title.as_str());
                (v, best_similarity(self.scorer.as_ref(), &original, &titles))
            })
            .filter(|(_, score)| *score >= self.threshold)
            .min_by(|(a, sa), (b, sb)| {
                sb.total_cmp(sa)
                    .then_with(|| prefers_requested(a, b, requested))
                    .then_with(|| compare_ordinals(a, b))
            })
            .map(|(v, _)| (v, VolumeMatch::Title))
    }
}

/// `Less` when `a` is the requested volume and `b` is not
fn prefers_requested(a: &FetchedVolume, b: &FetchedVolume, requested: Option<u32>) -> Ordering {
    let is_requested = |v: &FetchedVolume| requested.is_some() && v.volume.ordinal == requested;
    is_requested(b).cmp(&is_requested(a))
}

/// Lower ordinal first, missing ordinals last
fn compare_ordinals(a: &FetchedVolume, b: &FetchedVolume) -> Ordering {
    match (a.volume.ordinal, b.volume.ordinal) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FetchFailure, FetchFailureKind, ResolveRequest, SubjectType, VolumeEntry};
    use crate::resolve::QueryPlanner;
    use crate::utils::LevenshteinScorer;
    use chrono::NaiveDate;

    fn subject(id: u64, name: &str) -> SubjectDetail {
        SubjectDetail {
            id,
            subject_type: SubjectType::Book,
            platform: Some("小说".to_string()),
            name: name.to_string(),
            name_cn: String::new(),
            authors: vec![],
            tags: vec![],
            release_date: None,
            publisher: None,
            summary: String::new(),
            rating: None,
            isbn: None,
            cover_url: None,
            relations: vec![],
        }
    }

    fn main_subject() -> SubjectDetail {
        SubjectDetail {
            authors: vec!["丸山くがね".to_string(), "so-bin".to_string()],
            tags: vec!["轻小说".to_string()],
            release_date: NaiveDate::from_ymd_opt(2012, 7, 30),
            publisher: Some("KADOKAWA".to_string()),
            summary: "series summary".to_string(),
            rating: Some(3.9),
            cover_url: Some("https://img.example.test/series.jpg".to_string()),
            ..subject(100, "オーバーロード")
        }
    }

    fn fetched(id: u64, ordinal: u32, isbn: &str) -> FetchedVolume {
        let name = format!("オーバーロード {}", ordinal);
        let mut detail = subject(id, &name);
        detail.isbn = Some(isbn.to_string());
        detail.release_date = NaiveDate::from_ymd_opt(2012 + ordinal as i32, 1, 1);
        detail.authors = vec!["someone else".to_string()];
        FetchedVolume {
            volume: VolumeEntry {
                subject_id: id,
                ordinal: Some(ordinal),
                parent_id: 100,
                title: name,
            },
            detail,
            attempts: 1,
        }
    }

    fn failed(id: u64, ordinal: u32) -> FetchFailure {
        FetchFailure {
            volume: VolumeEntry {
                subject_id: id,
                ordinal: Some(ordinal),
                parent_id: 100,
                title: format!("オーバーロード {}", ordinal),
            },
            kind: FetchFailureKind::Transport("connection refused".to_string()),
            attempts: 3,
        }
    }

    fn merger() -> MetadataMerger {
        MetadataMerger::new(Arc::new(LevenshteinScorer), 0.5, IdentifierMapper::default())
    }

    fn query(request: ResolveRequest) -> SearchQuery {
        QueryPlanner::new().plan(&request).unwrap()
    }

    #[test]
    fn test_standalone_uses_main_fields() {
        let main = main_subject();
        let record = merger().merge(
            &main,
            &FetchReport::default(),
            &query(ResolveRequest::new("オーバーロード")),
            MatchQuality::exact(),
        );

        assert!(record.complete);
        assert_eq!(record.title, "オーバーロード");
        assert_eq!(record.authors, main.authors);
        assert_eq!(record.release_date, main.release_date);
        assert_eq!(record.cover_url, main.cover_url);
        assert_eq!(record.volume_id, None);
        assert_eq!(record.url, "https://bangumi.tv/subject/100");
        assert_eq!(record.identifiers["bgm"], "100");
    }

    #[test]
    fn test_title_match_merges_volume_fields() {
        let report = FetchReport {
            fetched: vec![
                fetched(101, 1, "9784047280001"),
                fetched(102, 2, "9784047280002"),
                fetched(110, 10, "9784047280010"),
            ],
            failed: vec![],
        };
        let record = merger().merge(
            &main_subject(),
            &report,
            &query(ResolveRequest::new("オーバーロード (1)")),
            MatchQuality::exact(),
        );

        assert_eq!(record.volume_id, Some(101));
        assert_eq!(record.volume_match, Some(VolumeMatch::Title));
        assert_eq!(record.title, "オーバーロード 1");
        assert_eq!(record.isbn.as_deref(), Some("9784047280001"));
        assert_eq!(record.release_date, NaiveDate::from_ymd_opt(2013, 1, 1));
        // Series-level fields stay with the main subject
        assert_eq!(record.authors, main_subject().authors);
        assert_eq!(record.publisher.as_deref(), Some("KADOKAWA"));
        // The volume has no cover of its own
        assert_eq!(record.cover_url, main_subject().cover_url);
        assert_eq!(record.catalog_id, 100);
        assert_eq!(record.identifiers["isbn"], "9784047280001");
        assert!(record.complete);
    }

    #[test]
    fn test_isbn_beats_title() {
        let report = FetchReport {
            fetched: vec![fetched(102, 2, "9784047280002"), fetched(103, 3, "9784047280003")],
            failed: vec![],
        };
        let request = ResolveRequest::new("オーバーロード 2").isbn("978-4-04-728000-3");
        let record = merger().merge(&main_subject(), &report, &query(request), MatchQuality::exact());

        assert_eq!(record.volume_id, Some(103));
        assert_eq!(record.volume_match, Some(VolumeMatch::Isbn));
    }

    #[test]
    fn test_untargeted_query_ignores_volume_titles() {
        let report = FetchReport {
            fetched: vec![fetched(101, 1, "9784047280001")],
            failed: vec![],
        };
        let record = merger().merge(
            &main_subject(),
            &report,
            &query(ResolveRequest::new("オーバーロード")),
            MatchQuality::exact(),
        );
        assert_eq!(record.volume_id, None);
        assert!(record.complete);
    }

    #[test]
    fn test_all_volumes_failed_is_incomplete() {
        let report = FetchReport {
            fetched: vec![],
            failed: vec![failed(101, 1), failed(102, 2)],
        };
        let record = merger().merge(
            &main_subject(),
            &report,
            &query(ResolveRequest::new("オーバーロード")),
            MatchQuality::exact(),
        );

        assert!(!record.complete);
        assert_eq!(record.title, "オーバーロード");
        assert_eq!(record.failed_volume_ids, vec![101, 102]);
        assert_eq!(record.volumes_total, 2);
    }

    #[test]
    fn test_unmatched_volume_with_failures_is_incomplete() {
        let report = FetchReport {
            fetched: vec![fetched(101, 1, "9784047280001")],
            failed: vec![failed(105, 5)],
        };
        let record = merger().merge(
            &main_subject(),
            &report,
            &query(ResolveRequest::new("まったく別の本 (5)")),
            MatchQuality::exact(),
        );
        assert_eq!(record.volume_id, None);
        assert!(!record.complete);
    }

    #[test]
    fn test_matched_volume_with_other_failures_is_complete() {
        let report = FetchReport {
            fetched: vec![fetched(101, 1, "9784047280001")],
            failed: vec![failed(105, 5)],
        };
        let record = merger().merge(
            &main_subject(),
            &report,
            &query(ResolveRequest::new("オーバーロード 1")),
            MatchQuality::exact(),
        );
        assert_eq!(record.volume_id, Some(101));
        assert!(record.complete);
        assert!(!record.is_partial());
    }

    #[test]
    fn test_isbn_of_failed_volume_is_incomplete() {
        let report = FetchReport {
            fetched: vec![fetched(101, 1, "9784047280001"), fetched(102, 2, "9784047280002")],
            failed: vec![failed(103, 3)],
        };
        let request = ResolveRequest::new("オーバーロード").isbn("9784047280003");
        let record = merger().merge(&main_subject(), &report, &query(request), MatchQuality::exact());

        assert_eq!(record.volume_id, None);
        assert_eq!(record.isbn, None);
        assert!(!record.complete);
        assert!(record.is_partial());
        assert_eq!(record.failed_volume_ids, vec![103]);
    }

    #[test]
    fn test_isbn_of_fetched_volume_with_other_failures_is_complete() {
        let report = FetchReport {
            fetched: vec![fetched(101, 1, "9784047280001")],
            failed: vec![failed(103, 3)],
        };
        let request = ResolveRequest::new("オーバーロード").isbn("9784047280001");
        let record = merger().merge(&main_subject(), &report, &query(request), MatchQuality::exact());

        assert_eq!(record.volume_match, Some(VolumeMatch::Isbn));
        assert!(record.complete);
    }

    #[test]
    fn test_other_numbered_volume_never_matches_by_title() {
        let report = FetchReport {
            fetched: vec![fetched(101, 1, "9784047280001"), fetched(102, 2, "9784047280002")],
            failed: vec![failed(103, 3)],
        };
        let record = merger().merge(
            &main_subject(),
            &report,
            &query(ResolveRequest::new("オーバーロード 第3巻")),
            MatchQuality::exact(),
        );
        assert_eq!(record.volume_id, None);
        assert!(!record.complete);
    }
}
