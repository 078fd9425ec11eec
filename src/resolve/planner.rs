//! Turns a host request into a normalized search query.

use regex::Regex;
use std::sync::OnceLock;

use crate::catalog::{normalize_isbn, CatalogError};
use crate::models::{ResolveRequest, SearchQuery};
use crate::utils::fold_full_width;

/// Trailing volume annotations, tried in order on every stripping pass.
///
/// Each pattern captures what precedes the marker as `rest` and, when the
/// marker carries one, the volume number as `num`.
const VOLUME_MARKERS: &[&str] = &[
    // "Vol. 3", "vol 3", "Volume 12"
    r"(?i)^(?P<rest>.*?)[\s,:\-]*\bvol(?:ume)?\.?\s*(?P<num>\d+)$",
    // "第2巻", "第 2 卷"
    r"^(?P<rest>.*?)\s*第\s*(?P<num>\d+)\s*[巻卷册冊]$",
    // "5巻"
    r"^(?P<rest>.*?)\s*(?P<num>\d+)\s*[巻卷册冊]$",
    // "(1)", "[MF文庫J]", "【限定版】"
    r"^(?P<rest>.*?)\s*[(\[【〔《<]\s*(?P<inner>[^()\[\]【】〔〕《》<>]*?)\s*[)\]】〕》>]$",
    // bare trailing number: "ダンジョン飯 0"
    r"^(?P<rest>.*\S)\s+(?P<num>\d+)$",
];

fn markers() -> &'static [Regex] {
    static MARKERS: OnceLock<Vec<Regex>> = OnceLock::new();
    MARKERS.get_or_init(|| {
        VOLUME_MARKERS
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    })
}

/// Builds [`SearchQuery`] values from host requests
///
/// Pure: no network access, no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryPlanner;

impl QueryPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a request into a query
    ///
    /// Fails only when the title is blank and there is no usable ISBN.
    pub fn plan(&self, request: &ResolveRequest) -> Result<SearchQuery, CatalogError> {
        let original = normalize_whitespace(&request.title);
        let (bare, volume_number) = strip_volume_annotations(&original);

        let isbn = request.isbn.as_deref().and_then(|raw| {
            if raw.trim().is_empty() {
                return None;
            }
            let normalized = normalize_isbn(raw);
            if normalized.is_none() {
                tracing::warn!("Ignoring malformed ISBN '{}'", raw);
            }
            normalized
        });

        if bare.is_empty() && isbn.is_none() {
            return Err(CatalogError::InvalidQuery(
                "title is blank and no valid ISBN was given".to_string(),
            ));
        }

        let query = SearchQuery::new(bare, original, isbn, volume_number, request.hint);
        tracing::debug!(
            "Planned query keyword='{}' volume={:?} isbn={:?}",
            query.keyword(),
            query.volume_number(),
            query.isbn()
        );
        Ok(query)
    }
}

/// Fold full-width ASCII and collapse runs of whitespace
pub(crate) fn normalize_whitespace(title: &str) -> String {
    title
        .chars()
        .map(fold_full_width)
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip trailing volume annotations from a normalized title
///
/// Returns the bare title and the first volume number met while stripping.
/// Never strips a title down to nothing.
pub(crate) fn strip_volume_annotations(title: &str) -> (String, Option<u32>) {
    let mut current = title.trim().to_string();
    let mut volume_number = None;

    'strip: loop {
        for marker in markers() {
            let Some(caps) = marker.captures(&current) else {
                continue;
            };
            let rest = caps.name("rest").map_or("", |m| m.as_str()).trim();
            if rest.is_empty() {
                continue;
            }

            let number = match (caps.name("num"), caps.name("inner")) {
                (Some(num), _) => num.as_str().parse::<u32>().ok(),
                (None, Some(inner)) => inner_volume_number(inner.as_str()),
                (None, None) => None,
            };
            if volume_number.is_none() {
                volume_number = number;
            }

            current = rest.to_string();
            continue 'strip;
        }
        break;
    }

    (current, volume_number)
}

/// Volume number written inside a bracketed annotation, e.g. "(3)" or "[Vol. 3]"
fn inner_volume_number(inner: &str) -> Option<u32> {
    let inner = inner.trim();
    if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit()) {
        return inner.parse().ok();
    }
    // "x" stands in for an empty prefix so the marker patterns can match
    let (rest, number) = strip_volume_annotations(&format!("x {}", inner));
    if rest == "x" {
        number
    } else {
        None
    }
}

/// Volume number carried by a title's trailing annotation, if any
pub(crate) fn trailing_volume_number(title: &str) -> Option<u32> {
    strip_volume_annotations(&normalize_whitespace(title)).1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookFormat;

    fn plan(title: &str) -> SearchQuery {
        QueryPlanner::new().plan(&ResolveRequest::new(title)).unwrap()
    }

    #[test]
    fn test_strips_parenthesized_volume() {
        let query = plan("オーバーロード (1)");
        assert_eq!(query.bare_title(), "オーバーロード");
        assert_eq!(query.original_title(), "オーバーロード (1)");
        assert_eq!(query.volume_number(), Some(1));
        assert_eq!(query.keyword(), "オーバーロード");
        assert!(query.targets_volume());
    }

    #[test]
    fn test_strips_full_width_annotation() {
        let query = plan("ダンジョン飯　（３）");
        assert_eq!(query.bare_title(), "ダンジョン飯");
        assert_eq!(query.original_title(), "ダンジョン飯 (3)");
        assert_eq!(query.volume_number(), Some(3));
    }

    #[test]
    fn test_strips_volume_markers() {
        assert_eq!(plan("Spice and Wolf Vol. 3").volume_number(), Some(3));
        assert_eq!(plan("Spice and Wolf Vol. 3").bare_title(), "Spice and Wolf");
        assert_eq!(plan("狼と香辛料 第2巻").bare_title(), "狼と香辛料");
        assert_eq!(plan("狼と香辛料 第2巻").volume_number(), Some(2));
        assert_eq!(plan("寄生獣 5巻").volume_number(), Some(5));
        assert_eq!(plan("ダンジョン飯 0").volume_number(), Some(0));
        assert_eq!(plan("ダンジョン飯 0").bare_title(), "ダンジョン飯");
    }

    #[test]
    fn test_first_numeric_marker_wins() {
        let query = plan("ノーゲーム・ノーライフ 4 (MF文庫J)");
        assert_eq!(query.bare_title(), "ノーゲーム・ノーライフ");
        assert_eq!(query.volume_number(), Some(4));

        let query = plan("とある魔術の禁書目録 [Vol. 7]");
        assert_eq!(query.bare_title(), "とある魔術の禁書目録");
        assert_eq!(query.volume_number(), Some(7));
    }

    #[test]
    fn test_label_only_annotation_targets_volume_without_number() {
        let query = plan("よつばと! 【限定版】");
        assert_eq!(query.bare_title(), "よつばと!");
        assert_eq!(query.volume_number(), None);
        assert!(query.targets_volume());
    }

    #[test]
    fn test_plain_title_is_untouched() {
        let query = plan("  寄生獣   ");
        assert_eq!(query.bare_title(), "寄生獣");
        assert_eq!(query.original_title(), "寄生獣");
        assert!(!query.targets_volume());
    }

    #[test]
    fn test_never_strips_to_empty() {
        let query = plan("1984");
        assert_eq!(query.bare_title(), "1984");
        assert_eq!(query.volume_number(), None);
        assert_eq!(plan("(1)").bare_title(), "(1)");
    }

    #[test]
    fn test_isbn_normalized_and_used_when_title_blank() {
        let request = ResolveRequest::new("  ").isbn("978-4-04-730000-?");
        assert!(matches!(
            QueryPlanner::new().plan(&request),
            Err(CatalogError::InvalidQuery(_))
        ));

        let request = ResolveRequest::new("").isbn("978-4-8401-4137-6");
        let query = QueryPlanner::new().plan(&request).unwrap();
        assert_eq!(query.isbn(), Some("9784840141376"));
        assert_eq!(query.keyword(), "9784840141376");
    }

    #[test]
    fn test_malformed_isbn_is_dropped() {
        let request = ResolveRequest::new("寄生獣").isbn("not an isbn");
        let query = QueryPlanner::new().plan(&request).unwrap();
        assert_eq!(query.isbn(), None);
        assert_eq!(query.keyword(), "寄生獣");
    }

    #[test]
    fn test_blank_request_is_invalid() {
        let result = QueryPlanner::new().plan(&ResolveRequest::new(" \u{3000} "));
        assert!(matches!(result, Err(CatalogError::InvalidQuery(_))));
    }

    #[test]
    fn test_hint_is_carried() {
        let request = ResolveRequest::new("寄生獣").hint(BookFormat::Comic);
        let query = QueryPlanner::new().plan(&request).unwrap();
        assert_eq!(query.format(), Some(BookFormat::Comic));
    }

    #[test]
    fn test_trailing_volume_number() {
        assert_eq!(trailing_volume_number("オーバーロード 3"), Some(3));
        assert_eq!(trailing_volume_number("オーバーロード (12)"), Some(12));
        assert_eq!(trailing_volume_number("狼と香辛料Ⅱ"), None);
        assert_eq!(trailing_volume_number("オーバーロード"), None);
    }
}
