//! Subject detail and relation fetching.

use chrono::NaiveDate;
use serde::Deserialize;

use super::{CatalogClient, CatalogError};
use crate::config::TagConfig;
use crate::models::{RelationRef, SubjectDetail, SubjectType};

/// Infobox keys that name a creator, in priority order
const AUTHOR_KEYS: &[&str] = &["作者", "原作", "作画", "插图", "插画"];
const PUBLISHER_KEYS: &[&str] = &["出版社"];
const RELEASE_DATE_KEYS: &[&str] = &["发售日"];
const ISBN_KEYS: &[&str] = &["ISBN"];

/// Fetches and parses the detail of one subject
///
/// Used for the main subject of a resolution and for each of its volumes.
#[derive(Debug, Clone)]
pub struct SubjectFetcher {
    client: CatalogClient,
    tags: TagConfig,
}

impl SubjectFetcher {
    pub fn new(client: CatalogClient, tags: TagConfig) -> Self {
        Self { client, tags }
    }

    /// Fetch one subject without its relations
    pub async fn fetch(&self, subject_id: u64) -> Result<SubjectDetail, CatalogError> {
        let data: SubjectResponse = self
            .client
            .get_json(&format!("/v0/subjects/{}", subject_id), &[])
            .await
            .map_err(|e| match e {
                CatalogError::NotFound(_) => {
                    CatalogError::NotFound(format!("subject {}", subject_id))
                }
                other => other,
            })?;

        if data.id != subject_id {
            return Err(CatalogError::Parse(format!(
                "requested subject {} but catalog returned {}",
                subject_id, data.id
            )));
        }

        Ok(self.parse_subject(data))
    }

    /// Fetch one subject together with its relation references
    pub async fn fetch_with_relations(&self, subject_id: u64) -> Result<SubjectDetail, CatalogError> {
        let mut detail = self.fetch(subject_id).await?;
        detail.relations = self.fetch_relations(subject_id).await?;
        Ok(detail)
    }

    /// Related subjects of a subject; a 404 means there are none
    pub async fn fetch_relations(&self, subject_id: u64) -> Result<Vec<RelationRef>, CatalogError> {
        let result: Result<Vec<RelationItem>, CatalogError> = self
            .client
            .get_json(&format!("/v0/subjects/{}/subjects", subject_id), &[])
            .await;

        let items = match result {
            Ok(items) => items,
            Err(CatalogError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        tracing::debug!("Subject {} has {} relations", subject_id, items.len());

        Ok(items
            .into_iter()
            .map(|item| RelationRef {
                id: item.id,
                subject_type: SubjectType::from_code(item.r#type),
                name: item.name,
                name_cn: item.name_cn,
                relation: item.relation,
            })
            .collect())
    }

    fn parse_subject(&self, data: SubjectResponse) -> SubjectDetail {
        let infobox = data.infobox.unwrap_or_default();

        let mut authors: Vec<String> = Vec::new();
        for author in infobox_values(&infobox, AUTHOR_KEYS) {
            if !authors.contains(&author) {
                authors.push(author);
            }
        }

        let release_date = data
            .date
            .as_deref()
            .and_then(parse_release_date)
            .or_else(|| {
                infobox_values(&infobox, RELEASE_DATE_KEYS)
                    .first()
                    .and_then(|d| parse_release_date(d))
            });

        let rating = data
            .rating
            .map(|r| r.score)
            .filter(|score| *score > 0.0)
            .map(|score| score / 2.0);

        SubjectDetail {
            id: data.id,
            subject_type: SubjectType::from_code(data.r#type),
            platform: data.platform.filter(|p| !p.trim().is_empty()),
            name: data.name,
            name_cn: data.name_cn,
            authors,
            tags: self.parse_tags(data.tags),
            release_date,
            publisher: infobox_values(&infobox, PUBLISHER_KEYS).into_iter().next(),
            summary: data.summary,
            rating,
            isbn: infobox_values(&infobox, ISBN_KEYS)
                .first()
                .and_then(|isbn| normalize_isbn(isbn)),
            cover_url: data.images.and_then(|i| i.large).filter(|u| !u.is_empty()),
            relations: Vec::new(),
        }
    }

    /// Keep tags applied by enough users, up to the configured count
    fn parse_tags(&self, tags: Vec<TagItem>) -> Vec<String> {
        tags.into_iter()
            .filter(|tag| tag.count >= self.tags.min_user_count)
            .map(|tag| tag.name)
            .take(self.tags.max_count)
            .collect()
    }
}

/// Values of the given infobox keys, grouped in key order
fn infobox_values(infobox: &[InfoboxEntry], keys: &[&str]) -> Vec<String> {
    keys.iter()
        .flat_map(|key| {
            infobox
                .iter()
                .filter(move |entry| entry.key.trim() == *key)
                .flat_map(|entry| entry.value.texts())
        })
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Parse the date formats the catalog uses in `date` and the infobox
pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%Y年%m月%d日"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }

    // Month precision: pin to the first of the month.
    let month_only = [
        (format!("{}-01", raw), "%Y-%m-%d"),
        (format!("{}1日", raw), "%Y年%m月%d日"),
    ];
    for (padded, format) in month_only {
        if let Ok(date) = NaiveDate::parse_from_str(&padded, format) {
            return Some(date);
        }
    }

    None
}

/// Strip separators from an ISBN and check its shape
///
/// Returns `None` unless the result is a 10-digit (last may be `X`) or
/// 13-digit ISBN.
pub fn normalize_isbn(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '-' | ' ' | '\u{2010}' | '\u{2011}' | '\u{2212}'))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !cleaned.is_ascii() {
        return None;
    }

    let valid = match cleaned.len() {
        13 => cleaned.chars().all(|c| c.is_ascii_digit()),
        10 => {
            let (body, check) = cleaned.split_at(9);
            body.chars().all(|c| c.is_ascii_digit())
                && check.chars().all(|c| c.is_ascii_digit() || c == 'X')
        }
        _ => false,
    };

    valid.then_some(cleaned)
}

// ===== Subject API Types =====

#[derive(Debug, Deserialize)]
struct SubjectResponse {
    id: u64,
    #[serde(default)]
    r#type: u8,
    #[serde(default)]
    name: String,
    #[serde(default)]
    name_cn: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    images: Option<SubjectImages>,
    #[serde(default)]
    infobox: Option<Vec<InfoboxEntry>>,
    #[serde(default)]
    rating: Option<SubjectRating>,
    #[serde(default)]
    tags: Vec<TagItem>,
}

#[derive(Debug, Deserialize)]
struct SubjectImages {
    #[serde(default)]
    large: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubjectRating {
    #[serde(default)]
    score: f64,
}

#[derive(Debug, Deserialize)]
struct TagItem {
    name: String,
    #[serde(default)]
    count: u32,
}

#[derive(Debug, Deserialize)]
struct InfoboxEntry {
    key: String,
    value: InfoboxValue,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InfoboxValue {
    Text(String),
    List(Vec<InfoboxItem>),
    Other(serde_json::Value),
}

impl InfoboxValue {
    fn texts(&self) -> Vec<String> {
        match self {
            InfoboxValue::Text(text) => vec![text.clone()],
            InfoboxValue::List(items) => items.iter().map(|i| i.v.clone()).collect(),
            InfoboxValue::Other(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InfoboxItem {
    #[serde(default)]
    v: String,
}

#[derive(Debug, Deserialize)]
struct RelationItem {
    id: u64,
    #[serde(default)]
    r#type: u8,
    #[serde(default)]
    name: String,
    #[serde(default)]
    name_cn: String,
    #[serde(default)]
    relation: String,
}
