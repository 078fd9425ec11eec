//! Catalog subject models: search candidates, fetched details and volume entries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Subject category as encoded by the catalog's numeric `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    Book,
    Anime,
    Music,
    Game,
    Real,
    #[serde(untagged)]
    Other(u8),
}

impl SubjectType {
    /// Map the catalog's numeric type code
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => SubjectType::Book,
            2 => SubjectType::Anime,
            3 => SubjectType::Music,
            4 => SubjectType::Game,
            6 => SubjectType::Real,
            other => SubjectType::Other(other),
        }
    }

    /// The catalog's numeric type code
    pub fn code(&self) -> u8 {
        match self {
            SubjectType::Book => 1,
            SubjectType::Anime => 2,
            SubjectType::Music => 3,
            SubjectType::Game => 4,
            SubjectType::Real => 6,
            SubjectType::Other(code) => *code,
        }
    }
}

/// Printed format of a book subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    Comic,
    Novel,
}

impl BookFormat {
    /// Interpret the catalog's `platform` label for book subjects
    pub fn from_platform(platform: &str) -> Option<Self> {
        match platform.trim() {
            "漫画" | "漫畫" | "Comic" | "comic" => Some(BookFormat::Comic),
            "小说" | "小說" | "Novel" | "novel" => Some(BookFormat::Novel),
            _ => None,
        }
    }

    /// Parse a host-supplied hint such as "comic" or "novel"
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.trim().to_lowercase().as_str() {
            "comic" | "manga" => Some(BookFormat::Comic),
            "novel" | "light-novel" | "light_novel" | "ln" => Some(BookFormat::Novel),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookFormat::Comic => write!(f, "comic"),
            BookFormat::Novel => write!(f, "novel"),
        }
    }
}

/// A subject returned by the search endpoint, before ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSubject {
    /// Catalog subject id
    pub id: u64,

    /// Original-language title
    pub name: String,

    /// Chinese title (may be empty)
    pub name_cn: String,

    /// Subject category
    pub subject_type: SubjectType,

    /// Platform label for books ("漫画", "小说", ...)
    pub platform: Option<String>,

    /// Popularity hint (number of ratings)
    pub popularity: u32,
}

impl CandidateSubject {
    /// Titles worth comparing against the query, skipping empty ones
    pub fn titles(&self) -> Vec<&str> {
        [self.name.as_str(), self.name_cn.as_str()]
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .collect()
    }

    /// Printed format derived from the platform label
    pub fn format(&self) -> Option<BookFormat> {
        self.platform.as_deref().and_then(BookFormat::from_platform)
    }
}

/// Reference from one subject to a related subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRef {
    pub id: u64,
    pub subject_type: SubjectType,
    pub name: String,
    pub name_cn: String,
    /// Relation label, e.g. "单行本" for a physical volume
    pub relation: String,
}

impl RelationRef {
    /// Preferred display title for the related subject
    pub fn title(&self) -> &str {
        if self.name_cn.trim().is_empty() {
            &self.name
        } else {
            &self.name_cn
        }
    }
}

/// Full metadata for one catalog subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectDetail {
    pub id: u64,
    pub subject_type: SubjectType,
    pub platform: Option<String>,
    pub name: String,
    pub name_cn: String,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub release_date: Option<NaiveDate>,
    pub publisher: Option<String>,
    pub summary: String,
    /// Rating on a five-point scale
    pub rating: Option<f64>,
    pub isbn: Option<String>,
    pub cover_url: Option<String>,
    /// Related subjects; only populated for the main subject of a resolution
    pub relations: Vec<RelationRef>,
}

impl SubjectDetail {
    /// Display title: the Chinese title when present, the original otherwise
    pub fn title(&self) -> &str {
        if self.name_cn.trim().is_empty() {
            &self.name
        } else {
            &self.name_cn
        }
    }

    /// Titles worth comparing against a query
    pub fn titles(&self) -> Vec<&str> {
        [self.name.as_str(), self.name_cn.as_str()]
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .collect()
    }
}

/// One physical volume of a series, discovered from the series' relations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeEntry {
    pub subject_id: u64,
    pub ordinal: Option<u32>,
    pub parent_id: u64,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_type_codes() {
        assert_eq!(SubjectType::from_code(1), SubjectType::Book);
        assert_eq!(SubjectType::from_code(6), SubjectType::Real);
        assert_eq!(SubjectType::from_code(9), SubjectType::Other(9));
        assert_eq!(SubjectType::Anime.code(), 2);
    }

    #[test]
    fn test_book_format_parsing() {
        assert_eq!(BookFormat::from_platform("漫画"), Some(BookFormat::Comic));
        assert_eq!(BookFormat::from_platform("小说"), Some(BookFormat::Novel));
        assert_eq!(BookFormat::from_platform("画集"), None);
        assert_eq!(BookFormat::from_hint("Manga"), Some(BookFormat::Comic));
        assert_eq!(BookFormat::from_hint("ln"), Some(BookFormat::Novel));
        assert_eq!(BookFormat::from_hint("audio"), None);
    }

    #[test]
    fn test_detail_title_prefers_chinese() {
        let mut detail = SubjectDetail {
            id: 1,
            subject_type: SubjectType::Book,
            platform: None,
            name: "オーバーロード".to_string(),
            name_cn: "不死者之王".to_string(),
            authors: Vec::new(),
            tags: Vec::new(),
            release_date: None,
            publisher: None,
            summary: String::new(),
            rating: None,
            isbn: None,
            cover_url: None,
            relations: Vec::new(),
        };
        assert_eq!(detail.title(), "不死者之王");
        assert_eq!(detail.titles().len(), 2);

        detail.name_cn = "  ".to_string();
        assert_eq!(detail.title(), "オーバーロード");
        assert_eq!(detail.titles(), vec!["オーバーロード"]);
    }
}
