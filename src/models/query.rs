//! Resolution request and normalized search query models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::BookFormat;

/// A resolution request as issued by the host application
///
/// One request describes one book: a standalone work or a single physical
/// volume of a multi-volume series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    /// Title as known to the host, possibly with a volume annotation
    pub title: String,

    /// ISBN as known to the host
    #[serde(default)]
    pub isbn: Option<String>,

    /// Expected printed format
    #[serde(default)]
    pub hint: Option<BookFormat>,

    /// Identifiers the host already holds for this book (e.g. "bgm", "isbn")
    #[serde(default)]
    pub identifiers: BTreeMap<String, String>,
}

impl ResolveRequest {
    /// Create a request for a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the ISBN
    pub fn isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    /// Set the expected printed format
    pub fn hint(mut self, hint: BookFormat) -> Self {
        self.hint = Some(hint);
        self
    }

    /// Add a host identifier
    pub fn identifier(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.identifiers.insert(key.into(), value.into());
        self
    }
}

/// Normalized search query produced by the query planner
///
/// Immutable once built; read it through the accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    keyword: String,
    bare_title: String,
    original_title: String,
    isbn: Option<String>,
    volume_number: Option<u32>,
    format: Option<BookFormat>,
}

impl SearchQuery {
    pub(crate) fn new(
        bare_title: String,
        original_title: String,
        isbn: Option<String>,
        volume_number: Option<u32>,
        format: Option<BookFormat>,
    ) -> Self {
        let keyword = match &isbn {
            Some(isbn) if bare_title.is_empty() => isbn.clone(),
            _ => bare_title.clone(),
        };

        Self {
            keyword,
            bare_title,
            original_title,
            isbn,
            volume_number,
            format,
        }
    }

    /// Keyword sent to the search endpoint
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Series title with volume annotations stripped
    pub fn bare_title(&self) -> &str {
        &self.bare_title
    }

    /// Title exactly as the host supplied it (whitespace-normalized)
    pub fn original_title(&self) -> &str {
        &self.original_title
    }

    /// Normalized ISBN, if the host supplied a valid one
    pub fn isbn(&self) -> Option<&str> {
        self.isbn.as_deref()
    }

    /// Volume number parsed from the title annotation
    pub fn volume_number(&self) -> Option<u32> {
        self.volume_number
    }

    /// Expected printed format
    pub fn format(&self) -> Option<BookFormat> {
        self.format
    }

    /// Whether the host asked about one specific volume rather than a whole work
    pub fn targets_volume(&self) -> bool {
        self.volume_number.is_some() || self.original_title != self.bare_title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_falls_back_to_isbn() {
        let query = SearchQuery::new(
            String::new(),
            String::new(),
            Some("9784047300000".to_string()),
            None,
            None,
        );
        assert_eq!(query.keyword(), "9784047300000");
        assert!(!query.targets_volume());
    }

    #[test]
    fn test_targets_volume() {
        let query = SearchQuery::new(
            "オーバーロード".to_string(),
            "オーバーロード (3)".to_string(),
            None,
            Some(3),
            None,
        );
        assert_eq!(query.keyword(), "オーバーロード");
        assert!(query.targets_volume());
    }

    #[test]
    fn test_request_builder() {
        let request = ResolveRequest::new("OVERLORD")
            .isbn("978-4-04-730000-0")
            .hint(BookFormat::Novel)
            .identifier("bgm", "136517");
        assert_eq!(request.isbn.as_deref(), Some("978-4-04-730000-0"));
        assert_eq!(request.hint, Some(BookFormat::Novel));
        assert_eq!(request.identifiers.get("bgm").map(String::as_str), Some("136517"));
    }
}
