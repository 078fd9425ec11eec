//! Mapping between catalog ids and the host's identifier vocabulary.

use std::collections::BTreeMap;

use crate::config::CatalogConfig;

/// Host identifier key for a catalog subject id
pub const CATALOG_ID_KEY: &str = "bgm";

/// Host identifier key for an ISBN
pub const ISBN_KEY: &str = "isbn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierMapper {
    site_base: String,
}

impl IdentifierMapper {
    /// `site_base` is the human-facing site, e.g. `https://bangumi.tv`
    pub fn new(site_base: impl Into<String>) -> Self {
        Self {
            site_base: site_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(config.site_base.clone())
    }

    /// Identifier pairs for a subject, omitting what is missing
    pub fn identifiers(&self, catalog_id: u64, isbn: Option<&str>) -> BTreeMap<String, String> {
        let mut identifiers = BTreeMap::new();
        identifiers.insert(CATALOG_ID_KEY.to_string(), catalog_id.to_string());
        if let Some(isbn) = isbn.filter(|i| !i.is_empty()) {
            identifiers.insert(ISBN_KEY.to_string(), isbn.to_string());
        }
        identifiers
    }

    /// Subject page on the catalog site
    pub fn subject_url(&self, catalog_id: u64) -> String {
        format!("{}/subject/{}", self.site_base, catalog_id)
    }

    /// Catalog id the host already holds, if it is a valid one
    pub fn catalog_id(&self, identifiers: &BTreeMap<String, String>) -> Option<u64> {
        let raw = identifiers.get(CATALOG_ID_KEY)?.trim();
        match raw.parse::<u64>() {
            Ok(id) if id > 0 => Some(id),
            _ => {
                tracing::warn!("Ignoring invalid {} identifier '{}'", CATALOG_ID_KEY, raw);
                None
            }
        }
    }
}

impl Default for IdentifierMapper {
    fn default() -> Self {
        Self::from_config(&CatalogConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_omit_missing_isbn() {
        let mapper = IdentifierMapper::default();
        let ids = mapper.identifiers(12345, None);
        assert_eq!(ids.len(), 1);
        assert_eq!(ids["bgm"], "12345");

        let ids = mapper.identifiers(12345, Some("9784047300000"));
        assert_eq!(ids["isbn"], "9784047300000");
    }

    #[test]
    fn test_subject_url() {
        let mapper = IdentifierMapper::new("https://bgm.example.test/");
        assert_eq!(mapper.subject_url(42), "https://bgm.example.test/subject/42");
        assert_eq!(
            IdentifierMapper::default().subject_url(7),
            "https://bangumi.tv/subject/7"
        );
    }

    #[test]
    fn test_catalog_id_round_trip() {
        let mapper = IdentifierMapper::default();
        let ids = mapper.identifiers(136517, None);
        assert_eq!(mapper.catalog_id(&ids), Some(136517));

        let mut bad = BTreeMap::new();
        bad.insert("bgm".to_string(), "abc".to_string());
        assert_eq!(mapper.catalog_id(&bad), None);
        bad.insert("bgm".to_string(), " 0 ".to_string());
        assert_eq!(mapper.catalog_id(&bad), None);
        assert_eq!(mapper.catalog_id(&BTreeMap::new()), None);
    }
}
