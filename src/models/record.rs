//! The merged metadata record handed back to the host.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// How confident the ranker is in the selected subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    High,
    /// Top score fell below the confidence threshold; the record is best effort
    Low,
}

/// How the merger picked the volume it merged in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeMatch {
    Isbn,
    Title,
}

/// Final output of one resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataRecord {
    pub title: String,
    pub authors: Vec<String>,
    pub tags: Vec<String>,
    pub release_date: Option<NaiveDate>,
    pub publisher: Option<String>,
    pub summary: String,
    /// Rating on a five-point scale
    pub rating: Option<f64>,
    pub isbn: Option<String>,

    /// Catalog id of the main (series or standalone) subject
    pub catalog_id: u64,

    /// Catalog id of the merged volume, if one matched
    pub volume_id: Option<u64>,
    pub volume_match: Option<VolumeMatch>,

    pub cover_url: Option<String>,
    pub url: String,

    /// Host identifier pairs
    pub identifiers: BTreeMap<String, String>,

    /// False when volume fetches the result depends on failed
    pub complete: bool,
    pub confidence: MatchConfidence,
    pub score: f64,

    pub volumes_total: usize,
    pub volumes_fetched: usize,
    pub failed_volume_ids: Vec<u64>,
}

impl MetadataRecord {
    /// Whether the host should treat this record as uncertain
    pub fn is_low_confidence(&self) -> bool {
        self.confidence == MatchConfidence::Low
    }

    /// Whether some of the volume data the record depends on is missing
    pub fn is_partial(&self) -> bool {
        !self.complete
    }
}
