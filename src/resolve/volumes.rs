//! Discovery of the physical volumes of a series.

use std::collections::HashSet;

use super::planner::trailing_volume_number;
use crate::models::{SubjectDetail, SubjectType, VolumeEntry};

/// Relation labels the catalog uses for a physical volume
const VOLUME_RELATIONS: &[&str] = &["单行本", "單行本"];

/// Extracts volume entries from a main subject's relations
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeDiscoverer;

impl VolumeDiscoverer {
    pub fn new() -> Self {
        Self
    }

    /// Volumes of `main`, ordered by ordinal
    ///
    /// Entries without a parseable ordinal come last, in the order the
    /// catalog returned them. A standalone work yields an empty list.
    pub fn discover(&self, main: &SubjectDetail) -> Vec<VolumeEntry> {
        let mut seen = HashSet::new();
        let mut volumes: Vec<VolumeEntry> = main
            .relations
            .iter()
            .filter(|r| r.subject_type == SubjectType::Book)
            .filter(|r| VOLUME_RELATIONS.contains(&r.relation.trim()))
            .filter(|r| r.id != main.id && seen.insert(r.id))
            .map(|r| VolumeEntry {
                subject_id: r.id,
                ordinal: trailing_volume_number(&r.name)
                    .or_else(|| trailing_volume_number(&r.name_cn)),
                parent_id: main.id,
                title: r.title().to_string(),
            })
            .collect();

        volumes.sort_by_key(|v| (v.ordinal.is_none(), v.ordinal));

        tracing::debug!("Subject {} has {} volumes", main.id, volumes.len());
        volumes
    }
}
