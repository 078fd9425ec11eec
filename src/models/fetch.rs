//! Volume fetch tasks and their aggregated outcome.

use serde::Serialize;

use super::{SubjectDetail, VolumeEntry};

/// One unit of work for the fetch orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    /// Position of the volume in discovery (ordinal) order
    pub position: usize,
    pub volume: VolumeEntry,
}

/// Why a volume fetch did not produce a detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FetchFailureKind {
    /// Network failures persisted after every retry
    Transport(String),
    /// The catalog has no such subject
    NotFound,
    /// The response could not be understood
    Parse(String),
    /// The task exceeded its own time budget
    TimedOut,
    /// The batch deadline passed before the task finished
    Cancelled,
}

/// A volume whose detail could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub volume: VolumeEntry,
    pub kind: FetchFailureKind,
    pub attempts: u32,
}

/// A volume whose detail was fetched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchedVolume {
    pub volume: VolumeEntry,
    pub detail: SubjectDetail,
    pub attempts: u32,
}

/// Result of a single fetch task
pub type FetchResult = Result<FetchedVolume, FetchFailure>;

/// Aggregated outcome of a volume fan-out
///
/// Both lists are kept in discovery order regardless of completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchReport {
    pub fetched: Vec<FetchedVolume>,
    pub failed: Vec<FetchFailure>,
}

impl FetchReport {
    /// Total number of volumes the batch covered
    pub fn total(&self) -> usize {
        self.fetched.len() + self.failed.len()
    }

    /// Whether every volume was fetched
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Subject ids of the volumes that failed
    pub fn failed_ids(&self) -> Vec<u64> {
        self.failed.iter().map(|f| f.volume.subject_id).collect()
    }
}
