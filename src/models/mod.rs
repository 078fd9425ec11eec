//! Core data models for catalog subjects and resolution results.

mod fetch;
mod query;
mod record;
mod subject;

pub use fetch::{FetchFailure, FetchFailureKind, FetchReport, FetchResult, FetchTask, FetchedVolume};
pub use query::{ResolveRequest, SearchQuery};
pub use record::{MatchConfidence, MetadataRecord, VolumeMatch};
pub use subject::{BookFormat, CandidateSubject, RelationRef, SubjectDetail, SubjectType, VolumeEntry};
