//! Persistence: durable version records and the collaborator activity log.
//!
//! # Invariants
//! - Records and activities are append-only; nothing is rewritten in place.
//! - The head of a subject is its newest non-snapshot record.
//! - A write based on a stale head is rejected, never merged.

mod error;
mod memory;
mod store;

#[cfg(test)]
mod fixtures;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{FileStore, IntegrityManifest, ManifestEntry, SubjectMeta};

use chrono::{DateTime, Utc};
use chronicle_common::{
    ActivityFilter, CollaboratorActivity, HistoryFilter, Page, SubjectId, VersionRecord,
};
use std::sync::Arc;

/// Durable storage behind the engine.
pub trait ContentStore: Send + Sync {
    /// Persist `record`. `expected_head` is the head version the caller
    /// based the record on; a mismatch fails with `StoreError::HeadMismatch`.
    fn save(&self, record: &VersionRecord, expected_head: Option<&str>) -> Result<(), StoreError>;

    /// The subject's head: its newest non-snapshot record.
    fn load_latest(&self, subject: &SubjectId) -> Result<Option<VersionRecord>, StoreError>;

    fn load_version(
        &self,
        subject: &SubjectId,
        version: &str,
    ) -> Result<Option<VersionRecord>, StoreError>;

    /// Matching records, newest first, plus the total match count.
    fn list(
        &self,
        subject: &SubjectId,
        filter: &HistoryFilter,
    ) -> Result<Page<VersionRecord>, StoreError>;

    fn append_activity(&self, activity: &CollaboratorActivity) -> Result<(), StoreError>;

    /// Matching activities, newest first, plus the total match count.
    fn list_activity(
        &self,
        subject: &SubjectId,
        filter: &ActivityFilter,
    ) -> Result<Page<CollaboratorActivity>, StoreError>;
}

impl<T: ContentStore + ?Sized> ContentStore for Arc<T> {
    fn save(&self, record: &VersionRecord, expected_head: Option<&str>) -> Result<(), StoreError> {
        (**self).save(record, expected_head)
    }

    fn load_latest(&self, subject: &SubjectId) -> Result<Option<VersionRecord>, StoreError> {
        (**self).load_latest(subject)
    }

    fn load_version(
        &self,
        subject: &SubjectId,
        version: &str,
    ) -> Result<Option<VersionRecord>, StoreError> {
        (**self).load_version(subject, version)
    }

    fn list(
        &self,
        subject: &SubjectId,
        filter: &HistoryFilter,
    ) -> Result<Page<VersionRecord>, StoreError> {
        (**self).list(subject, filter)
    }

    fn append_activity(&self, activity: &CollaboratorActivity) -> Result<(), StoreError> {
        (**self).append_activity(activity)
    }

    fn list_activity(
        &self,
        subject: &SubjectId,
        filter: &ActivityFilter,
    ) -> Result<Page<CollaboratorActivity>, StoreError> {
        (**self).list_activity(subject, filter)
    }
}

/// Reject `record` if its subject's head is not `expected_head` or its
/// version string is already taken.
pub(crate) fn check_write(
    record: &VersionRecord,
    expected_head: Option<&str>,
    current_head: Option<&str>,
    version_taken: bool,
) -> Result<(), StoreError> {
    if expected_head != current_head {
        return Err(StoreError::HeadMismatch {
            subject: record.subject_id.clone(),
            expected: expected_head.map(str::to_string),
            actual: current_head.map(str::to_string),
        });
    }
    if version_taken {
        return Err(StoreError::DuplicateVersion {
            subject: record.subject_id.clone(),
            version: record.version.clone(),
        });
    }
    Ok(())
}

/// Order insertion-ordered items newest first, then paginate.
///
/// Items with equal timestamps keep reverse insertion order.
pub(crate) fn newest_first<T>(
    mut items: Vec<T>,
    at: impl Fn(&T) -> DateTime<Utc>,
    offset: usize,
    limit: usize,
) -> Page<T> {
    items.reverse();
    items.sort_by_key(|item| std::cmp::Reverse(at(item)));
    Page::paginate(items, offset, limit)
}
