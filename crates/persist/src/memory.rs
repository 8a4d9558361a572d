//! In-memory content store.

use chronicle_common::{
    ActivityFilter, CollaboratorActivity, HistoryFilter, Page, SubjectId, VersionRecord,
};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::{ContentStore, StoreError, check_write, newest_first};

#[derive(Debug, Default)]
struct SubjectLog {
    /// Insertion order.
    records: Vec<VersionRecord>,
    /// Index into `records` of the newest non-snapshot record.
    head: Option<usize>,
    activities: Vec<CollaboratorActivity>,
}

impl SubjectLog {
    fn head(&self) -> Option<&VersionRecord> {
        self.head.and_then(|i| self.records.get(i))
    }
}

/// Keeps every subject's records and activities in memory. Lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    subjects: RwLock<HashMap<SubjectId, SubjectLog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored for `subject`, snapshots included.
    pub fn record_count(&self, subject: &SubjectId) -> usize {
        self.subjects
            .read()
            .get(subject)
            .map_or(0, |log| log.records.len())
    }
}

impl ContentStore for MemoryStore {
    fn save(&self, record: &VersionRecord, expected_head: Option<&str>) -> Result<(), StoreError> {
        let mut subjects = self.subjects.write();
        let log = subjects.entry(record.subject_id.clone()).or_default();
        check_write(
            record,
            expected_head,
            log.head().map(|r| r.version.as_str()),
            log.records.iter().any(|r| r.version == record.version),
        )?;
        log.records.push(record.clone());
        if !record.is_snapshot() {
            log.head = Some(log.records.len() - 1);
        }
        tracing::debug!(
            subject = %record.subject_id,
            version = %record.version,
            "stored version in memory"
        );
        Ok(())
    }

    fn load_latest(&self, subject: &SubjectId) -> Result<Option<VersionRecord>, StoreError> {
        Ok(self
            .subjects
            .read()
            .get(subject)
            .and_then(|log| log.head().cloned()))
    }

    fn load_version(
        &self,
        subject: &SubjectId,
        version: &str,
    ) -> Result<Option<VersionRecord>, StoreError> {
        Ok(self.subjects.read().get(subject).and_then(|log| {
            log.records
                .iter()
                .find(|r| r.version == version)
                .cloned()
        }))
    }

    fn list(
        &self,
        subject: &SubjectId,
        filter: &HistoryFilter,
    ) -> Result<Page<VersionRecord>, StoreError> {
        let matches: Vec<VersionRecord> = self
            .subjects
            .read()
            .get(subject)
            .map(|log| {
                log.records
                    .iter()
                    .filter(|r| filter.matches(r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(newest_first(
            matches,
            |r| r.created_at,
            filter.offset,
            filter.limit,
        ))
    }

    fn append_activity(&self, activity: &CollaboratorActivity) -> Result<(), StoreError> {
        self.subjects
            .write()
            .entry(activity.subject_id.clone())
            .or_default()
            .activities
            .push(activity.clone());
        Ok(())
    }

    fn list_activity(
        &self,
        subject: &SubjectId,
        filter: &ActivityFilter,
    ) -> Result<Page<CollaboratorActivity>, StoreError> {
        let matches: Vec<CollaboratorActivity> = self
            .subjects
            .read()
            .get(subject)
            .map(|log| {
                log.activities
                    .iter()
                    .filter(|a| filter.matches(a))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(newest_first(
            matches,
            |a| a.timestamp,
            filter.offset,
            filter.limit,
        ))
    }
}
