use chronicle_common::SubjectId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Idle entries are pruned once the map grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

/// One mutex per subject, created on first use.
#[derive(Debug, Default)]
pub(crate) struct SubjectLocks {
    locks: Mutex<HashMap<SubjectId, Arc<Mutex<()>>>>,
}

impl SubjectLocks {
    pub(crate) fn for_subject(&self, subject: &SubjectId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        if locks.len() >= PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        locks.entry(subject.clone()).or_default().clone()
    }
}
