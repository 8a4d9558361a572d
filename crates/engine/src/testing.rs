use chrono::{Duration, TimeZone, Utc};
use chronicle_common::{
    ActivityFilter, ActorId, ActorInfo, CollaboratorActivity, HistoryFilter, ManualClock, Page,
    SubjectId, VersionRecord,
};
use chronicle_persist::{ContentStore, MemoryStore, StoreError};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::engine::Engine;
use crate::identity::{IdentityError, IdentityLookup, StaticDirectory};
use crate::notify::{Notifier, NotifyError, RestoreNotification};

pub(crate) fn ada() -> ActorId {
    ActorId::new("ada")
}

pub(crate) fn directory() -> Arc<StaticDirectory> {
    Arc::new(StaticDirectory::from_actors([ActorInfo {
        id: ada(),
        display_name: "Ada Lovelace".into(),
        email: "ada@example.com".into(),
        avatar_url: Some("https://example.com/ada.png".into()),
    }]))
}

pub(crate) fn engine_with(
    store: Arc<dyn ContentStore>,
    identity: Arc<dyn IdentityLookup>,
) -> Engine {
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    Engine::new(store, identity).with_clock(Arc::new(ManualClock::new(
        start,
        Duration::seconds(1),
    )))
}

pub(crate) fn engine() -> (Engine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (engine_with(store.clone(), directory()), store)
}

pub(crate) struct FailingIdentity;

impl IdentityLookup for FailingIdentity {
    fn resolve(&self, _actor: &ActorId) -> Result<ActorInfo, IdentityError> {
        Err(IdentityError::Unavailable("directory offline".into()))
    }
}

/// Reads succeed on an empty store; every write fails.
pub(crate) struct FailingStore;

impl ContentStore for FailingStore {
    fn save(&self, _record: &VersionRecord, _expected: Option<&str>) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".into()))
    }

    fn load_latest(&self, _subject: &SubjectId) -> Result<Option<VersionRecord>, StoreError> {
        Ok(None)
    }

    fn load_version(
        &self,
        _subject: &SubjectId,
        _version: &str,
    ) -> Result<Option<VersionRecord>, StoreError> {
        Ok(None)
    }

    fn list(
        &self,
        _subject: &SubjectId,
        filter: &HistoryFilter,
    ) -> Result<Page<VersionRecord>, StoreError> {
        Ok(Page::paginate(Vec::new(), filter.offset, filter.limit))
    }

    fn append_activity(&self, _activity: &CollaboratorActivity) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".into()))
    }

    fn list_activity(
        &self,
        _subject: &SubjectId,
        filter: &ActivityFilter,
    ) -> Result<Page<CollaboratorActivity>, StoreError> {
        Ok(Page::paginate(Vec::new(), filter.offset, filter.limit))
    }
}

/// Memory store whose head can be pinned, simulating a reader that saw
/// an older head than the one being written against.
#[derive(Default)]
pub(crate) struct StaleHeadStore {
    inner: MemoryStore,
    frozen: Mutex<Option<VersionRecord>>,
}

impl StaleHeadStore {
    pub(crate) fn freeze_head(&self) {
        let head = self
            .inner
            .load_latest(&SubjectId::new("game-1"))
            .unwrap();
        *self.frozen.lock() = head;
    }
}

impl ContentStore for StaleHeadStore {
    fn save(&self, record: &VersionRecord, expected: Option<&str>) -> Result<(), StoreError> {
        self.inner.save(record, expected)
    }

    fn load_latest(&self, subject: &SubjectId) -> Result<Option<VersionRecord>, StoreError> {
        match self.frozen.lock().clone() {
            Some(head) => Ok(Some(head)),
            None => self.inner.load_latest(subject),
        }
    }

    fn load_version(
        &self,
        subject: &SubjectId,
        version: &str,
    ) -> Result<Option<VersionRecord>, StoreError> {
        self.inner.load_version(subject, version)
    }

    fn list(
        &self,
        subject: &SubjectId,
        filter: &HistoryFilter,
    ) -> Result<Page<VersionRecord>, StoreError> {
        self.inner.list(subject, filter)
    }

    fn append_activity(&self, activity: &CollaboratorActivity) -> Result<(), StoreError> {
        self.inner.append_activity(activity)
    }

    fn list_activity(
        &self,
        subject: &SubjectId,
        filter: &ActivityFilter,
    ) -> Result<Page<CollaboratorActivity>, StoreError> {
        self.inner.list_activity(subject, filter)
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    events: Mutex<Vec<(SubjectId, RestoreNotification)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn events(&self) -> Vec<(SubjectId, RestoreNotification)> {
        self.events.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, subject: &SubjectId, event: &RestoreNotification) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Delivery("mail relay refused".into()));
        }
        self.events.lock().push((subject.clone(), event.clone()));
        Ok(())
    }
}
