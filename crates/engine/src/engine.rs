//! Version store façade, history query, comparison, and activity feed.

use chronicle_codec::ContentCodec;
use chronicle_common::{
    ActivityAction, ActivityFilter, ActorId, ActorInfo, Change, Clock, CollaboratorActivity,
    ContentMetadata, HistoryFilter, SubjectId, SystemClock, VersionComparison, VersionId,
    VersionKind, VersionRecord,
};
use chronicle_kernel::{ConcurrentEdits, VersionNumber, detect_changes, next_version};
use chronicle_persist::ContentStore;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{EngineError, ValidationError};
use crate::identity::IdentityLookup;
use crate::locks::SubjectLocks;
use crate::notify::Notifier;

/// Options for [`Engine::create_version`].
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub kind: VersionKind,
    /// Defaults to `Version <version>`.
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeSet<String>,
    pub actor_id: ActorId,
    /// Recorded verbatim instead of running change detection.
    pub explicit_changes: Option<Vec<Change>>,
    /// The head the caller based this content on. Checked against the
    /// current head; a mismatch is a concurrent modification.
    pub parent_version: Option<String>,
    pub branch_name: Option<String>,
    pub session_id: Option<String>,
}

impl CreateOptions {
    pub fn new(actor_id: ActorId) -> Self {
        Self {
            kind: VersionKind::default(),
            title: None,
            description: None,
            tags: BTreeSet::new(),
            actor_id,
            explicit_changes: None,
            parent_version: None,
            branch_name: None,
            session_id: None,
        }
    }
}

/// One page of version history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionHistory {
    pub versions: Vec<VersionRecord>,
    pub total: usize,
    pub has_more: bool,
}

/// One page of collaborator activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFeed {
    pub activities: Vec<CollaboratorActivity>,
    pub total: usize,
    pub has_more: bool,
}

/// The versioning engine. Cheap to share behind an `Arc`.
pub struct Engine {
    pub(crate) store: Arc<dyn ContentStore>,
    pub(crate) identity: Arc<dyn IdentityLookup>,
    pub(crate) notifier: Option<Arc<dyn Notifier>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: EngineConfig,
    pub(crate) codec: ContentCodec,
    pub(crate) locks: SubjectLocks,
}

impl Engine {
    pub fn new(store: Arc<dyn ContentStore>, identity: Arc<dyn IdentityLookup>) -> Self {
        let config = EngineConfig::default();
        Self {
            store,
            identity,
            notifier: None,
            clock: Arc::new(SystemClock),
            codec: ContentCodec::new(config.codec),
            config,
            locks: SubjectLocks::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.codec = ContentCodec::new(config.codec);
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Persist `content` as the next version of `subject`.
    pub fn create_version(
        &self,
        subject: &SubjectId,
        content: &Value,
        options: CreateOptions,
    ) -> Result<VersionRecord, EngineError> {
        let span = tracing::info_span!("create_version", subject = %subject, kind = %options.kind);
        let _enter = span.enter();

        let lock = self.locks.for_subject(subject);
        let _guard = lock.lock();
        let head = self.store.load_latest(subject)?;
        self.create_locked(
            subject,
            content,
            options,
            head.as_ref(),
            ActivityAction::CreateVersion,
        )
    }

    /// Create a version while the subject lock is held. `head` is the
    /// head observed under that lock.
    pub(crate) fn create_locked(
        &self,
        subject: &SubjectId,
        content: &Value,
        options: CreateOptions,
        head: Option<&VersionRecord>,
        action: ActivityAction,
    ) -> Result<VersionRecord, EngineError> {
        let CreateOptions {
            kind,
            title,
            description,
            tags,
            actor_id,
            explicit_changes,
            parent_version,
            branch_name,
            session_id,
        } = options;
        let observed = head.map(|r| r.version.as_str());

        if let Some(expected) = parent_version.as_deref() {
            if Some(expected) != observed {
                return Err(EngineError::ConcurrentModification {
                    subject: subject.clone(),
                    expected: Some(expected.to_string()),
                    actual: observed.map(str::to_string),
                });
            }
        }
        if kind == VersionKind::Snapshot && head.is_none() {
            return Err(ValidationError::SnapshotWithoutBase {
                subject: subject.clone(),
            }
            .into());
        }

        let now = self.clock.now();
        let version = next_version(observed, kind, now)?;
        let encoded = self.codec.encode(content).map_err(EngineError::Codec)?;
        let author = self.resolve_actor(&actor_id);
        let changes = match explicit_changes {
            Some(changes) => changes,
            None => {
                let previous = head.map(|r| self.read_content(r)).transpose()?;
                detect_changes(
                    previous.as_ref(),
                    content,
                    &author,
                    self.config.change_granularity,
                    now,
                )
            }
        };

        let record = VersionRecord {
            id: VersionId::new(),
            subject_id: subject.clone(),
            title: title.unwrap_or_else(|| format!("Version {version}")),
            version,
            kind,
            description,
            metadata: ContentMetadata::from(&encoded),
            content: encoded,
            changes,
            author,
            created_at: now,
            tags,
            is_stable: kind.is_stable(),
            parent_version: observed.map(str::to_string),
            branch_name: branch_name.unwrap_or_else(|| self.config.default_branch.clone()),
        };
        self.store.save(&record, observed)?;
        tracing::info!(
            subject = %subject,
            version = %record.version,
            kind = %record.kind,
            changes = record.changes.len(),
            size_bytes = record.metadata.size_bytes,
            "created version"
        );

        self.record_activity(&record, action, session_id);
        Ok(record)
    }

    /// The subject's head, if it has one.
    pub fn latest(&self, subject: &SubjectId) -> Result<Option<VersionRecord>, EngineError> {
        Ok(self.store.load_latest(subject)?)
    }

    pub fn get_version(
        &self,
        subject: &SubjectId,
        version: &str,
    ) -> Result<VersionRecord, EngineError> {
        VersionNumber::parse(version)?;
        self.store
            .load_version(subject, version)?
            .ok_or_else(|| EngineError::NotFound {
                subject: subject.clone(),
                version: version.to_string(),
            })
    }

    /// Decode a record's payload, verifying its checksum.
    pub fn read_content(&self, record: &VersionRecord) -> Result<Value, EngineError> {
        if record.metadata.checksum != record.content.checksum {
            tracing::error!(
                subject = %record.subject_id,
                version = %record.version,
                "metadata checksum disagrees with content"
            );
            return Err(EngineError::Integrity {
                subject: record.subject_id.clone(),
                version: record.version.clone(),
                expected: record.metadata.checksum.clone(),
                actual: record.content.checksum.clone(),
            });
        }
        self.codec
            .decode(&record.content)
            .map_err(|e| EngineError::from_decode(&record.subject_id, &record.version, e))
    }

    /// Versions of `subject`, newest first.
    pub fn list_versions(
        &self,
        subject: &SubjectId,
        filter: HistoryFilter,
    ) -> Result<VersionHistory, EngineError> {
        let limit = self.config.page_limit(filter.limit);
        let filter = HistoryFilter { limit, ..filter };
        let page = self.store.list(subject, &filter)?;
        Ok(VersionHistory {
            has_more: page.has_more(filter.offset, limit),
            total: page.total,
            versions: page.items,
        })
    }

    /// Collaborator activity on `subject`, newest first.
    pub fn list_activity(
        &self,
        subject: &SubjectId,
        filter: ActivityFilter,
    ) -> Result<ActivityFeed, EngineError> {
        let limit = self.config.page_limit(filter.limit);
        let filter = ActivityFilter { limit, ..filter };
        let page = self.store.list_activity(subject, &filter)?;
        Ok(ActivityFeed {
            has_more: page.has_more(filter.offset, limit),
            total: page.total,
            activities: page.items,
        })
    }

    /// Compare two stored versions of `subject`.
    ///
    /// Conflicts are only counted when `concurrent` edit information is given.
    pub fn compare(
        &self,
        subject: &SubjectId,
        source_version: &str,
        target_version: &str,
        concurrent: Option<&ConcurrentEdits>,
    ) -> Result<VersionComparison, EngineError> {
        let span = tracing::info_span!(
            "compare",
            subject = %subject,
            source = source_version,
            target = target_version
        );
        let _enter = span.enter();

        let source = self.get_version(subject, source_version)?;
        let target = self.get_version(subject, target_version)?;
        let comparison = chronicle_kernel::compare(
            &source.version,
            &target.version,
            &self.read_content(&source)?,
            &self.read_content(&target)?,
            concurrent,
        );
        tracing::info!(
            total_changes = comparison.summary.total_changes,
            conflict_count = comparison.conflict_count,
            similarity = comparison.similarity_score,
            "compared versions"
        );
        Ok(comparison)
    }

    /// Identity lookup never blocks versioning: failures fall back to a
    /// placeholder actor.
    pub(crate) fn resolve_actor(&self, actor: &ActorId) -> ActorInfo {
        match self.identity.resolve(actor) {
            Ok(info) => info,
            Err(err) => {
                tracing::warn!(actor = %actor, error = %err, "identity lookup failed, using placeholder");
                ActorInfo::placeholder(actor)
            }
        }
    }

    /// The record is already durable, so a failed append is logged rather
    /// than reported as a failed create.
    fn record_activity(
        &self,
        record: &VersionRecord,
        action: ActivityAction,
        session_id: Option<String>,
    ) {
        let activity = CollaboratorActivity {
            subject_id: record.subject_id.clone(),
            actor_id: record.author.id.clone(),
            actor_name: record.author.display_name.clone(),
            actor_avatar: record.author.avatar_url.clone(),
            action,
            timestamp: record.created_at,
            version_id: record.id,
            version: record.version.clone(),
            changes: record.changes.clone(),
            session_id: session_id.unwrap_or_else(new_session_id),
        };
        if let Err(err) = self.store.append_activity(&activity) {
            tracing::error!(
                subject = %record.subject_id,
                version = %record.version,
                action = %action,
                error = %err,
                "failed to append collaborator activity"
            );
        }
    }
}

fn new_session_id() -> String {
    format!("session_{}", uuid::Uuid::new_v4().simple())
}
