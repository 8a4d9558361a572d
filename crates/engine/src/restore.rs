//! Restore orchestration: derive new content from an earlier version.
//!
//! A restore validates its options, computes the restored content, takes
//! an optional backup snapshot of the current head, persists the restored
//! version, and finally notifies collaborators. Content is derived before
//! any write, so a rejected merge leaves no backup behind.

use chronicle_common::{
    ActivityAction, ActorId, Change, ChangeId, ChangeKind, ContentPath, LocationHint, SubjectId,
    UnknownVariant, VersionKind, VersionRecord,
};
use chronicle_kernel::{
    ConcurrentEdits, apply_selected, conflicting_paths, diff, merge_onto, payload_reference,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::engine::{CreateOptions, Engine};
use crate::error::{EngineError, ValidationError};
use crate::notify::RestoreNotification;

/// How restored content is derived from the current and target versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Target content verbatim.
    #[default]
    Overwrite,
    /// Target's paths applied onto current, keeping current-only paths.
    Merge,
    /// Only the selected paths are taken from target.
    Selective,
}

impl MergeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overwrite => "overwrite",
            Self::Merge => "merge",
            Self::Selective => "selective",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "merge" => Ok(Self::Merge),
            "selective" => Ok(Self::Selective),
            _ => Err(UnknownVariant {
                what: "merge strategy",
                value: s.to_string(),
            }),
        }
    }
}

/// What a merge does with conflicting paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolution {
    /// Target wins.
    #[default]
    Auto,
    /// Abort with the conflicting paths.
    Manual,
}

impl FromStr for ConflictResolution {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            _ => Err(UnknownVariant {
                what: "conflict resolution",
                value: s.to_string(),
            }),
        }
    }
}

/// Options for [`Engine::restore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOptions {
    pub target_version: String,
    /// Earlier versions are immutable and always kept; recorded on the
    /// restore change for callers that surface it.
    pub preserve_current: bool,
    pub create_backup: bool,
    pub merge_strategy: MergeStrategy,
    /// Paths copied by a selective restore, pointer (`/words`) or dotted
    /// (`content.words`) form.
    pub selected_paths: Vec<String>,
    pub conflict_resolution: ConflictResolution,
    pub notify_collaborators: bool,
    /// Paths edited concurrently, as known to the caller. Without them a
    /// merge never reports conflicts.
    pub concurrent_paths: Vec<String>,
    /// Defaults to `Restore version <target>`.
    pub title: Option<String>,
    pub session_id: Option<String>,
}

impl RestoreOptions {
    pub fn new(target_version: impl Into<String>) -> Self {
        Self {
            target_version: target_version.into(),
            preserve_current: true,
            create_backup: true,
            merge_strategy: MergeStrategy::default(),
            selected_paths: Vec::new(),
            conflict_resolution: ConflictResolution::default(),
            notify_collaborators: false,
            concurrent_paths: Vec::new(),
            title: None,
            session_id: None,
        }
    }
}

/// Result of a restore.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreOutcome {
    /// The new version carrying the restored content.
    pub restored: VersionRecord,
    /// Snapshot of the pre-restore head, when one was taken.
    pub backup: Option<VersionRecord>,
    /// Whether a collaborator notification was delivered.
    pub notified: bool,
}

impl Engine {
    /// Restore `subject` to the content of `options.target_version`.
    pub fn restore(
        &self,
        subject: &SubjectId,
        options: RestoreOptions,
        actor_id: &ActorId,
    ) -> Result<RestoreOutcome, EngineError> {
        let span = tracing::info_span!(
            "restore",
            subject = %subject,
            target = %options.target_version,
            strategy = %options.merge_strategy
        );
        let _enter = span.enter();

        let selected = parse_paths(&options.selected_paths)?;
        if options.merge_strategy == MergeStrategy::Selective && selected.is_empty() {
            return Err(ValidationError::EmptySelection.into());
        }
        let concurrent = ConcurrentEdits::new(parse_paths(&options.concurrent_paths)?);

        let lock = self.locks.for_subject(subject);
        let guard = lock.lock();

        let target = self.get_version(subject, &options.target_version)?;
        let current = self.store.load_latest(subject)?;
        let target_content = self.read_content(&target)?;
        let current_content = current.as_ref().map(|r| self.read_content(r)).transpose()?;

        let restored_content = match options.merge_strategy {
            MergeStrategy::Overwrite => target_content,
            MergeStrategy::Merge => match &current_content {
                Some(current_content) => {
                    let conflicts = conflicting_paths(&diff(current_content, &target_content), &concurrent);
                    if !conflicts.is_empty() {
                        if options.conflict_resolution == ConflictResolution::Manual {
                            tracing::info!(conflicts = conflicts.len(), "restore aborted on conflicts");
                            return Err(EngineError::Conflict { paths: conflicts });
                        }
                        tracing::debug!(conflicts = conflicts.len(), "resolving conflicts in favour of target");
                    }
                    merge_onto(current_content, &target_content)
                }
                None => target_content,
            },
            MergeStrategy::Selective => {
                let base = current_content
                    .clone()
                    .unwrap_or_else(|| Value::Object(Map::new()));
                apply_selected(&base, &target_content, &selected).map_err(ValidationError::from)?
            }
        };

        let backup = match (&current, &current_content) {
            (Some(head), Some(content)) if options.create_backup => {
                let now = self.clock.now();
                let backup = self.create_locked(
                    subject,
                    content,
                    CreateOptions {
                        kind: VersionKind::Snapshot,
                        title: Some(format!("Pre-restore backup - {}", now.to_rfc3339())),
                        description: Some(format!(
                            "Backup before restoring to version {}",
                            target.version
                        )),
                        session_id: options.session_id.clone(),
                        ..CreateOptions::new(actor_id.clone())
                    },
                    Some(head),
                    ActivityAction::CreateVersion,
                )?;
                tracing::info!(backup = %backup.version, "created pre-restore backup");
                Some(backup)
            }
            _ => None,
        };

        let change = self.restore_change(
            &options,
            &target,
            current.as_ref(),
            current_content.as_ref(),
            &restored_content,
            actor_id,
        );
        let restored = self.create_locked(
            subject,
            &restored_content,
            CreateOptions {
                kind: VersionKind::Manual,
                title: Some(
                    options
                        .title
                        .clone()
                        .unwrap_or_else(|| format!("Restore version {}", target.version)),
                ),
                description: Some(format!("Restored from version {}", target.version)),
                explicit_changes: Some(vec![change]),
                session_id: options.session_id.clone(),
                ..CreateOptions::new(actor_id.clone())
            },
            current.as_ref(),
            ActivityAction::RestoreVersion,
        )?;
        drop(guard);
        tracing::info!(
            version = %restored.version,
            parent = ?restored.parent_version,
            "restored version"
        );

        let notified = options.notify_collaborators
            && self.notify_restore(subject, &restored, &target.version, actor_id);
        Ok(RestoreOutcome {
            restored,
            backup,
            notified,
        })
    }

    fn restore_change(
        &self,
        options: &RestoreOptions,
        target: &VersionRecord,
        current: Option<&VersionRecord>,
        current_content: Option<&Value>,
        restored_content: &Value,
        actor_id: &ActorId,
    ) -> Change {
        let author = self.resolve_actor(actor_id);
        let description = match current {
            Some(current) => format!(
                "restored version {} onto version {} ({})",
                target.version, current.version, options.merge_strategy
            ),
            None => format!(
                "restored version {} ({})",
                target.version, options.merge_strategy
            ),
        };
        Change {
            id: ChangeId::new(),
            kind: ChangeKind::Restore,
            path: ContentPath::root().to_string(),
            old_value: current_content.map(payload_reference),
            new_value: Some(payload_reference(restored_content)),
            description,
            timestamp: self.clock.now(),
            actor_id: author.id,
            actor_name: author.display_name,
            location: Some(LocationHint {
                context: Some(format!(
                    "strategy={}; preserve_current={}",
                    options.merge_strategy, options.preserve_current
                )),
                ..LocationHint::default()
            }),
        }
    }

    /// Best effort: a failed delivery is logged and reported as `false`.
    fn notify_restore(
        &self,
        subject: &SubjectId,
        restored: &VersionRecord,
        target_version: &str,
        actor_id: &ActorId,
    ) -> bool {
        let Some(notifier) = &self.notifier else {
            tracing::debug!("no notifier configured, skipping collaborator notification");
            return false;
        };
        let event = RestoreNotification::new(&restored.version, target_version, actor_id);
        match notifier.notify(subject, &event) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    subject = %subject,
                    version = %restored.version,
                    error = %err,
                    "collaborator notification failed"
                );
                false
            }
        }
    }
}

fn parse_paths(raw: &[String]) -> Result<Vec<ContentPath>, ValidationError> {
    raw.iter()
        .map(|path| {
            ContentPath::parse(path).map_err(|source| ValidationError::InvalidPath {
                path: path.clone(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingNotifier, ada, engine};
    use chronicle_common::{ActivityFilter, HistoryFilter};
    use serde_json::json;
    use std::sync::Arc;

    fn subject() -> SubjectId {
        SubjectId::new("game-1")
    }

    fn create(engine: &Engine, content: Value, kind: VersionKind) -> VersionRecord {
        engine
            .create_version(
                &subject(),
                &content,
                CreateOptions {
                    kind,
                    ..CreateOptions::new(ada())
                },
            )
            .unwrap()
    }

    fn seed(engine: &Engine) {
        create(
            engine,
            json!({"title": "Original", "words": ["hello", "world"]}),
            VersionKind::Auto,
        );
        create(
            engine,
            json!({"title": "Changed", "words": ["hello", "world", "game"]}),
            VersionKind::Minor,
        );
    }

    #[test]
    fn overwrite_with_backup() {
        let (engine, _) = engine();
        seed(&engine);

        let outcome = engine
            .restore(&subject(), RestoreOptions::new("1.0.0"), &ada())
            .unwrap();

        let restored = &outcome.restored;
        assert_eq!(restored.version, "1.1.1");
        assert_eq!(restored.kind, VersionKind::Manual);
        assert_eq!(restored.parent_version.as_deref(), Some("1.1.0"));
        assert_eq!(restored.title, "Restore version 1.0.0");
        assert_eq!(
            restored.description.as_deref(),
            Some("Restored from version 1.0.0")
        );
        assert_eq!(restored.changes.len(), 1);
        assert_eq!(restored.changes[0].kind, ChangeKind::Restore);
        assert_eq!(
            engine.read_content(restored).unwrap(),
            json!({"title": "Original", "words": ["hello", "world"]})
        );

        let backup = outcome.backup.unwrap();
        assert_eq!(backup.kind, VersionKind::Snapshot);
        assert!(backup.version.starts_with("1.1.0-snapshot-"));
        assert!(backup.title.starts_with("Pre-restore backup - "));
        assert_eq!(
            backup.description.as_deref(),
            Some("Backup before restoring to version 1.0.0")
        );
        assert_eq!(
            engine.read_content(&backup).unwrap(),
            json!({"title": "Changed", "words": ["hello", "world", "game"]})
        );
        assert!(backup.created_at < restored.created_at);
        assert!(!outcome.notified);

        let history = engine
            .list_versions(&subject(), HistoryFilter::default())
            .unwrap();
        assert_eq!(history.total, 4);
        assert_eq!(history.versions[0].version, "1.1.1");
        assert_eq!(history.versions[1].version, backup.version);

        let feed = engine
            .list_activity(&subject(), ActivityFilter::default())
            .unwrap();
        assert_eq!(feed.activities[0].action, ActivityAction::RestoreVersion);
        assert_eq!(feed.activities[1].action, ActivityAction::CreateVersion);
    }

    #[test]
    fn restore_without_backup() {
        let (engine, store) = engine();
        seed(&engine);
        let outcome = engine
            .restore(
                &subject(),
                RestoreOptions {
                    create_backup: false,
                    ..RestoreOptions::new("1.0.0")
                },
                &ada(),
            )
            .unwrap();
        assert!(outcome.backup.is_none());
        assert_eq!(store.record_count(&subject()), 3);
    }

    #[test]
    fn selective_keeps_unselected_fields() {
        let (engine, _) = engine();
        seed(&engine);
        let outcome = engine
            .restore(
                &subject(),
                RestoreOptions {
                    merge_strategy: MergeStrategy::Selective,
                    selected_paths: vec!["words".into()],
                    ..RestoreOptions::new("1.0.0")
                },
                &ada(),
            )
            .unwrap();
        assert_eq!(
            engine.read_content(&outcome.restored).unwrap(),
            json!({"title": "Changed", "words": ["hello", "world"]})
        );
    }

    #[test]
    fn selective_without_paths_is_rejected_before_writing() {
        let (engine, store) = engine();
        seed(&engine);
        let err = engine
            .restore(
                &subject(),
                RestoreOptions {
                    merge_strategy: MergeStrategy::Selective,
                    ..RestoreOptions::new("1.0.0")
                },
                &ada(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::EmptySelection)
        ));
        assert_eq!(store.record_count(&subject()), 2);
    }

    #[test]
    fn invalid_selected_path_is_a_validation_error() {
        let (engine, _) = engine();
        seed(&engine);
        let err = engine
            .restore(
                &subject(),
                RestoreOptions {
                    merge_strategy: MergeStrategy::Selective,
                    selected_paths: vec!["a..b".into()],
                    ..RestoreOptions::new("1.0.0")
                },
                &ada(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::InvalidPath { .. })
        ));
    }

    #[test]
    fn merge_keeps_current_only_paths() {
        let (engine, _) = engine();
        create(&engine, json!({"title": "Original", "timer": 30}), VersionKind::Auto);
        create(
            &engine,
            json!({"title": "Changed", "timer": 60, "shuffle": true}),
            VersionKind::Auto,
        );
        let outcome = engine
            .restore(
                &subject(),
                RestoreOptions {
                    merge_strategy: MergeStrategy::Merge,
                    ..RestoreOptions::new("1.0.0")
                },
                &ada(),
            )
            .unwrap();
        assert_eq!(
            engine.read_content(&outcome.restored).unwrap(),
            json!({"title": "Original", "timer": 30, "shuffle": true})
        );
    }

    #[test]
    fn manual_merge_reports_conflicts_without_writing() {
        let (engine, store) = engine();
        create(&engine, json!({"timer": 30, "title": "a"}), VersionKind::Auto);
        create(&engine, json!({"timer": "thirty", "title": "b"}), VersionKind::Auto);

        let options = RestoreOptions {
            merge_strategy: MergeStrategy::Merge,
            conflict_resolution: ConflictResolution::Manual,
            concurrent_paths: vec!["/timer".into()],
            ..RestoreOptions::new("1.0.0")
        };
        match engine.restore(&subject(), options.clone(), &ada()) {
            Err(EngineError::Conflict { paths }) => assert_eq!(paths, vec!["/timer"]),
            other => panic!("expected Conflict, got {other:?}"),
        }
        assert_eq!(store.record_count(&subject()), 2);

        let auto = engine
            .restore(
                &subject(),
                RestoreOptions {
                    conflict_resolution: ConflictResolution::Auto,
                    ..options
                },
                &ada(),
            )
            .unwrap();
        assert_eq!(
            engine.read_content(&auto.restored).unwrap(),
            json!({"timer": 30, "title": "a"})
        );
    }

    #[test]
    fn manual_merge_without_concurrent_info_never_conflicts() {
        let (engine, _) = engine();
        create(&engine, json!({"timer": 30}), VersionKind::Auto);
        create(&engine, json!({"timer": "thirty"}), VersionKind::Auto);
        let outcome = engine.restore(
            &subject(),
            RestoreOptions {
                merge_strategy: MergeStrategy::Merge,
                conflict_resolution: ConflictResolution::Manual,
                ..RestoreOptions::new("1.0.0")
            },
            &ada(),
        );
        assert!(outcome.is_ok());
    }

    #[test]
    fn unknown_target_is_not_found() {
        let (engine, _) = engine();
        seed(&engine);
        assert!(matches!(
            engine.restore(&subject(), RestoreOptions::new("3.0.0"), &ada()),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn snapshot_versions_can_be_restored() {
        let (engine, _) = engine();
        seed(&engine);
        let first = engine
            .restore(&subject(), RestoreOptions::new("1.0.0"), &ada())
            .unwrap();
        let backup = first.backup.unwrap();
        let second = engine
            .restore(
                &subject(),
                RestoreOptions {
                    create_backup: false,
                    ..RestoreOptions::new(backup.version.clone())
                },
                &ada(),
            )
            .unwrap();
        assert_eq!(second.restored.version, "1.1.2");
        assert_eq!(
            engine.read_content(&second.restored).unwrap(),
            json!({"title": "Changed", "words": ["hello", "world", "game"]})
        );
    }

    #[test]
    fn collaborators_are_notified() {
        let (engine, _) = engine();
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = engine.with_notifier(notifier.clone());
        seed(&engine);
        let outcome = engine
            .restore(
                &subject(),
                RestoreOptions {
                    notify_collaborators: true,
                    ..RestoreOptions::new("1.0.0")
                },
                &ada(),
            )
            .unwrap();
        assert!(outcome.notified);
        let events = notifier.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, subject());
        assert_eq!(
            events[0].1,
            RestoreNotification::new("1.1.1", "1.0.0", &ada())
        );
    }

    #[test]
    fn notification_failure_does_not_undo_the_restore() {
        let (engine, _) = engine();
        let engine = engine.with_notifier(Arc::new(RecordingNotifier::failing()));
        seed(&engine);
        let outcome = engine
            .restore(
                &subject(),
                RestoreOptions {
                    notify_collaborators: true,
                    ..RestoreOptions::new("1.0.0")
                },
                &ada(),
            )
            .unwrap();
        assert!(!outcome.notified);
        assert_eq!(
            engine.latest(&subject()).unwrap().unwrap().version,
            outcome.restored.version
        );
    }

    #[test]
    fn strategy_names_parse() {
        assert_eq!("Merge".parse::<MergeStrategy>().unwrap(), MergeStrategy::Merge);
        assert_eq!(
            "manual".parse::<ConflictResolution>().unwrap(),
            ConflictResolution::Manual
        );
        assert!("rebase".parse::<MergeStrategy>().is_err());
    }
}
