use chrono::{DateTime, Duration, TimeZone, Utc};
use chronicle_codec::ContentCodec;
use chronicle_common::{
    ActivityAction, ActorId, ActorInfo, CollaboratorActivity, ContentMetadata, SubjectId,
    VersionId, VersionKind, VersionRecord,
};
use serde_json::json;

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
}

pub(crate) fn record(version: &str, kind: VersionKind, secs: i64) -> VersionRecord {
    let content = ContentCodec::default()
        .encode(&json!({"title": "Quiz", "version": version}))
        .unwrap();
    VersionRecord {
        id: VersionId::new(),
        subject_id: SubjectId::new("game-1"),
        version: version.to_string(),
        kind,
        title: format!("Version {version}"),
        description: None,
        metadata: ContentMetadata::from(&content),
        content,
        changes: Vec::new(),
        author: ActorInfo::placeholder(&ActorId::new("ada")),
        created_at: at(secs),
        tags: Default::default(),
        is_stable: kind.is_stable(),
        parent_version: None,
        branch_name: "main".to_string(),
    }
}

pub(crate) fn activity(actor: &str, secs: i64) -> CollaboratorActivity {
    CollaboratorActivity {
        subject_id: SubjectId::new("game-1"),
        actor_id: ActorId::new(actor),
        actor_name: actor.to_string(),
        actor_avatar: None,
        action: ActivityAction::CreateVersion,
        timestamp: at(secs),
        version_id: VersionId::new(),
        version: "1.0.0".to_string(),
        changes: Vec::new(),
        session_id: "session-1".to_string(),
    }
}
