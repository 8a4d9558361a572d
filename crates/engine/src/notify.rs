use chronicle_common::{ActorId, SubjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Event sent to collaborators after a restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreNotification {
    /// Always `version_restored`.
    pub action: String,
    /// The version the restore produced.
    pub version: String,
    pub target_version: String,
    pub actor_id: ActorId,
}

impl RestoreNotification {
    pub const ACTION: &'static str = "version_restored";

    pub fn new(version: &str, target_version: &str, actor_id: &ActorId) -> Self {
        Self {
            action: Self::ACTION.to_string(),
            version: version.to_string(),
            target_version: target_version.to_string(),
            actor_id: actor_id.clone(),
        }
    }
}

/// Best-effort delivery of restore events.
pub trait Notifier: Send + Sync {
    fn notify(&self, subject: &SubjectId, event: &RestoreNotification) -> Result<(), NotifyError>;
}

/// Emits notifications as log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, subject: &SubjectId, event: &RestoreNotification) -> Result<(), NotifyError> {
        tracing::info!(
            subject = %subject,
            action = %event.action,
            version = %event.version,
            target_version = %event.target_version,
            actor = %event.actor_id,
            "collaborator notification"
        );
        Ok(())
    }
}
