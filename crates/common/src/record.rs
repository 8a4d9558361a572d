use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

use crate::types::{
    ActorId, ChangeId, ChangeKind, DiffKind, Severity, SubjectId, VersionId, VersionKind,
};

/// Serialization format of an encoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Canonical JSON: sorted object keys, no whitespace, UTF-8.
    #[default]
    Json,
    /// CBOR via ciborium. Map keys are emitted in sorted order.
    Cbor,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Cbor => "cbor",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compression applied to the serialized payload before storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Zstd,
}

impl Compression {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Zstd => "zstd",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codec output: the exact stored bytes plus the tags needed to read them back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedContent {
    pub bytes: Vec<u8>,
    /// Lowercase hex SHA-256 of `bytes`.
    pub checksum: String,
    /// Length of the canonical serialized payload before compression.
    pub size_bytes: u64,
    pub compression: Compression,
    pub encoding: Encoding,
}

/// Descriptive metadata about a version's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    pub size_bytes: u64,
    pub checksum: String,
    pub compression_algorithm: Compression,
    pub encoding: Encoding,
}

impl From<&EncodedContent> for ContentMetadata {
    fn from(content: &EncodedContent) -> Self {
        Self {
            size_bytes: content.size_bytes,
            checksum: content.checksum.clone(),
            compression_algorithm: content.compression,
            encoding: content.encoding,
        }
    }
}

/// Display metadata for an actor, resolved once when a version is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorInfo {
    pub id: ActorId,
    pub display_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

impl ActorInfo {
    /// Stand-in used when the identity service cannot resolve an actor.
    pub fn placeholder(id: &ActorId) -> Self {
        Self {
            id: id.clone(),
            display_name: format!("Unknown user ({id})"),
            email: String::new(),
            avatar_url: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.email.is_empty() && self.display_name.starts_with("Unknown user")
    }
}

/// Optional positional hints attached to a change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationHint {
    pub line_number: Option<u32>,
    pub column_number: Option<u32>,
    pub context: Option<String>,
    pub impact: Option<String>,
}

/// One atomic edit attributed to a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub id: ChangeId,
    pub kind: ChangeKind,
    /// Structural locator within the content, JSON-pointer style.
    pub path: String,
    /// `None` is an absent value; `Some(Value::Null)` is an explicit null.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub new_value: Option<Value>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub actor_id: ActorId,
    pub actor_name: String,
    pub location: Option<LocationHint>,
}

/// Position of a list element on either side of a comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineNumbers {
    pub old: Option<usize>,
    pub new: Option<usize>,
}

/// One entry of a version comparison. Computed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Difference {
    pub kind: DiffKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    pub new_value: Option<Value>,
    pub description: String,
    pub severity: Severity,
    pub category: String,
    pub line_numbers: Option<LineNumbers>,
}

/// Count of differences by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub total_changes: usize,
    pub additions: usize,
    pub deletions: usize,
    pub modifications: usize,
    pub moves: usize,
}

impl DiffSummary {
    pub fn from_differences(differences: &[Difference]) -> Self {
        let mut summary = Self {
            total_changes: differences.len(),
            ..Self::default()
        };
        for diff in differences {
            match diff.kind {
                DiffKind::Addition => summary.additions += 1,
                DiffKind::Deletion => summary.deletions += 1,
                DiffKind::Modification => summary.modifications += 1,
                DiffKind::Move => summary.moves += 1,
            }
        }
        summary
    }
}

/// Result of comparing two payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionComparison {
    pub source_version: String,
    pub target_version: String,
    pub differences: Vec<Difference>,
    pub summary: DiffSummary,
    pub conflict_count: usize,
    /// In `[0, 1]`; `1.0` means identical.
    pub similarity_score: f64,
}

impl VersionComparison {
    pub fn is_identical(&self) -> bool {
        self.differences.is_empty()
    }
}

/// An immutable snapshot of a subject's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub id: VersionId,
    pub subject_id: SubjectId,
    /// `MAJOR.MINOR.PATCH`, optionally suffixed `-snapshot-<unix millis>`.
    pub version: String,
    pub kind: VersionKind,
    pub title: String,
    pub description: Option<String>,
    pub content: EncodedContent,
    pub metadata: ContentMetadata,
    pub changes: Vec<Change>,
    pub author: ActorInfo,
    pub created_at: DateTime<Utc>,
    pub tags: BTreeSet<String>,
    pub is_stable: bool,
    pub parent_version: Option<String>,
    pub branch_name: String,
}

impl VersionRecord {
    pub fn is_snapshot(&self) -> bool {
        self.kind == VersionKind::Snapshot
    }
}

/// What a collaborator did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    CreateVersion,
    RestoreVersion,
}

impl ActivityAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateVersion => "create_version",
            Self::RestoreVersion => "restore_version",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only log entry, one per version-affecting operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorActivity {
    pub subject_id: SubjectId,
    pub actor_id: ActorId,
    pub actor_name: String,
    pub actor_avatar: Option<String>,
    pub action: ActivityAction,
    pub timestamp: DateTime<Utc>,
    pub version_id: VersionId,
    pub version: String,
    pub changes: Vec<Change>,
    pub session_id: String,
}

/// A field that is present deserializes to `Some`, even when it is `null`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
