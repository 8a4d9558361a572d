//! Change bookkeeping recorded on each new version.
//!
//! Coarse by default: a single root-level update. Finer granularities add
//! per-field or per-difference entries on top of that root entry, never
//! instead of it.

use chrono::{DateTime, Utc};
use chronicle_codec::{sha256_hex, to_canonical_bytes};
use chronicle_common::{
    ActorInfo, Change, ChangeId, ChangeKind, ContentPath, DiffKind, LocationHint, Severity,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::diff::diff;

/// How finely changes are broken down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeGranularity {
    /// Only the mandatory root-level update.
    #[default]
    Root,
    /// Root update plus one entry per changed top-level field.
    Fields,
    /// Root update plus one entry per structural difference.
    Deep,
}

/// Stable reference to a payload, stored instead of a full copy.
pub fn payload_reference(payload: &Value) -> Value {
    let digest = to_canonical_bytes(payload)
        .map(|bytes| sha256_hex(&bytes))
        .unwrap_or_default();
    Value::String(format!("sha256:{digest}"))
}

/// Changes between `old` and `new`, attributed to `actor`.
pub fn detect_changes(
    old: Option<&Value>,
    new: &Value,
    actor: &ActorInfo,
    granularity: ChangeGranularity,
    now: DateTime<Utc>,
) -> Vec<Change> {
    let make = |kind, path: String, old_value, new_value, description: String| Change {
        id: ChangeId::new(),
        kind,
        path,
        old_value,
        new_value,
        description,
        timestamp: now,
        actor_id: actor.id.clone(),
        actor_name: actor.display_name.clone(),
        location: None,
    };

    let Some(old) = old else {
        return vec![make(
            ChangeKind::Create,
            ContentPath::root().to_string(),
            None,
            Some(payload_reference(new)),
            "initial version".to_string(),
        )];
    };
    // serde_json compares objects by key set, not insertion order
    if old == new {
        return Vec::new();
    }

    let mut changes = vec![make(
        ChangeKind::Update,
        ContentPath::root().to_string(),
        Some(payload_reference(old)),
        Some(payload_reference(new)),
        "content updated".to_string(),
    )];

    match granularity {
        ChangeGranularity::Root => {}
        ChangeGranularity::Fields => {
            if let (Value::Object(old_map), Value::Object(new_map)) = (old, new) {
                for (kind, path, old_value, new_value, description) in
                    field_changes(old_map, new_map)
                {
                    changes.push(make(kind, path, old_value, new_value, description));
                }
            }
        }
        ChangeGranularity::Deep => {
            for difference in diff(old, new) {
                let kind = match difference.kind {
                    DiffKind::Addition => ChangeKind::Create,
                    DiffKind::Deletion => ChangeKind::Delete,
                    DiffKind::Modification => ChangeKind::Update,
                    DiffKind::Move => ChangeKind::Move,
                };
                let mut change = make(
                    kind,
                    difference.path,
                    difference.old_value,
                    difference.new_value,
                    difference.description,
                );
                if let Some(lines) = difference.line_numbers {
                    change.location = Some(LocationHint {
                        line_number: lines.new.or(lines.old).map(|n| n as u32),
                        impact: Some(impact_label(difference.severity).to_string()),
                        ..Default::default()
                    });
                }
                changes.push(change);
            }
        }
    }
    changes
}

fn impact_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
    }
}

type FieldChange = (ChangeKind, String, Option<Value>, Option<Value>, String);

/// Top-level field changes, recognising renames and copies.
///
/// An added key whose value equals a removed key's value is a rename; one
/// whose value equals an unchanged key's value is a copy.
fn field_changes(old: &Map<String, Value>, new: &Map<String, Value>) -> Vec<FieldChange> {
    let path = |key: &str| ContentPath::root().child(key).to_string();
    let mut removed: Vec<&String> = old.keys().filter(|k| !new.contains_key(*k)).collect();
    let mut out = Vec::new();

    for (key, new_value) in new {
        match old.get(key) {
            Some(old_value) if old_value != new_value => out.push((
                ChangeKind::Update,
                path(key),
                Some(old_value.clone()),
                Some(new_value.clone()),
                format!("updated field {key}"),
            )),
            Some(_) => {}
            None => {
                if let Some(pos) = removed.iter().position(|r| &old[*r] == new_value) {
                    let from = removed.remove(pos);
                    out.push((
                        ChangeKind::Rename,
                        path(key),
                        Some(Value::String(from.clone())),
                        Some(Value::String(key.clone())),
                        format!("renamed field {from} to {key}"),
                    ));
                } else if let Some(source) = old
                    .iter()
                    .find(|(k, v)| *v == new_value && new.get(*k) == Some(*v))
                    .map(|(k, _)| k)
                {
                    out.push((
                        ChangeKind::Copy,
                        path(key),
                        Some(Value::String(source.clone())),
                        Some(new_value.clone()),
                        format!("copied field {source} to {key}"),
                    ));
                } else {
                    out.push((
                        ChangeKind::Create,
                        path(key),
                        None,
                        Some(new_value.clone()),
                        format!("added field {key}"),
                    ));
                }
            }
        }
    }
    for key in removed {
        out.push((
            ChangeKind::Delete,
            path(key),
            Some(old[key].clone()),
            None,
            format!("removed field {key}"),
        ));
    }
    out
}
