use chrono::{DateTime, Utc};
use chronicle_common::VersionKind;
use std::cmp::Ordering;
use std::fmt;

const SNAPSHOT_MARKER: &str = "-snapshot-";

/// A version string that is not `MAJOR.MINOR.PATCH` with non-negative integers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version format: {version:?} (expected MAJOR.MINOR.PATCH)")]
pub struct VersionFormatError {
    pub version: String,
}

/// Parsed semantic version, optionally carrying a snapshot timestamp.
///
/// Snapshots order before the release with the same triple and among
/// themselves by timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionNumber {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub snapshot: Option<i64>,
}

impl VersionNumber {
    /// First version of every subject.
    pub const INITIAL: Self = Self {
        major: 1,
        minor: 0,
        patch: 0,
        snapshot: None,
    };

    pub fn parse(raw: &str) -> Result<Self, VersionFormatError> {
        let invalid = || VersionFormatError {
            version: raw.to_string(),
        };
        let (core, snapshot) = match raw.split_once(SNAPSHOT_MARKER) {
            Some((core, millis)) => {
                if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                (core, Some(millis.parse::<i64>().map_err(|_| invalid())?))
            }
            None => (raw, None),
        };
        let mut parts = core.split('.');
        let (Some(major), Some(minor), Some(patch), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        Ok(Self {
            major: parse_component(major).ok_or_else(invalid)?,
            minor: parse_component(minor).ok_or_else(invalid)?,
            patch: parse_component(patch).ok_or_else(invalid)?,
            snapshot,
        })
    }

    pub fn is_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// The same triple without a snapshot suffix.
    pub fn release(&self) -> Self {
        Self {
            snapshot: None,
            ..*self
        }
    }

    /// Derive the successor for `kind`. Returns `None` on numeric overflow.
    pub fn bump(&self, kind: VersionKind, now: DateTime<Utc>) -> Option<Self> {
        let base = self.release();
        Some(match kind {
            VersionKind::Major => Self {
                major: base.major.checked_add(1)?,
                minor: 0,
                patch: 0,
                snapshot: None,
            },
            VersionKind::Minor => Self {
                minor: base.minor.checked_add(1)?,
                patch: 0,
                ..base
            },
            VersionKind::Patch | VersionKind::Auto | VersionKind::Manual => Self {
                patch: base.patch.checked_add(1)?,
                ..base
            },
            VersionKind::Snapshot => Self {
                snapshot: Some(now.timestamp_millis()),
                ..base
            },
        })
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(millis) = self.snapshot {
            write!(f, "{SNAPSHOT_MARKER}{millis}")?;
        }
        Ok(())
    }
}

impl Ord for VersionNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.snapshot, other.snapshot) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(&b),
            })
    }
}

impl PartialOrd for VersionNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Next version string after `previous` for the requested bump.
///
/// `previous` must be a release version; snapshot versions are never a
/// numbering base. No previous version yields `1.0.0`.
pub fn next_version(
    previous: Option<&str>,
    kind: VersionKind,
    now: DateTime<Utc>,
) -> Result<String, VersionFormatError> {
    let Some(previous) = previous else {
        return Ok(VersionNumber::INITIAL.to_string());
    };
    let parsed = VersionNumber::parse(previous)?;
    if parsed.is_snapshot() {
        return Err(VersionFormatError {
            version: previous.to_string(),
        });
    }
    parsed
        .bump(kind, now)
        .map(|next| next.to_string())
        .ok_or_else(|| VersionFormatError {
            version: previous.to_string(),
        })
}

/// Digits only, no sign, no leading zeros except a lone `0`.
fn parse_component(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if raw.len() > 1 && raw.starts_with('0') {
        return None;
    }
    raw.parse().ok()
}
