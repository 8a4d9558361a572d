//! Structural locators inside a JSON-like payload.
//!
//! Paths render as JSON pointers (`/words/2`, root is `/`). Parsing also
//! accepts the dotted form (`content.words`) callers tend to type by hand.
//! An empty key renders as `~2` so it never collides with the root.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors from parsing a path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("invalid escape sequence in path segment {segment:?}")]
    InvalidEscape { segment: String },
    #[error("path {path:?} contains an empty segment")]
    EmptySegment { path: String },
}

/// A sequence of object keys or list indices, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentPath {
    segments: Vec<String>,
}

impl ContentPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a JSON pointer (`/a/b`) or a dotted path (`a.b`).
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        if raw == "/" {
            return Ok(Self::root());
        }
        if let Some(pointer) = raw.strip_prefix('/') {
            if pointer.split('/').any(str::is_empty) {
                return Err(PathError::EmptySegment {
                    path: raw.to_string(),
                });
            }
            let segments = pointer
                .split('/')
                .map(unescape)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Self { segments });
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PathError::EmptySegment {
                path: raw.to_string(),
            });
        }
        Ok(Self { segments })
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn index(&self, index: usize) -> Self {
        self.child(index.to_string())
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn starts_with(&self, prefix: &ContentPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// True when one path is an ancestor of (or equal to) the other.
    pub fn overlaps(&self, other: &ContentPath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }

    /// Classification label derived from the top-level segment.
    ///
    /// A leading `content` wrapper is skipped so that `content.words` and
    /// `words` both classify as `words`.
    pub fn category(&self) -> String {
        match self.segments.as_slice() {
            [] => "root".to_string(),
            [first, second, ..] if first == "content" => second.clone(),
            [first, ..] => first.clone(),
        }
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            if segment.is_empty() {
                f.write_str("/")?;
                f.write_str(EMPTY_SEGMENT)?;
            } else {
                write!(f, "/{}", segment.replace('~', "~0").replace('/', "~1"))?;
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for ContentPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentPath> for String {
    fn from(path: ContentPath) -> Self {
        path.to_string()
    }
}

const EMPTY_SEGMENT: &str = "~2";

fn unescape(segment: &str) -> Result<String, PathError> {
    if segment == EMPTY_SEGMENT {
        return Ok(String::new());
    }
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(PathError::InvalidEscape {
                    segment: segment.to_string(),
                });
            }
        }
    }
    Ok(out)
}
