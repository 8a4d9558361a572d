use chronicle_codec::CodecError;
use chronicle_common::{PathError, SubjectId};
use chronicle_kernel::{ApplyError, VersionFormatError};
use chronicle_persist::StoreError;

/// Input rejected before anything is read or written.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("selective restore requires at least one selected path")]
    EmptySelection,
    #[error("invalid path {path:?}: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: PathError,
    },
    #[error("cannot apply selected path: {0}")]
    Apply(#[from] ApplyError),
    #[error("cannot snapshot {subject}: it has no version yet")]
    SnapshotWithoutBase { subject: SubjectId },
}

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid version format: {version:?}")]
    InvalidVersionFormat { version: String },
    #[error("version {version} of {subject} not found")]
    NotFound { subject: SubjectId, version: String },
    #[error("integrity check failed for {subject}@{version}: expected {expected}, got {actual}")]
    Integrity {
        subject: SubjectId,
        version: String,
        expected: String,
        actual: String,
    },
    #[error("unresolved conflicts at {}", .paths.join(", "))]
    Conflict { paths: Vec<String> },
    #[error("{subject} was modified concurrently: expected head {expected:?}, found {actual:?}")]
    ConcurrentModification {
        subject: SubjectId,
        expected: Option<String>,
        actual: Option<String>,
    },
    #[error("storage error: {0}")]
    Storage(StoreError),
    #[error("content encoding error: {0}")]
    Codec(CodecError),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl EngineError {
    /// Whether reloading and retrying the call can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. } | Self::Conflict { .. })
    }

    /// Map a decode failure of `subject@version`.
    pub(crate) fn from_decode(subject: &SubjectId, version: &str, err: CodecError) -> Self {
        match err {
            CodecError::Integrity { expected, actual } => Self::Integrity {
                subject: subject.clone(),
                version: version.to_string(),
                expected,
                actual,
            },
            CodecError::SizeMismatch { expected, actual } => Self::Integrity {
                subject: subject.clone(),
                version: version.to_string(),
                expected: format!("{expected} bytes"),
                actual: format!("{actual} bytes"),
            },
            other => Self::Codec(other),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::HeadMismatch {
                subject,
                expected,
                actual,
            } => Self::ConcurrentModification {
                subject,
                expected,
                actual,
            },
            other => Self::Storage(other),
        }
    }
}

impl From<VersionFormatError> for EngineError {
    fn from(err: VersionFormatError) -> Self {
        Self::InvalidVersionFormat {
            version: err.version,
        }
    }
}
