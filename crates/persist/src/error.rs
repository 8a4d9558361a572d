use chronicle_common::SubjectId;

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("integrity check failed for {file}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("head of {subject} moved: expected {expected:?}, found {actual:?}")]
    HeadMismatch {
        subject: SubjectId,
        expected: Option<String>,
        actual: Option<String>,
    },
    #[error("version {version} of {subject} already exists")]
    DuplicateVersion { subject: SubjectId, version: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
