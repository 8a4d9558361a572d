//! Shared types for the chronicle versioning engine.
//!
//! # Invariants
//! - A `VersionRecord` is immutable once persisted; corrections are new records.
//! - `VersionRecord::metadata.checksum` always matches `content.checksum`.

pub mod clock;
pub mod filter;
pub mod path;
pub mod record;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use filter::{ActivityFilter, DEFAULT_PAGE_LIMIT, HistoryFilter, Page};
pub use path::{ContentPath, PathError};
pub use record::{
    ActivityAction, ActorInfo, Change, CollaboratorActivity, Compression, ContentMetadata,
    DiffSummary, Difference, EncodedContent, Encoding, LineNumbers, LocationHint,
    VersionComparison, VersionRecord,
};
pub use types::{
    ActorId, ChangeId, ChangeKind, DiffKind, Severity, SubjectId, UnknownVariant, VersionId,
    VersionKind,
};

/// Branch every record lands on unless configured otherwise.
pub const DEFAULT_BRANCH: &str = "main";
