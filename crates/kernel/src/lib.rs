//! Versioning kernel: the pure algorithms behind the engine.
//!
//! # Invariants
//! - Every function here is a deterministic function of its inputs
//!   (timestamps are passed in, never read).
//! - No content change is ever silently undetected: the change detector
//!   always falls back to a root-level update.

pub mod detector;
pub mod diff;
pub mod merge;
pub mod numbering;

pub use detector::{ChangeGranularity, detect_changes, payload_reference};
pub use diff::{ConcurrentEdits, compare, conflicting_paths, diff, similarity_score};
pub use merge::{ApplyError, apply_selected, get_path, merge_onto, remove_path, set_path};
pub use numbering::{VersionFormatError, VersionNumber, next_version};
