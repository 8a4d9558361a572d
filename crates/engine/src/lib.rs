//! Content versioning engine.
//!
//! Snapshots structured content per subject, records what changed,
//! compares any two versions, and restores earlier content under a merge
//! strategy. Collaborators (store, identity lookup, notifier) are injected;
//! the engine itself keeps no state between calls beyond per-subject locks.
//!
//! # Invariants
//! - A persisted version is never mutated; corrections are new versions.
//! - create and restore are serialized per subject, and the store rejects
//!   a write whose observed head has moved.
//! - Identity lookup failure is the only locally recovered error.

mod config;
mod engine;
mod error;
mod identity;
mod locks;
mod notify;
mod restore;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, EngineConfig};
pub use engine::{ActivityFeed, CreateOptions, Engine, VersionHistory};
pub use error::{EngineError, ValidationError};
pub use identity::{IdentityError, IdentityLookup, StaticDirectory};
pub use notify::{NotifyError, Notifier, RestoreNotification, TracingNotifier};
pub use restore::{ConflictResolution, MergeStrategy, RestoreOptions, RestoreOutcome};
