//! Content codec: turns opaque structured payloads into stored bytes and back.
//!
//! # Invariants
//! - Encoding is deterministic: equal payloads produce equal bytes and checksums.
//! - Decoding never returns a payload whose stored bytes fail the checksum.

mod canonical;
mod codec;

pub use canonical::{canonicalize, to_canonical_bytes};
pub use codec::{CodecConfig, CodecError, ContentCodec, DEFAULT_ZSTD_LEVEL, sha256_hex};
