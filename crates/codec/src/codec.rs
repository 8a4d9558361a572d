use chronicle_common::{Compression, EncodedContent, Encoding};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

use crate::canonical::{canonicalize, to_canonical_bytes};

/// zstd level used unless configured otherwise.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Errors from encoding or decoding content.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("integrity check failed: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },
    #[error("decoded size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
}

/// Which encoding and compression new content is written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub encoding: Encoding,
    pub compression: Compression,
    pub zstd_level: i32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::Json,
            compression: Compression::None,
            zstd_level: DEFAULT_ZSTD_LEVEL,
        }
    }
}

/// Encodes payloads for storage and verifies them on the way back.
///
/// Decoding always follows the tags stored on the content, so records
/// written under a different configuration stay readable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentCodec {
    config: CodecConfig,
}

impl ContentCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Serialize canonically, compress, and checksum the stored bytes.
    pub fn encode(&self, payload: &Value) -> Result<EncodedContent, CodecError> {
        let serialized = match self.config.encoding {
            Encoding::Json => to_canonical_bytes(payload)?,
            Encoding::Cbor => cbor_serialize(&canonicalize(payload))?,
        };
        let size_bytes = serialized.len() as u64;
        let bytes = match self.config.compression {
            Compression::None => serialized,
            Compression::Zstd => zstd_compress(&serialized, self.config.zstd_level)?,
        };
        let checksum = sha256_hex(&bytes);
        tracing::trace!(
            encoding = %self.config.encoding,
            compression = %self.config.compression,
            size_bytes,
            stored_bytes = bytes.len(),
            "encoded content"
        );
        Ok(EncodedContent {
            bytes,
            checksum,
            size_bytes,
            compression: self.config.compression,
            encoding: self.config.encoding,
        })
    }

    /// Verify, decompress, and parse stored content.
    pub fn decode(&self, content: &EncodedContent) -> Result<Value, CodecError> {
        Self::verify(content)?;
        let serialized = match content.compression {
            Compression::None => content.bytes.clone(),
            Compression::Zstd => zstd_decompress(&content.bytes)?,
        };
        if serialized.len() as u64 != content.size_bytes {
            return Err(CodecError::SizeMismatch {
                expected: content.size_bytes,
                actual: serialized.len() as u64,
            });
        }
        match content.encoding {
            Encoding::Json => Ok(serde_json::from_slice(&serialized)?),
            Encoding::Cbor => cbor_deserialize(&serialized),
        }
    }

    /// Recompute the checksum of the stored bytes.
    pub fn verify(content: &EncodedContent) -> Result<(), CodecError> {
        let actual = sha256_hex(&content.bytes);
        if actual != content.checksum {
            tracing::error!(
                expected = %content.checksum,
                actual = %actual,
                "content checksum mismatch"
            );
            return Err(CodecError::Integrity {
                expected: content.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// Lowercase hex SHA-256.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn cbor_serialize(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CodecError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize(data: &[u8]) -> Result<Value, CodecError> {
    ciborium::from_reader(data).map_err(|e| CodecError::CborDecode(e.to_string()))
}

fn zstd_compress(data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), level)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}
