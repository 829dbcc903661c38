use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

/// Validated session identifier.
///
/// Upstream clients have been observed handing over the literal string
/// "undefined" (or nothing at all) as the session id, which previously
/// produced orphaned records that no lookup could ever match. All
/// construction paths go through [`SessionId::new`], which normalizes
/// null-ish input to the fixed default identifier, so the invalid id
/// space is unrepresentable past this boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// The identifier used when the caller supplies no usable id.
    pub const DEFAULT: &'static str = "default";

    /// Create a session id, normalizing invalid input.
    ///
    /// Empty, whitespace-only, `"undefined"`, and `"null"` all collapse
    /// to [`SessionId::DEFAULT`].
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "undefined" || trimmed == "null" {
            Self(Self::DEFAULT.to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Normalize an optional raw identifier (absent ⇒ default).
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw {
            Some(s) => Self::new(s),
            None => Self::default(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// One durable backup of a session directory.
///
/// Exactly one record per session id; each successful save fully
/// overwrites it. When `is_chunked` is set the payload lives in
/// [`ChunkRecord`]s and `payload` here is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    /// Archive bytes; empty when chunked.
    #[serde(with = "serde_bytes_base64", default)]
    pub payload: Vec<u8>,
    /// Hex SHA-256 of the full pre-chunking archive, never of a single chunk.
    pub checksum: String,
    /// Timestamp of the most recent successful save.
    pub created_at: DateTime<Utc>,
    /// Length in bytes of the original archive.
    pub size: u64,
    pub is_chunked: bool,
    /// Number of chunk records when chunked, else 1.
    pub chunk_count: u32,
}

/// One fixed-size segment of a chunked session archive.
///
/// `chunk_index` values for a session are exactly `0..chunk_count` with
/// no gaps; reassembly sorts ascending and concatenates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub session_id: SessionId,
    pub chunk_index: u32,
    #[serde(with = "serde_bytes_base64")]
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Listing view of a stored session, payload omitted.
///
/// Carries the *raw* stored id rather than a [`SessionId`] so corrupt
/// rows (empty or placeholder ids) stay visible to the cleanup tooling
/// instead of being normalized away on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub is_chunked: bool,
    pub chunk_count: u32,
}

/// Base64 (de)serialization for binary payloads in JSON contexts.
///
/// The database stores payloads as raw blobs; this only matters for
/// JSON debug output and the status API.
mod serde_bytes_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
