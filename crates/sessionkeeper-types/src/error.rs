use thiserror::Error;

/// Errors from archive encoding and decoding.
///
/// Always local: a failed pack or unpack never mutates remote state.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive encoding failed: {0}")]
    Encoding(String),

    #[error("archive decoding failed: {0}")]
    Decoding(String),
}

/// Integrity disagreement detected while restoring a backup.
///
/// Restore aborts on either variant and leaves the local session
/// directory untouched.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("checksum mismatch: expected '{expected}', got '{actual}'")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("chunk count mismatch: record says {expected}, store returned {actual}")]
    ChunkCountMismatch { expected: u32, actual: u32 },
}

/// Errors from repository operations (used by trait definitions in sessionkeeper-core).
///
/// The session store reduces every repository error to a boolean at its
/// public boundary; these variants exist for logging detail.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("record not found")]
    NotFound,
}

/// Errors from the external connection client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client initialization failed: {0}")]
    Initialize(String),

    #[error("client teardown failed: {0}")]
    Destroy(String),
}
