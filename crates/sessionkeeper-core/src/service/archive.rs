//! SessionArchiver trait for encoding directory trees.
//!
//! Defined in sessionkeeper-core so the session store can archive
//! without coupling to a specific container format. The `TarGzArchiver`
//! adapter lives in sessionkeeper-infra.

use std::path::Path;

use sessionkeeper_types::error::ArchiveError;

/// Abstraction over lossless directory-tree archiving.
pub trait SessionArchiver: Send + Sync {
    /// Serialize the directory at `dir` into a single deterministic
    /// byte sequence. An absent directory yields a valid empty archive
    /// -- a first run with no session is a legitimate state, not an
    /// error.
    fn pack(
        &self,
        dir: &Path,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, ArchiveError>> + Send;

    /// Materialize `archive` into `dir`, replacing any existing
    /// content. On failure the previous content of `dir` must be left
    /// untouched; on success `dir` holds exactly the archived tree.
    fn unpack(
        &self,
        archive: Vec<u8>,
        dir: &Path,
    ) -> impl std::future::Future<Output = Result<(), ArchiveError>> + Send;
}
