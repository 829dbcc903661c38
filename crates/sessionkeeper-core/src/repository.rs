//! Session repository trait definition (port).
//!
//! Defines the document-store interface that the infrastructure layer
//! (sessionkeeper-infra) implements. The core crate never depends on
//! any specific storage technology. Uses native async fn in traits
//! (RPITIT, Rust 2024 edition).

use sessionkeeper_types::error::RepositoryError;
use sessionkeeper_types::session::{ChunkRecord, SessionId, SessionRecord, SessionSummary};

/// Repository trait for session and chunk persistence.
///
/// Implementations must make `upsert_session` atomic at the record
/// level: the session store relies on writing all chunk rows before the
/// session record so a reader never observes a record pointing at
/// chunks that are not yet fully written.
pub trait SessionRepository: Send + Sync {
    /// Fetch the session record for an id, if one exists.
    fn find_session(
        &self,
        id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Option<SessionRecord>, RepositoryError>> + Send;

    /// Create or fully overwrite the session record for its id.
    fn upsert_session(
        &self,
        record: &SessionRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert one chunk row (upsert on `(session_id, chunk_index)`).
    fn insert_chunk(
        &self,
        chunk: &ChunkRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Fetch all chunk rows for a session, ordered by ascending
    /// `chunk_index`.
    fn find_chunks(
        &self,
        id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Vec<ChunkRecord>, RepositoryError>> + Send;

    /// Delete all chunk rows for a session, returning the count removed.
    fn delete_chunks(
        &self,
        id: &SessionId,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Delete every session and chunk row whose raw stored id is NULL,
    /// empty, or the literal placeholder `"undefined"`. Returns the
    /// total rows removed across both collections.
    fn delete_corrupted(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// List summaries of all stored sessions with their raw ids,
    /// including corrupt rows that a `SessionId` would normalize away.
    fn list_sessions(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<SessionSummary>, RepositoryError>> + Send;
}
