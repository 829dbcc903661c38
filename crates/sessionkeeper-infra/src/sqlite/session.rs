//! SQLite session repository implementation.
//!
//! Implements `SessionRepository` from `sessionkeeper-core` using sqlx
//! with split read/write pools. Archive bytes are stored as BLOBs;
//! timestamps are RFC 3339 text.

use chrono::{DateTime, Utc};
use sqlx::Row;

use sessionkeeper_core::repository::SessionRepository;
use sessionkeeper_types::error::RepositoryError;
use sessionkeeper_types::session::{ChunkRecord, SessionId, SessionRecord, SessionSummary};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionRepository`.
pub struct SqliteSessionRepository {
    pool: DatabasePool,
}

impl SqliteSessionRepository {
    /// Create a new session repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct SessionRow {
    session_id: String,
    payload: Vec<u8>,
    checksum: String,
    created_at: String,
    size: i64,
    is_chunked: bool,
    chunk_count: i64,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_id: row.try_get("session_id")?,
            payload: row.try_get("payload")?,
            checksum: row.try_get("checksum")?,
            created_at: row.try_get("created_at")?,
            size: row.try_get("size")?,
            is_chunked: row.try_get("is_chunked")?,
            chunk_count: row.try_get("chunk_count")?,
        })
    }

    fn into_record(self) -> Result<SessionRecord, RepositoryError> {
        let created_at = parse_datetime(&self.created_at)?;
        Ok(SessionRecord {
            session_id: SessionId::from(self.session_id.as_str()),
            payload: self.payload,
            checksum: self.checksum,
            created_at,
            size: self.size as u64,
            is_chunked: self.is_chunked,
            chunk_count: self.chunk_count as u32,
        })
    }
}

struct ChunkRow {
    session_id: String,
    chunk_index: i64,
    payload: Vec<u8>,
    created_at: String,
}

impl ChunkRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_id: row.try_get("session_id")?,
            chunk_index: row.try_get("chunk_index")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_record(self) -> Result<ChunkRecord, RepositoryError> {
        let created_at = parse_datetime(&self.created_at)?;
        Ok(ChunkRecord {
            session_id: SessionId::from(self.session_id.as_str()),
            chunk_index: self.chunk_index as u32,
            payload: self.payload,
            created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// ---------------------------------------------------------------------------
// SessionRepository implementation
// ---------------------------------------------------------------------------

impl SessionRepository for SqliteSessionRepository {
    async fn find_session(
        &self,
        id: &SessionId,
    ) -> Result<Option<SessionRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE session_id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let session_row =
                    SessionRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(session_row.into_record()?))
            }
            None => Ok(None),
        }
    }

    async fn upsert_session(&self, record: &SessionRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO sessions (session_id, payload, checksum, created_at, size, is_chunked, chunk_count)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (session_id) DO UPDATE SET
                   payload = excluded.payload,
                   checksum = excluded.checksum,
                   created_at = excluded.created_at,
                   size = excluded.size,
                   is_chunked = excluded.is_chunked,
                   chunk_count = excluded.chunk_count"#,
        )
        .bind(record.session_id.as_str())
        .bind(&record.payload)
        .bind(&record.checksum)
        .bind(format_datetime(&record.created_at))
        .bind(record.size as i64)
        .bind(record.is_chunked)
        .bind(record.chunk_count as i64)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn insert_chunk(&self, chunk: &ChunkRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO session_chunks (session_id, chunk_index, payload, created_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (session_id, chunk_index) DO UPDATE SET
                   payload = excluded.payload,
                   created_at = excluded.created_at"#,
        )
        .bind(chunk.session_id.as_str())
        .bind(chunk.chunk_index as i64)
        .bind(&chunk.payload)
        .bind(format_datetime(&chunk.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn find_chunks(&self, id: &SessionId) -> Result<Vec<ChunkRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM session_chunks WHERE session_id = ? ORDER BY chunk_index ASC",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut chunks = Vec::with_capacity(rows.len());
        for row in &rows {
            let chunk_row =
                ChunkRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            chunks.push(chunk_row.into_record()?);
        }

        Ok(chunks)
    }

    async fn delete_chunks(&self, id: &SessionId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM session_chunks WHERE session_id = ?")
            .bind(id.as_str())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn delete_corrupted(&self) -> Result<u64, RepositoryError> {
        let sessions = sqlx::query(
            "DELETE FROM sessions WHERE session_id IS NULL OR session_id IN ('', 'undefined')",
        )
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let chunks = sqlx::query(
            "DELETE FROM session_chunks WHERE session_id IS NULL OR session_id IN ('', 'undefined')",
        )
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(sessions.rows_affected() + chunks.rows_affected())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT session_id, size, created_at, is_chunked, chunk_count FROM sessions ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            // Raw id on purpose, so corrupt rows stay visible to cleanup
            // tooling instead of being collapsed to "default".
            let session_id: Option<String> = row
                .try_get("session_id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let created_at: String = row
                .try_get("created_at")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let size: i64 = row
                .try_get("size")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let is_chunked: bool = row
                .try_get("is_chunked")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let chunk_count: i64 = row
                .try_get("chunk_count")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

            summaries.push(SessionSummary {
                session_id: session_id.unwrap_or_default(),
                size: size as u64,
                created_at: parse_datetime(&created_at)?,
                is_chunked,
                chunk_count: chunk_count as u32,
            });
        }

        Ok(summaries)
    }
}
