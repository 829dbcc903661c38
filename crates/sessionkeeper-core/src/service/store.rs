//! Session store: durable save/restore of the client session directory.
//!
//! Owns the storage strategy decision (single record vs. chunked), the
//! integrity checks on restore, and the periodic backup schedule. Every
//! public operation reduces lower-layer failures to a boolean -- a
//! failed save means "retry on the next scheduled attempt", never a
//! crashed control loop -- with detail logged for operators.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sessionkeeper_types::config::BackupConfig;
use sessionkeeper_types::error::IntegrityError;
use sessionkeeper_types::session::{ChunkRecord, SessionId, SessionRecord};

use crate::chunk;
use crate::repository::SessionRepository;
use crate::service::archive::SessionArchiver;
use crate::service::hash::PayloadHasher;

/// Consecutive scheduled-save failures before the log level escalates
/// to error. The schedule itself never stops; a success resets the
/// count.
const FAILURE_ESCALATION_THRESHOLD: u32 = 3;

/// Handle to the armed periodic backup schedule.
struct BackupTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Orchestrates archiving, hashing, chunking, and the repository.
///
/// Generic over the adapter ports so the core crate stays free of
/// storage and archive-format dependencies; `AppState` in the api crate
/// pins the concrete infra implementations.
pub struct SessionStore<R, A, H> {
    repo: R,
    archiver: A,
    hasher: H,
    session_dir: PathBuf,
    max_chunk_size: u64,
    chunking_threshold: u64,
    backup_task: Mutex<Option<BackupTask>>,
    last_backup_at: Mutex<Option<DateTime<Utc>>>,
}

impl<R, A, H> SessionStore<R, A, H>
where
    R: SessionRepository,
    A: SessionArchiver,
    H: PayloadHasher,
{
    /// Create a new store over the given adapters.
    ///
    /// `config.chunking_threshold` must exceed `config.max_chunk_size`;
    /// a threshold at or below the chunk size would chunk archives that
    /// fit in a single record.
    pub fn new(repo: R, archiver: A, hasher: H, session_dir: PathBuf, config: &BackupConfig) -> Self {
        debug_assert!(config.chunking_threshold > config.max_chunk_size);
        Self {
            repo,
            archiver,
            hasher,
            session_dir,
            max_chunk_size: config.max_chunk_size,
            chunking_threshold: config.chunking_threshold,
            backup_task: Mutex::new(None),
            last_backup_at: Mutex::new(None),
        }
    }

    /// The local directory this store archives and restores.
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Timestamp of the most recent successful save, for status
    /// reporting.
    pub fn last_backup_at(&self) -> Option<DateTime<Utc>> {
        *self.last_backup_at.lock().expect("last_backup_at lock poisoned")
    }

    #[cfg(test)]
    pub(crate) fn repo(&self) -> &R {
        &self.repo
    }

    /// Whether a periodic backup schedule is currently armed.
    pub fn periodic_backup_armed(&self) -> bool {
        self.backup_task
            .lock()
            .expect("backup task lock poisoned")
            .is_some()
    }

    /// Archive the session directory and persist it under `id`.
    ///
    /// Returns `false` (without touching the stored backup) when there
    /// is nothing to save: the source directory is absent or the
    /// archive comes back empty. An empty archive overwriting a good
    /// prior backup would silently erase the only copy of the session.
    pub async fn save(&self, id: &SessionId) -> bool {
        if !tokio::fs::try_exists(&self.session_dir).await.unwrap_or(false) {
            debug!(session = %id, dir = %self.session_dir.display(), "session directory absent, nothing to back up");
            return false;
        }

        let archive = match self.archiver.pack(&self.session_dir).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(session = %id, error = %e, "failed to archive session directory");
                return false;
            }
        };
        if archive.is_empty() {
            warn!(session = %id, "archiver produced an empty archive, keeping previous backup");
            return false;
        }

        let checksum = self.hasher.digest(&archive);
        let size = archive.len() as u64;
        let now = Utc::now();

        let result = if size > self.chunking_threshold {
            self.save_chunked(id, archive, checksum, size, now).await
        } else {
            let result = self
                .repo
                .upsert_session(&SessionRecord {
                    session_id: id.clone(),
                    payload: archive,
                    checksum,
                    created_at: now,
                    size,
                    is_chunked: false,
                    chunk_count: 1,
                })
                .await;
            if result.is_ok() {
                // A session that shrank below the threshold may still
                // have chunk rows from an earlier chunked backup. The
                // record above no longer references them, so removal is
                // best effort.
                match self.repo.delete_chunks(id).await {
                    Ok(removed) if removed > 0 => {
                        debug!(session = %id, removed, "cleared chunks from previous chunked backup");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(session = %id, error = %e, "failed to clear stale chunks");
                    }
                }
            }
            result
        };

        match result {
            Ok(()) => {
                *self.last_backup_at.lock().expect("last_backup_at lock poisoned") = Some(now);
                info!(session = %id, size, "session backup saved");
                true
            }
            Err(e) => {
                warn!(session = %id, error = %e, "session save failed");
                false
            }
        }
    }

    /// Chunked save path: stale chunks are deleted first, chunk rows
    /// are written sequentially, and the session record goes last. A
    /// failure partway leaves the old record in place, so a concurrent
    /// restore still sees the previous consistent backup.
    async fn save_chunked(
        &self,
        id: &SessionId,
        archive: Vec<u8>,
        checksum: String,
        size: u64,
        now: DateTime<Utc>,
    ) -> Result<(), sessionkeeper_types::error::RepositoryError> {
        let removed = self.repo.delete_chunks(id).await?;
        if removed > 0 {
            debug!(session = %id, removed, "cleared chunks from previous backup");
        }

        let chunks = chunk::split(&archive, self.max_chunk_size as usize);
        let chunk_count = chunks.len() as u32;
        for (index, payload) in chunks.into_iter().enumerate() {
            self.repo
                .insert_chunk(&ChunkRecord {
                    session_id: id.clone(),
                    chunk_index: index as u32,
                    payload,
                    created_at: now,
                })
                .await?;
        }

        info!(session = %id, size, chunk_count, "session archive stored chunked");
        self.repo
            .upsert_session(&SessionRecord {
                session_id: id.clone(),
                payload: Vec::new(),
                checksum,
                created_at: now,
                size,
                is_chunked: true,
                chunk_count,
            })
            .await
    }

    /// Reconstruct the session directory from the stored backup.
    ///
    /// Verifies chunk-count equality and the checksum of the
    /// reassembled archive *before* touching the local directory, so
    /// good local state is never replaced by a torn or corrupt remote
    /// backup.
    pub async fn restore(&self, id: &SessionId) -> bool {
        let record = match self.repo.find_session(id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!(session = %id, "no stored backup to restore");
                return false;
            }
            Err(e) => {
                warn!(session = %id, error = %e, "failed to look up session backup");
                return false;
            }
        };

        let payload = if record.is_chunked {
            let chunks = match self.repo.find_chunks(id).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!(session = %id, error = %e, "failed to fetch session chunks");
                    return false;
                }
            };
            let actual = chunks.len() as u32;
            if actual != record.chunk_count {
                // A torn write or concurrent overwrite; never guess.
                let mismatch = IntegrityError::ChunkCountMismatch {
                    expected: record.chunk_count,
                    actual,
                };
                warn!(session = %id, error = %mismatch, "refusing to restore inconsistent backup");
                return false;
            }
            chunk::join(chunks.iter().map(|c| c.payload.as_slice()))
        } else {
            record.payload
        };

        let actual = self.hasher.digest(&payload);
        if actual != record.checksum {
            let mismatch = IntegrityError::ChecksumMismatch {
                expected: record.checksum,
                actual,
            };
            warn!(session = %id, error = %mismatch, "refusing to restore corrupt backup");
            return false;
        }

        match self.archiver.unpack(payload, &self.session_dir).await {
            Ok(()) => {
                info!(session = %id, size = record.size, "session restored from backup");
                true
            }
            Err(e) => {
                warn!(session = %id, error = %e, "failed to unpack session backup");
                false
            }
        }
    }

    /// Whether a backup with a non-empty effective payload exists.
    ///
    /// A chunked record is trusted on its `chunk_count`; restore
    /// remains the authority on whether the chunks actually reassemble.
    pub async fn exists(&self, id: &SessionId) -> bool {
        match self.repo.find_session(id).await {
            Ok(Some(record)) => {
                if record.is_chunked {
                    record.chunk_count > 0
                } else {
                    !record.payload.is_empty()
                }
            }
            Ok(None) => false,
            Err(e) => {
                warn!(session = %id, error = %e, "failed to check for session backup");
                false
            }
        }
    }

    /// Delete session and chunk rows whose stored id is null, empty, or
    /// the `"undefined"` placeholder. Returns the total rows removed.
    pub async fn cleanup_corrupted(&self) -> u64 {
        match self.repo.delete_corrupted().await {
            Ok(count) => {
                if count > 0 {
                    info!(count, "deleted corrupted session records");
                }
                count
            }
            Err(e) => {
                warn!(error = %e, "failed to clean up corrupted session records");
                0
            }
        }
    }
}

impl<R, A, H> SessionStore<R, A, H>
where
    R: SessionRepository + 'static,
    A: SessionArchiver + 'static,
    H: PayloadHasher + 'static,
{
    /// Arm the periodic backup schedule for `id`.
    ///
    /// Idempotent: starting while already running cancels the prior
    /// schedule rather than stacking a second one. Each tick runs its
    /// save to completion before the next tick is eligible.
    pub fn start_periodic_backup(self: &Arc<Self>, id: SessionId, interval: Duration) {
        let mut guard = self.backup_task.lock().expect("backup task lock poisoned");
        if let Some(previous) = guard.take() {
            debug!(session = %id, "replacing existing backup schedule");
            previous.cancel.cancel();
        }

        let store = Arc::clone(self);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately; the
            // initial save is the orchestrator's job, so skip it.
            ticker.tick().await;

            let mut consecutive_failures: u32 = 0;
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        // Runs to completion; cancellation only takes
                        // effect between ticks.
                        if store.save(&id).await {
                            consecutive_failures = 0;
                        } else {
                            consecutive_failures += 1;
                            if consecutive_failures >= FAILURE_ESCALATION_THRESHOLD {
                                error!(
                                    session = %id,
                                    consecutive_failures,
                                    "scheduled backups keep failing, previous backup is going stale"
                                );
                            } else {
                                warn!(
                                    session = %id,
                                    consecutive_failures,
                                    "scheduled backup failed, will retry next tick"
                                );
                            }
                        }
                    }
                }
            }
            debug!("periodic backup schedule stopped");
        });

        *guard = Some(BackupTask { cancel, handle });
    }

    /// Cancel future scheduled backups.
    ///
    /// Idempotent; does not interrupt a save already in flight.
    pub fn stop_periodic_backup(&self) {
        if let Some(task) = self
            .backup_task
            .lock()
            .expect("backup task lock poisoned")
            .take()
        {
            task.cancel.cancel();
            // The task finishes its current tick on its own; the handle
            // is only kept so tests can await quiescence.
            drop(task.handle);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scripted fakes shared by the store and recovery tests.

    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use sessionkeeper_types::error::{ArchiveError, RepositoryError};
    use sessionkeeper_types::session::{ChunkRecord, SessionId, SessionRecord, SessionSummary};

    use crate::repository::SessionRepository;
    use crate::service::archive::SessionArchiver;
    use crate::service::hash::PayloadHasher;

    /// In-memory repository keyed on the raw id string so tests can
    /// seed corrupt rows the typed API cannot produce.
    #[derive(Default)]
    pub struct MemoryRepository {
        pub sessions: Mutex<HashMap<String, SessionRecord>>,
        pub chunks: Mutex<Vec<ChunkRecord>>,
        pub fail_writes: AtomicBool,
        pub find_session_calls: AtomicU32,
    }

    impl MemoryRepository {
        pub fn chunk_count_for(&self, id: &SessionId) -> usize {
            self.chunks
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.session_id == *id)
                .count()
        }

        fn write_guard(&self) -> Result<(), RepositoryError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(RepositoryError::Query("injected write failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl SessionRepository for MemoryRepository {
        async fn find_session(
            &self,
            id: &SessionId,
        ) -> Result<Option<SessionRecord>, RepositoryError> {
            self.find_session_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.sessions.lock().unwrap().get(id.as_str()).cloned())
        }

        async fn upsert_session(&self, record: &SessionRecord) -> Result<(), RepositoryError> {
            self.write_guard()?;
            self.sessions
                .lock()
                .unwrap()
                .insert(record.session_id.as_str().to_string(), record.clone());
            Ok(())
        }

        async fn insert_chunk(&self, chunk: &ChunkRecord) -> Result<(), RepositoryError> {
            self.write_guard()?;
            self.chunks.lock().unwrap().push(chunk.clone());
            Ok(())
        }

        async fn find_chunks(&self, id: &SessionId) -> Result<Vec<ChunkRecord>, RepositoryError> {
            let mut chunks: Vec<ChunkRecord> = self
                .chunks
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.session_id == *id)
                .cloned()
                .collect();
            chunks.sort_by_key(|c| c.chunk_index);
            Ok(chunks)
        }

        async fn delete_chunks(&self, id: &SessionId) -> Result<u64, RepositoryError> {
            self.write_guard()?;
            let mut chunks = self.chunks.lock().unwrap();
            let before = chunks.len();
            chunks.retain(|c| c.session_id != *id);
            Ok((before - chunks.len()) as u64)
        }

        async fn delete_corrupted(&self) -> Result<u64, RepositoryError> {
            self.write_guard()?;
            let corrupt = |raw: &str| raw.is_empty() || raw == "undefined";
            let mut sessions = self.sessions.lock().unwrap();
            let before_sessions = sessions.len();
            sessions.retain(|raw, _| !corrupt(raw));
            let mut chunks = self.chunks.lock().unwrap();
            let before_chunks = chunks.len();
            chunks.retain(|c| !corrupt(c.session_id.as_str()));
            Ok((before_sessions - sessions.len()) as u64 + (before_chunks - chunks.len()) as u64)
        }

        async fn list_sessions(&self) -> Result<Vec<SessionSummary>, RepositoryError> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .iter()
                .map(|(raw, r)| SessionSummary {
                    session_id: raw.clone(),
                    size: r.size,
                    created_at: r.created_at,
                    is_chunked: r.is_chunked,
                    chunk_count: r.chunk_count,
                })
                .collect())
        }
    }

    /// Archiver fake: the archive of a directory is the content of its
    /// `state.bin` file, which keeps archive-level round-trips
    /// byte-exact without a real container format.
    pub struct FileArchiver;

    impl SessionArchiver for FileArchiver {
        async fn pack(&self, dir: &Path) -> Result<Vec<u8>, ArchiveError> {
            match tokio::fs::read(dir.join("state.bin")).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
                Err(e) => Err(ArchiveError::Encoding(e.to_string())),
            }
        }

        async fn unpack(&self, archive: Vec<u8>, dir: &Path) -> Result<(), ArchiveError> {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ArchiveError::Decoding(e.to_string()))?;
            tokio::fs::write(dir.join("state.bin"), archive)
                .await
                .map_err(|e| ArchiveError::Decoding(e.to_string()))
        }
    }

    /// Deterministic non-cryptographic hasher, good enough for
    /// mismatch detection in tests.
    pub struct TestHasher;

    impl PayloadHasher for TestHasher {
        fn digest(&self, payload: &[u8]) -> String {
            use std::hash::{Hash, Hasher};
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            payload.hash(&mut hasher);
            format!("{:016x}", hasher.finish())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{FileArchiver, MemoryRepository, TestHasher};
    use super::*;
    use sessionkeeper_types::session::SessionSummary;
    use std::sync::atomic::Ordering;

    fn small_config() -> BackupConfig {
        BackupConfig {
            max_chunk_size: 4,
            chunking_threshold: 10,
            ..BackupConfig::default()
        }
    }

    fn store_in(
        dir: &Path,
    ) -> SessionStore<MemoryRepository, FileArchiver, TestHasher> {
        SessionStore::new(
            MemoryRepository::default(),
            FileArchiver,
            TestHasher,
            dir.join("session"),
            &small_config(),
        )
    }

    async fn seed_session_dir(store: &SessionStore<MemoryRepository, FileArchiver, TestHasher>, bytes: &[u8]) {
        tokio::fs::create_dir_all(store.session_dir()).await.unwrap();
        tokio::fs::write(store.session_dir().join("state.bin"), bytes)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn save_without_source_directory_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let id = SessionId::default();

        assert!(!store.save(&id).await);
        assert!(store.repo.sessions.lock().unwrap().is_empty());
        assert!(store.last_backup_at().is_none());
    }

    #[tokio::test]
    async fn save_empty_archive_keeps_previous_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let id = SessionId::default();

        seed_session_dir(&store, b"good state").await;
        assert!(store.save(&id).await);

        // Directory now empties out; the stored backup must survive.
        tokio::fs::remove_file(store.session_dir().join("state.bin"))
            .await
            .unwrap();
        assert!(!store.save(&id).await);
        let record = store.repo.sessions.lock().unwrap()[id.as_str()].clone();
        assert_eq!(record.payload, b"good state");
    }

    #[tokio::test]
    async fn save_small_payload_stores_single_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let id = SessionId::new("main");

        seed_session_dir(&store, b"tiny").await;
        assert!(store.save(&id).await);

        let record = store.repo.sessions.lock().unwrap()["main"].clone();
        assert!(!record.is_chunked);
        assert_eq!(record.chunk_count, 1);
        assert_eq!(record.payload, b"tiny");
        assert_eq!(record.size, 4);
        assert_eq!(record.checksum, TestHasher.digest(b"tiny"));
        assert_eq!(store.repo.chunk_count_for(&id), 0);
        assert!(store.last_backup_at().is_some());
    }

    #[tokio::test]
    async fn save_large_payload_chunks_with_contiguous_indices() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let id = SessionId::new("main");

        // 11 bytes > threshold 10, chunk size 4 -> ceil(11/4) = 3 chunks.
        seed_session_dir(&store, b"0123456789A").await;
        assert!(store.save(&id).await);

        let record = store.repo.sessions.lock().unwrap()["main"].clone();
        assert!(record.is_chunked);
        assert!(record.payload.is_empty());
        assert_eq!(record.chunk_count, 3);
        assert_eq!(record.size, 11);
        // Checksum covers the full archive, not any single chunk.
        assert_eq!(record.checksum, TestHasher.digest(b"0123456789A"));

        let chunks = store.repo.find_chunks(&id).await.unwrap();
        let indices: Vec<u32> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(chunks[0].payload, b"0123");
        assert_eq!(chunks[2].payload, b"89A");
    }

    #[tokio::test]
    async fn chunked_save_replaces_stale_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let id = SessionId::new("main");

        seed_session_dir(&store, &[7u8; 20]).await; // 5 chunks
        assert!(store.save(&id).await);
        assert_eq!(store.repo.chunk_count_for(&id), 5);

        seed_session_dir(&store, &[8u8; 11]).await; // 3 chunks
        assert!(store.save(&id).await);
        assert_eq!(store.repo.chunk_count_for(&id), 3);
    }

    #[tokio::test]
    async fn shrinking_save_clears_stale_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let id = SessionId::new("main");

        seed_session_dir(&store, &[7u8; 20]).await; // chunked: 5 chunks
        assert!(store.save(&id).await);
        assert_eq!(store.repo.chunk_count_for(&id), 5);

        // Shrinks below the threshold: single record, no leftover rows.
        seed_session_dir(&store, b"tiny").await;
        assert!(store.save(&id).await);
        assert_eq!(store.repo.chunk_count_for(&id), 0);

        let record = store.repo.sessions.lock().unwrap()["main"].clone();
        assert!(!record.is_chunked);
        assert_eq!(record.payload, b"tiny");

        tokio::fs::remove_dir_all(store.session_dir()).await.unwrap();
        assert!(store.restore(&id).await);
        let restored = tokio::fs::read(store.session_dir().join("state.bin"))
            .await
            .unwrap();
        assert_eq!(restored, b"tiny");
    }

    #[tokio::test]
    async fn save_write_failure_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let id = SessionId::default();

        seed_session_dir(&store, b"state").await;
        store.repo.fail_writes.store(true, Ordering::SeqCst);
        assert!(!store.save(&id).await);
        assert!(store.last_backup_at().is_none());
    }

    #[tokio::test]
    async fn restore_roundtrips_single_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let id = SessionId::default();

        seed_session_dir(&store, b"precious").await;
        assert!(store.save(&id).await);
        tokio::fs::remove_dir_all(store.session_dir()).await.unwrap();

        assert!(store.restore(&id).await);
        let restored = tokio::fs::read(store.session_dir().join("state.bin"))
            .await
            .unwrap();
        assert_eq!(restored, b"precious");
    }

    #[tokio::test]
    async fn restore_roundtrips_chunked_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let id = SessionId::default();

        let payload: Vec<u8> = (0..=255u8).cycle().take(37).collect();
        seed_session_dir(&store, &payload).await;
        assert!(store.save(&id).await);
        tokio::fs::remove_dir_all(store.session_dir()).await.unwrap();

        assert!(store.restore(&id).await);
        let restored = tokio::fs::read(store.session_dir().join("state.bin"))
            .await
            .unwrap();
        assert_eq!(restored, payload);
    }

    #[tokio::test]
    async fn restore_without_backup_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(!store.restore(&SessionId::default()).await);
    }

    #[tokio::test]
    async fn restore_aborts_on_chunk_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let id = SessionId::default();

        seed_session_dir(&store, &[9u8; 12]).await;
        assert!(store.save(&id).await);

        // Simulate a torn write: drop one chunk behind the record's back.
        store.repo.chunks.lock().unwrap().pop();

        seed_session_dir(&store, b"local state to protect").await;
        assert!(!store.restore(&id).await);
        let local = tokio::fs::read(store.session_dir().join("state.bin"))
            .await
            .unwrap();
        assert_eq!(local, b"local state to protect");
    }

    #[tokio::test]
    async fn restore_aborts_on_checksum_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let id = SessionId::default();

        seed_session_dir(&store, b"original").await;
        assert!(store.save(&id).await);
        store
            .repo
            .sessions
            .lock()
            .unwrap()
            .get_mut(id.as_str())
            .unwrap()
            .checksum = "deadbeef".to_string();

        seed_session_dir(&store, b"local state to protect").await;
        assert!(!store.restore(&id).await);
        let local = tokio::fs::read(store.session_dir().join("state.bin"))
            .await
            .unwrap();
        assert_eq!(local, b"local state to protect");
    }

    #[tokio::test]
    async fn exists_reflects_effective_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let id = SessionId::default();

        assert!(!store.exists(&id).await);

        seed_session_dir(&store, b"state").await;
        assert!(store.save(&id).await);
        assert!(store.exists(&id).await);

        // A record with neither payload nor chunks is not a usable backup.
        let mut sessions = store.repo.sessions.lock().unwrap();
        let record = sessions.get_mut(id.as_str()).unwrap();
        record.payload = Vec::new();
        record.is_chunked = false;
        drop(sessions);
        assert!(!store.exists(&id).await);
    }

    #[tokio::test]
    async fn cleanup_deletes_only_corrupt_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let id = SessionId::new("healthy");

        seed_session_dir(&store, b"state").await;
        assert!(store.save(&id).await);

        // Seed corrupt rows directly; the typed API cannot produce them.
        let template = store.repo.sessions.lock().unwrap()["healthy"].clone();
        for raw in ["", "undefined"] {
            store
                .repo
                .sessions
                .lock()
                .unwrap()
                .insert(raw.to_string(), template.clone());
        }

        assert_eq!(store.cleanup_corrupted().await, 2);
        let remaining: Vec<SessionSummary> = store.repo.list_sessions().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].session_id, "healthy");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn periodic_backup_saves_on_each_tick() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(dir.path()));
        let id = SessionId::default();
        seed_session_dir(&store, b"state").await;

        store.start_periodic_backup(id.clone(), Duration::from_millis(50));
        assert!(store.periodic_backup_armed());
        assert!(store.last_backup_at().is_none());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(store.last_backup_at().is_some());
        store.stop_periodic_backup();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_periodic_backup_cancels_future_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(dir.path()));
        let id = SessionId::default();
        seed_session_dir(&store, b"state").await;

        store.start_periodic_backup(id.clone(), Duration::from_millis(100));
        store.stop_periodic_backup();
        assert!(!store.periodic_backup_armed());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(store.last_backup_at().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restarting_periodic_backup_replaces_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(dir.path()));
        let id = SessionId::default();
        seed_session_dir(&store, b"state").await;

        // The first schedule would never fire inside this test window;
        // only the replacement one is live.
        store.start_periodic_backup(id.clone(), Duration::from_secs(3600));
        store.start_periodic_backup(id.clone(), Duration::from_millis(50));
        assert!(store.periodic_backup_armed());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(store.last_backup_at().is_some());
        store.stop_periodic_backup();
    }
}
