//! Recovery orchestrator: the reconnect/health-check control loop.
//!
//! Drives the external connection client's lifecycle against the
//! session store: restore-then-initialize on startup, grace-delayed
//! initial save plus periodic backup once the client is ready, a
//! health-check interval that self-heals a missing session directory,
//! and a disconnect flow that falls back to wiping local state when the
//! client refuses to come back up.
//!
//! Save and restore for the owned session id never run concurrently:
//! the periodic backup schedule is stopped before any restore-driven
//! flow starts.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sessionkeeper_types::config::BackupConfig;
use sessionkeeper_types::error::ClientError;
use sessionkeeper_types::event::ClientEvent;
use sessionkeeper_types::session::SessionId;

use crate::repository::SessionRepository;
use crate::service::archive::SessionArchiver;
use crate::service::client::ConnectionClient;
use crate::service::hash::PayloadHasher;
use crate::service::store::SessionStore;

/// Lifecycle position of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    Uninitialized,
    /// Pulling the stored backup down before the client starts.
    Restoring,
    /// Client initialization issued, waiting for the ready event.
    Initializing,
    Connected,
    /// Disconnect observed, re-initialization in progress.
    Reconnecting,
    /// Gave up on the client (or shut down gracefully).
    Disconnected,
}

struct HealthTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the save/restore flows around the connection client lifecycle.
///
/// Single logical owner of its session id: only this component invokes
/// store operations for it, one flow at a time.
pub struct RecoveryOrchestrator<C, R, A, H> {
    client: C,
    store: Arc<SessionStore<R, A, H>>,
    session_id: SessionId,
    config: BackupConfig,
    state: Mutex<RecoveryState>,
    health_task: Mutex<Option<HealthTask>>,
}

impl<C, R, A, H> RecoveryOrchestrator<C, R, A, H>
where
    C: ConnectionClient + 'static,
    R: SessionRepository + 'static,
    A: SessionArchiver + 'static,
    H: PayloadHasher + 'static,
{
    pub fn new(
        client: C,
        store: Arc<SessionStore<R, A, H>>,
        session_id: SessionId,
        config: BackupConfig,
    ) -> Self {
        Self {
            client,
            store,
            session_id,
            config,
            state: Mutex::new(RecoveryState::Uninitialized),
            health_task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RecoveryState {
        *self.state.lock().expect("recovery state lock poisoned")
    }

    fn set_state(&self, next: RecoveryState) {
        let mut state = self.state.lock().expect("recovery state lock poisoned");
        debug!(from = ?*state, to = ?next, "recovery state transition");
        *state = next;
    }

    /// Startup flow: purge corrupt records, restore the stored backup,
    /// then initialize the client and arm the health-check loop.
    ///
    /// A missing or failed restore is not fatal -- the client simply
    /// comes up without a session and requires a fresh interactive
    /// login.
    pub async fn start(self: &Arc<Self>) -> Result<(), ClientError> {
        self.set_state(RecoveryState::Restoring);
        self.store.cleanup_corrupted().await;
        if !self.store.restore(&self.session_id).await {
            info!(session = %self.session_id, "starting without a restored session, fresh login required");
        }

        self.set_state(RecoveryState::Initializing);
        self.client.initialize().await?;
        self.start_health_loop();
        Ok(())
    }

    /// Consume lifecycle events until the bus closes.
    pub async fn run(
        self: &Arc<Self>,
        mut events: tokio::sync::broadcast::Receiver<ClientEvent>,
    ) {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match events.recv().await {
                Ok(ClientEvent::Ready) => self.handle_ready().await,
                Ok(ClientEvent::Disconnected { reason }) => {
                    self.handle_disconnected(&reason).await;
                }
                Ok(ClientEvent::AuthFailure { message }) => {
                    error!(session = %self.session_id, message, "client authentication failed");
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "lifecycle event bus lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    /// Ready flow: one grace-delayed save, then the periodic schedule.
    ///
    /// The schedule is armed even when the initial save fails; a
    /// transient failure self-heals on the next tick.
    async fn handle_ready(self: &Arc<Self>) {
        info!(session = %self.session_id, "client ready, starting session backups");
        // Let the client finish writing its own files first.
        tokio::time::sleep(self.config.ready_grace()).await;

        if !self.store.save(&self.session_id).await {
            warn!(session = %self.session_id, "initial session save failed, relying on periodic schedule");
        }
        self.store
            .start_periodic_backup(self.session_id.clone(), self.config.backup_interval());
        self.set_state(RecoveryState::Connected);
    }

    /// Disconnect flow: stop backups, re-seed the session directory
    /// from the last good backup, and re-initialize the client. If
    /// initialization raises, wipe the local session state and try once
    /// more, accepting a forced fresh login.
    async fn handle_disconnected(self: &Arc<Self>, reason: &str) {
        warn!(session = %self.session_id, reason, "client disconnected");
        self.set_state(RecoveryState::Reconnecting);
        self.store.stop_periodic_backup();

        // Best effort; a failed restore just means reconnecting with
        // whatever is on disk.
        self.store.restore(&self.session_id).await;

        tokio::time::sleep(self.config.reconnect_delay()).await;
        if let Err(e) = self.client.initialize().await {
            warn!(session = %self.session_id, error = %e, "re-initialization failed, wiping local session state");
            if let Err(e) = tokio::fs::remove_dir_all(self.store.session_dir()).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(error = %e, "failed to remove session directory");
                }
            }
            if let Err(e) = self.client.initialize().await {
                error!(session = %self.session_id, error = %e, "client will not come back up, giving up");
                self.set_state(RecoveryState::Disconnected);
                return;
            }
        }
        self.set_state(RecoveryState::Initializing);
    }

    /// One health-check pass.
    ///
    /// Skips entirely while the client reports no connection. A missing
    /// session directory under a supposedly live connection is
    /// self-healed with a restore; a sparse one is only logged.
    async fn health_check(&self) {
        if self.client.connection_info().await.is_none() {
            debug!(session = %self.session_id, "health check skipped, client not connected");
            return;
        }

        let dir = self.store.session_dir();
        if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
            warn!(session = %self.session_id, "session directory missing while connected, restoring");
            self.store.restore(&self.session_id).await;
            return;
        }

        match directory_entry_count(dir).await {
            Some(count) if count < self.config.min_session_entries => {
                warn!(
                    session = %self.session_id,
                    entries = count,
                    "session directory looks implausibly sparse"
                );
            }
            Some(_) => {}
            None => {
                warn!(session = %self.session_id, "session directory could not be read during health check");
            }
        }
    }

    fn start_health_loop(self: &Arc<Self>) {
        let mut guard = self.health_task.lock().expect("health task lock poisoned");
        if let Some(previous) = guard.take() {
            previous.cancel.cancel();
        }

        let orchestrator = Arc::clone(self);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let interval = self.config.health_interval();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => orchestrator.health_check().await,
                }
            }
        });
        *guard = Some(HealthTask { cancel, handle });
    }

    fn stop_health_loop(&self) {
        if let Some(task) = self
            .health_task
            .lock()
            .expect("health task lock poisoned")
            .take()
        {
            task.cancel.cancel();
            drop(task.handle);
        }
    }

    /// Graceful stop: cancel schedules, take one final backup, tear the
    /// client down.
    pub async fn shutdown(&self) {
        info!(session = %self.session_id, "shutting down, taking final backup");
        self.stop_health_loop();
        self.store.stop_periodic_backup();

        if !self.store.save(&self.session_id).await {
            warn!(session = %self.session_id, "final save failed, previous backup remains current");
        }
        if let Err(e) = self.client.destroy().await {
            warn!(session = %self.session_id, error = %e, "client teardown reported an error");
        }
        self.set_state(RecoveryState::Disconnected);
    }
}

/// Count directory entries, `None` when the directory cannot be read.
async fn directory_entry_count(dir: &std::path::Path) -> Option<usize> {
    let mut read_dir = tokio::fs::read_dir(dir).await.ok()?;
    let mut count = 0;
    loop {
        match read_dir.next_entry().await {
            Ok(Some(_)) => count += 1,
            Ok(None) => return Some(count),
            Err(_) => return None,
        }
    }
}
