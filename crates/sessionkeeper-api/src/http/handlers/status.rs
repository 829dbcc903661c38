//! Backup status endpoint.
//!
//! GET /status - Current backup state for health checks and dashboards.

use axum::Json;
use axum::extract::State;

use sessionkeeper_types::session::SessionId;

use crate::state::AppState;

/// GET /status - Report readiness and backup state.
///
/// `ready` is true once the periodic backup schedule is armed; probes
/// treat a listening-but-not-ready server as unhealthy.
/// `last_backup_at` is null until the first successful save of this
/// process; `session_exists` reflects the store, not the local
/// directory.
pub async fn get_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let session_exists = state.store.exists(&SessionId::default()).await;
    let last_backup_at = state
        .store
        .last_backup_at()
        .map(|at| at.to_rfc3339());

    Json(serde_json::json!({
        "ready": state.store.periodic_backup_armed(),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "session_exists": session_exists,
        "last_backup_at": last_backup_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AppState, ConcreteSessionStore};
    use sessionkeeper_core::service::store::SessionStore;
    use sessionkeeper_infra::archive::TarGzArchiver;
    use sessionkeeper_infra::crypto::Sha256PayloadHasher;
    use sessionkeeper_infra::sqlite::pool::DatabasePool;
    use sessionkeeper_infra::sqlite::session::SqliteSessionRepository;
    use sessionkeeper_types::config::BackupConfig;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    async fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_path_buf();
        let url = format!("sqlite://{}?mode=rwc", data_dir.join("test.db").display());
        std::mem::forget(dir);
        let db_pool = DatabasePool::new(&url).await.unwrap();

        let config = BackupConfig::default();
        let store: Arc<ConcreteSessionStore> = Arc::new(SessionStore::new(
            SqliteSessionRepository::new(db_pool.clone()),
            TarGzArchiver::new(),
            Sha256PayloadHasher::new(),
            data_dir.join("session"),
            &config,
        ));

        AppState {
            store,
            config,
            data_dir,
            db_pool,
            started_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_status_not_ready_before_backup_schedule() {
        let state = test_state().await;
        let body = get_status(State(state)).await.0;

        assert_eq!(body["ready"], serde_json::json!(false));
        assert_eq!(body["session_exists"], serde_json::json!(false));
        assert!(body["last_backup_at"].is_null());
    }

    #[tokio::test]
    async fn test_status_ready_once_backups_armed() {
        let state = test_state().await;
        state.store.start_periodic_backup(
            sessionkeeper_types::session::SessionId::default(),
            Duration::from_secs(3600),
        );

        let body = get_status(State(state.clone())).await.0;
        assert_eq!(body["ready"], serde_json::json!(true));
        state.store.stop_periodic_backup();
    }
}
