//! Application state wiring the store and its adapters together.
//!
//! AppState holds the concrete session store used by both CLI commands
//! and the status API. The store is generic over repository/archiver/
//! hasher traits, but AppState pins it to the concrete infra
//! implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use sessionkeeper_core::service::store::SessionStore;
use sessionkeeper_infra::archive::TarGzArchiver;
use sessionkeeper_infra::crypto::Sha256PayloadHasher;
use sessionkeeper_infra::sqlite::pool::DatabasePool;
use sessionkeeper_infra::sqlite::session::SqliteSessionRepository;
use sessionkeeper_types::config::BackupConfig;

/// Concrete type alias for the store generics pinned to infra implementations.
pub type ConcreteSessionStore =
    SessionStore<SqliteSessionRepository, TarGzArchiver, Sha256PayloadHasher>;

/// Shared application state.
///
/// Used by both CLI commands and status API handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConcreteSessionStore>,
    pub config: BackupConfig,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
    pub started_at: Instant,
}

impl AppState {
    /// Initialize the application state: resolve directories, load
    /// config, connect to the database, wire the store.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await?;

        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join("sessionkeeper.db").display()
        );
        let db_pool = DatabasePool::new(&db_url).await?;

        // A relative session_dir is anchored under the data directory.
        let session_dir = if config.session_dir.is_absolute() {
            config.session_dir.clone()
        } else {
            data_dir.join(&config.session_dir)
        };

        let store = SessionStore::new(
            SqliteSessionRepository::new(db_pool.clone()),
            TarGzArchiver::new(),
            Sha256PayloadHasher::new(),
            session_dir,
            &config,
        );

        Ok(Self {
            store: Arc::new(store),
            config,
            data_dir,
            db_pool,
            started_at: Instant::now(),
        })
    }
}

/// Resolve the data directory from `SESSIONKEEPER_DATA_DIR`, falling
/// back to `~/.sessionkeeper`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SESSIONKEEPER_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sessionkeeper")
}

/// Load `config.toml` from the data directory; defaults apply when the
/// file is absent or a field is omitted.
async fn load_config(data_dir: &std::path::Path) -> anyhow::Result<BackupConfig> {
    let path = data_dir.join("config.toml");
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        let raw = tokio::fs::read_to_string(&path).await?;
        let config = toml::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Ok(config)
    } else {
        Ok(BackupConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_config_defaults_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).await.unwrap();
        assert_eq!(config.backup_interval_secs, 300);
    }

    #[tokio::test]
    async fn test_load_config_overrides() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("config.toml"),
            "backup_interval_secs = 60\nsession_dir = \"wa-session\"\n",
        )
        .await
        .unwrap();

        let config = load_config(dir.path()).await.unwrap();
        assert_eq!(config.backup_interval_secs, 60);
        assert_eq!(config.session_dir, PathBuf::from("wa-session"));
        // Untouched fields keep their defaults
        assert_eq!(config.health_interval_secs, 60);
    }
}
