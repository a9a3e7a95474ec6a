//! Writing the active credential into the target application's own state store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use rotator_types::models::TargetAppConfig;
use rotator_types::CloudAccount;
use rusqlite::{Connection, OptionalExtension};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::utils::paths::default_state_db_path;
use crate::utils::protobuf;

/// `ItemTable` key of the serialized login state.
pub const STATE_KEY: &str = "jetskiStateSync.agentManagerInitState";

/// Suffix of the byte-for-byte copy taken before injection.
pub const BACKUP_SUFFIX: &str = ".backup";

/// The external application's credential storage, opaque to the rotation logic.
#[async_trait]
pub trait StateInjector: Send + Sync {
    /// Copy the state file to its `.backup` sibling. `None` when there is no file yet.
    async fn backup(&self) -> AppResult<Option<PathBuf>>;

    /// Put a previous backup back in place.
    async fn restore(&self, backup: &Path) -> AppResult<()>;

    /// Overwrite the stored OAuth credential with the account's token.
    async fn inject(&self, account: &CloudAccount) -> AppResult<()>;
}

pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// [`StateInjector`] for the application's SQLite `state.vscdb`.
#[derive(Debug, Clone)]
pub struct SqliteStateInjector {
    db_path: PathBuf,
}

impl SqliteStateInjector {
    pub const fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    /// Configured path, or the platform default location.
    pub fn from_config(target: &TargetAppConfig) -> AppResult<Self> {
        let path = match target.state_db_path.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(p) => PathBuf::from(p),
            None => default_state_db_path().map_err(AppError::Config)?,
        };
        Ok(Self::new(path))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn write_credentials(
        db_path: &Path,
        access_token: &str,
        refresh_token: &str,
        expiry: i64,
    ) -> AppResult<()> {
        let conn = Connection::open(db_path)?;
        conn.execute("CREATE TABLE IF NOT EXISTS ItemTable (key TEXT PRIMARY KEY, value TEXT)", [])?;

        let current: Option<String> = conn
            .query_row("SELECT value FROM ItemTable WHERE key = ?1", [STATE_KEY], |row| row.get(0))
            .optional()?;

        let state = match current {
            Some(encoded) => general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| AppError::Database(format!("state blob is not base64: {e}")))?,
            None => {
                warn!("[Switch] No login state in {}, writing a fresh one", db_path.display());
                Vec::new()
            },
        };

        let updated = protobuf::replace_oauth_field(&state, access_token, refresh_token, expiry)
            .map_err(|e| AppError::Database(format!("state blob is not valid protobuf: {e}")))?;

        conn.execute(
            "INSERT OR REPLACE INTO ItemTable (key, value) VALUES (?1, ?2)",
            [STATE_KEY, general_purpose::STANDARD.encode(updated).as_str()],
        )?;
        Ok(())
    }
}

#[async_trait]
impl StateInjector for SqliteStateInjector {
    async fn backup(&self) -> AppResult<Option<PathBuf>> {
        let source = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> AppResult<Option<PathBuf>> {
            if !source.exists() {
                return Ok(None);
            }
            let target = backup_path_for(&source);
            std::fs::copy(&source, &target)?;
            info!("[Switch] Backed up state to {}", target.display());
            Ok(Some(target))
        })
        .await?
    }

    async fn restore(&self, backup: &Path) -> AppResult<()> {
        let source = backup.to_path_buf();
        let target = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> AppResult<()> {
            std::fs::copy(&source, &target)?;
            info!("[Switch] Restored state from {}", source.display());
            Ok(())
        })
        .await?
    }

    async fn inject(&self, account: &CloudAccount) -> AppResult<()> {
        let db_path = self.db_path.clone();
        let token = account.token.clone();
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::task::spawn_blocking(move || {
            Self::write_credentials(
                &db_path,
                &token.access_token,
                &token.refresh_token,
                token.expiry_timestamp,
            )
        })
        .await??;
        info!("[Switch] Injected credentials for {}", account.email);
        Ok(())
    }
}
