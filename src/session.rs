use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::{time::now_ms, AppError, AppResult};

/// Key under which the client-local "already logged in" marker is stored.
pub const AUTH_FLAG_KEY: &str = "kitchenAuth";
const AUTH_FLAG_VALUE: &str = "authenticated";

trait FlagStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    fn save(&self) -> AppResult<()>;
}

/// JSON map persisted to disk, so the login gate is skipped on the next
/// startup.
struct FileStore {
    path: PathBuf,
    data: Mutex<HashMap<String, String>>,
}

impl FileStore {
    fn open(path: &Path) -> AppResult<Self> {
        let data = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => HashMap::new(),
        };
        Ok(FileStore {
            path: path.to_path_buf(),
            data: Mutex::new(data),
        })
    }
}

impl FlagStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.remove(key);
        }
    }

    fn save(&self) -> AppResult<()> {
        let snapshot = self
            .data
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(AppError::from)?;
        }
        let raw = serde_json::to_string(&snapshot).map_err(AppError::from)?;
        fs::write(&self.path, raw).map_err(AppError::from)
    }
}

#[derive(Default)]
struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl FlagStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut guard) = self.data.lock() {
            guard.remove(key);
        }
    }

    fn save(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Handle over the persisted login marker.
#[derive(Clone)]
pub struct SessionFlag {
    inner: Arc<dyn FlagStore>,
}

impl SessionFlag {
    pub fn file(path: &Path) -> AppResult<Self> {
        Ok(SessionFlag {
            inner: Arc::new(FileStore::open(path)?),
        })
    }

    /// Default on-disk location under the user data directory.
    pub fn default_file() -> AppResult<Self> {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::file(&base.join("kitchenhub").join("session.json"))
    }

    pub fn in_memory() -> Self {
        SessionFlag {
            inner: Arc::new(MemoryStore::default()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.get(AUTH_FLAG_KEY).as_deref() == Some(AUTH_FLAG_VALUE)
    }

    pub fn set_authenticated(&self) {
        self.inner.set(AUTH_FLAG_KEY, AUTH_FLAG_VALUE);
        if let Err(err) = self.inner.save() {
            warn!(target: "kitchenhub", area = "session", error = %err, "flag_save_failed");
        }
    }

    pub fn clear(&self) {
        self.inner.remove(AUTH_FLAG_KEY);
        if let Err(err) = self.inner.save() {
            warn!(target: "kitchenhub", area = "session", error = %err, "flag_save_failed");
        }
    }
}

/// Mint a bearer token for a logged-in member.
pub async fn create_session(pool: &SqlitePool, member_name: Option<&str>) -> AppResult<String> {
    let token = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO sessions (token, member_name, created_at) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(member_name)
        .bind(now_ms())
        .execute(pool)
        .await
        .map_err(AppError::from)?;
    Ok(token)
}

/// Resolve a bearer token to the session's member name (which may be null).
/// `None` means the token is unknown.
pub async fn lookup_token(pool: &SqlitePool, token: &str) -> AppResult<Option<Option<String>>> {
    let row: Option<Option<String>> =
        sqlx::query_scalar("SELECT member_name FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(pool)
            .await
            .map_err(AppError::from)?;
    Ok(row)
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> AppResult<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await
        .map_err(AppError::from)?;
    Ok(())
}
