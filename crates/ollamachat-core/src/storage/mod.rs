mod file;
mod migration;
mod preferences;

pub use file::FileStore;
pub use preferences::AppPreferences;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::constants::{defaults, paths};
use crate::error::StorageError;
use crate::session::{ChatSession, SessionSummary};

/// Durable storage for sessions and application preferences.
pub trait SessionStore: Send + Sync {
    /// Persist `session`, refreshing its `updated_at` first so the caller's
    /// copy matches what was written.
    fn save(&self, session: &mut ChatSession) -> Result<(), StorageError>;

    fn load(&self, id: &str) -> Result<ChatSession, StorageError>;

    /// All loadable sessions, most recently updated first.
    fn list(&self) -> Result<Vec<ChatSession>, StorageError>;

    fn delete(&self, id: &str) -> Result<(), StorageError>;

    /// Stored preferences, or defaults when none were saved yet.
    fn load_preferences(&self) -> Result<AppPreferences, StorageError>;

    fn save_preferences(&self, prefs: &AppPreferences) -> Result<(), StorageError>;

    /// Cheap availability check.
    fn ping(&self) -> Result<(), StorageError>;

    fn list_summaries(&self) -> Result<Vec<SessionSummary>, StorageError> {
        Ok(self.list()?.iter().map(ChatSession::summary).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub kind: String,
    pub base_path: PathBuf,
}

impl StorageConfig {
    pub fn file(base_path: impl Into<PathBuf>) -> Self {
        Self {
            kind: defaults::STORAGE_KIND.to_string(),
            base_path: base_path.into(),
        }
    }

    /// Platform data directory, e.g. `~/.local/share/ollamachat`.
    pub fn default_base_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(paths::DATA_DIR)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::file(Self::default_base_path())
    }
}

pub fn create_store(config: &StorageConfig) -> Result<Arc<dyn SessionStore>, StorageError> {
    match config.kind.trim().to_ascii_lowercase().as_str() {
        "file" => Ok(Arc::new(FileStore::open(&config.base_path)?)),
        other => Err(StorageError::Unsupported(other.to_string())),
    }
}
