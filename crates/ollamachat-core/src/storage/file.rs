use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::migration;
use super::{AppPreferences, SessionStore};
use crate::constants::paths;
use crate::error::StorageError;
use crate::session::ChatSession;

/// Stores each session as pretty-printed JSON under `<base>/sessions/<id>.json`
/// and the preferences record as `<base>/preferences.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `base_dir`, importing a
    /// legacy `chat_history.json` on first use.
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let store = Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        };
        let sessions = store.sessions_dir();
        fs::create_dir_all(&sessions)
            .map_err(|e| StorageError::io("create directory", &sessions, e))?;
        info!(path = %store.base_dir.display(), "Opened session store");

        migration::migrate_legacy_history(&store)?;
        Ok(store)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn sessions_dir(&self) -> PathBuf {
        self.base_dir.join(paths::SESSIONS_DIR)
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.sessions_dir().join(format!("{id}.json"))
    }

    fn preferences_path(&self) -> PathBuf {
        self.base_dir.join(paths::PREFERENCES_FILE)
    }

    pub(crate) fn session_exists(&self, id: &str) -> bool {
        ChatSession::is_valid_id(id) && self.session_path(id).is_file()
    }
}

impl SessionStore for FileStore {
    fn save(&self, session: &mut ChatSession) -> Result<(), StorageError> {
        if !ChatSession::is_valid_id(&session.id) {
            return Err(StorageError::InvalidId(session.id.clone()));
        }
        session.touch();
        write_json(&self.session_path(&session.id), session)?;
        debug!(session_id = %session.id, messages = session.messages.len(), "Saved session");
        Ok(())
    }

    fn load(&self, id: &str) -> Result<ChatSession, StorageError> {
        if !ChatSession::is_valid_id(id) {
            return Err(StorageError::NotFound(id.to_string()));
        }
        read_session(&self.session_path(id), id)?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn list(&self) -> Result<Vec<ChatSession>, StorageError> {
        let dir = self.sessions_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io("read directory", &dir, e)),
        };

        let mut sessions = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match read_session(&path, id) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unloadable session"),
            }
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    fn delete(&self, id: &str) -> Result<(), StorageError> {
        if !ChatSession::is_valid_id(id) {
            return Err(StorageError::NotFound(id.to_string()));
        }
        let path = self.session_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(session_id = id, "Deleted session");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(id.to_string())),
            Err(e) => Err(StorageError::io("delete", path, e)),
        }
    }

    fn load_preferences(&self) -> Result<AppPreferences, StorageError> {
        Ok(read_json(&self.preferences_path())?.unwrap_or_default())
    }

    fn save_preferences(&self, prefs: &AppPreferences) -> Result<(), StorageError> {
        write_json(&self.preferences_path(), prefs)?;
        debug!("Saved preferences");
        Ok(())
    }

    fn ping(&self) -> Result<(), StorageError> {
        let meta = fs::metadata(&self.base_dir)
            .map_err(|e| StorageError::io("stat", &self.base_dir, e))?;
        if !meta.is_dir() {
            return Err(StorageError::io(
                "stat",
                &self.base_dir,
                std::io::Error::new(ErrorKind::Other, "not a directory"),
            ));
        }
        Ok(())
    }
}

/// Read a JSON record. A missing file is `Ok(None)`.
pub(super) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io("read", path, e)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Read a session record, rejecting one whose `id` differs from its file name.
fn read_session(path: &Path, id: &str) -> Result<Option<ChatSession>, StorageError> {
    let Some(session) = read_json::<ChatSession>(path)? else {
        return Ok(None);
    };
    if session.id != id {
        return Err(StorageError::Corrupt {
            path: path.to_path_buf(),
            source: serde::de::Error::custom(format!(
                "record id `{}` does not match file name `{id}`",
                session.id
            )),
        });
    }
    Ok(Some(session))
}

/// Write via a temporary sibling and rename, so readers never see a partial record.
pub(super) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let contents = serde_json::to_string_pretty(value).map_err(|source| StorageError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents).map_err(|e| StorageError::io("write", &tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| StorageError::io("rename", path, e))?;
    Ok(())
}
