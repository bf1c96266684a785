use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use super::file::read_json;
use super::{FileStore, SessionStore};
use crate::constants::paths;
use crate::error::StorageError;
use crate::session::{ChatMessage, ChatSession, Sender};

/// Entry of the single-conversation history file written by early releases.
#[derive(Debug, Deserialize)]
struct LegacyMessage {
    sender: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    timestamp: String,
}

impl LegacyMessage {
    fn into_message(self, fallback: DateTime<Utc>) -> ChatMessage {
        let sender = match self.sender.as_str() {
            "user" => Sender::User,
            _ => Sender::Assistant,
        };
        let timestamp = DateTime::parse_from_rfc3339(self.timestamp.trim())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(fallback);
        ChatMessage {
            sender,
            content: self.content,
            timestamp,
        }
    }
}

/// Import `<base>/chat_history.json` as the `default` session, then rename it
/// to `chat_history.json.migrated` so the import happens once.
pub(super) fn migrate_legacy_history(store: &FileStore) -> Result<(), StorageError> {
    let legacy_path = store.base_dir().join(paths::LEGACY_HISTORY_FILE);
    if !legacy_path.is_file() {
        return Ok(());
    }

    if store.session_exists(paths::LEGACY_SESSION_ID) {
        info!("Default session already present, retiring legacy history file");
    } else {
        match read_json::<Vec<LegacyMessage>>(&legacy_path) {
            Ok(Some(history)) => import(store, history)?,
            Ok(None) => return Ok(()),
            Err(e) => {
                // Leave the file in place so the user can recover it by hand.
                warn!(path = %legacy_path.display(), error = %e, "Legacy history is unreadable, skipping migration");
                return Ok(());
            }
        }
    }

    retire(&legacy_path)
}

fn import(store: &FileStore, history: Vec<LegacyMessage>) -> Result<(), StorageError> {
    let now = Utc::now();
    let messages: Vec<ChatMessage> = history
        .into_iter()
        .map(|m| m.into_message(now))
        .collect();

    let mut session = ChatSession::new(paths::LEGACY_SESSION_NAME);
    session.id = paths::LEGACY_SESSION_ID.to_string();
    if let Some(first) = messages.first() {
        session.created_at = first.timestamp.min(now);
    }
    let count = messages.len();
    session.messages = messages;

    store.save(&mut session)?;
    info!(messages = count, "Migrated legacy chat history");
    Ok(())
}

fn retire(legacy_path: &Path) -> Result<(), StorageError> {
    let mut target = legacy_path.as_os_str().to_owned();
    target.push(".");
    target.push(paths::LEGACY_MIGRATED_SUFFIX);
    fs::rename(legacy_path, &target).map_err(|e| StorageError::io("rename", legacy_path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LEGACY: &str = r#"[
        {"sender": "user", "content": "Hello", "timestamp": "2024-05-01T10:00:00Z"},
        {"sender": "llm", "content": "Hi!", "timestamp": "2024-05-01T10:00:05Z"},
        {"sender": "user", "content": "No time"}
    ]"#;

    #[test]
    fn test_imports_once() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("chat_history.json"), LEGACY).unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        let session = store.load("default").unwrap();
        assert_eq!(session.name, "Default Session");
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[0].sender, Sender::User);
        assert_eq!(session.messages[1].sender, Sender::Assistant);
        assert_eq!(session.messages[1].content, "Hi!");
        assert_eq!(
            session.created_at,
            DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap()
        );

        assert!(!dir.path().join("chat_history.json").exists());
        assert!(dir.path().join("chat_history.json.migrated").exists());

        // Second open is a no-op.
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.load("default").unwrap(), session);
    }

    #[test]
    fn test_existing_default_session_wins() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let mut existing = ChatSession::new("Mine");
        existing.id = "default".to_string();
        store.save(&mut existing).unwrap();

        fs::write(dir.path().join("chat_history.json"), LEGACY).unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert_eq!(store.load("default").unwrap().name, "Mine");
        assert!(dir.path().join("chat_history.json.migrated").exists());
    }

    #[test]
    fn test_unreadable_legacy_file_left_alone() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("chat_history.json"), "garbage").unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(dir.path().join("chat_history.json").exists());
    }
}
