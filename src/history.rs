//! Conversation history persistence
//!
//! The history is a JSON array of `{role, content}` objects, rewritten in
//! full after every assistant turn.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instruction to the model
    System,
    /// Something the user said or typed
    User,
    /// A model reply
    Assistant,
}

impl Role {
    /// Wire name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Loads and saves the conversation history file
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Create a store backed by `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the history file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted history
    ///
    /// Never fails: a missing or unreadable file yields an empty history. A
    /// file that does not parse is moved aside so the next save cannot
    /// clobber it.
    #[must_use]
    pub fn load(&self) -> Vec<Message> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no history file, starting fresh");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read history, starting fresh");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Message>>(&content) {
            Ok(messages) => {
                tracing::debug!(path = %self.path.display(), count = messages.len(), "loaded history");
                messages
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "history file is not valid, starting fresh");
                self.quarantine();
                Vec::new()
            }
        }
    }

    /// Overwrite the history file with `messages`
    ///
    /// The content is written to a temporary file next to the destination
    /// and renamed over it, so readers see either the old or the new history.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written or renamed
    pub fn save(&self, messages: &[Message]) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut file, messages)?;
        file.flush()?;
        file.as_file().sync_all()?;
        file.persist(&self.path)
            .map_err(|e| Error::Persist(format!("{}: {}", self.path.display(), e.error)))?;

        tracing::debug!(path = %self.path.display(), count = messages.len(), "saved history");
        Ok(())
    }

    /// Move an unparseable history file to `<path>.corrupt`
    fn quarantine(&self) {
        let mut target = OsString::from(self.path.as_os_str());
        target.push(".corrupt");
        let target = PathBuf::from(target);

        match std::fs::rename(&self.path, &target) {
            Ok(()) => tracing::warn!(path = %target.display(), "moved unreadable history aside"),
            Err(e) => tracing::warn!(error = %e, "failed to move unreadable history aside"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
        assert_eq!(Role::System.as_str(), "system");
    }

    #[test]
    fn test_save_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));

        store.save(&[Message::user("one")]).unwrap();
        store.save(&[Message::user("one"), Message::assistant("two")]).unwrap();

        assert_eq!(store.load().len(), 2);
        // Only the history file remains, no stray temp files
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_history_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("absent.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_corrupt_history_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "not json").unwrap();

        let store = HistoryStore::new(&path);
        assert!(store.load().is_empty());
        assert!(!path.exists());
        assert!(dir.path().join("history.json.corrupt").exists());
    }
}
