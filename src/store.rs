//! Durable key/value persistence for the session record.
//!
//! A [`SessionRecord`] is the `(gameId, username)` pair that lets the client
//! rejoin an in-flight game after a dropped connection or a restart. Both
//! halves must be present and non-empty; anything else reads as "no record".
//!
//! The record helpers on [`SessionStore`] never fail: storage errors are
//! logged and treated as an absent record.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::error::{ClientError, Result};

/// Storage key for the active game id.
pub const GAME_ID_KEY: &str = "gameId";

/// Storage key for the player's username.
pub const USERNAME_KEY: &str = "username";

/// The persisted identity needed to rejoin a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub game_id: String,
    pub username: String,
}

impl SessionRecord {
    pub fn new(game_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            username: username.into(),
        }
    }
}

/// String key/value storage.
///
/// Implementations use interior mutability so one store can be shared
/// behind an `Arc`.
pub trait SessionStore: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] if the backing medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] if the value cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] if the backing medium cannot be written.
    fn remove(&self, key: &str) -> Result<()>;

    /// The stored record, or `None` if either half is missing or empty.
    fn load_record(&self) -> Option<SessionRecord> {
        let read = |key: &str| match self.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, "failed to read session store: {e}");
                None
            }
        };
        let game_id = read(GAME_ID_KEY)?;
        let username = read(USERNAME_KEY)?;
        Some(SessionRecord { game_id, username })
    }

    fn save_record(&self, record: &SessionRecord) {
        for (key, value) in [
            (GAME_ID_KEY, record.game_id.as_str()),
            (USERNAME_KEY, record.username.as_str()),
        ] {
            if let Err(e) = self.set(key, value) {
                warn!(key, "failed to write session store: {e}");
            }
        }
    }

    fn clear_record(&self) {
        for key in [GAME_ID_KEY, USERNAME_KEY] {
            if let Err(e) = self.remove(key) {
                warn!(key, "failed to clear session store: {e}");
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── In-memory ───────────────────────────────────────────────────────

/// A store that lives as long as the process. Useful for tests and for
/// clients that should not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.values).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.values).insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.values).remove(key);
        Ok(())
    }
}

// ── JSON file ───────────────────────────────────────────────────────

/// A store backed by a single JSON object on disk.
///
/// The file is read on every access and rewritten on every change. A missing
/// file is an empty store; an unreadable one is reported as a
/// [`ClientError::Storage`] and overwritten by the next write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(ClientError::Storage(format!("{}: {e}", self.path.display()))),
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text)
            .map_err(|e| ClientError::Storage(format!("{}: {e}", self.path.display())))
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, json)
            .map_err(|e| ClientError::Storage(format!("{}: {e}", self.path.display())))
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = lock(&self.write_lock);
        let mut map = self.read_map().unwrap_or_else(|e| {
            warn!("discarding unreadable session file: {e}");
            BTreeMap::new()
        });
        apply(&mut map);
        self.write_map(&map)
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|map| {
            map.remove(key);
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "connect-four-store-{}-{name}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn record_round_trips_through_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.load_record(), None);

        let record = SessionRecord::new("g1", "alice");
        store.save_record(&record);
        assert_eq!(store.load_record(), Some(record));
        assert_eq!(store.get(GAME_ID_KEY).unwrap().as_deref(), Some("g1"));

        store.clear_record();
        assert_eq!(store.load_record(), None);
        assert_eq!(store.get(USERNAME_KEY).unwrap(), None);
    }

    #[test]
    fn partial_record_is_not_trusted() {
        let store = MemoryStore::new();
        store.set(GAME_ID_KEY, "g1").unwrap();
        assert_eq!(store.load_record(), None);

        store.set(USERNAME_KEY, "").unwrap();
        assert_eq!(store.load_record(), None);

        store.set(USERNAME_KEY, "alice").unwrap();
        assert_eq!(store.load_record(), Some(SessionRecord::new("g1", "alice")));
    }

    #[test]
    fn file_store_survives_reopen() {
        let path = scratch_file("reopen");
        FileStore::new(&path).save_record(&SessionRecord::new("g7", "bob"));

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.load_record(), Some(SessionRecord::new("g7", "bob")));

        reopened.clear_record();
        assert_eq!(FileStore::new(&path).load_record(), None);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let store = FileStore::new(scratch_file("missing"));
        assert_eq!(store.get(GAME_ID_KEY).unwrap(), None);
        assert_eq!(store.load_record(), None);
        tokio_test::assert_ok!(store.remove(GAME_ID_KEY));
        let _ = std::fs::remove_file(store.path());
    }

    #[test]
    fn corrupt_file_reads_as_absent_and_is_overwritten() {
        let path = scratch_file("corrupt");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileStore::new(&path);

        let err = tokio_test::assert_err!(store.get(GAME_ID_KEY));
        assert!(matches!(err, ClientError::Storage(_)));
        assert_eq!(store.load_record(), None);

        store.save_record(&SessionRecord::new("g2", "carol"));
        assert_eq!(store.load_record(), Some(SessionRecord::new("g2", "carol")));
        let _ = std::fs::remove_file(&path);
    }
}
