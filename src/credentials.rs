use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;

use crate::api::models::Identity;
use crate::error::StorageError;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

/// String key/value storage that survives restarts.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Credentials kept in a small TOML file, one string per key.
pub struct FileCredentials {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    /// `credentials.toml` in the user's config directory.
    pub fn open_default() -> Result<Self, StorageError> {
        let proj = ProjectDirs::from("com", "example", "SendMe").ok_or(StorageError::NoDir)?;
        Ok(Self::new(proj.config_dir().join("credentials.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string_pretty(entries)?)?;
        Ok(())
    }
}

impl CredentialStore for FileCredentials {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCredentials {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentials {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
        Ok(())
    }
}

pub fn persist_session(
    store: &dyn CredentialStore,
    token: &str,
    user: &Identity,
) -> Result<(), StorageError> {
    store.set(TOKEN_KEY, token)?;
    store.set(USER_KEY, &serde_json::to_string(user)?)
}

/// Reads back a saved session. Missing keys or an unreadable profile mean
/// there is no session to restore.
pub fn restore_session(store: &dyn CredentialStore) -> Result<Option<(String, Identity)>, StorageError> {
    let (Some(token), Some(raw_user)) = (store.get(TOKEN_KEY)?, store.get(USER_KEY)?) else {
        return Ok(None);
    };
    match serde_json::from_str::<Identity>(&raw_user) {
        Ok(user) => Ok(Some((token, user))),
        Err(e) => {
            log::warn!("Ignoring stored profile: {e}");
            Ok(None)
        }
    }
}

pub fn clear_session(store: &dyn CredentialStore) -> Result<(), StorageError> {
    store.remove(TOKEN_KEY)?;
    store.remove(USER_KEY)
}
