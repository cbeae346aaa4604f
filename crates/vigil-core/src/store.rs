//! Persistent session state
//!
//! One JSON record per subject holding the credential, the failure count and
//! the pending challenge. Written after every mutating operation.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credential::Credential;
use crate::otp::PendingOtp;

/// Current state record version
pub const STATE_VERSION: u32 = 1;

/// Persistence failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("State IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State record is corrupt: {0}")]
    Corrupt(String),
}

/// Everything that survives a restart for one subject
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredState {
    /// Version for future migrations
    #[serde(default = "default_version")]
    pub version: u32,
    /// Credential, absent until setup
    #[serde(default)]
    pub credential: Option<Credential>,
    /// Consecutive PIN failures
    #[serde(default)]
    pub failure_count: u32,
    /// Pending second-factor challenge
    #[serde(default)]
    pub pending: Option<PendingOtp>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl Default for StoredState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            credential: None,
            failure_count: 0,
            pending: None,
        }
    }
}

impl StoredState {
    /// Parse a state record
    pub fn from_json(data: &[u8]) -> Result<Self, StoreError> {
        let state: Self =
            serde_json::from_slice(data).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        if state.version > STATE_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported state version {}",
                state.version
            )));
        }
        if let Some(credential) = &state.credential {
            credential.check().map_err(StoreError::Corrupt)?;
        }
        if let Some(pending) = &state.pending {
            pending.check().map_err(StoreError::Corrupt)?;
        }
        Ok(state)
    }

    /// Serialize a state record
    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

/// Durable storage for one subject's state
pub trait StateStore: Send + Sync {
    /// Load the record; `Ok(None)` when nothing was saved yet
    fn load(&self) -> Result<Option<StoredState>, StoreError>;

    /// Replace the record
    fn save(&self, state: &StoredState) -> Result<(), StoreError>;
}

/// JSON file store with atomic replace
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store state at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store state as `state.json` inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("state.json"))
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<StoredState>, StoreError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        StoredState::from_json(&data).map(Some)
    }

    fn save(&self, state: &StoredState) -> Result<(), StoreError> {
        let contents = state.to_json()?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically; the temp file is owner-only from creation
        let temp_path = self.path.with_extension("json.tmp");
        match fs::remove_file(&temp_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&temp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

/// In-memory store keeping the serialized record
#[derive(Debug, Default)]
pub struct MemoryStore {
    raw: Mutex<Option<String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with raw record text
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    /// Raw record text, if saved
    pub fn raw(&self) -> Option<String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.raw.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<StoredState>, StoreError> {
        match self.lock().as_deref() {
            Some(raw) => StoredState::from_json(raw.as_bytes()).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, state: &StoredState) -> Result<(), StoreError> {
        let raw = state.to_json()?;
        *self.lock() = Some(raw);
        Ok(())
    }
}
