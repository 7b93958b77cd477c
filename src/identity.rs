//! Durable client-local key/value storage.
//!
//! The only things docfit persists across sessions are the referral
//! identity code and the referral-consumed marker. Rather than hard-wiring
//! a storage mechanism, the tracker takes an injected [`IdentityStore`]
//! capability: hosts embed whatever they have (browser localStorage, a
//! config file, a test fake).
//!
//! Two implementations ship with the crate: [`MemoryIdentityStore`] for
//! tests and ephemeral sessions, and [`FsIdentityStore`], a JSON file used
//! by the CLI host.

use crate::error::DocfitError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Capability for durable string storage.
///
/// Implementations are infallible on `get`/`exists` (a broken store reads
/// as empty) and report write failures so callers can decide whether the
/// loss of durability matters.
pub trait IdentityStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), DocfitError>;
    fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

// ── In-memory store ──────────────────────────────────────────────────────

/// Volatile store for tests and hosts without durable storage.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    values: HashMap<String, String>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), DocfitError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ── File-backed store ────────────────────────────────────────────────────

/// JSON-file store: the CLI's stand-in for browser localStorage.
///
/// The whole map is rewritten on every `set` via temp-file-plus-rename so a
/// crash mid-write never leaves a truncated state file behind.
#[derive(Debug)]
pub struct FsIdentityStore {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl FsIdentityStore {
    /// Open (or create) the store at `path`.
    ///
    /// An unreadable or malformed file reads as empty rather than failing:
    /// losing a referral marker is preferable to making the whole client
    /// unusable over a corrupt state file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocfitError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DocfitError::StoreFailed {
                reason: format!("create {}: {e}", parent.display()),
            })?;
        }
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => HashMap::new(),
        };
        Ok(Self { path, values })
    }

    fn flush(&self) -> Result<(), DocfitError> {
        let raw = serde_json::to_string_pretty(&self.values).map_err(|e| {
            DocfitError::StoreFailed {
                reason: format!("serialise state: {e}"),
            }
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw).map_err(|e| DocfitError::StoreFailed {
            reason: format!("write {}: {e}", tmp.display()),
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| DocfitError::StoreFailed {
            reason: format!("rename to {}: {e}", self.path.display()),
        })
    }
}

impl IdentityStore for FsIdentityStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), DocfitError> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }
}
