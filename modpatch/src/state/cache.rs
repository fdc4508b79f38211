//! Hot in-memory cache of the last touched patch state.
//!
//! One slot per `prefix.key`, each holding the state of a single patch path.
//! Asking for a different path drops the slot instead of keeping a map of
//! paths: memory stays bounded at the cost of reloading when the active
//! collection alternates.
//!
//! All access goes through an internal mutex, so the cache can be shared
//! between the store, its background writer and the facade.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use super::model::PatchState;

/// Cache prefix used by the state store.
pub const STATE_CACHE_PREFIX: &str = "ModPatchExporter";

/// Cache key used by the state store.
pub const STATE_CACHE_KEY: &str = "PatchState";

/// A cached patch state plus what is known about its history payloads.
#[derive(Debug, Clone, Default)]
pub struct CachedState {
    /// Patch root this state belongs to.
    pub last_cached_path: PathBuf,

    pub patch_state: PatchState,

    /// `TypeAndId`s whose payload lives in a history side file.
    pub externally_loaded: HashSet<String>,

    /// Whether side files were read into `patch_state.conflict_history`.
    pub external_code_loaded: bool,
}

impl CachedState {
    /// Whether this entry belongs to `path` (case-insensitive).
    pub fn is_for_path(&self, path: &Path) -> bool {
        paths_match(&self.last_cached_path, path)
    }
}

fn paths_match(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

fn construct_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Mutex-guarded slots of [`CachedState`].
#[derive(Debug, Default)]
pub struct StateCache {
    slots: Mutex<HashMap<String, CachedState>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the slot, if any.
    pub fn get(&self, prefix: &str, key: &str) -> Option<CachedState> {
        self.slots.lock().get(&construct_key(prefix, key)).cloned()
    }

    /// Replace the slot.
    pub fn set(&self, prefix: &str, key: &str, value: CachedState) {
        self.slots.lock().insert(construct_key(prefix, key), value);
    }

    /// Drop the slot.
    pub fn invalidate(&self, prefix: &str, key: &str) {
        self.slots.lock().remove(&construct_key(prefix, key));
    }

    /// Run `f` against the slot when it belongs to `path`.
    ///
    /// A slot holding another path is invalidated and `None` is returned, so
    /// state never leaks from one collection into another.
    pub fn read_for_path<R>(
        &self,
        prefix: &str,
        key: &str,
        path: &Path,
        f: impl FnOnce(&CachedState) -> R,
    ) -> Option<R> {
        let cache_key = construct_key(prefix, key);
        let mut slots = self.slots.lock();
        match slots.get(&cache_key) {
            Some(cached) if cached.is_for_path(path) => Some(f(cached)),
            Some(cached) => {
                debug!(
                    cached = %cached.last_cached_path.display(),
                    requested = %path.display(),
                    "Patch path changed, dropping cached state"
                );
                slots.remove(&cache_key);
                None
            }
            None => None,
        }
    }

    /// Mutate the slot in place when it belongs to `path`. Returns whether it did.
    pub fn update_for_path(
        &self,
        prefix: &str,
        key: &str,
        path: &Path,
        f: impl FnOnce(&mut CachedState),
    ) -> bool {
        let mut slots = self.slots.lock();
        match slots.get_mut(&construct_key(prefix, key)) {
            Some(cached) if cached.is_for_path(path) => {
                f(cached);
                true
            }
            _ => false,
        }
    }
}
