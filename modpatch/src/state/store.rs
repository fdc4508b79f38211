//! Patch state store.
//!
//! Loads and saves [`PatchState`] for a patch directory, keeping the last
//! touched state in a [`StateCache`] and persisting in the background.
//!
//! # Concurrency
//!
//! One async write lock serializes every cache-miss load, every save and every
//! background write, across all patches. Saves update the cache before the
//! write is scheduled, so reads issued while a write is in flight already see
//! the new state.
//!
//! ```text
//! save_state ──lock──► merge into cached state ──► cache.set ──► spawn write
//!                                                                   │
//!                        lock ◄─────────────────────────────────────┘
//!                          │
//!                          ├─ state.json ──copy──► state.json.bak
//!                          ├─ modified history ──► state_conflict_history/
//!                          └─ document ──► state.json.tmp ──rename──► state.json
//! ```
//!
//! A write that has been overtaken by a newer save of the same document is
//! skipped; the newer write carries its changes. Until the newest write for a
//! document lands, cache misses load the state it was scheduled with instead
//! of the stale file on disk.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, warn};

use super::cache::{CachedState, StateCache, STATE_CACHE_KEY, STATE_CACHE_PREFIX};
use super::history::{same_payload, strip_externalized, HistoryExternalizer};
use super::model::{PatchState, PatchStateMode};
use super::signal::{StateWriteEvent, WriteTracker};
use crate::config::ExporterConfig;
use crate::definition::{Definition, DefinitionMapper};
use crate::error::{PatchError, PatchResult};
use crate::naming::backup_path;
use crate::patches::PatchLocation;
use crate::retry::RetryStrategy;

/// Suffix of the sibling file the document is written to before the rename.
const TEMP_EXTENSION: &str = ".tmp";

/// Everything a save replaces in the stored state.
#[derive(Debug, Clone, Default)]
pub struct SaveStateRequest {
    pub location: PatchLocation,

    /// Entries resolved in this pass. Feed the history only.
    pub definitions: Vec<Definition>,

    pub conflicts: Vec<Definition>,
    pub resolved_conflicts: Vec<Definition>,
    pub orphan_conflicts: Vec<Definition>,
    pub ignored_conflicts: Vec<Definition>,
    pub overwritten_conflicts: Vec<Definition>,
    pub custom_conflicts: Vec<Definition>,

    pub ignore_conflict_paths: Option<String>,
    pub mode: PatchStateMode,
    pub load_order: Vec<String>,
    pub allowed_languages: Vec<String>,
    pub has_game_definitions: bool,
}

impl SaveStateRequest {
    pub fn new(location: PatchLocation) -> Self {
        Self {
            location,
            ..Self::default()
        }
    }
}

/// Latest scheduled write for one document plus the history keys it owes.
///
/// Kept until that write lands, so `snapshot` is the newest state of the
/// document while the file is behind.
#[derive(Debug, Default)]
struct PendingWrite {
    generation: u64,
    modified: HashSet<String>,
    snapshot: CachedState,
}

/// Snapshot handed to the background writer.
struct WriteJob {
    generation: u64,
    patch_root: PathBuf,
    state_path: PathBuf,
    state: PatchState,
    externally_loaded: HashSet<String>,
}

/// Loads, caches and persists patch state.
///
/// Cheap to clone; clones share the cache, lock and write tracker.
#[derive(Clone)]
pub struct StateStore {
    config: Arc<ExporterConfig>,
    retry: RetryStrategy,
    history: HistoryExternalizer,
    cache: Arc<StateCache>,
    write_lock: Arc<Mutex<()>>,
    tracker: Arc<WriteTracker>,
    pending: Arc<parking_lot::Mutex<HashMap<PathBuf, PendingWrite>>>,
    next_generation: Arc<AtomicU64>,
}

impl StateStore {
    /// Create a store with its own cache and lock.
    pub fn new(config: ExporterConfig) -> Self {
        Self::with_shared(
            config,
            Arc::new(StateCache::new()),
            Arc::new(Mutex::new(())),
        )
    }

    /// Create a store over an existing cache and write lock.
    ///
    /// # Arguments
    ///
    /// * `config` - File names and retry policy
    /// * `cache` - Cache shared with other components
    /// * `write_lock` - Process-wide lock for state I/O
    pub fn with_shared(
        config: ExporterConfig,
        cache: Arc<StateCache>,
        write_lock: Arc<Mutex<()>>,
    ) -> Self {
        let retry = RetryStrategy::new(config.retry);
        let history = HistoryExternalizer::new(config.history_dir_name.clone(), retry.clone());
        Self {
            config: Arc::new(config),
            retry,
            history,
            cache,
            write_lock,
            tracker: Arc::new(WriteTracker::new()),
            pending: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    /// The lock guarding all state I/O.
    pub fn write_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.write_lock)
    }

    pub fn history(&self) -> &HistoryExternalizer {
        &self.history
    }

    /// Path of the primary document for a patch root.
    pub fn state_path(&self, patch_root: &Path) -> PathBuf {
        patch_root.join(&self.config.state_file_name)
    }

    // =========================================================================
    // Load
    // =========================================================================

    /// Load the state of a patch.
    ///
    /// Returns a detached copy; mutating it never touches the cache. `None`
    /// when the patch has no state document or it cannot be parsed.
    ///
    /// # Arguments
    ///
    /// * `location` - Patch to load
    /// * `load_external_code` - Attach externalized history payloads
    pub async fn get_patch_state(
        &self,
        location: &PatchLocation,
        load_external_code: bool,
    ) -> PatchResult<Option<PatchState>> {
        self.with_state(location, load_external_code, |state| state.mapped(true))
            .await
    }

    /// Stored resolution mode, `None` when the patch has no state.
    pub async fn get_patch_state_mode(
        &self,
        location: &PatchLocation,
    ) -> PatchResult<PatchStateMode> {
        Ok(self
            .with_state(location, false, |state| state.mode)
            .await?
            .unwrap_or_default())
    }

    /// Stored allowed languages, empty when the patch has no state.
    pub async fn get_allowed_languages(&self, location: &PatchLocation) -> PatchResult<Vec<String>> {
        Ok(self
            .with_state(location, false, |state| state.allowed_languages.clone())
            .await?
            .unwrap_or_default())
    }

    /// Run `f` against the cached state of `location`, loading it first on a miss.
    async fn with_state<R>(
        &self,
        location: &PatchLocation,
        load_external_code: bool,
        f: impl FnOnce(&PatchState) -> R,
    ) -> PatchResult<Option<R>> {
        location.validate()?;
        let patch_root = location.patch_root();

        let mut f = Some(f);
        let hit = self
            .cache
            .read_for_path(STATE_CACHE_PREFIX, STATE_CACHE_KEY, &patch_root, |cached| {
                if load_external_code && !cached.external_code_loaded {
                    return None;
                }
                f.take().map(|f| f(&cached.patch_state))
            })
            .flatten();
        if hit.is_some() {
            return Ok(hit);
        }

        let _guard = self.write_lock.lock().await;

        // Re-check: another caller may have loaded while we waited
        let cached = match self.cache.read_for_path(
            STATE_CACHE_PREFIX,
            STATE_CACHE_KEY,
            &patch_root,
            CachedState::clone,
        ) {
            Some(cached) if !load_external_code || cached.external_code_loaded => Some(cached),
            Some(mut cached) => {
                self.history
                    .load(
                        &patch_root,
                        &mut cached.patch_state.conflict_history,
                        &mut cached.externally_loaded,
                    )
                    .await;
                cached.external_code_loaded = true;
                Some(cached)
            }
            None => self.load_locked(&patch_root, load_external_code).await?,
        };

        Ok(cached.and_then(|cached| {
            let result = f.take().map(|f| f(&cached.patch_state));
            self.cache.set(STATE_CACHE_PREFIX, STATE_CACHE_KEY, cached);
            result
        }))
    }

    /// Load on a cache miss. Caller holds the write lock.
    ///
    /// A document with a write still pending is loaded from the state that
    /// write was scheduled with; otherwise from disk.
    async fn load_locked(
        &self,
        patch_root: &Path,
        load_external_code: bool,
    ) -> PatchResult<Option<CachedState>> {
        let state_path = self.state_path(patch_root);
        let scheduled = self
            .pending
            .lock()
            .get(&state_path)
            .map(|pending| pending.snapshot.clone());

        let Some(mut cached) = scheduled else {
            return self.read_state_locked(patch_root, load_external_code).await;
        };

        debug!(path = %state_path.display(), "Loading state of a pending write");
        if load_external_code && !cached.external_code_loaded {
            self.history
                .load(
                    patch_root,
                    &mut cached.patch_state.conflict_history,
                    &mut cached.externally_loaded,
                )
                .await;
            cached.external_code_loaded = true;
        }
        Ok(Some(cached))
    }

    /// Read the document from disk. Caller holds the write lock.
    async fn read_state_locked(
        &self,
        patch_root: &Path,
        load_external_code: bool,
    ) -> PatchResult<Option<CachedState>> {
        let state_path = self.state_path(patch_root);
        if !tokio::fs::try_exists(&state_path).await.unwrap_or(false) {
            debug!(path = %state_path.display(), "No patch state document");
            return Ok(None);
        }

        let text = self
            .retry
            .run(|| tokio::fs::read_to_string(&state_path))
            .await
            .map_err(|e| PatchError::io(&state_path, e))?;

        let mut patch_state: PatchState = match serde_json::from_str(&text) {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    path = %state_path.display(),
                    error = %e,
                    "Patch state document is corrupt, treating as absent"
                );
                return Ok(None);
            }
        };
        patch_state.standardize_paths();

        let mut externally_loaded = HashSet::new();
        if load_external_code {
            self.history
                .load(
                    patch_root,
                    &mut patch_state.conflict_history,
                    &mut externally_loaded,
                )
                .await;
        }

        info!(
            patch = %patch_root.display(),
            history = patch_state.conflict_history.len(),
            "Loaded patch state"
        );

        Ok(Some(CachedState {
            last_cached_path: patch_root.to_path_buf(),
            patch_state,
            externally_loaded,
            external_code_loaded: load_external_code,
        }))
    }

    /// Drop the cached state.
    ///
    /// States of writes still pending stay loadable until they land.
    pub fn reset_cache(&self) {
        self.cache.invalidate(STATE_CACHE_PREFIX, STATE_CACHE_KEY);
    }

    /// Forget unwritten state for a patch whose directory is gone.
    pub fn discard_pending(&self, patch_root: &Path) {
        let state_path = self.state_path(patch_root);
        if self.pending.lock().remove(&state_path).is_some() {
            warn!(path = %state_path.display(), "Discarded unwritten patch state");
        }
    }

    // =========================================================================
    // Save
    // =========================================================================

    /// Merge `request` into the stored state and schedule its persistence.
    ///
    /// Returns once the cache holds the new state; the document is written by
    /// a background task. Use [`StateStore::wait_for_writes`] or
    /// [`StateStore::subscribe_events`] to observe durability.
    pub async fn save_state(&self, request: SaveStateRequest) -> PatchResult<bool> {
        request.location.validate()?;
        let patch_root = request.location.patch_root();
        let state_path = self.state_path(&patch_root);

        let guard = self.write_lock.lock().await;

        let mut cached = match self.cache.read_for_path(
            STATE_CACHE_PREFIX,
            STATE_CACHE_KEY,
            &patch_root,
            CachedState::clone,
        ) {
            Some(cached) => cached,
            None => self
                .load_locked(&patch_root, false)
                .await?
                .unwrap_or_else(|| CachedState {
                    last_cached_path: patch_root.clone(),
                    ..CachedState::default()
                }),
        };

        let SaveStateRequest {
            location: _,
            definitions,
            conflicts,
            resolved_conflicts,
            orphan_conflicts,
            ignored_conflicts,
            overwritten_conflicts,
            custom_conflicts,
            ignore_conflict_paths,
            mode,
            load_order,
            allowed_languages,
            has_game_definitions,
        } = request;

        let state = &mut cached.patch_state;
        state.conflicts = DefinitionMapper::map_many(&conflicts, false);
        state.resolved_conflicts = DefinitionMapper::map_many(&resolved_conflicts, false);
        state.orphan_conflicts = DefinitionMapper::map_many(&orphan_conflicts, false);
        state.ignored_conflicts = DefinitionMapper::map_many(&ignored_conflicts, false);
        state.overwritten_conflicts = DefinitionMapper::map_many(&overwritten_conflicts, false);
        state.custom_conflicts = DefinitionMapper::map_many(&custom_conflicts, false);
        state.ignore_conflict_paths = ignore_conflict_paths;
        state.mode = mode;
        state.load_order = load_order;
        state.allowed_languages = allowed_languages;
        state.has_game_definitions = has_game_definitions;

        let modified = self
            .merge_history(
                &patch_root,
                &mut cached,
                resolved_conflicts.iter().chain(definitions.iter()),
            )
            .await;

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let job = WriteJob {
            generation,
            patch_root: patch_root.clone(),
            state_path: state_path.clone(),
            state: cached.patch_state.mapped(true),
            externally_loaded: cached.externally_loaded.clone(),
        };

        info!(
            patch = %patch_root.display(),
            modified = modified.len(),
            history = cached.patch_state.conflict_history.len(),
            "Saved patch state"
        );

        cached.last_cached_path = patch_root;
        let snapshot = cached.clone();
        self.cache.set(STATE_CACHE_PREFIX, STATE_CACHE_KEY, cached);

        {
            let mut pending = self.pending.lock();
            let entry = pending.entry(state_path).or_default();
            entry.generation = generation;
            entry.modified.extend(modified);
            entry.snapshot = snapshot;
        }

        self.tracker.begin();
        drop(guard);

        let store = self.clone();
        tokio::spawn(async move { store.run_write(job).await });

        Ok(true)
    }

    /// Fold incoming entries with code into the history.
    ///
    /// Per `TypeAndId`: an existing entry with the same payload (line endings
    /// aside) is kept and its duplicates dropped; otherwise the incoming entry
    /// takes the place of the first existing one and the rest are dropped.
    /// Returns the keys that changed.
    async fn merge_history<'a>(
        &self,
        patch_root: &Path,
        cached: &mut CachedState,
        incoming: impl Iterator<Item = &'a Definition>,
    ) -> HashSet<String> {
        let mut modified = HashSet::new();

        for definition in incoming {
            let Some(incoming_code) = definition.code.as_deref().filter(|c| !c.is_empty()) else {
                continue;
            };
            let key = definition.type_and_id();
            let history = &mut cached.patch_state.conflict_history;
            let existing: Vec<usize> = history
                .iter()
                .enumerate()
                .filter(|(_, d)| d.type_and_id() == key)
                .map(|(idx, _)| idx)
                .collect();

            let mut identical = None;
            for &idx in &existing {
                let code = match &history[idx].code {
                    Some(code) => Some(code.clone()),
                    None => self
                        .history
                        .read_one(patch_root, &history[idx])
                        .await
                        .unwrap_or_else(|e| {
                            warn!(type_and_id = %key, error = %e, "Failed to read history payload");
                            None
                        }),
                };
                if code
                    .as_deref()
                    .is_some_and(|code| same_payload(code, incoming_code))
                {
                    identical = Some((idx, code));
                    break;
                }
            }

            match identical {
                Some((keep, code)) => {
                    if history[keep].code.is_none() {
                        history[keep].code = code;
                        cached.externally_loaded.insert(key);
                    }
                    retain_indices(history, |idx| idx == keep || !existing.contains(&idx));
                }
                None => {
                    let replacement = DefinitionMapper::map(definition, true);
                    match existing.first() {
                        Some(&first) => {
                            history[first] = replacement;
                            retain_indices(history, |idx| idx == first || !existing.contains(&idx));
                        }
                        None => history.push(replacement),
                    }
                    // Any side file now holds stale code
                    cached.externally_loaded.remove(&key);
                    modified.insert(key);
                }
            }
        }

        modified
    }

    // =========================================================================
    // Background write
    // =========================================================================

    async fn run_write(self, job: WriteJob) {
        let guard = self.write_lock.lock().await;

        // No entry means a newer write for this document already landed
        let modified = match self.pending.lock().get_mut(&job.state_path) {
            Some(latest) if latest.generation == job.generation => {
                Some(std::mem::take(&mut latest.modified))
            }
            _ => None,
        };

        let event = match modified {
            None => {
                debug!(
                    path = %job.state_path.display(),
                    generation = job.generation,
                    "Skipping superseded state write"
                );
                StateWriteEvent::Superseded {
                    path: job.state_path.clone(),
                }
            }
            Some(modified) => match self.write_state(&job, &modified).await {
                Ok(externalized) => {
                    self.pending.lock().remove(&job.state_path);
                    self.cache.update_for_path(
                        STATE_CACHE_PREFIX,
                        STATE_CACHE_KEY,
                        &job.patch_root,
                        |cached| cached.externally_loaded.extend(externalized),
                    );
                    debug!(path = %job.state_path.display(), "Wrote patch state");
                    StateWriteEvent::Written {
                        path: job.state_path.clone(),
                    }
                }
                Err(e) => {
                    error!(
                        path = %job.state_path.display(),
                        error = %e,
                        "Failed to write patch state"
                    );
                    // Owe the history keys to the next write
                    if let Some(latest) = self.pending.lock().get_mut(&job.state_path) {
                        latest.modified.extend(modified);
                    }
                    StateWriteEvent::Failed {
                        path: job.state_path.clone(),
                        error: e.to_string(),
                    }
                }
            },
        };

        drop(guard);
        self.tracker.finish(event);
    }

    /// Backup, externalize and write. Returns the newly externalized keys.
    async fn write_state(
        &self,
        job: &WriteJob,
        modified: &HashSet<String>,
    ) -> PatchResult<HashSet<String>> {
        let patch_root = &job.patch_root;
        let state_path = &job.state_path;
        let backup = backup_path(state_path);

        self.retry
            .run(|| tokio::fs::create_dir_all(patch_root))
            .await
            .map_err(|e| PatchError::io(patch_root, e))?;

        if tokio::fs::try_exists(&backup).await.unwrap_or(false) {
            self.retry
                .run(|| tokio::fs::remove_file(&backup))
                .await
                .map_err(|e| PatchError::io(&backup, e))?;
        }
        if tokio::fs::try_exists(state_path).await.unwrap_or(false) {
            self.retry
                .run(|| tokio::fs::copy(state_path, &backup))
                .await
                .map_err(|e| PatchError::io(&backup, e))?;
        }

        let mut document = job.state.clone();
        let externalized = self
            .history
            .write_modified(
                patch_root,
                &document.conflict_history,
                modified,
                &job.externally_loaded,
            )
            .await;

        let mut covered = job.externally_loaded.clone();
        covered.extend(externalized.iter().cloned());
        strip_externalized(&mut document.conflict_history, &covered);

        let json = serde_json::to_vec(&document)?;
        let temp = temp_path(state_path);
        self.retry
            .run(|| tokio::fs::write(&temp, &json))
            .await
            .map_err(|e| PatchError::io(&temp, e))?;
        self.retry
            .run(|| tokio::fs::rename(&temp, state_path))
            .await
            .map_err(|e| PatchError::io(state_path, e))?;

        Ok(externalized)
    }

    // =========================================================================
    // Write signal
    // =========================================================================

    /// Wait until no background write is pending.
    pub async fn wait_for_writes(&self) {
        self.tracker.wait_idle().await;
    }

    /// Whether a background write is pending.
    pub fn is_writing(&self) -> bool {
        self.tracker.is_writing()
    }

    /// The "any writes pending" signal.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tracker.subscribe()
    }

    /// Outcomes of background writes.
    pub fn subscribe_events(&self) -> broadcast::Receiver<StateWriteEvent> {
        self.tracker.subscribe_events()
    }
}

fn temp_path(state_path: &Path) -> PathBuf {
    let mut name = state_path.as_os_str().to_owned();
    name.push(TEMP_EXTENSION);
    PathBuf::from(name)
}

fn retain_indices(items: &mut Vec<Definition>, keep: impl Fn(usize) -> bool) {
    let mut idx = 0;
    items.retain(|_| {
        let retained = keep(idx);
        idx += 1;
        retained
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use tempfile::TempDir;

    fn store() -> StateStore {
        StateStore::new(ExporterConfig::default().with_retry(RetryPolicy::none()))
    }

    fn request(dir: &TempDir, definitions: Vec<Definition>) -> SaveStateRequest {
        SaveStateRequest {
            resolved_conflicts: definitions,
            mode: PatchStateMode::Default,
            ..SaveStateRequest::new(PatchLocation::new(dir.path(), "patch"))
        }
    }

    #[test]
    fn test_retain_indices() {
        let mut items = vec![
            Definition::new("t", "a", "f", "1"),
            Definition::new("t", "b", "f", "2"),
            Definition::new("t", "c", "f", "3"),
        ];
        retain_indices(&mut items, |idx| idx != 1);
        let ids: Vec<_> = items.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path(Path::new("/p/state.json")),
            Path::new("/p/state.json.tmp")
        );
    }

    #[tokio::test]
    async fn test_get_missing_state_returns_none() {
        let dir = TempDir::new().unwrap();
        let location = PatchLocation::new(dir.path(), "patch");

        let state = store().get_patch_state(&location, true).await.unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn test_invalid_location_fails_before_io() {
        let err = store()
            .get_patch_state(&PatchLocation::new("", "patch"), false)
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_save_is_visible_before_write_completes() {
        let dir = TempDir::new().unwrap();
        let store = store();
        let definition = Definition::new("events", "e1", "events/e.txt", "e1 = {}");

        assert!(store.save_state(request(&dir, vec![definition])).await.unwrap());

        let state = store
            .get_patch_state(&PatchLocation::new(dir.path(), "patch"), false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.mode, PatchStateMode::Default);
        assert_eq!(state.resolved_conflicts.len(), 1);
        assert!(state.resolved_conflicts[0].code.is_none());
        assert_eq!(state.conflict_history[0].code.as_deref(), Some("e1 = {}"));

        store.wait_for_writes().await;
        assert!(dir.path().join("patch").join("state.json").is_file());
    }

    #[tokio::test]
    async fn test_returned_state_is_detached_from_cache() {
        let dir = TempDir::new().unwrap();
        let store = store();
        let location = PatchLocation::new(dir.path(), "patch");
        store
            .save_state(request(&dir, vec![Definition::new("events", "e", "f", "x")]))
            .await
            .unwrap();

        let mut first = store.get_patch_state(&location, false).await.unwrap().unwrap();
        first.conflict_history.clear();

        let second = store.get_patch_state(&location, false).await.unwrap().unwrap();
        assert_eq!(second.conflict_history.len(), 1);
        store.wait_for_writes().await;
    }

    #[tokio::test]
    async fn test_write_events_report_success() {
        let dir = TempDir::new().unwrap();
        let store = store();
        let mut events = store.subscribe_events();

        store.save_state(request(&dir, Vec::new())).await.unwrap();

        match events.recv().await.unwrap() {
            StateWriteEvent::Written { path } => assert!(path.ends_with("state.json")),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(!store.is_writing());
    }

    #[tokio::test]
    async fn test_mode_and_languages_default_without_state() {
        let dir = TempDir::new().unwrap();
        let store = store();
        let location = PatchLocation::new(dir.path(), "patch");

        assert_eq!(
            store.get_patch_state_mode(&location).await.unwrap(),
            PatchStateMode::None
        );
        assert!(store.get_allowed_languages(&location).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_changed_code_keeps_history_position() {
        let dir = TempDir::new().unwrap();
        let store = store();
        let location = PatchLocation::new(dir.path(), "patch");

        store
            .save_state(request(
                &dir,
                vec![
                    Definition::new("events", "a", "f", "A"),
                    Definition::new("events", "b", "f", "B"),
                ],
            ))
            .await
            .unwrap();
        store
            .save_state(request(
                &dir,
                vec![
                    Definition::new("events", "a", "f", "A2"),
                    Definition::new("events", "b", "f", "B"),
                ],
            ))
            .await
            .unwrap();

        let state = store.get_patch_state(&location, true).await.unwrap().unwrap();
        let history: Vec<_> = state
            .conflict_history
            .iter()
            .map(|d| (d.id.as_str(), d.code.as_deref()))
            .collect();
        assert_eq!(history, vec![("a", Some("A2")), ("b", Some("B"))]);
        store.wait_for_writes().await;
    }

    #[tokio::test]
    async fn test_line_endings_do_not_count_as_change() {
        let dir = TempDir::new().unwrap();
        let store = store();
        let location = PatchLocation::new(dir.path(), "patch");

        store
            .save_state(request(&dir, vec![Definition::new("events", "a", "f", "a = {}\r\n")]))
            .await
            .unwrap();
        store.wait_for_writes().await;
        store.reset_cache();

        let mut events = store.subscribe_events();
        store
            .save_state(request(&dir, vec![Definition::new("events", "a", "f", "a = {}\n")]))
            .await
            .unwrap();
        assert!(matches!(events.recv().await.unwrap(), StateWriteEvent::Written { .. }));

        let state = store.get_patch_state(&location, true).await.unwrap().unwrap();
        assert_eq!(state.conflict_history.len(), 1);
        let side_file = store
            .history()
            .path_for(&location.patch_root(), &state.conflict_history[0])
            .unwrap();
        assert_eq!(std::fs::read_to_string(side_file).unwrap(), "a = {}\r\n");
    }

    #[tokio::test]
    async fn test_cold_load_sees_pending_write() {
        let dir = TempDir::new().unwrap();
        let store = store();
        let location = PatchLocation::new(dir.path(), "patch");

        store
            .save_state(request(&dir, vec![Definition::new("events", "a", "f", "A")]))
            .await
            .unwrap();
        store.reset_cache();

        let state = store.get_patch_state(&location, true).await.unwrap().unwrap();
        assert_eq!(state.conflict_history[0].code.as_deref(), Some("A"));
        store.wait_for_writes().await;

        // Once written, the file is the source again
        store.reset_cache();
        assert!(store.pending.lock().is_empty());
        let state = store.get_patch_state(&location, true).await.unwrap().unwrap();
        assert_eq!(state.conflict_history[0].code.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_discard_pending_forgets_unwritten_state() {
        let dir = TempDir::new().unwrap();
        let store = store();
        let location = PatchLocation::new(dir.path(), "patch");

        store.save_state(request(&dir, Vec::new())).await.unwrap();
        store.discard_pending(&location.patch_root());
        store.reset_cache();

        let mut events = store.subscribe_events();
        store.wait_for_writes().await;
        assert!(matches!(
            events.try_recv(),
            Ok(StateWriteEvent::Superseded { .. })
        ));
        assert!(!location.patch_root().join("state.json").exists());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let patch_root = dir.path().join("patch");
        std::fs::create_dir_all(&patch_root).unwrap();
        std::fs::write(patch_root.join("state.json"), "{ not json").unwrap();

        let state = store()
            .get_patch_state(&PatchLocation::new(dir.path(), "patch"), false)
            .await
            .unwrap();
        assert!(state.is_none());
    }
}
