//! Caller-facing patch operations.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::info;

use super::files::{copy_patch_dir, list_patch_files, RenamePair};
use super::location::PatchLocation;
use crate::config::ExporterConfig;
use crate::definition::standardize_path;
use crate::error::{PatchError, PatchResult};
use crate::export::{ContentExporter, DefinitionInfoProvider, ExportRequest, ModReader};
use crate::naming::backup_path;
use crate::retry::RetryStrategy;
use crate::state::{PatchState, PatchStateMode, SaveStateRequest, StateStore, StateWriteEvent};

/// Copy or rename a patch to a new name under the same root.
#[derive(Debug, Clone, Default)]
pub struct CopyPatchRequest {
    /// The existing patch.
    pub location: PatchLocation,

    pub new_patch_name: String,

    /// Replacements applied to the state documents. Defaults to the old
    /// patch name becoming the new one.
    pub rename_pairs: Vec<RenamePair>,
}

impl CopyPatchRequest {
    pub fn new(location: PatchLocation, new_patch_name: impl Into<String>) -> Self {
        Self {
            location,
            new_patch_name: new_patch_name.into(),
            rename_pairs: Vec::new(),
        }
    }

    fn validate(&self) -> PatchResult<()> {
        self.location.validate()?;
        if self.new_patch_name.trim().is_empty() {
            return Err(PatchError::invalid("new patch name is required"));
        }
        if self.new_patch_name == self.location.patch_name {
            return Err(PatchError::invalid("new patch name must differ from the old one"));
        }
        Ok(())
    }

    fn effective_rename_pairs(&self) -> Vec<RenamePair> {
        if self.rename_pairs.is_empty() {
            vec![RenamePair::new(
                self.location.patch_name.clone(),
                self.new_patch_name.clone(),
            )]
        } else {
            self.rename_pairs.clone()
        }
    }
}

/// Persists, exports and manages mod patches.
///
/// Combines the [`StateStore`] and the [`ContentExporter`] behind the set of
/// operations the surrounding application calls.
pub struct ModPatchExporter {
    store: StateStore,
    exporter: ContentExporter,
    retry: RetryStrategy,
}

impl ModPatchExporter {
    /// Create an exporter with a fresh store reading mods through `reader`.
    pub fn new(config: ExporterConfig, reader: Arc<dyn ModReader>) -> Self {
        let exporter = ContentExporter::new(&config, reader);
        Self::from_parts(StateStore::new(config), exporter)
    }

    /// Assemble from an existing store and exporter.
    pub fn from_parts(store: StateStore, exporter: ContentExporter) -> Self {
        let retry = RetryStrategy::new(store.config().retry);
        Self {
            store,
            exporter,
            retry,
        }
    }

    /// Register a naming provider.
    pub fn with_provider(mut self, provider: Arc<dyn DefinitionInfoProvider>) -> Self {
        self.exporter = self.exporter.with_provider(provider);
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    // =========================================================================
    // State
    // =========================================================================

    /// See [`StateStore::get_patch_state`].
    pub async fn get_patch_state(
        &self,
        location: &PatchLocation,
        load_external_code: bool,
    ) -> PatchResult<Option<PatchState>> {
        self.store.get_patch_state(location, load_external_code).await
    }

    /// See [`StateStore::save_state`].
    pub async fn save_state(&self, request: SaveStateRequest) -> PatchResult<bool> {
        self.store.save_state(request).await
    }

    pub async fn get_patch_state_mode(&self, location: &PatchLocation) -> PatchResult<PatchStateMode> {
        self.store.get_patch_state_mode(location).await
    }

    pub async fn get_allowed_languages(&self, location: &PatchLocation) -> PatchResult<Vec<String>> {
        self.store.get_allowed_languages(location).await
    }

    /// Drop the cached state unconditionally.
    pub fn reset_cache(&self) {
        self.store.reset_cache();
    }

    pub async fn wait_for_writes(&self) {
        self.store.wait_for_writes().await;
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.store.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StateWriteEvent> {
        self.store.subscribe_events()
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// See [`ContentExporter::export`].
    pub async fn export_definition(&self, request: &mut ExportRequest) -> PatchResult<bool> {
        self.exporter.export(request).await
    }

    /// Exported files of a patch, relative to its root.
    pub async fn get_patch_files(&self, location: &PatchLocation) -> PatchResult<Vec<String>> {
        location.validate()?;
        let patch_root = location.patch_root();
        let history_dir = self.store.config().history_dir_name.clone();
        tokio::task::spawn_blocking(move || list_patch_files(&patch_root, &history_dir))
            .await
            .map_err(|e| PatchError::Task(e.to_string()))?
    }

    /// Content of an exported file, empty when it does not exist.
    pub async fn load_definition_contents(
        &self,
        location: &PatchLocation,
        file: &str,
    ) -> PatchResult<String> {
        location.validate()?;
        if file.trim().is_empty() {
            return Err(PatchError::invalid("file name is required"));
        }
        let path = location.patch_root().join(standardize_path(file));
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(String::new());
        }
        self.retry
            .run(|| tokio::fs::read_to_string(&path))
            .await
            .map_err(|e| PatchError::io(&path, e))
    }

    // =========================================================================
    // Copy / rename
    // =========================================================================

    /// Copy a patch directory to a new name.
    ///
    /// Returns `false` when the source patch does not exist.
    pub async fn copy_patch_mod(&self, request: &CopyPatchRequest) -> PatchResult<bool> {
        request.validate()?;
        self.copy_locked(request).await
    }

    /// Move a patch directory to a new name.
    ///
    /// Returns `false` when the source patch does not exist.
    pub async fn rename_patch_mod(&self, request: &CopyPatchRequest) -> PatchResult<bool> {
        request.validate()?;
        if !self.copy_locked(request).await? {
            return Ok(false);
        }

        let source = request.location.patch_root();
        let lock = self.store.write_lock();
        let _guard = lock.lock().await;
        self.retry
            .run(|| tokio::fs::remove_dir_all(&source))
            .await
            .map_err(|e| PatchError::io(&source, e))?;
        self.store.discard_pending(&source);
        self.store.reset_cache();

        info!(
            from = %request.location.patch_name,
            to = %request.new_patch_name,
            "Renamed patch"
        );
        Ok(true)
    }

    async fn copy_locked(&self, request: &CopyPatchRequest) -> PatchResult<bool> {
        let source = request.location.patch_root();
        if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
            return Ok(false);
        }
        let destination = request
            .location
            .with_patch_name(request.new_patch_name.clone())
            .patch_root();

        // Let queued writes land so the copy carries the newest state
        self.store.wait_for_writes().await;
        let lock = self.store.write_lock();
        let _guard = lock.lock().await;

        let state_file = self.store.state_path(&source);
        let state_files: Vec<String> = [state_file.clone(), backup_path(&state_file)]
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect();

        let copied = copy_patch_dir(
            &self.retry,
            &source,
            &destination,
            &state_files,
            &request.effective_rename_pairs(),
        )
        .await?;

        info!(
            from = %source.display(),
            to = %destination.display(),
            files = copied,
            "Copied patch"
        );
        Ok(true)
    }
}
