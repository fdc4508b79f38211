//! Writes resolved entries into the patch directory.

use std::io;
use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::encoding::TextEncoding;
use super::policy::{ExportCategory, ExportPolicy};
use super::provider::DefinitionInfoProvider;
use super::reader::{ModReader, ModStream};
use crate::config::ExporterConfig;
use crate::definition::{standardize_path, Definition};
use crate::error::{PatchError, PatchResult};
use crate::naming::{image_extension, swap_extension};
use crate::patches::PatchLocation;
use crate::retry::RetryStrategy;

/// Entries to export, by category.
///
/// Entries are updated in place: text entries exported under a generated name
/// get their `file` rewritten to that name.
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub location: PatchLocation,

    /// Game identifier used to pick the naming provider.
    pub game: String,

    pub definitions: Vec<Definition>,
    pub orphan_conflicts: Vec<Definition>,
    pub overwritten_conflicts: Vec<Definition>,
    pub custom_conflicts: Vec<Definition>,
}

impl ExportRequest {
    pub fn new(location: PatchLocation, game: impl Into<String>) -> Self {
        Self {
            location,
            game: game.into(),
            ..Self::default()
        }
    }

    /// Entries of one category.
    pub fn entries_mut(&mut self, category: ExportCategory) -> &mut Vec<Definition> {
        match category {
            ExportCategory::Definitions => &mut self.definitions,
            ExportCategory::OrphanConflicts => &mut self.orphan_conflicts,
            ExportCategory::OverwrittenConflicts => &mut self.overwritten_conflicts,
            ExportCategory::CustomConflicts => &mut self.custom_conflicts,
        }
    }
}

/// Exports entries as game-readable files.
///
/// Binary entries are stream-copied from the mod they came from; text entries
/// are written from their code. Every entry is handled by its own future and
/// one failing file never stops the others.
pub struct ContentExporter {
    retry: RetryStrategy,
    reader: Arc<dyn ModReader>,
    providers: Vec<Arc<dyn DefinitionInfoProvider>>,
    image_extensions: Vec<String>,
}

impl ContentExporter {
    /// Create an exporter reading mod content through `reader`.
    pub fn new(config: &ExporterConfig, reader: Arc<dyn ModReader>) -> Self {
        Self {
            retry: RetryStrategy::new(config.retry),
            reader,
            providers: Vec::new(),
            image_extensions: config.image_extensions.clone(),
        }
    }

    /// Register a naming provider. The first provider accepting a game wins.
    pub fn with_provider(mut self, provider: Arc<dyn DefinitionInfoProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    fn provider_for(&self, game: &str) -> PatchResult<&dyn DefinitionInfoProvider> {
        self.providers
            .iter()
            .find(|p| p.can_process(game))
            .map(|p| &**p)
            .ok_or_else(|| PatchError::NoInfoProvider {
                game: game.to_string(),
            })
    }

    /// Export every entry of `request`.
    ///
    /// Returns `Ok(true)` when every file was written, `Ok(false)` when at
    /// least one failed. Errors are reserved for invalid requests.
    pub async fn export(&self, request: &mut ExportRequest) -> PatchResult<bool> {
        request.location.validate()?;
        if request.game.trim().is_empty() {
            return Err(PatchError::invalid("game identifier is required"));
        }
        let provider = self.provider_for(&request.game)?;
        let patch_root = request.location.patch_root();

        let mut success = true;
        for category in ExportCategory::ALL {
            let policy = category.policy();
            let entries = request.entries_mut(category);
            if entries.is_empty() {
                continue;
            }

            let total = entries.len();
            let (binary, text): (Vec<&mut Definition>, Vec<&mut Definition>) = entries
                .iter_mut()
                .partition(|d| d.value_type.is_binary());

            let binaries = join_all(
                binary
                    .into_iter()
                    .map(|d| self.copy_binary(d, &patch_root, policy)),
            );
            let texts = join_all(
                text.into_iter()
                    .map(|d| self.write_text(d, provider, &patch_root, policy)),
            );
            let (binaries, texts) = futures::join!(binaries, texts);

            let failed = binaries.iter().chain(texts.iter()).filter(|ok| !**ok).count();
            debug!(?category, total, failed, "Exported category");
            success &= failed == 0;
        }

        info!(
            patch = %patch_root.display(),
            game = %request.game,
            success,
            "Exported patch content"
        );
        Ok(success)
    }

    // =========================================================================
    // Binary entries
    // =========================================================================

    async fn copy_binary(
        &self,
        definition: &Definition,
        patch_root: &Path,
        policy: ExportPolicy,
    ) -> bool {
        let destination = patch_root.join(standardize_path(&definition.file));
        if policy.skip_if_exists && tokio::fs::try_exists(&destination).await.unwrap_or(false) {
            debug!(path = %destination.display(), "Binary already exported");
            return true;
        }

        let Some(mod_path) = definition.mod_path.as_deref().filter(|p| !p.is_empty()) else {
            warn!(file = %definition.file, "Binary entry has no mod path");
            return false;
        };

        let file = definition.file.as_str();
        match self
            .retry
            .run(|| self.copy_once(mod_path, file, &destination))
            .await
        {
            Ok(true) => {
                debug!(path = %destination.display(), "Copied binary");
                true
            }
            Ok(false) => {
                warn!(mod_path, file, "Binary source not found");
                false
            }
            Err(e) => {
                warn!(path = %destination.display(), error = %e, "Failed to copy binary");
                false
            }
        }
    }

    /// One copy attempt. `Ok(false)` when no source exists.
    async fn copy_once(&self, mod_path: &str, file: &str, destination: &Path) -> io::Result<bool> {
        let Some(mut source) = self.open_source(mod_path, file).await? else {
            return Ok(false);
        };

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut out = tokio::fs::File::create(destination).await?;
        tokio::io::copy(&mut source, &mut out).await?;
        out.flush().await?;
        Ok(true)
    }

    /// Open `file`, falling back to the other image extensions.
    async fn open_source(&self, mod_path: &str, file: &str) -> io::Result<Option<ModStream>> {
        if let Some(stream) = self.reader.get_stream(mod_path, file).await? {
            return Ok(Some(stream));
        }

        let Some(current) = image_extension(file, &self.image_extensions) else {
            return Ok(None);
        };

        for alternative in &self.image_extensions {
            if alternative.eq_ignore_ascii_case(current) {
                continue;
            }
            let candidate = swap_extension(file, current, alternative);
            if let Some(stream) = self.reader.get_stream(mod_path, &candidate).await? {
                debug!(file, candidate = %candidate, "Using alternative image source");
                return Ok(Some(stream));
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Text entries
    // =========================================================================

    async fn write_text(
        &self,
        definition: &mut Definition,
        provider: &dyn DefinitionInfoProvider,
        patch_root: &Path,
        policy: ExportPolicy,
    ) -> bool {
        match self
            .try_write_text(definition, provider, patch_root, policy)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    type_and_id = %definition.type_and_id(),
                    error = %e,
                    "Failed to export text entry"
                );
                false
            }
        }
    }

    async fn try_write_text(
        &self,
        definition: &mut Definition,
        provider: &dyn DefinitionInfoProvider,
        patch_root: &Path,
        policy: ExportPolicy,
    ) -> PatchResult<()> {
        let file_name = if policy.file_names.generates_name() {
            provider.get_file_name(definition)?
        } else {
            standardize_path(&definition.file)
        };
        let destination = patch_root.join(&file_name);

        if policy.skip_if_exists && tokio::fs::try_exists(&destination).await.unwrap_or(false) {
            debug!(path = %destination.display(), "Text already exported");
            definition.file = file_name;
            return Ok(());
        }

        let encoding = provider.get_encoding(definition)?;
        let bytes = encoding.encode(&with_trailing_newline(
            definition.code.as_deref().unwrap_or_default(),
        ));

        self.create_parent(&destination).await?;
        self.retry
            .run(|| tokio::fs::write(&destination, &bytes))
            .await
            .map_err(|e| PatchError::io(&destination, e))?;

        if policy.file_names.writes_empty_files() {
            for other in &definition.overwritten_file_names {
                let other = standardize_path(other);
                if other.eq_ignore_ascii_case(&file_name) {
                    continue;
                }
                self.write_placeholder(&patch_root.join(other), encoding)
                    .await?;
            }
        }

        debug!(path = %destination.display(), "Wrote text entry");
        definition.file = file_name;
        Ok(())
    }

    /// Create an empty file at `path` unless something is already there.
    async fn write_placeholder(&self, path: &Path, encoding: TextEncoding) -> PatchResult<()> {
        self.create_parent(path).await?;
        let content = &encoding.encode("");
        self.retry
            .run(move || async move {
                let file = tokio::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(path)
                    .await;
                match file {
                    Ok(mut file) => file.write_all(content).await,
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
                    Err(e) => Err(e),
                }
            })
            .await
            .map_err(|e| PatchError::io(path, e))?;
        debug!(path = %path.display(), "Wrote placeholder");
        Ok(())
    }

    async fn create_parent(&self, path: &Path) -> PatchResult<()> {
        if let Some(parent) = path.parent() {
            self.retry
                .run(|| tokio::fs::create_dir_all(parent))
                .await
                .map_err(|e| PatchError::io(parent, e))?;
        }
        Ok(())
    }
}

/// `text` with trailing line breaks collapsed into a single `\n`.
fn with_trailing_newline(text: &str) -> String {
    format!("{}\n", text.trim_end_matches(['\r', '\n']))
}
