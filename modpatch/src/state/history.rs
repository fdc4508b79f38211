//! Externalized conflict history payloads.
//!
//! History entries can carry the full text of a resolved entry. Keeping all of
//! that inline would make `state.json` grow with every resolution pass, so
//! payloads live in side files:
//!
//! ```text
//! <patch_root>/state_conflict_history/<Type>/<sanitized Id>.txt
//! ```
//!
//! The primary document keeps the entry with a `null` code; the set of
//! `TypeAndId`s that have a side file travels with the cached state.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use futures::future::join_all;
use tracing::{debug, warn};

use crate::definition::Definition;
use crate::error::{PatchError, PatchResult};
use crate::naming::history_file_path;
use crate::retry::RetryStrategy;

/// Reads and writes history side files for one patch layout.
#[derive(Clone, Debug)]
pub struct HistoryExternalizer {
    history_dir: String,
    retry: RetryStrategy,
}

impl HistoryExternalizer {
    /// Create an externalizer writing under `<patch_root>/<history_dir>`.
    pub fn new(history_dir: impl Into<String>, retry: RetryStrategy) -> Self {
        Self {
            history_dir: history_dir.into(),
            retry,
        }
    }

    /// Side-file path for `definition`.
    ///
    /// Fails when the entry's type would leave the history directory.
    pub fn path_for(&self, patch_root: &Path, definition: &Definition) -> PatchResult<PathBuf> {
        history_file_path(
            patch_root,
            &self.history_dir,
            &definition.def_type,
            &definition.id,
        )
    }

    /// Attach side-file payloads to `history`.
    ///
    /// Every entry without inline code that has a side file gets the file
    /// content (line endings canonicalized to `\n`) and its key added to
    /// `externally_loaded`. Inline code is newer than any side file and is
    /// kept. Reads run concurrently. An unreadable side file is logged and
    /// leaves its entry untouched.
    pub async fn load(
        &self,
        patch_root: &Path,
        history: &mut [Definition],
        externally_loaded: &mut HashSet<String>,
    ) {
        let reads = history
            .iter_mut()
            .filter(|d| d.code.is_none())
            .map(|definition| async move {
                match self.read_one(patch_root, definition).await {
                    Ok(Some(code)) => {
                        definition.code = Some(code);
                        Some(definition.type_and_id())
                    }
                    Ok(None) => None,
                    Err(e) => {
                        warn!(
                            type_and_id = %definition.type_and_id(),
                            error = %e,
                            "Failed to load externalized history"
                        );
                        None
                    }
                }
            });

        let loaded: Vec<String> = join_all(reads).await.into_iter().flatten().collect();
        debug!(
            patch = %patch_root.display(),
            count = loaded.len(),
            "Loaded externalized history"
        );
        externally_loaded.extend(loaded);
    }

    /// Payload of one entry's side file, `None` when it has none.
    pub async fn read_one(
        &self,
        patch_root: &Path,
        definition: &Definition,
    ) -> PatchResult<Option<String>> {
        let path = self.path_for(patch_root, definition)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        let content = self
            .retry
            .run(|| tokio::fs::read_to_string(&path))
            .await
            .map_err(|e| PatchError::io(&path, e))?;

        Ok(Some(canonicalize_lines(&content)))
    }

    /// Write side files for the entries in `history` whose key is in `modified`.
    ///
    /// Keys already in `externally_loaded` are skipped. Returns the keys whose
    /// side file now matches the entry; a failed write is logged and its key
    /// left out, so the payload stays inline in the document.
    ///
    /// Distinct keys can share a side file once their ids are sanitized. The
    /// file belongs to the key already externalized there, else to the first
    /// entry in history order; other keys keep their payload inline.
    pub async fn write_modified(
        &self,
        patch_root: &Path,
        history: &[Definition],
        modified: &HashSet<String>,
        externally_loaded: &HashSet<String>,
    ) -> HashSet<String> {
        let owners = self.side_file_owners(patch_root, history, externally_loaded);

        let writes = history
            .iter()
            .filter(|d| d.has_code())
            .filter_map(|d| {
                let key = d.type_and_id();
                (modified.contains(&key) && !externally_loaded.contains(&key)).then_some((key, d))
            })
            .filter(|(key, definition)| {
                let owner = self
                    .path_for(patch_root, definition)
                    .ok()
                    .and_then(|path| owners.get(&path));
                match owner {
                    Some(owner) if owner == key => true,
                    Some(owner) => {
                        warn!(
                            type_and_id = %key,
                            owner = %owner,
                            "History side file already used by another entry, keeping payload inline"
                        );
                        false
                    }
                    None => {
                        warn!(type_and_id = %key, "No valid history side file, keeping payload inline");
                        false
                    }
                }
            })
            .map(|(key, definition)| async move {
                match self.write_one(patch_root, definition).await {
                    Ok(()) => Some(key),
                    Err(e) => {
                        warn!(type_and_id = %key, error = %e, "Failed to externalize history");
                        None
                    }
                }
            });

        join_all(writes).await.into_iter().flatten().collect()
    }

    /// Which key each side file belongs to.
    fn side_file_owners(
        &self,
        patch_root: &Path,
        history: &[Definition],
        externally_loaded: &HashSet<String>,
    ) -> HashMap<PathBuf, String> {
        let mut owners = HashMap::new();
        let (claimed, rest): (Vec<&Definition>, Vec<&Definition>) = history
            .iter()
            .partition(|d| externally_loaded.contains(&d.type_and_id()));

        for definition in claimed.into_iter().chain(rest) {
            if let Ok(path) = self.path_for(patch_root, definition) {
                owners.entry(path).or_insert_with(|| definition.type_and_id());
            }
        }
        owners
    }

    async fn write_one(&self, patch_root: &Path, definition: &Definition) -> PatchResult<()> {
        let path = self.path_for(patch_root, definition)?;
        let code = definition.code.as_deref().unwrap_or_default();

        if let Some(parent) = path.parent() {
            self.retry
                .run(|| tokio::fs::create_dir_all(parent))
                .await
                .map_err(|e| PatchError::io(parent, e))?;
        }

        self.retry
            .run(|| tokio::fs::write(&path, code))
            .await
            .map_err(|e| PatchError::io(&path, e))?;

        debug!(path = %path.display(), "Wrote history payload");
        Ok(())
    }
}

/// Join lines with `\n`, dropping `\r\n` and a trailing newline.
fn canonicalize_lines(content: &str) -> String {
    content.lines().collect::<Vec<_>>().join("\n")
}

/// Whether two payloads are equal once line endings are canonicalized.
///
/// Side-file payloads come back canonicalized, so comparisons against fresh
/// code go through this.
pub fn same_payload(a: &str, b: &str) -> bool {
    a.lines().eq(b.lines())
}

/// Null the code of every history entry whose payload has a side file.
pub fn strip_externalized(history: &mut [Definition], externally_loaded: &HashSet<String>) {
    for definition in history {
        if externally_loaded.contains(&definition.type_and_id()) {
            definition.code = None;
        }
    }
}
