//! Where a patch lives on disk.

use std::path::{Path, PathBuf};

use crate::error::{PatchError, PatchResult};

/// A patch directory: `<root_path>/<patch_name>`.
///
/// Every caller-facing operation validates its location before touching the
/// filesystem, so a missing root or name fails as an invalid argument rather
/// than as an I/O error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchLocation {
    /// Mod directory holding the patch.
    pub root_path: PathBuf,

    /// Patch directory name, usually derived from the collection name.
    pub patch_name: String,
}

impl PatchLocation {
    pub fn new(root_path: impl Into<PathBuf>, patch_name: impl Into<String>) -> Self {
        Self {
            root_path: root_path.into(),
            patch_name: patch_name.into(),
        }
    }

    /// Reject empty roots and names.
    pub fn validate(&self) -> PatchResult<()> {
        if self.root_path.as_os_str().is_empty() {
            return Err(PatchError::invalid("patch root path is required"));
        }
        if self.patch_name.trim().is_empty() {
            return Err(PatchError::invalid("patch name is required"));
        }
        Ok(())
    }

    /// The patch directory.
    pub fn patch_root(&self) -> PathBuf {
        self.root_path.join(&self.patch_name)
    }

    /// Same root, different patch name.
    pub fn with_patch_name(&self, patch_name: impl Into<String>) -> Self {
        Self::new(self.root_path.clone(), patch_name)
    }

    /// Resolve a patch-relative file.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.patch_root().join(relative)
    }
}
