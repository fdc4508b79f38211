//! Source of original mod content.
//!
//! [`ModReader`] is the only way the exporter reads mod files. Implementations
//! may read from directories, archives or memory; the exporter only needs a
//! byte stream per `(mod path, file name)`.
//!
//! File names may be wildcard-prefixed: `gfx/flags/*.dds` means "the first
//! `.dds` file in `gfx/flags`".

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::io::AsyncRead;
use tracing::debug;

use crate::definition::standardize_path;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A readable mod file.
pub type ModStream = Pin<Box<dyn AsyncRead + Send>>;

/// Reads original mod files as byte streams.
///
/// # Dyn Compatibility
///
/// Uses `Pin<Box<dyn Future>>` so the exporter can hold an `Arc<dyn ModReader>`.
pub trait ModReader: Send + Sync {
    /// Open `file_name` inside the mod at `mod_path`.
    ///
    /// Returns `Ok(None)` when the file does not exist. Errors are reserved
    /// for files that exist but cannot be read.
    fn get_stream<'a>(
        &'a self,
        mod_path: &'a str,
        file_name: &'a str,
    ) -> BoxFuture<'a, io::Result<Option<ModStream>>>;
}

/// Reads mods unpacked on disk.
///
/// Relative mod paths resolve against an optional base directory.
#[derive(Debug, Clone, Default)]
pub struct DiskModReader {
    base_dir: Option<PathBuf>,
}

impl DiskModReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative mod paths against `base_dir`.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    fn mod_root(&self, mod_path: &str) -> PathBuf {
        let path = PathBuf::from(standardize_path(mod_path));
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }

    async fn open(&self, mod_path: &str, file_name: &str) -> io::Result<Option<ModStream>> {
        let root = self.mod_root(mod_path);
        if !tokio::fs::metadata(&root).await.is_ok_and(|m| m.is_dir()) {
            return Ok(None);
        }

        let relative = PathBuf::from(standardize_path(file_name));
        let path = match wildcard_parts(&relative) {
            Some((dir, pattern)) => match first_match(&root.join(dir), &pattern).await? {
                Some(path) => path,
                None => return Ok(None),
            },
            None => root.join(&relative),
        };

        match tokio::fs::File::open(&path).await {
            Ok(file) => {
                debug!(path = %path.display(), "Opened mod file");
                let stream: ModStream = Box::pin(file);
                Ok(Some(stream))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl ModReader for DiskModReader {
    fn get_stream<'a>(
        &'a self,
        mod_path: &'a str,
        file_name: &'a str,
    ) -> BoxFuture<'a, io::Result<Option<ModStream>>> {
        Box::pin(self.open(mod_path, file_name))
    }
}

/// Split `dir/*.ext` into `dir` and the glob pattern for the file name.
fn wildcard_parts(relative: &Path) -> Option<(PathBuf, glob::Pattern)> {
    let name = relative.file_name()?.to_str()?;
    if !name.starts_with('*') {
        return None;
    }
    let pattern = glob::Pattern::new(name).ok()?;
    let dir = relative.parent().map(Path::to_path_buf).unwrap_or_default();
    Some((dir, pattern))
}

/// First file in `dir` matching `pattern`, by sorted name.
async fn first_match(dir: &Path, pattern: &glob::Pattern) -> io::Result<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let options = glob::MatchOptions {
        case_sensitive: false,
        ..glob::MatchOptions::new()
    };

    let mut matches = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
        let name = entry.file_name();
        if is_file && pattern.matches_with(&name.to_string_lossy(), options) {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches.into_iter().next())
}
