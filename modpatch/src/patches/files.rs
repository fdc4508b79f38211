//! Files inside a patch directory.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{PatchError, PatchResult};
use crate::retry::RetryStrategy;

/// Old and new patch name, replaced inside copied state documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePair {
    pub old_name: String,
    pub new_name: String,
}

impl RenamePair {
    pub fn new(old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            old_name: old_name.into(),
            new_name: new_name.into(),
        }
    }
}

/// Every regular file under `root`, as absolute paths, sorted.
///
/// Missing roots yield an empty list.
pub fn walk_files(root: &Path) -> PatchResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let pattern = format!(
        "{}/**/*",
        glob::Pattern::escape(&root.to_string_lossy())
    );
    let paths = glob::glob(&pattern)
        .map_err(|e| PatchError::invalid(format!("bad patch path {}: {}", root.display(), e)))?;

    let mut files: Vec<PathBuf> = paths
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Exported files of a patch, relative to its root.
///
/// Only files inside subdirectories count: the root holds the state document
/// and its backup. The history directory is excluded.
pub fn list_patch_files(patch_root: &Path, history_dir: &str) -> PatchResult<Vec<String>> {
    let files = walk_files(patch_root)?
        .into_iter()
        .filter_map(|path| {
            let relative = path.strip_prefix(patch_root).ok()?.to_path_buf();
            let mut components = relative.components();
            let first = match components.next()? {
                Component::Normal(first) => first.to_string_lossy().to_string(),
                _ => return None,
            };
            // Root-level files have a single component
            components.next()?;
            if first.eq_ignore_ascii_case(history_dir) {
                return None;
            }
            Some(relative.to_string_lossy().to_string())
        })
        .collect();
    Ok(files)
}

/// Copy every file from `source` to `destination`.
///
/// Files named in `state_files` at the patch root are copied as text with
/// every `old_name` replaced by `new_name`. Returns the number of files copied.
pub async fn copy_patch_dir(
    retry: &RetryStrategy,
    source: &Path,
    destination: &Path,
    state_files: &[String],
    rename_pairs: &[RenamePair],
) -> PatchResult<usize> {
    let root = source.to_path_buf();
    let files = tokio::task::spawn_blocking(move || walk_files(&root))
        .await
        .map_err(|e| PatchError::Task(e.to_string()))??;

    for file in &files {
        let Ok(relative) = file.strip_prefix(source) else {
            continue;
        };
        let target = destination.join(relative);

        if let Some(parent) = target.parent() {
            retry
                .run(|| tokio::fs::create_dir_all(parent))
                .await
                .map_err(|e| PatchError::io(parent, e))?;
        }

        if is_state_file(relative, state_files) {
            let text = retry
                .run(|| tokio::fs::read_to_string(file))
                .await
                .map_err(|e| PatchError::io(file, e))?;
            let text = apply_renames(text, rename_pairs);
            retry
                .run(|| tokio::fs::write(&target, &text))
                .await
                .map_err(|e| PatchError::io(&target, e))?;
        } else {
            retry
                .run(|| tokio::fs::copy(file, &target))
                .await
                .map_err(|e| PatchError::io(&target, e))?;
        }
    }

    debug!(
        from = %source.display(),
        to = %destination.display(),
        count = files.len(),
        "Copied patch directory"
    );
    Ok(files.len())
}

fn is_state_file(relative: &Path, state_files: &[String]) -> bool {
    let mut components = relative.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => {
            let name = name.to_string_lossy();
            state_files.iter().any(|s| s.eq_ignore_ascii_case(&name))
        }
        _ => false,
    }
}

fn apply_renames(text: String, rename_pairs: &[RenamePair]) -> String {
    rename_pairs
        .iter()
        .filter(|pair| !pair.old_name.is_empty())
        .fold(text, |text, pair| text.replace(&pair.old_name, &pair.new_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use tempfile::TempDir;

    fn populate(root: &Path) {
        std::fs::create_dir_all(root.join("events")).unwrap();
        std::fs::create_dir_all(root.join("state_conflict_history/events")).unwrap();
        std::fs::write(root.join("state.json"), r#"{"ModName":"old_patch"}"#).unwrap();
        std::fs::write(root.join("events/zzz_a.txt"), "a = {}").unwrap();
        std::fs::write(root.join("state_conflict_history/events/a.txt"), "a").unwrap();
    }

    #[test]
    fn test_list_patch_files_skips_root_and_history() {
        let dir = TempDir::new().unwrap();
        populate(dir.path());

        let files = list_patch_files(dir.path(), "state_conflict_history").unwrap();
        assert_eq!(
            files,
            vec![Path::new("events").join("zzz_a.txt").to_string_lossy().to_string()]
        );
    }

    #[test]
    fn test_list_missing_patch_is_empty() {
        let dir = TempDir::new().unwrap();
        let files = list_patch_files(&dir.path().join("nope"), "h").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_apply_renames() {
        let text = apply_renames(
            "old_patch/old_patch".to_string(),
            &[RenamePair::new("old_patch", "new_patch"), RenamePair::new("", "x")],
        );
        assert_eq!(text, "new_patch/new_patch");
    }

    #[test]
    fn test_is_state_file_only_at_root() {
        let names = vec!["state.json".to_string()];
        assert!(is_state_file(Path::new("state.json"), &names));
        assert!(!is_state_file(&Path::new("events").join("state.json"), &names));
    }

    #[tokio::test]
    async fn test_copy_patch_dir_rewrites_state() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("old_patch");
        let destination = dir.path().join("new_patch");
        populate(&source);

        let copied = copy_patch_dir(
            &RetryStrategy::new(RetryPolicy::none()),
            &source,
            &destination,
            &["state.json".to_string()],
            &[RenamePair::new("old_patch", "new_patch")],
        )
        .await
        .unwrap();

        assert_eq!(copied, 3);
        assert_eq!(
            std::fs::read_to_string(destination.join("state.json")).unwrap(),
            r#"{"ModName":"new_patch"}"#
        );
        assert_eq!(
            std::fs::read_to_string(destination.join("events/zzz_a.txt")).unwrap(),
            "a = {}"
        );
        assert!(source.join("state.json").is_file());
    }
}
