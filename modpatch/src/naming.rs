//! Centralized patch naming conventions.
//!
//! This module is the single source of truth for names the crate puts on disk:
//! - The primary state document and its backup (`state.json`, `state.json.bak`)
//! - The history directory (`state_conflict_history/<Type>/<Id>.txt`)
//! - Sanitized file names for ids that contain characters a filesystem rejects
//!
//! Other modules should call these functions rather than building names directly.

use std::path::{Path, PathBuf};

use crate::error::{PatchError, PatchResult};

/// File name of the primary state document.
pub const STATE_FILE_NAME: &str = "state.json";

/// Extension appended to the state document for its backup copy.
pub const BACKUP_EXTENSION: &str = ".bak";

/// Directory (under the patch root) holding externalized history payloads.
pub const HISTORY_DIR_NAME: &str = "state_conflict_history";

/// Extension of externalized history payload files.
pub const HISTORY_FILE_EXTENSION: &str = "txt";

/// Image extensions that may substitute for one another when a mod renamed a texture.
pub const IMAGE_EXTENSIONS: &[&str] = &[".dds", ".png", ".tga", ".jpg", ".jpeg", ".bmp"];

/// Characters rejected by at least one supported filesystem.
const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Strip characters that are invalid in a file name.
///
/// # Examples
///
/// ```
/// use modpatch::naming::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("my:event?"), "myevent");
/// assert_eq!(sanitize_file_name("plain_id"), "plain_id");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control() && !INVALID_FILE_NAME_CHARS.contains(c))
        .collect()
}

/// Path of the backup copy for a state document.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use modpatch::naming::backup_path;
///
/// assert_eq!(
///     backup_path(Path::new("/mods/patch/state.json")),
///     Path::new("/mods/patch/state.json.bak")
/// );
/// ```
pub fn backup_path(state_path: &Path) -> PathBuf {
    let mut name = state_path.as_os_str().to_owned();
    name.push(BACKUP_EXTENSION);
    PathBuf::from(name)
}

/// Path of the externalized payload for one history entry.
///
/// `<patch_root>/<history_dir>/<Type>/<sanitized Id>.txt`. The type keeps its
/// folder structure with each segment sanitized; empty and `.` segments are
/// dropped. A `..` segment is rejected so the file stays under the history
/// directory.
pub fn history_file_path(
    patch_root: &Path,
    history_dir: &str,
    def_type: &str,
    id: &str,
) -> PatchResult<PathBuf> {
    let mut path = patch_root.join(history_dir);
    for segment in def_type.split(['/', '\\']) {
        let segment = sanitize_file_name(segment.trim());
        match segment.as_str() {
            "" | "." => continue,
            ".." => {
                return Err(PatchError::invalid(format!(
                    "history type '{}' leaves the history directory",
                    def_type
                )))
            }
            _ => path.push(segment),
        }
    }
    path.push(format!("{}.{}", sanitize_file_name(id), HISTORY_FILE_EXTENSION));
    Ok(path)
}

/// The entry of `extensions` that `file` ends with (case-insensitive).
pub fn image_extension<'a, S: AsRef<str>>(file: &str, extensions: &'a [S]) -> Option<&'a str> {
    let lower = file.to_lowercase();
    extensions
        .iter()
        .map(|ext| ext.as_ref())
        .find(|ext| lower.ends_with(&ext.to_lowercase()))
}

/// Replace the trailing `current` extension of `file` with `replacement`.
pub fn swap_extension(file: &str, current: &str, replacement: &str) -> String {
    let idx = file.len().saturating_sub(current.len());
    let stem = file.get(..idx).unwrap_or(file);
    format!("{}{}", stem, replacement)
}
