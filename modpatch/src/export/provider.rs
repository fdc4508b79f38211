//! Game-specific file naming and encoding rules.
//!
//! The exporter asks a [`DefinitionInfoProvider`] for the output file name of
//! entries whose name it generates, and for the encoding of every text entry.
//! Providers are selected by game identifier.

use super::encoding::TextEncoding;
use crate::definition::{standardize_path, Definition, ValueType};
use crate::error::{PatchError, PatchResult};
use crate::naming::sanitize_file_name;

/// Prefix for folders where the first loaded file wins.
pub const FIOS_PREFIX: &str = "!!!_";

/// Prefix for folders where the last loaded file wins.
pub const LIOS_PREFIX: &str = "zzz_";

/// Localisation folder name.
const LOCALISATION_DIR: &str = "localisation";

/// Localisation override folder name.
const REPLACE_DIR: &str = "replace";

/// File naming and encoding rules for one or more games.
pub trait DefinitionInfoProvider: Send + Sync {
    /// Whether this provider handles `game`.
    fn can_process(&self, game: &str) -> bool;

    /// Patch-relative output path for `definition`.
    fn get_file_name(&self, definition: &Definition) -> PatchResult<String>;

    /// Encoding of the exported text for `definition`.
    fn get_encoding(&self, definition: &Definition) -> PatchResult<TextEncoding>;
}

/// Naming rules shared by Paradox titles.
///
/// Output names are `<parent dir>/<prefix><name>`:
///
/// - `<name>` is the source file name for whole-text entries and `<Id><ext>`
///   otherwise, sanitized for the filesystem.
/// - Folders listed as first-in-order-wins get `!!!_`, everything else `zzz_`.
/// - Localisation goes to `localisation/replace/` without a prefix.
///
/// Localisation is written as UTF-8 with BOM, everything else without.
#[derive(Debug, Clone, Default)]
pub struct ParadoxInfoProvider {
    games: Vec<String>,
    fios_paths: Vec<String>,
}

impl ParadoxInfoProvider {
    /// Create a provider for `games` (case-insensitive identifiers).
    pub fn new<I, S>(games: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            games: games.into_iter().map(Into::into).collect(),
            fios_paths: Vec::new(),
        }
    }

    /// Folders where the first loaded file wins, relative to the game root.
    pub fn with_fios_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fios_paths = paths
            .into_iter()
            .map(|p| {
                standardize_path(&p.into())
                    .trim_end_matches(std::path::MAIN_SEPARATOR)
                    .to_lowercase()
            })
            .collect();
        self
    }

    fn ensure_valid_type(definition: &Definition) -> PatchResult<()> {
        let kind = match definition.value_type {
            ValueType::Variable => "variable",
            ValueType::Namespace => "namespace",
            _ => return Ok(()),
        };
        Err(PatchError::invalid(format!(
            "{} entries cannot be exported as files: {}",
            kind,
            definition.type_and_id()
        )))
    }

    fn is_fios(&self, parent: &str) -> bool {
        let parent = parent.to_lowercase();
        !parent.is_empty() && self.fios_paths.iter().any(|p| *p == parent)
    }
}

fn is_localisation(parent: &str) -> bool {
    parent.to_lowercase().starts_with(LOCALISATION_DIR)
}

fn has_replace_dir(parent: &str) -> bool {
    parent
        .split(std::path::MAIN_SEPARATOR)
        .any(|segment| segment.eq_ignore_ascii_case(REPLACE_DIR))
}

fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        standardize_path(&format!("{}/{}", parent, name))
    }
}

fn file_name_of(file: &str) -> &str {
    file.rsplit(['/', '\\']).next().unwrap_or(file)
}

fn extension_of(file: &str) -> &str {
    let name = file_name_of(file);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[idx..],
        _ => "",
    }
}

impl DefinitionInfoProvider for ParadoxInfoProvider {
    fn can_process(&self, game: &str) -> bool {
        self.games.iter().any(|g| g.eq_ignore_ascii_case(game))
    }

    fn get_file_name(&self, definition: &Definition) -> PatchResult<String> {
        Self::ensure_valid_type(definition)?;

        let parent = standardize_path(definition.parent_directory());
        let name = match definition.value_type {
            ValueType::WholeTextFile => file_name_of(&definition.file).to_string(),
            _ => format!("{}{}", definition.id, extension_of(&definition.file)),
        };
        let name = sanitize_file_name(&name);

        if is_localisation(&parent) {
            if has_replace_dir(&parent) {
                return Ok(join_relative(&parent, &name));
            }
            return Ok(join_relative(&join_relative(&parent, REPLACE_DIR), &name));
        }

        let prefix = if self.is_fios(&parent) {
            FIOS_PREFIX
        } else {
            LIOS_PREFIX
        };
        Ok(join_relative(&parent, &format!("{}{}", prefix, name)))
    }

    fn get_encoding(&self, definition: &Definition) -> PatchResult<TextEncoding> {
        Self::ensure_valid_type(definition)?;

        if is_localisation(&standardize_path(definition.parent_directory())) {
            Ok(TextEncoding::Utf8Bom)
        } else {
            Ok(TextEncoding::Utf8)
        }
    }
}
