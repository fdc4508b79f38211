//! Resolved game-data entries.
//!
//! A [`Definition`] is one configuration item after conflict resolution. Its
//! logical key is [`Definition::type_and_id`]; the same key may appear several
//! times across categories during one resolution pass.
//!
//! Entries are value-like. Anything that stores or serializes an entry goes
//! through [`DefinitionMapper`] first so the caller's copy, the cached copy and
//! the serialized copy never alias.

mod mapper;
mod paths;

pub use mapper::DefinitionMapper;
pub use paths::{standardize_path, standardize_paths};

use serde::{Deserialize, Deserializer, Serialize};

/// Kind of payload an entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ValueType {
    /// Non-text asset copied byte for byte (textures, sounds, ...).
    Binary,
    /// Namespace declaration; never written on its own.
    Namespace,
    /// Scripted variable; never written on its own.
    Variable,
    /// Object parsed out of a shared script file.
    #[default]
    Object,
    /// Entire text file treated as one entry.
    WholeTextFile,
    /// Placeholder for a file that exists but is empty.
    EmptyFile,
    /// Entry that failed upstream parsing but is still tracked.
    Invalid,
}

impl ValueType {
    /// Whether the payload must be copied as raw bytes.
    pub fn is_binary(self) -> bool {
        matches!(self, Self::Binary)
    }
}

/// One resolved configuration entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Definition {
    /// Game-data category (usually the parent directory, e.g. `common/events`).
    #[serde(rename = "Type")]
    pub def_type: String,

    /// Name or key within the category.
    pub id: String,

    /// Text payload. `None` when externalized or not loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    pub value_type: ValueType,

    #[serde(rename = "ContentSHA", skip_serializing_if = "Option::is_none")]
    pub content_sha: Option<String>,

    #[serde(rename = "DefinitionSHA", skip_serializing_if = "Option::is_none")]
    pub definition_sha: Option<String>,

    /// Output-relative path. Rewritten by file-name generation on export.
    pub file: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mod_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mod_name: Option<String>,

    #[serde(deserialize_with = "null_as_default")]
    pub generated_file_names: Vec<String>,

    #[serde(deserialize_with = "null_as_default")]
    pub additional_file_names: Vec<String>,

    /// Every file the entry overrides; all but the written one get placeholders.
    #[serde(deserialize_with = "null_as_default")]
    pub overwritten_file_names: Vec<String>,

    pub order: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_line: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_column: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_file_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_mod_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name_suffix: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_parser: Option<String>,

    #[serde(deserialize_with = "null_as_default")]
    pub dependencies: Vec<String>,

    pub custom_priority_order: i32,
    pub is_from_game: bool,
    pub is_custom_patch: bool,
    pub is_placeholder: bool,
    pub allow_duplicate: bool,
    pub exists_in_last_file: bool,
}

impl Definition {
    /// Create an entry with identity, file and payload set.
    pub fn new(
        def_type: impl Into<String>,
        id: impl Into<String>,
        file: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            def_type: def_type.into(),
            id: id.into(),
            file: file.into(),
            code: Some(code.into()),
            ..Self::default()
        }
    }

    /// Logical key `"<Type>-<Id>"`.
    pub fn type_and_id(&self) -> String {
        type_and_id(&self.def_type, &self.id)
    }

    /// Whether the entry carries a non-empty payload.
    pub fn has_code(&self) -> bool {
        self.code.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Directory portion of [`Definition::file`], using `/` or `\` as separators.
    pub fn parent_directory(&self) -> &str {
        match self.file.rfind(['/', '\\']) {
            Some(idx) => &self.file[..idx],
            None => "",
        }
    }
}

/// Build the logical key for a type and id.
pub fn type_and_id(def_type: &str, id: &str) -> String {
    format!("{}-{}", def_type, id)
}

/// Deserialize `null` as the type's default (empty list for collections).
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
