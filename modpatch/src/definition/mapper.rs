//! Detached copies of entries.

use super::Definition;

/// Produces detached copies of [`Definition`]s, optionally without payload.
///
/// The primary state document stays small by leaving out payloads that are
/// externalized or not yet needed; export and fresh history keep them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionMapper;

impl DefinitionMapper {
    /// Copy one entry. `code` is copied only when `include_code` is set.
    pub fn map(definition: &Definition, include_code: bool) -> Definition {
        Definition {
            def_type: definition.def_type.clone(),
            id: definition.id.clone(),
            code: if include_code {
                definition.code.clone()
            } else {
                None
            },
            value_type: definition.value_type,
            content_sha: definition.content_sha.clone(),
            definition_sha: definition.definition_sha.clone(),
            file: definition.file.clone(),
            mod_path: definition.mod_path.clone(),
            mod_name: definition.mod_name.clone(),
            generated_file_names: definition.generated_file_names.clone(),
            additional_file_names: definition.additional_file_names.clone(),
            overwritten_file_names: definition.overwritten_file_names.clone(),
            order: definition.order,
            error_line: definition.error_line,
            error_column: definition.error_column,
            error_message: definition.error_message.clone(),
            original_file_name: definition.original_file_name.clone(),
            original_mod_name: definition.original_mod_name.clone(),
            disk_file: definition.disk_file.clone(),
            virtual_path: definition.virtual_path.clone(),
            file_name_suffix: definition.file_name_suffix.clone(),
            used_parser: definition.used_parser.clone(),
            dependencies: definition.dependencies.clone(),
            custom_priority_order: definition.custom_priority_order,
            is_from_game: definition.is_from_game,
            is_custom_patch: definition.is_custom_patch,
            is_placeholder: definition.is_placeholder,
            allow_duplicate: definition.allow_duplicate,
            exists_in_last_file: definition.exists_in_last_file,
        }
    }

    /// Copy a sequence of entries. An absent sequence maps to an empty one.
    pub fn map_many<'a, I>(definitions: I, include_code: bool) -> Vec<Definition>
    where
        I: IntoIterator<Item = &'a Definition>,
    {
        definitions
            .into_iter()
            .map(|d| Self::map(d, include_code))
            .collect()
    }
}
