//! Persisted patch state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::definition::{null_as_default, standardize_paths, Definition, DefinitionMapper};

/// Resolution strategy recorded with a patch. Opaque to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PatchStateMode {
    #[default]
    None,
    Default,
    Advanced,
    DefaultWithoutLocalization,
    AdvancedWithoutLocalization,
    ReadOnly,
    ReadOnlyWithoutLocalization,
}

/// Everything recorded about one patch between sessions.
///
/// Collections are never absent: `null` in the document loads as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PatchState {
    #[serde(deserialize_with = "null_as_default")]
    pub conflicts: Vec<Definition>,

    #[serde(deserialize_with = "null_as_default")]
    pub resolved_conflicts: Vec<Definition>,

    #[serde(deserialize_with = "null_as_default")]
    pub orphan_conflicts: Vec<Definition>,

    #[serde(deserialize_with = "null_as_default")]
    pub ignored_conflicts: Vec<Definition>,

    #[serde(deserialize_with = "null_as_default")]
    pub overwritten_conflicts: Vec<Definition>,

    #[serde(deserialize_with = "null_as_default")]
    pub custom_conflicts: Vec<Definition>,

    /// Last known payload per `TypeAndId`, independent of categorization.
    #[serde(deserialize_with = "null_as_default")]
    pub conflict_history: Vec<Definition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_conflict_paths: Option<String>,

    pub mode: PatchStateMode,

    #[serde(deserialize_with = "null_as_default")]
    pub load_order: Vec<String>,

    #[serde(deserialize_with = "null_as_default")]
    pub allowed_languages: Vec<String>,

    pub has_game_definitions: bool,
}

impl PatchState {
    /// Every entry collection, history included.
    pub fn collections_mut(&mut self) -> [&mut Vec<Definition>; 7] {
        [
            &mut self.conflicts,
            &mut self.resolved_conflicts,
            &mut self.orphan_conflicts,
            &mut self.ignored_conflicts,
            &mut self.overwritten_conflicts,
            &mut self.custom_conflicts,
            &mut self.conflict_history,
        ]
    }

    /// Rewrite path separators in every entry to the host separator.
    pub fn standardize_paths(&mut self) {
        for collection in self.collections_mut() {
            collection.iter_mut().for_each(standardize_paths);
        }
    }

    /// History grouped by `TypeAndId`, in document order.
    pub fn indexed_conflict_history(&self) -> HashMap<String, Vec<&Definition>> {
        let mut index: HashMap<String, Vec<&Definition>> = HashMap::new();
        for definition in &self.conflict_history {
            index
                .entry(definition.type_and_id())
                .or_default()
                .push(definition);
        }
        index
    }

    /// Detached copy. Category payloads follow `include_code`; history always
    /// keeps whatever payload it has.
    pub fn mapped(&self, include_code: bool) -> Self {
        Self {
            conflicts: DefinitionMapper::map_many(&self.conflicts, include_code),
            resolved_conflicts: DefinitionMapper::map_many(&self.resolved_conflicts, include_code),
            orphan_conflicts: DefinitionMapper::map_many(&self.orphan_conflicts, include_code),
            ignored_conflicts: DefinitionMapper::map_many(&self.ignored_conflicts, include_code),
            overwritten_conflicts: DefinitionMapper::map_many(
                &self.overwritten_conflicts,
                include_code,
            ),
            custom_conflicts: DefinitionMapper::map_many(&self.custom_conflicts, include_code),
            conflict_history: DefinitionMapper::map_many(&self.conflict_history, true),
            ignore_conflict_paths: self.ignore_conflict_paths.clone(),
            mode: self.mode,
            load_order: self.load_order.clone(),
            allowed_languages: self.allowed_languages.clone(),
            has_game_definitions: self.has_game_definitions,
        }
    }
}
