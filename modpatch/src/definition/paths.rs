//! Path separator standardization.
//!
//! State documents written on Windows carry `\` separators while those written
//! elsewhere carry `/`. Every path-bearing field is rewritten to the host
//! separator at the load boundary.

use std::path::MAIN_SEPARATOR;

use super::Definition;

/// Replace both `/` and `\` with the host separator.
pub fn standardize_path(path: &str) -> String {
    path.chars()
        .map(|c| if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c })
        .collect()
}

fn standardize_opt(path: &mut Option<String>) {
    if let Some(p) = path.as_mut() {
        *p = standardize_path(p);
    }
}

fn standardize_list(paths: &mut [String]) {
    for p in paths.iter_mut() {
        *p = standardize_path(p);
    }
}

/// Standardize every path-bearing field of an entry in place.
pub fn standardize_paths(definition: &mut Definition) {
    definition.file = standardize_path(&definition.file);
    standardize_opt(&mut definition.mod_path);
    standardize_opt(&mut definition.disk_file);
    standardize_opt(&mut definition.original_file_name);
    standardize_opt(&mut definition.virtual_path);
    standardize_list(&mut definition.generated_file_names);
    standardize_list(&mut definition.additional_file_names);
    standardize_list(&mut definition.overwritten_file_names);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sep() -> String {
        MAIN_SEPARATOR.to_string()
    }

    #[test]
    fn test_standardize_mixed_separators() {
        let expected = format!("common{0}events{0}a.txt", sep());
        assert_eq!(standardize_path("common\\events/a.txt"), expected);
    }

    #[test]
    fn test_standardize_paths_touches_every_path_field() {
        let mut def = Definition::new("events", "e", "events\\a.txt", "");
        def.overwritten_file_names = vec!["events\\a.txt".into(), "events/b.txt".into()];
        def.virtual_path = Some("x\\y".into());
        def.mod_path = Some("mods\\m".into());

        standardize_paths(&mut def);

        assert_eq!(def.file, format!("events{}a.txt", sep()));
        assert_eq!(def.overwritten_file_names[1], format!("events{}b.txt", sep()));
        assert_eq!(def.virtual_path.as_deref(), Some(format!("x{}y", sep()).as_str()));
        assert_eq!(def.mod_path.as_deref(), Some(format!("mods{}m", sep()).as_str()));
    }

    proptest! {
        #[test]
        fn prop_standardize_is_idempotent(s in "[a-z/\\\\._]{0,40}") {
            let once = standardize_path(&s);
            prop_assert_eq!(standardize_path(&once), once.clone());
            prop_assert_eq!(once.chars().count(), s.chars().count());
        }
    }
}
