//! Integration tests for content export and patch directory operations.
//!
//! These tests verify:
//! - per-category file name and existence policies
//! - zero-byte placeholders for overwritten file chains
//! - binary copies with image extension fallback
//! - listing, reading, copying and renaming exported patches
//!
//! Run with: `cargo test --test export_integration`

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use modpatch::config::ExporterConfig;
use modpatch::definition::{Definition, ValueType};
use modpatch::export::{
    BoxFuture, ExportRequest, ModReader, ModStream, ParadoxInfoProvider, UTF8_BOM,
};
use modpatch::patches::{CopyPatchRequest, ModPatchExporter, PatchLocation};
use modpatch::retry::RetryPolicy;
use modpatch::state::SaveStateRequest;

// ============================================================================
// Helper Functions
// ============================================================================

const MOD_PATH: &str = "/mods/flags_mod";
const GAME: &str = "stellaris";

/// In-memory mod content keyed by `(mod path, file name)`.
#[derive(Default)]
struct MemoryModReader {
    files: HashMap<(String, String), Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryModReader {
    fn with_file(mut self, mod_path: &str, file: &str, bytes: &[u8]) -> Self {
        self.files
            .insert((mod_path.to_string(), file.to_string()), bytes.to_vec());
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl ModReader for MemoryModReader {
    fn get_stream<'a>(
        &'a self,
        mod_path: &'a str,
        file_name: &'a str,
    ) -> BoxFuture<'a, io::Result<Option<ModStream>>> {
        self.requests.lock().push(file_name.to_string());
        let data = self
            .files
            .get(&(mod_path.to_string(), file_name.to_string()))
            .cloned();
        Box::pin(async move {
            Ok(data.map(|bytes| {
                let stream: ModStream = Box::pin(io::Cursor::new(bytes));
                stream
            }))
        })
    }
}

fn exporter_with(reader: Arc<MemoryModReader>) -> ModPatchExporter {
    let config = ExporterConfig::default().with_retry(RetryPolicy::none());
    ModPatchExporter::new(config, reader).with_provider(Arc::new(
        ParadoxInfoProvider::new([GAME]).with_fios_paths(["common/on_actions"]),
    ))
}

fn exporter() -> ModPatchExporter {
    exporter_with(Arc::new(MemoryModReader::default()))
}

fn location(dir: &TempDir) -> PatchLocation {
    PatchLocation::new(dir.path(), "patch")
}

fn patch_file(dir: &TempDir, relative: &str) -> std::path::PathBuf {
    dir.path().join("patch").join(relative)
}

fn binary(file: &str) -> Definition {
    Definition {
        value_type: ValueType::Binary,
        mod_path: Some(MOD_PATH.to_string()),
        code: None,
        ..Definition::new("gfx/flags", file, file, "")
    }
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Overwritten entries write their own file plus empty files for the rest of the chain.
#[tokio::test]
async fn test_overwritten_entries_write_empty_placeholders() {
    let dir = TempDir::new().unwrap();
    let mut request = ExportRequest::new(location(&dir), GAME);
    request.overwritten_conflicts.push(Definition {
        overwritten_file_names: vec![
            "common/buildings/a.txt".into(),
            "common/buildings/b.txt".into(),
        ],
        ..Definition::new("common/buildings", "farm", "common/buildings/a.txt", "farm = {}")
    });

    assert!(exporter().export_definition(&mut request).await.unwrap());

    let a = std::fs::read(patch_file(&dir, "common/buildings/a.txt")).unwrap();
    assert_eq!(a, b"farm = {}\n");
    let b = std::fs::read(patch_file(&dir, "common/buildings/b.txt")).unwrap();
    assert!(b.is_empty());
}

/// Placeholders are zero bytes even where the encoding carries a BOM.
#[tokio::test]
async fn test_localisation_placeholders_are_zero_bytes() {
    let dir = TempDir::new().unwrap();
    let mut request = ExportRequest::new(location(&dir), GAME);
    request.overwritten_conflicts.push(Definition {
        overwritten_file_names: vec![
            "localisation/english/a_l_english.yml".into(),
            "localisation/english/b_l_english.yml".into(),
        ],
        ..Definition::new(
            "localisation/english",
            "key",
            "localisation/english/a_l_english.yml",
            "l_english:\n key:0 \"Value\"",
        )
    });

    assert!(exporter().export_definition(&mut request).await.unwrap());

    let a = std::fs::read(patch_file(&dir, "localisation/english/a_l_english.yml")).unwrap();
    assert!(a.starts_with(UTF8_BOM));
    assert!(a.ends_with(b"\"Value\"\n"));
    let b = std::fs::read(patch_file(&dir, "localisation/english/b_l_english.yml")).unwrap();
    assert!(b.is_empty());
}

/// A placeholder never clobbers a file that already has content.
#[tokio::test]
async fn test_placeholder_keeps_existing_content() {
    let dir = TempDir::new().unwrap();
    let existing = patch_file(&dir, "common/buildings/b.txt");
    std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
    std::fs::write(&existing, "keep = yes").unwrap();

    let mut request = ExportRequest::new(location(&dir), GAME);
    request.overwritten_conflicts.push(Definition {
        overwritten_file_names: vec![
            "common/buildings/a.txt".into(),
            "common/buildings/b.txt".into(),
        ],
        ..Definition::new("common/buildings", "farm", "common/buildings/a.txt", "farm = {}")
    });

    assert!(exporter().export_definition(&mut request).await.unwrap());
    assert_eq!(std::fs::read_to_string(existing).unwrap(), "keep = yes");
}

/// A missing `.dds` source is found under another image extension.
#[tokio::test]
async fn test_binary_image_extension_fallback() {
    let dir = TempDir::new().unwrap();
    let reader = Arc::new(MemoryModReader::default().with_file(
        MOD_PATH,
        "gfx/flags/flag.png",
        b"png bytes",
    ));
    let mut request = ExportRequest::new(location(&dir), GAME);
    request.definitions.push(binary("gfx/flags/flag.dds"));

    assert!(exporter_with(reader.clone())
        .export_definition(&mut request)
        .await
        .unwrap());

    let copied = std::fs::read(patch_file(&dir, "gfx/flags/flag.dds")).unwrap();
    assert_eq!(copied, b"png bytes");
    assert_eq!(reader.requests()[0], "gfx/flags/flag.dds");
    assert!(reader.requests().contains(&"gfx/flags/flag.png".to_string()));
}

/// A binary with no source fails on its own; the rest of the batch is written.
#[tokio::test]
async fn test_missing_binary_fails_without_stopping_batch() {
    let dir = TempDir::new().unwrap();
    let reader = Arc::new(MemoryModReader::default().with_file(
        MOD_PATH,
        "gfx/flags/present.dds",
        b"dds",
    ));
    let mut request = ExportRequest::new(location(&dir), GAME);
    request.definitions.push(binary("gfx/flags/missing.dds"));
    request.definitions.push(binary("gfx/flags/present.dds"));
    request
        .definitions
        .push(Definition::new("events", "e", "events/e.txt", "e = {}"));

    let ok = exporter_with(reader)
        .export_definition(&mut request)
        .await
        .unwrap();

    assert!(!ok);
    assert!(patch_file(&dir, "gfx/flags/present.dds").is_file());
    assert!(!patch_file(&dir, "gfx/flags/missing.dds").exists());
    assert!(patch_file(&dir, "events/zzz_e.txt").is_file());
}

/// Fresh definitions always overwrite; custom conflicts keep their own path.
#[tokio::test]
async fn test_definitions_and_custom_conflicts_overwrite() {
    let dir = TempDir::new().unwrap();
    let generated = patch_file(&dir, "common/on_actions/!!!_on_game_start.txt");
    let custom = patch_file(&dir, "events/custom.txt");
    std::fs::create_dir_all(generated.parent().unwrap()).unwrap();
    std::fs::create_dir_all(custom.parent().unwrap()).unwrap();
    std::fs::write(&generated, "old").unwrap();
    std::fs::write(&custom, "old").unwrap();

    let mut request = ExportRequest::new(location(&dir), GAME);
    request.definitions.push(Definition::new(
        "common/on_actions",
        "on_game_start",
        "common/on_actions/00_on_actions.txt",
        "on_game_start = {}\n\n",
    ));
    request
        .custom_conflicts
        .push(Definition::new("events", "c", "events/custom.txt", "c = {}"));

    assert!(exporter().export_definition(&mut request).await.unwrap());
    assert_eq!(std::fs::read_to_string(generated).unwrap(), "on_game_start = {}\n");
    assert_eq!(std::fs::read_to_string(custom).unwrap(), "c = {}\n");
    assert_eq!(request.custom_conflicts[0].file, "events/custom.txt");
}

/// Exported files are listed and readable; state files and history are not listed.
#[tokio::test]
async fn test_patch_files_and_contents() {
    let dir = TempDir::new().unwrap();
    let patches = exporter();

    let mut request = ExportRequest::new(location(&dir), GAME);
    request
        .definitions
        .push(Definition::new("events", "e", "events/e.txt", "e = {}"));
    assert!(patches.export_definition(&mut request).await.unwrap());

    patches
        .save_state(SaveStateRequest {
            resolved_conflicts: vec![Definition::new("events", "e", "events/e.txt", "e = {}")],
            ..SaveStateRequest::new(location(&dir))
        })
        .await
        .unwrap();
    patches.wait_for_writes().await;

    let files = patches.get_patch_files(&location(&dir)).await.unwrap();
    let expected = Path::new("events").join("zzz_e.txt");
    assert_eq!(files, vec![expected.to_string_lossy().to_string()]);

    let content = patches
        .load_definition_contents(&location(&dir), "events/zzz_e.txt")
        .await
        .unwrap();
    assert_eq!(content, "e = {}\n");

    let missing = patches
        .load_definition_contents(&location(&dir), "events/nope.txt")
        .await
        .unwrap();
    assert!(missing.is_empty());
}

/// Copying a patch rewrites its name inside the state documents.
#[tokio::test]
async fn test_copy_patch_rewrites_state() {
    let dir = TempDir::new().unwrap();
    let patches = exporter();
    let old = PatchLocation::new(dir.path(), "old_patch");

    for _ in 0..2 {
        patches
            .save_state(SaveStateRequest {
                conflicts: vec![Definition {
                    mod_name: Some("old_patch".into()),
                    ..Definition::new("events", "e", "events/e.txt", "e = {}")
                }],
                ..SaveStateRequest::new(old.clone())
            })
            .await
            .unwrap();
        patches.wait_for_writes().await;
    }

    let copied = patches
        .copy_patch_mod(&CopyPatchRequest::new(old.clone(), "new_patch"))
        .await
        .unwrap();
    assert!(copied);

    let new_root = dir.path().join("new_patch");
    let state = std::fs::read_to_string(new_root.join("state.json")).unwrap();
    assert!(state.contains("new_patch"));
    assert!(!state.contains("old_patch"));
    let backup = std::fs::read_to_string(new_root.join("state.json.bak")).unwrap();
    assert!(!backup.contains("old_patch"));
    assert!(dir.path().join("old_patch").join("state.json").is_file());

    let loaded = patches
        .get_patch_state(&PatchLocation::new(dir.path(), "new_patch"), false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.conflicts[0].mod_name.as_deref(), Some("new_patch"));
}

/// Renaming moves the directory and drops the source.
#[tokio::test]
async fn test_rename_patch_moves_directory() {
    let dir = TempDir::new().unwrap();
    let patches = exporter();
    let old = PatchLocation::new(dir.path(), "old_patch");

    patches
        .save_state(SaveStateRequest::new(old.clone()))
        .await
        .unwrap();

    let renamed = patches
        .rename_patch_mod(&CopyPatchRequest::new(old.clone(), "new_patch"))
        .await
        .unwrap();
    assert!(renamed);
    assert!(!dir.path().join("old_patch").exists());
    assert!(dir.path().join("new_patch").join("state.json").is_file());

    let missing = patches
        .rename_patch_mod(&CopyPatchRequest::new(old, "other"))
        .await
        .unwrap();
    assert!(!missing);
}

/// Requests without a patch location fail before any I/O.
#[tokio::test]
async fn test_export_rejects_missing_location() {
    let mut request = ExportRequest::new(PatchLocation::default(), GAME);
    request
        .definitions
        .push(Definition::new("events", "e", "events/e.txt", "e = {}"));

    let err = exporter().export_definition(&mut request).await.unwrap_err();
    assert!(err.is_invalid_argument());
}
