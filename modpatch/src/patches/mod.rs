//! Mod patches on disk.
//!
//! A patch is the output of conflict resolution for one mod collection: a
//! directory under the game's mod folder holding the exported files and the
//! state needed to resume resolution later.
//!
//! # Layout
//!
//! ```text
//! <mod dir>/<patch name>/
//! ├── state.json                      # primary state document
//! ├── state.json.bak                  # previous generation
//! ├── state_conflict_history/
//! │   └── <Type>/<Id>.txt             # externalized history payloads
//! └── common/…, events/…, gfx/…       # exported game files
//! ```
//!
//! [`ModPatchExporter`] is the entry point for everything a caller does with
//! a patch.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use modpatch::config::ExporterConfig;
//! use modpatch::export::{DiskModReader, ParadoxInfoProvider};
//! use modpatch::patches::{ModPatchExporter, PatchLocation};
//!
//! let patches = ModPatchExporter::new(ExporterConfig::default(), Arc::new(DiskModReader::new()))
//!     .with_provider(Arc::new(ParadoxInfoProvider::new(["stellaris"])));
//!
//! let location = PatchLocation::new("/mods", "IronyModManager_my_collection");
//! for file in patches.get_patch_files(&location).await? {
//!     println!("{}", file);
//! }
//! ```

mod exporter;
mod files;
mod location;

pub use exporter::{CopyPatchRequest, ModPatchExporter};
pub use files::{copy_patch_dir, list_patch_files, walk_files, RenamePair};
pub use location::PatchLocation;
