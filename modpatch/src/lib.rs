//! ModPatch - patch state persistence and content export for game mod collections
//!
//! When several mods edit the same game-data entry, a conflict solver picks or
//! merges a winner. This library records those resolutions durably and writes
//! the resolved entries back to disk as a game-readable patch mod.
//!
//! # Modules
//!
//! - [`state`]: cached, backed-up `state.json` with externalized history
//! - [`export`]: writes resolved entries as game files
//! - [`patches`]: the [`patches::ModPatchExporter`] facade and patch directory operations
//! - [`definition`]: the entry model and its detached copies
//! - [`retry`]: bounded fixed-delay retry around single file operations
//! - [`config`], [`logging`]: ambient configuration and tracing setup

pub mod config;
pub mod definition;
pub mod error;
pub mod export;
pub mod logging;
pub mod naming;
pub mod patches;
pub mod retry;
pub mod state;

pub use error::{PatchError, PatchResult};

/// Crate version, as reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
