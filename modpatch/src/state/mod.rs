//! Patch state persistence.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        StateStore                          │
//! │  get_patch_state / save_state / reset_cache                │
//! ├──────────────┬──────────────────────┬──────────────────────┤
//! │  StateCache  │  HistoryExternalizer │  WriteTracker        │
//! │  one slot,   │  side files under    │  pending signal +    │
//! │  one path    │  state_conflict_     │  write events        │
//! │              │  history/            │                      │
//! └──────────────┴──────────────────────┴──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use modpatch::config::ExporterConfig;
//! use modpatch::patches::PatchLocation;
//! use modpatch::state::{SaveStateRequest, StateStore};
//!
//! let store = StateStore::new(ExporterConfig::default());
//! let location = PatchLocation::new("/mods", "IronyModManager_my_collection");
//!
//! store.save_state(SaveStateRequest::new(location.clone())).await?;
//! store.wait_for_writes().await;
//!
//! let state = store.get_patch_state(&location, true).await?;
//! ```

mod cache;
mod history;
mod model;
mod signal;
mod store;

pub use cache::{CachedState, StateCache, STATE_CACHE_KEY, STATE_CACHE_PREFIX};
pub use history::{same_payload, strip_externalized, HistoryExternalizer};
pub use model::{PatchState, PatchStateMode};
pub use signal::{StateWriteEvent, WriteTracker};
pub use store::{SaveStateRequest, StateStore};
