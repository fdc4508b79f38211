//! Content export.
//!
//! Turns resolved entries into files the game reads, under the patch root.
//!
//! # Policies
//!
//! | Category               | File name                | Existing file |
//! |------------------------|--------------------------|---------------|
//! | definitions            | generated by provider    | overwritten   |
//! | orphan conflicts       | generated by provider    | kept          |
//! | overwritten conflicts  | existing + empty files   | kept          |
//! | custom conflicts       | existing                 | overwritten   |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use modpatch::config::ExporterConfig;
//! use modpatch::export::{ContentExporter, DiskModReader, ExportRequest, ParadoxInfoProvider};
//! use modpatch::patches::PatchLocation;
//!
//! let exporter = ContentExporter::new(&ExporterConfig::default(), Arc::new(DiskModReader::new()))
//!     .with_provider(Arc::new(ParadoxInfoProvider::new(["stellaris"])));
//!
//! let mut request = ExportRequest::new(PatchLocation::new("/mods", "my_patch"), "stellaris");
//! request.definitions = resolved;
//! let all_written = exporter.export(&mut request).await?;
//! ```

mod encoding;
mod exporter;
mod policy;
mod provider;
mod reader;

pub use encoding::{TextEncoding, UTF8_BOM};
pub use exporter::{ContentExporter, ExportRequest};
pub use policy::{ExportCategory, ExportPolicy, FileNameGeneration};
pub use provider::{DefinitionInfoProvider, ParadoxInfoProvider, FIOS_PREFIX, LIOS_PREFIX};
pub use reader::{BoxFuture, DiskModReader, ModReader, ModStream};
