//! Common setup shared across patch commands.

use std::path::PathBuf;
use std::sync::Arc;

use modpatch::config::{ConfigFile, ExporterConfig};
use modpatch::export::{DiskModReader, ParadoxInfoProvider};
use modpatch::logging::{init_logging, LoggingGuard};
use modpatch::patches::{ModPatchExporter, PatchLocation};

use crate::error::CliError;

/// Games the bundled naming provider handles.
pub const SUPPORTED_GAMES: &[&str] = &[
    "stellaris",
    "hearts_of_iron4",
    "europa_universalis4",
    "crusader_kings3",
    "imperator_rome",
    "victoria3",
];

/// Loaded configuration, logging and the exporter facade.
pub struct CliContext {
    config: ConfigFile,
    mod_directory: PathBuf,
    exporter: ModPatchExporter,
    _logging: LoggingGuard,
}

impl CliContext {
    /// Load `config.ini`, start logging and build the exporter.
    ///
    /// `mod_dir` overrides `paths.mod_directory` from the config file.
    pub fn new(mod_dir: Option<PathBuf>, verbose: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let mut logging = config.logging.clone();
        if verbose {
            logging.level = "debug".to_string();
        }
        let guard = init_logging(&logging).map_err(CliError::Logging)?;

        let mod_directory = mod_dir
            .or_else(|| config.paths.mod_directory.clone())
            .ok_or_else(|| {
                CliError::Config(
                    "No mod directory configured. \
                     Set paths.mod_directory with 'modpatch config set' or use --mod-dir"
                        .to_string(),
                )
            })?;

        let exporter = ModPatchExporter::new(
            ExporterConfig::from_config_file(&config),
            Arc::new(DiskModReader::new()),
        )
        .with_provider(Arc::new(ParadoxInfoProvider::new(
            SUPPORTED_GAMES.iter().copied(),
        )));

        tracing::debug!(mod_directory = %mod_directory.display(), "CLI context ready");

        Ok(Self {
            config,
            mod_directory,
            exporter,
            _logging: guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn exporter(&self) -> &ModPatchExporter {
        &self.exporter
    }

    /// Location of `patch` under the mod directory.
    pub fn location(&self, patch: &str) -> PatchLocation {
        PatchLocation::new(&self.mod_directory, patch)
    }

    /// Like [`CliContext::location`], failing when the patch directory is absent.
    pub fn existing_location(&self, patch: &str) -> Result<PatchLocation, CliError> {
        let location = self.location(patch);
        location.validate()?;
        if !location.patch_root().is_dir() {
            return Err(CliError::PatchNotFound(patch.to_string()));
        }
        Ok(location)
    }
}
