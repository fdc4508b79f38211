//! `modpatch config`: read and edit `~/.modpatch/config.ini`.
//!
//! Keys are addressed as `section.key`, e.g. `retry.delay_ms` or
//! `paths.mod_directory`. Editing works without a mod directory configured.

use std::path::PathBuf;

use clap::Subcommand;
use console::style;
use modpatch::config::{config_file_path, ConfigError, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Shown for keys without a value.
const UNSET: &str = "(not set)";

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the value stored under KEY
    Get {
        /// `section.key`, see `modpatch config list`
        key: String,
    },

    /// Store VALUE under KEY and write the file
    Set {
        /// `section.key`, see `modpatch config list`
        key: String,

        /// New value; an empty string clears optional paths
        value: String,
    },

    /// Print every key with its current value, grouped by section
    List,

    /// Print where the configuration file lives
    Path,
}

pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    if let ConfigCommands::Path = command {
        println!("{}", file_path()?.display());
        return Ok(());
    }

    let path = file_path()?;
    let mut config = ConfigFile::load_from(&path)?;

    match command {
        ConfigCommands::Get { key } => {
            let value = lookup(&key)?.get(&config);
            println!("{}", display_value(&value));
        }
        ConfigCommands::Set { key, value } => {
            let key = lookup(&key)?;
            key.set(&mut config, &value)?;
            config.save_to(&path)?;
            println!(
                "{} {} = {}",
                style("Updated").bold().green(),
                key,
                display_value(&key.get(&config))
            );
        }
        ConfigCommands::List => print_settings(&config, &path),
        ConfigCommands::Path => {}
    }
    Ok(())
}

fn file_path() -> Result<PathBuf, CliError> {
    Ok(config_file_path().ok_or(ConfigError::NoHomeDirectory)?)
}

fn lookup(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "'{}' is not a configuration key (run 'modpatch config list')",
            key
        ))
    })
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        UNSET
    } else {
        value
    }
}

fn print_settings(config: &ConfigFile, path: &std::path::Path) {
    println!("{} {}", style("Settings from").bold().cyan(), path.display());

    let width = ConfigKey::all()
        .iter()
        .map(|key| key.key_name().len())
        .max()
        .unwrap_or(0);

    let mut section = None;
    for key in ConfigKey::all() {
        if section != Some(key.section()) {
            section = Some(key.section());
            println!();
            println!("{}", style(format!("[{}]", key.section())).bold().yellow());
        }
        println!(
            "  {:<width$}  {}",
            key.key_name(),
            display_value(&key.get(config)),
            width = width
        );
    }
}
