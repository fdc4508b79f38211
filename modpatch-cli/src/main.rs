//! ModPatch CLI - inspect and maintain conflict-resolution patches
//!
//! Reads the patch state written by the library, lists and prints exported
//! files, and copies or renames patches without losing their history.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;

use commands::common::CliContext;
use commands::config::ConfigCommands;
use commands::patch::CopyArgs;
use commands::state::StateCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "modpatch")]
#[command(version = modpatch::VERSION)]
#[command(about = "Inspect and maintain mod conflict patches", long_about = None)]
struct Cli {
    /// Mod directory holding the patches (overrides paths.mod_directory)
    #[arg(long, global = true, value_name = "DIR")]
    mod_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// View or edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    #[command(flatten)]
    Patch(PatchCommands),
}

/// Commands that operate on patches under the mod directory.
#[derive(Debug, Subcommand)]
enum PatchCommands {
    /// Inspect saved patch state
    #[command(subcommand)]
    State(StateCommands),

    /// List the files exported into a patch
    Files {
        /// Patch directory name under the mod directory
        patch: String,
    },

    /// Print one exported file of a patch
    Cat {
        /// Patch directory name under the mod directory
        patch: String,

        /// File path relative to the patch root
        file: String,
    },

    /// Copy a patch under a new name
    Copy {
        /// Existing patch directory name
        patch: String,

        /// New patch directory name
        new_name: String,

        /// Extra OLD=NEW replacements applied to the state documents
        #[arg(long, value_name = "OLD=NEW")]
        replace: Vec<String>,
    },

    /// Rename a patch, removing the old directory
    Rename {
        /// Existing patch directory name
        patch: String,

        /// New patch directory name
        new_name: String,

        /// Extra OLD=NEW replacements applied to the state documents
        #[arg(long, value_name = "OLD=NEW")]
        replace: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("error:").bold().red(), e);
            e.exit_code()
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let command = match cli.command {
        // Config editing works without a mod directory
        Commands::Config(command) => return commands::config::run(command),
        Commands::Patch(command) => command,
    };

    let ctx = CliContext::new(cli.mod_dir, cli.verbose)?;
    tracing::debug!(retry_attempts = ctx.config().retry.attempts, "Starting command");

    match command {
        PatchCommands::State(command) => commands::state::run(&ctx, command).await,
        PatchCommands::Files { patch } => commands::patch::run_files(&ctx, &patch).await,
        PatchCommands::Cat { patch, file } => commands::patch::run_cat(&ctx, &patch, &file).await,
        PatchCommands::Copy {
            patch,
            new_name,
            replace,
        } => {
            let args = CopyArgs {
                patch,
                new_name,
                replace,
            };
            commands::patch::run_copy(&ctx, args).await
        }
        PatchCommands::Rename {
            patch,
            new_name,
            replace,
        } => {
            let args = CopyArgs {
                patch,
                new_name,
                replace,
            };
            commands::patch::run_rename(&ctx, args).await
        }
    }
}
