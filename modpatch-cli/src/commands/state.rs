//! Patch state inspection commands.

use clap::Subcommand;
use console::style;
use modpatch::definition::Definition;
use modpatch::state::PatchState;

use super::common::CliContext;
use crate::error::CliError;

/// State subcommands.
#[derive(Debug, Subcommand)]
pub enum StateCommands {
    /// Summarize the saved state of a patch
    Show {
        /// Patch directory name under the mod directory
        patch: String,

        /// Print the full state document as JSON
        #[arg(long)]
        json: bool,

        /// Load externalized history payloads
        #[arg(long)]
        with_code: bool,
    },

    /// Print the resolution mode of a patch
    Mode {
        /// Patch directory name under the mod directory
        patch: String,
    },

    /// Print the languages allowed in a patch
    Languages {
        /// Patch directory name under the mod directory
        patch: String,
    },
}

/// Run a state subcommand.
pub async fn run(ctx: &CliContext, command: StateCommands) -> Result<(), CliError> {
    match command {
        StateCommands::Show {
            patch,
            json,
            with_code,
        } => run_show(ctx, &patch, json, with_code).await,
        StateCommands::Mode { patch } => {
            let location = ctx.existing_location(&patch)?;
            let mode = ctx.exporter().get_patch_state_mode(&location).await?;
            println!("{:?}", mode);
            Ok(())
        }
        StateCommands::Languages { patch } => {
            let location = ctx.existing_location(&patch)?;
            let languages = ctx.exporter().get_allowed_languages(&location).await?;
            if languages.is_empty() {
                println!("(all languages)");
            }
            for language in languages {
                println!("{}", language);
            }
            Ok(())
        }
    }
}

async fn run_show(
    ctx: &CliContext,
    patch: &str,
    json: bool,
    with_code: bool,
) -> Result<(), CliError> {
    let location = ctx.existing_location(patch)?;
    let Some(state) = ctx.exporter().get_patch_state(&location, with_code).await? else {
        println!("{} no saved state", style(patch).bold());
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    print_summary(patch, &state);
    Ok(())
}

fn print_summary(patch: &str, state: &PatchState) {
    println!("{} {}", style("Patch:").bold().cyan(), patch);
    println!("{} {:?}", style("Mode:").bold().cyan(), state.mode);
    println!(
        "{} {}",
        style("Game definitions:").bold().cyan(),
        if state.has_game_definitions { "yes" } else { "no" }
    );
    if let Some(paths) = &state.ignore_conflict_paths {
        println!("{} {}", style("Ignore rules:").bold().cyan(), paths.lines().count());
    }
    println!();

    println!("{}", style("Conflicts:").bold().yellow());
    print_count("unresolved", &state.conflicts);
    print_count("resolved", &state.resolved_conflicts);
    print_count("ignored", &state.ignored_conflicts);
    print_count("orphan", &state.orphan_conflicts);
    print_count("overwritten", &state.overwritten_conflicts);
    print_count("custom", &state.custom_conflicts);
    print_count("history", &state.conflict_history);

    if !state.load_order.is_empty() {
        println!();
        println!("{}", style("Load order:").bold().yellow());
        for (idx, name) in state.load_order.iter().enumerate() {
            println!("  {:>3}. {}", idx + 1, name);
        }
    }
}

fn print_count(label: &str, definitions: &[Definition]) {
    println!("  {:<12} {}", label, definitions.len());
}
