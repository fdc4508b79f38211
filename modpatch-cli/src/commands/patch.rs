//! Patch directory commands: listing, reading, copying and renaming.

use console::style;
use modpatch::patches::{CopyPatchRequest, RenamePair};

use super::common::CliContext;
use crate::error::CliError;

/// List the exported files of a patch.
pub async fn run_files(ctx: &CliContext, patch: &str) -> Result<(), CliError> {
    let location = ctx.existing_location(patch)?;
    let files = ctx.exporter().get_patch_files(&location).await?;

    if files.is_empty() {
        println!("{} has no exported files", style(patch).bold());
        return Ok(());
    }
    for file in &files {
        println!("{}", file);
    }
    println!();
    println!("{} {}", style("Total:").bold().cyan(), files.len());
    Ok(())
}

/// Print one exported file.
pub async fn run_cat(ctx: &CliContext, patch: &str, file: &str) -> Result<(), CliError> {
    let location = ctx.existing_location(patch)?;
    let content = ctx
        .exporter()
        .load_definition_contents(&location, file)
        .await?;
    print!("{}", content);
    Ok(())
}

/// Arguments shared by `copy` and `rename`.
pub struct CopyArgs {
    pub patch: String,
    pub new_name: String,
    /// Extra `old=new` replacements for the state documents.
    pub replace: Vec<String>,
}

impl CopyArgs {
    fn into_request(self, ctx: &CliContext) -> Result<CopyPatchRequest, CliError> {
        let location = ctx.existing_location(&self.patch)?;
        let mut request = CopyPatchRequest::new(location, self.new_name);
        if !self.replace.is_empty() {
            request.rename_pairs.push(RenamePair::new(
                request.location.patch_name.clone(),
                request.new_patch_name.clone(),
            ));
            for pair in &self.replace {
                request.rename_pairs.push(parse_pair(pair)?);
            }
        }
        Ok(request)
    }
}

/// Copy a patch under a new name.
pub async fn run_copy(ctx: &CliContext, args: CopyArgs) -> Result<(), CliError> {
    let request = args.into_request(ctx)?;
    ctx.exporter().copy_patch_mod(&request).await?;
    println!(
        "{} {} -> {}",
        style("Copied").bold().green(),
        request.location.patch_name,
        request.new_patch_name
    );
    Ok(())
}

/// Move a patch to a new name.
pub async fn run_rename(ctx: &CliContext, args: CopyArgs) -> Result<(), CliError> {
    let request = args.into_request(ctx)?;
    ctx.exporter().rename_patch_mod(&request).await?;
    println!(
        "{} {} -> {}",
        style("Renamed").bold().green(),
        request.location.patch_name,
        request.new_patch_name
    );
    Ok(())
}

fn parse_pair(value: &str) -> Result<RenamePair, CliError> {
    match value.split_once('=') {
        Some((old, new)) if !old.is_empty() => Ok(RenamePair::new(old, new)),
        _ => Err(CliError::Config(format!(
            "Invalid replacement '{}'. Expected OLD=NEW",
            value
        ))),
    }
}
