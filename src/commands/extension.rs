// src/commands/extension.rs

//! Stored extension commands
//!
//! Thin wrappers over `tlext::extension::manage` and the listing functions.
//! Each runs in its own session so failures leave the catalog unchanged.

use super::{Context, print_notices, print_result};
use anyhow::{Context as _, Result};
use std::path::Path;
use tlext::Session;
use tlext::extension::{ExtensionControl, VirtualFile, available, manage};
use tracing::{debug, info};

fn read_script(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read script {}", path.display()))
}

/// Run one management call in a transaction and report its notices
fn with_session<T>(ctx: &Context, f: impl FnOnce(&mut Session) -> tlext::Result<T>) -> Result<T> {
    let mut session = ctx.session()?;
    session.execute("BEGIN")?;
    let outcome = f(&mut session);
    let end = if outcome.is_ok() { "COMMIT" } else { "ROLLBACK" };
    session.execute(end)?;
    print_notices(&mut session);
    Ok(outcome?)
}

pub fn cmd_install(
    ctx: &Context,
    name: &str,
    version: &str,
    script: &Path,
    description: Option<&str>,
    requires: &[String],
) -> Result<()> {
    let script = read_script(script)?;
    let description = description.unwrap_or(name);
    with_session(ctx, |session| {
        manage::install_extension(session, name, version, description, &script, requires)
    })?;
    println!("Installed extension {} version {}", name, version);
    Ok(())
}

/// Store an extension from a directory laid out like an extension directory
pub fn cmd_install_local(ctx: &Context, path: &Path, name: &str, version: &str) -> Result<()> {
    let control_path = path.join(VirtualFile::control(name).file_name());
    let script_path = path.join(VirtualFile::install_script(name, version).file_name());
    debug!("Control file is {}", control_path.display());
    debug!("Script file is {}", script_path.display());

    let control_text = std::fs::read_to_string(&control_path)
        .with_context(|| format!("Failed to read control file {}", control_path.display()))?;
    let mut control = ExtensionControl::new(name);
    control
        .apply(&control_text, &control_path.display().to_string(), false)
        .with_context(|| format!("Invalid control file {}", control_path.display()))?;

    info!("Loading {} version {} from {}", name, version, path.display());
    let description = control.comment.clone().unwrap_or_else(|| name.to_string());
    cmd_install(ctx, name, version, &script_path, Some(&description), &control.requires)
}

pub fn cmd_install_version(ctx: &Context, name: &str, version: &str, script: &Path) -> Result<()> {
    let script = read_script(script)?;
    with_session(ctx, |session| {
        manage::install_extension_version_sql(session, name, version, &script)
    })?;
    println!("Installed version {} of extension {}", version, name);
    Ok(())
}

pub fn cmd_install_update_path(ctx: &Context, name: &str, from: &str, to: &str, script: &Path) -> Result<()> {
    let script = read_script(script)?;
    with_session(ctx, |session| {
        manage::install_update_path(session, name, from, to, &script)
    })?;
    println!("Installed update path {}--{} for extension {}", from, to, name);
    Ok(())
}

pub fn cmd_uninstall_update_path(ctx: &Context, name: &str, from: &str, to: &str, if_exists: bool) -> Result<()> {
    let removed = with_session(ctx, |session| {
        if if_exists {
            manage::uninstall_update_path_if_exists(session, name, from, to)
        } else {
            manage::uninstall_update_path(session, name, from, to).map(|_| true)
        }
    })?;
    if removed {
        println!("Removed update path {}--{} of extension {}", from, to, name);
    } else {
        println!("No update path {}--{} for extension {}", from, to, name);
    }
    Ok(())
}

pub fn cmd_uninstall(ctx: &Context, name: &str, version: Option<&str>, if_exists: bool) -> Result<()> {
    let removed = with_session(ctx, |session| {
        if if_exists {
            manage::uninstall_if_exists(session, name, version)
        } else {
            manage::uninstall(session, name, version).map(|_| true)
        }
    })?;
    match (removed, version) {
        (true, Some(version)) => println!("Uninstalled version {} of extension {}", version, name),
        (true, None) => println!("Uninstalled extension {}", name),
        (false, _) => println!("Extension {} is not installed", name),
    }
    Ok(())
}

pub fn cmd_set_default_version(ctx: &Context, name: &str, version: &str) -> Result<()> {
    with_session(ctx, |session| manage::set_default_version(session, name, version))?;
    println!("Default version of {} is now {}", name, version);
    Ok(())
}

pub fn cmd_available(ctx: &Context) -> Result<()> {
    let session = ctx.session()?;
    let rows = available::available_extensions(session.conn())?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No stored extensions.");
        println!("\nUse 'tlext install <name> <version> <script>' to add one.");
        return Ok(());
    }
    print_result(&available::extensions_result(&rows), false)
}

pub fn cmd_versions(ctx: &Context) -> Result<()> {
    let session = ctx.session()?;
    let rows = available::available_extension_versions(session.conn())?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    print_result(&available::versions_result(&rows), false)
}

pub fn cmd_update_paths(ctx: &Context, name: &str) -> Result<()> {
    let session = ctx.session()?;
    let rows = available::extension_update_paths(session.conn(), name)?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    print_result(&available::update_paths_result(&rows), false)
}
