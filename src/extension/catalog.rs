// src/extension/catalog.rs

//! Catalog writes shared by create, update and the management functions:
//! required-extension resolution, dependency edges, and the edges that pin
//! stored virtual files to the extension instances built from them.

use super::control::ExtensionControl;
use super::create;
use super::graph::VersionGraph;
use super::names::VirtualFile;
use super::source::ExtensionSource;
use super::store;
use crate::db::models::{Dependency, DependencyType, Extension, Namespace, ObjectClass};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::settings::MessageLevel;
use rusqlite::Connection;
use tracing::debug;

/// Options carried from the outer CREATE EXTENSION into required
/// extensions it installs
#[derive(Debug, Clone, Default)]
pub struct CascadeContext {
    /// Schema named in the outer command
    pub schema: Option<String>,
    pub cascade: bool,
    /// Extensions already being installed further up the chain
    pub parents: Vec<String>,
    /// True under CREATE EXTENSION, false under ALTER EXTENSION
    pub is_create: bool,
}

/// Required extensions resolved to oids, with the schema each lives in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredExtensions {
    pub oids: Vec<i64>,
    pub schemas: Vec<String>,
}

/// Oid of a required extension, installing it first under CASCADE
pub fn get_required_extension(
    session: &mut Session,
    required: &str,
    extension: &str,
    ctx: &CascadeContext,
) -> Result<i64> {
    if let Some(oid) = Extension::oid_of(session.conn(), required)? {
        return Ok(oid);
    }

    if !ctx.cascade {
        return Err(Error::UndefinedObject {
            message: format!("required extension \"{}\" is not installed", required),
            hint: ctx
                .is_create
                .then(|| "Use CREATE EXTENSION ... CASCADE to install required extensions too.".to_string()),
        });
    }

    if ctx.parents.iter().any(|p| p == required) {
        return Err(Error::CyclicDependency {
            extension: extension.to_string(),
            required: required.to_string(),
        });
    }

    session.notice(
        MessageLevel::Notice,
        format!("installing required extension \"{}\"", required),
        None,
    );

    let mut chain = ctx.parents.clone();
    chain.push(extension.to_string());
    let nested = CascadeContext {
        schema: ctx.schema.clone(),
        cascade: ctx.cascade,
        parents: chain,
        is_create: ctx.is_create,
    };
    let source = ExtensionSource::resolve(session.conn(), session.config(), required)?;
    create::create_extension_internal(session, &source, required, None, &nested)
}

/// Resolve every entry of `requires` in order
pub fn resolve_requires(
    session: &mut Session,
    control: &ExtensionControl,
    ctx: &CascadeContext,
) -> Result<RequiredExtensions> {
    let mut required = RequiredExtensions::default();
    for name in &control.requires {
        let oid = get_required_extension(session, name, &control.name, ctx)?;
        let ext = Extension::get(session.conn(), oid)?;
        required.oids.push(oid);
        required.schemas.push(Namespace::name_of(session.conn(), ext.namespace_oid)?);
    }
    Ok(required)
}

/// Record extension -> required extension edges
pub fn record_requires(conn: &Connection, extension_oid: i64, required: &[i64]) -> Result<()> {
    for oid in required {
        Dependency::new(
            ObjectClass::Extension,
            extension_oid,
            ObjectClass::Extension,
            *oid,
            DependencyType::Normal,
        )
        .insert(conn)?;
    }
    Ok(())
}

/// Replace the required-extension edges with a new set
pub fn replace_requires(conn: &Connection, extension_oid: i64, required: &[i64]) -> Result<()> {
    Dependency::delete_for_object(conn, ObjectClass::Extension, extension_oid, Some(ObjectClass::Extension))?;
    record_requires(conn, extension_oid, required)
}

/// Pin stored virtual files to an extension instance. Missing files are
/// skipped.
pub fn pin_files(conn: &Connection, extension_oid: i64, files: &[VirtualFile]) -> Result<()> {
    for file in files {
        let Some(func) = store::find(conn, file)? else {
            continue;
        };
        let oid = func
            .oid
            .ok_or_else(|| Error::Internal(format!("function {} has no oid", func.name)))?;
        Dependency::new(
            ObjectClass::Extension,
            extension_oid,
            ObjectClass::Function,
            oid,
            DependencyType::Normal,
        )
        .insert(conn)?;
        debug!("Pinned {} to extension {}", file, extension_oid);
    }
    Ok(())
}

/// Control file, the script files on the install path to the default
/// version, and their auxiliary control files
pub fn default_path_files(conn: &Connection, source: &ExtensionSource, control: &ExtensionControl) -> Result<Vec<VirtualFile>> {
    let mut files = vec![VirtualFile::control(&control.name)];
    let Some(default_version) = &control.default_version else {
        return Ok(files);
    };

    let names = source.script_names(conn, control)?;
    let mut graph = VersionGraph::build(&control.name, &names);
    let Some(target) = graph.find(default_version) else {
        return Ok(files);
    };
    let Some((start, path)) = graph.find_install_path(target) else {
        return Ok(files);
    };

    let mut from = graph.node(start).name.clone();
    files.push(VirtualFile::install_script(&control.name, &from));
    files.push(VirtualFile::aux_control(&control.name, &from));
    for version in path {
        files.push(VirtualFile::update_script(&control.name, &from, &version));
        files.push(VirtualFile::aux_control(&control.name, &version));
        from = version;
    }
    Ok(files)
}

/// Pin the default-version path of a stored extension; a no-op for files
pub fn pin_default_path(conn: &Connection, source: &ExtensionSource, extension_oid: i64, control: &ExtensionControl) -> Result<()> {
    if !source.is_stored() {
        return Ok(());
    }
    let files = default_path_files(conn, source, control)?;
    pin_files(conn, extension_oid, &files)
}
