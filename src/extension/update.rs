// src/extension/update.rs

//! ALTER EXTENSION ... UPDATE and the update chain shared with CREATE

use super::catalog::{self, CascadeContext};
use super::control::ExtensionControl;
use super::graph::identify_update_path;
use super::names::{VirtualFile, check_valid_version_name};
use super::script::{self, ScriptStep};
use super::source::ExtensionSource;
use crate::db::models::{Extension, Namespace};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::settings::MessageLevel;
use crate::sql::{AlterExtensionUpdate, QueryResult};
use tracing::info;

/// Entry point for a client `ALTER EXTENSION name UPDATE [TO version]`
pub fn alter_extension_update(
    session: &mut Session,
    source: &ExtensionSource,
    stmt: &AlterExtensionUpdate,
) -> Result<QueryResult> {
    if session.creating_extension().is_some() {
        return Err(Error::Nested("nested ALTER EXTENSION is not supported".to_string()));
    }

    let ext = Extension::find_by_name(session.conn(), &stmt.name)?
        .ok_or_else(|| Error::undefined(format!("extension \"{}\" does not exist", stmt.name)))?;
    let oid = ext
        .oid
        .ok_or_else(|| Error::Internal(format!("extension {} has no oid", ext.name)))?;

    if !session.has_privs_of(ext.owner_oid)? {
        return Err(Error::permission_denied(
            format!("must be owner of extension {}", ext.name),
            None,
        ));
    }

    let pcontrol = source.read_control(session.conn(), &stmt.name)?;
    let version = match stmt.version.as_deref().or(pcontrol.default_version.as_deref()) {
        Some(v) => v.to_string(),
        None => {
            return Err(Error::InvalidParameter(
                "version to install must be specified".to_string(),
            ));
        }
    };
    check_valid_version_name(&version)?;

    if ext.version == version {
        session.notice(
            MessageLevel::Notice,
            format!(
                "version \"{}\" of extension \"{}\" is already installed",
                version, ext.name
            ),
            None,
        );
        return Ok(QueryResult::command("ALTER EXTENSION"));
    }

    let names = source.script_names(session.conn(), &pcontrol)?;
    let path = identify_update_path(&ext.name, &names, &ext.version, &version)?;

    apply_extension_updates(session, source, oid, &pcontrol, &ext.version, &path, &CascadeContext::default())?;
    catalog::pin_default_path(session.conn(), source, oid, &pcontrol)?;
    Ok(QueryResult::command("ALTER EXTENSION"))
}

/// Run each update step in order. Every step rewrites the catalog row and
/// replaces the required-extension edges before running its script.
pub fn apply_extension_updates(
    session: &mut Session,
    source: &ExtensionSource,
    extension_oid: i64,
    pcontrol: &ExtensionControl,
    initial_version: &str,
    updates: &[String],
    ctx: &CascadeContext,
) -> Result<()> {
    let mut old_version = initial_version.to_string();

    for version in updates {
        let control = source.read_aux_control(session.conn(), pcontrol, version)?;
        let ext = Extension::get(session.conn(), extension_oid)?;
        let schema = Namespace::name_of(session.conn(), ext.namespace_oid)?;

        let required = catalog::resolve_requires(session, &control, ctx)?;
        Extension::update_version(session.conn(), extension_oid, version, control.relocatable, &required.oids)?;
        catalog::replace_requires(session.conn(), extension_oid, &required.oids)?;

        if source.is_stored() {
            catalog::pin_files(
                session.conn(),
                extension_oid,
                &[
                    VirtualFile::update_script(&pcontrol.name, &old_version, version),
                    VirtualFile::aux_control(&pcontrol.name, version),
                ],
            )?;
        }

        script::execute_extension_script(
            session,
            &ScriptStep {
                source,
                control: &control,
                extension_oid,
                from_version: Some(&old_version),
                version,
                schema: &schema,
                required_schemas: &required.schemas,
            },
        )?;

        info!("Updated extension {} from {} to {}", pcontrol.name, old_version, version);
        old_version = version.clone();
    }
    Ok(())
}
