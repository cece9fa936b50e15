// src/extension/create.rs

//! CREATE EXTENSION

use super::catalog::{self, CascadeContext};
use super::control::ExtensionControl;
use super::graph::VersionGraph;
use super::names::{VirtualFile, check_valid_extension_name, check_valid_version_name};
use super::script::{self, ScriptStep};
use super::source::ExtensionSource;
use super::update;
use crate::db::models::{Extension, Namespace};
use crate::error::{Error, Result};
use crate::executor;
use crate::session::Session;
use crate::settings::MessageLevel;
use crate::sql::{CreateExtension, QueryResult};
use tracing::{debug, info};

/// Entry point for a client `CREATE EXTENSION`
pub fn create_extension(session: &mut Session, source: &ExtensionSource, stmt: &CreateExtension) -> Result<QueryResult> {
    check_valid_extension_name(&stmt.name)?;

    if Extension::oid_of(session.conn(), &stmt.name)?.is_some() {
        if stmt.if_not_exists {
            session.notice(
                MessageLevel::Notice,
                format!("extension \"{}\" already exists, skipping", stmt.name),
                None,
            );
            return Ok(QueryResult::command("CREATE EXTENSION"));
        }
        return Err(Error::DuplicateObject(format!(
            "extension \"{}\" already exists",
            stmt.name
        )));
    }

    if session.creating_extension().is_some() {
        return Err(Error::Nested("nested CREATE EXTENSION is not supported".to_string()));
    }

    let ctx = CascadeContext {
        schema: stmt.schema.clone(),
        cascade: stmt.cascade,
        parents: Vec::new(),
        is_create: true,
    };
    create_extension_internal(session, source, &stmt.name, stmt.version.as_deref(), &ctx)?;
    Ok(QueryResult::command("CREATE EXTENSION"))
}

/// Version to start from and the update steps after it
fn find_versions_to_apply(
    session: &Session,
    source: &ExtensionSource,
    control: &ExtensionControl,
    version: &str,
) -> Result<(String, Vec<String>)> {
    let names = source.script_names(session.conn(), control)?;
    let mut graph = VersionGraph::build(&control.name, &names);
    let no_path = || {
        Error::NoPath(format!(
            "extension \"{}\" has no installation script nor update path for version \"{}\"",
            control.name, version
        ))
    };

    let target = graph.find(version).ok_or_else(no_path)?;
    let (start, path) = graph.find_install_path(target).ok_or_else(no_path)?;
    Ok((graph.node(start).name.clone(), path))
}

/// Schema the extension is created in, creating the control file's schema
/// when it does not exist yet
fn resolve_schema(
    session: &mut Session,
    control: &ExtensionControl,
    requested: Option<&str>,
    cascade: bool,
) -> Result<(i64, String)> {
    if let Some(name) = requested
        && Namespace::lookup_oid(session.conn(), name)?.is_none()
    {
        return Err(Error::undefined(format!("schema \"{}\" does not exist", name)));
    }

    if let Some(schema) = &control.schema {
        if let Some(name) = requested
            && name != schema
            && !cascade
        {
            return Err(Error::FeatureNotSupported(format!(
                "extension \"{}\" must be installed in schema \"{}\"",
                control.name, schema
            )));
        }
        if Namespace::lookup_oid(session.conn(), schema)?.is_none() {
            executor::create_schema(session, schema, false)?;
        }
        let oid = Namespace::lookup_oid(session.conn(), schema)?
            .ok_or_else(|| Error::Internal(format!("schema {} was not created", schema)))?;
        return Ok((oid, schema.clone()));
    }

    match requested {
        Some(name) => {
            let oid = Namespace::lookup_oid(session.conn(), name)?
                .ok_or_else(|| Error::undefined(format!("schema \"{}\" does not exist", name)))?;
            Ok((oid, name.to_string()))
        }
        None => session.creation_namespace(),
    }
}

/// Install `name`, recursing into required extensions under CASCADE.
/// Returns the new extension oid.
pub fn create_extension_internal(
    session: &mut Session,
    source: &ExtensionSource,
    name: &str,
    version: Option<&str>,
    ctx: &CascadeContext,
) -> Result<i64> {
    let pcontrol = source.read_control(session.conn(), name)?;

    let version = match version.or(pcontrol.default_version.as_deref()) {
        Some(v) => v.to_string(),
        None => {
            return Err(Error::InvalidParameter(
                "version to install must be specified".to_string(),
            ));
        }
    };
    check_valid_version_name(&version)?;

    let (install_version, updates) = find_versions_to_apply(session, source, &pcontrol, &version)?;
    debug!("Installing {} {} then {:?}", name, install_version, updates);

    let control = source.read_aux_control(session.conn(), &pcontrol, &install_version)?;
    let (schema_oid, schema) = resolve_schema(session, &control, ctx.schema.as_deref(), ctx.cascade)?;

    let owner = session.current_user().clone();
    let required = catalog::resolve_requires(session, &control, ctx)?;

    let mut ext = Extension::new(name.to_string(), owner.oid, schema_oid, install_version.clone());
    ext.relocatable = control.relocatable;
    ext.requires = required.oids.clone();
    let oid = ext.insert(session.conn())?;
    Extension::set_comment(session.conn(), oid, control.comment.as_deref())?;
    catalog::record_requires(session.conn(), oid, &required.oids)?;

    if source.is_stored() {
        catalog::pin_files(
            session.conn(),
            oid,
            &[
                VirtualFile::control(name),
                VirtualFile::aux_control(name, &install_version),
                VirtualFile::install_script(name, &install_version),
            ],
        )?;
    }

    script::execute_extension_script(
        session,
        &ScriptStep {
            source,
            control: &control,
            extension_oid: oid,
            from_version: None,
            version: &install_version,
            schema: &schema,
            required_schemas: &required.schemas,
        },
    )?;

    let update_ctx = CascadeContext {
        parents: Vec::new(),
        ..ctx.clone()
    };
    update::apply_extension_updates(session, source, oid, &pcontrol, &install_version, &updates, &update_ctx)?;
    catalog::pin_default_path(session.conn(), source, oid, &pcontrol)?;

    info!("Created extension {} version {} in schema {}", name, version, schema);
    Ok(oid)
}
