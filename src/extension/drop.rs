// src/extension/drop.rs

//! DROP EXTENSION
//!
//! Drops member objects, dependency edges and the catalog row. Virtual files
//! are left alone; only the edges pinning them to the instance go away.

use crate::db::models::{Dependency, DependencyType, Extension, ExtensionMember, Function, ObjectClass};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::settings::MessageLevel;
use crate::sql::{DropExtension, QueryResult, quote_identifier};
use tracing::info;

/// Member relation kinds, in the order they are dropped
const DROP_ORDER: &[&str] = &["trigger", "index", "view", "table"];

pub fn drop_extensions(session: &mut Session, stmt: &DropExtension) -> Result<QueryResult> {
    for name in &stmt.names {
        match Extension::find_by_name(session.conn(), name)? {
            Some(ext) => drop_extension(session, &ext, stmt.cascade)?,
            None if stmt.if_exists => {
                session.notice(
                    MessageLevel::Notice,
                    format!("extension \"{}\" does not exist, skipping", name),
                    None,
                );
            }
            None => return Err(Error::undefined(format!("extension \"{}\" does not exist", name))),
        }
    }
    Ok(QueryResult::command("DROP EXTENSION"))
}

fn drop_extension(session: &mut Session, ext: &Extension, cascade: bool) -> Result<()> {
    let oid = ext
        .oid
        .ok_or_else(|| Error::Internal(format!("extension {} has no oid", ext.name)))?;

    if session.creating_extension().is_some_and(|e| e.oid == oid) {
        return Err(Error::ObjectInUse(format!(
            "cannot drop extension \"{}\" because it is being modified",
            ext.name
        )));
    }
    if !session.has_privs_of(ext.owner_oid)? {
        return Err(Error::permission_denied(
            format!("must be owner of extension {}", ext.name),
            None,
        ));
    }

    let referencing = Dependency::find_referencing(session.conn(), ObjectClass::Extension, oid)?;

    // Virtual files depending on the engine extension are never dropped here
    if referencing
        .iter()
        .any(|d| d.classid == ObjectClass::Function && d.deptype == DependencyType::Normal)
    {
        return Err(Error::DependentObjects {
            message: format!(
                "cannot drop extension {} because other objects depend on it",
                ext.name
            ),
            hint: Some("Uninstall the stored extensions first.".to_string()),
        });
    }

    let dependents: Vec<i64> = referencing
        .iter()
        .filter(|d| d.classid == ObjectClass::Extension)
        .map(|d| d.objid)
        .collect();
    if !dependents.is_empty() {
        if !cascade {
            let first = Extension::get(session.conn(), dependents[0])?;
            return Err(Error::DependentObjects {
                message: format!(
                    "cannot drop extension {} because other objects depend on it",
                    ext.name
                ),
                hint: Some(format!(
                    "extension {} depends on extension {}. Use DROP ... CASCADE to drop the dependent objects too.",
                    first.name, ext.name
                )),
            });
        }
        for dependent in dependents {
            let Some(dep) = Extension::find_by_oid(session.conn(), dependent)? else {
                continue;
            };
            session.notice(
                MessageLevel::Notice,
                format!("drop cascades to extension {}", dep.name),
                None,
            );
            drop_extension(session, &dep, true)?;
        }
    }

    let mut members = ExtensionMember::list_for_extension(session.conn(), oid)?;
    members.sort_by_key(|m| DROP_ORDER.iter().position(|k| *k == m.object_type));
    for member in &members {
        session.conn().execute_batch(&format!(
            "DROP {} IF EXISTS {}",
            member.object_type.to_uppercase(),
            quote_identifier(&member.object_name)
        ))?;
    }

    for edge in &referencing {
        if edge.classid == ObjectClass::Function && edge.deptype == DependencyType::Extension {
            Function::delete(session.conn(), edge.objid)?;
            Dependency::delete_for_object(session.conn(), ObjectClass::Function, edge.objid, None)?;
        }
    }

    Dependency::delete_for_object(session.conn(), ObjectClass::Extension, oid, None)?;
    Dependency::delete_referencing(session.conn(), ObjectClass::Extension, oid)?;
    ExtensionMember::delete_for_extension(session.conn(), oid)?;
    Extension::delete(session.conn(), oid)?;
    info!("Dropped extension {}", ext.name);
    Ok(())
}
