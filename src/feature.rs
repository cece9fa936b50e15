// src/feature.rs

//! Feature registry
//!
//! Maps functions to the hook points (`passcheck`, `clientauth`) that call
//! them. The hook runners live outside this crate; here we keep the table,
//! validate what goes into it, and refuse DDL that would change a
//! registered function underneath a hook.

use crate::db::models::{Feature, FeatureEntry, Function};
use crate::error::{Error, Result};
use crate::executor::resolve_function;
use crate::session::Session;
use crate::sql::{QualifiedName, quote_identifier};
use rusqlite::Connection;
use std::str::FromStr;
use tracing::info;

fn parse_feature(name: &str) -> Result<Feature> {
    Feature::from_str(name)
        .map_err(|_| Error::InvalidParameter(format!("invalid input value for feature: \"{}\"", name)))
}

/// Split `schema.name` or `name`, with an optional trailing `(args)`
fn parse_proc(proc: &str) -> Result<(QualifiedName, Option<Vec<String>>)> {
    let (name, args) = match proc.split_once('(') {
        Some((name, rest)) => {
            let inner = rest.strip_suffix(')').ok_or_else(|| {
                Error::syntax(format!("invalid function reference \"{}\"", proc))
            })?;
            (name.trim(), Some(crate::sql::parse_type_list(inner)?))
        }
        None => (proc.trim(), None),
    };
    let qualified = match name.split_once('.') {
        Some((schema, name)) => QualifiedName::new(Some(schema.trim()), name.trim()),
        None => QualifiedName::new(None, name),
    };
    Ok((qualified, args))
}

/// Function and schema named by a `proc` argument
fn lookup(session: &Session, proc: &str) -> Result<(Function, String)> {
    let (name, args) = parse_proc(proc)?;
    resolve_function(session, &name, args.as_deref())?
        .ok_or_else(|| Error::undefined(format!("function {} does not exist", proc)))
}

fn check_name(feature: &str, name: &str) -> Result<()> {
    if name.contains(';') {
        return Err(Error::PermissionDenied {
            message: format!(
                "\"{}\" feature does not support calling out to functions/schemas that contain \";\"",
                feature
            ),
            hint: Some("Check the \"tle.feature_info\" table does not contain ';'.".to_string()),
        });
    }
    Ok(())
}

/// Register `proc` for `feature`. Fails when already registered.
pub fn register_feature(session: &mut Session, proc: &str, feature: &str) -> Result<()> {
    if !register_feature_if_not_exists(session, proc, feature)? {
        return Err(Error::DuplicateObject(format!(
            "function \"{}\" is already registered for the \"{}\" feature",
            proc, feature
        )));
    }
    Ok(())
}

/// Register `proc` for `feature`; returns false when it already was
pub fn register_feature_if_not_exists(session: &mut Session, proc: &str, feature: &str) -> Result<bool> {
    let kind = parse_feature(feature)?;
    let (func, schema) = lookup(session, proc)?;
    check_name(feature, &schema)?;
    check_name(feature, &func.name)?;

    if FeatureEntry::find(session.conn(), kind, &schema, &func.name)?.is_some() {
        return Ok(false);
    }
    let identity = format!("{}.{}", quote_identifier(&schema), func.signature());
    FeatureEntry::new(kind, schema, func.name.clone(), identity).insert(session.conn())?;
    info!("Registered {} for {}", func.name, feature);
    Ok(true)
}

pub fn unregister_feature(session: &mut Session, proc: &str, feature: &str) -> Result<()> {
    if !unregister_feature_if_exists(session, proc, feature)? {
        return Err(Error::undefined(format!(
            "function \"{}\" is not registered for the \"{}\" feature",
            proc, feature
        )));
    }
    Ok(())
}

/// Remove a registration; returns false when there was none
pub fn unregister_feature_if_exists(session: &mut Session, proc: &str, feature: &str) -> Result<bool> {
    let kind = parse_feature(feature)?;
    let (name, _) = parse_proc(proc)?;
    let schema = match &name.schema {
        Some(schema) => schema.clone(),
        None => match resolve_function(session, &name, None)? {
            Some((_, schema)) => schema,
            None => return Ok(false),
        },
    };
    let removed = FeatureEntry::delete(session.conn(), kind, &schema, &name.name)?;
    if removed {
        info!("Unregistered {} from {}", name, feature);
    }
    Ok(removed)
}

/// Qualified names of the functions registered for `feature`, ready to be
/// called by a hook runner
pub fn feature_proc(conn: &Connection, feature: Feature) -> Result<Vec<String>> {
    let mut procs = Vec::new();
    for entry in FeatureEntry::list_for_feature(conn, feature)? {
        if entry.schema_name.is_empty() || entry.proname.is_empty() {
            return Err(Error::InvalidParameter(
                "table, schema, and proname must be present in \"tle.feature_info\"".to_string(),
            ));
        }
        check_name(feature.as_str(), &entry.schema_name)?;
        check_name(feature.as_str(), &entry.proname)?;
        procs.push(format!(
            "{}.{}",
            quote_identifier(&entry.schema_name),
            quote_identifier(&entry.proname)
        ));
    }
    Ok(procs)
}

/// Refuse to change a function a hook depends on
pub fn check_alterable(conn: &Connection, func: &Function, schema: &str) -> Result<()> {
    if let Some(feature) = FeatureEntry::features_for_function(conn, schema, &func.name)?
        .into_iter()
        .next()
    {
        return Err(Error::FeatureNotSupported(format!(
            "ALTER of function {} registered for the \"{}\" feature is not allowed",
            func.name, feature
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_check() -> Session {
        let mut session = Session::open_in_memory().unwrap();
        session
            .execute("CREATE FUNCTION pw_check(text) RETURNS boolean LANGUAGE sql AS $$SELECT length($1) > 8$$")
            .unwrap();
        session
    }

    #[test]
    fn test_register_and_lookup() {
        let mut session = session_with_check();
        register_feature(&mut session, "main.pw_check", "passcheck").unwrap();
        assert_eq!(
            feature_proc(session.conn(), Feature::Passcheck).unwrap(),
            vec!["main.pw_check".to_string()]
        );
        assert!(feature_proc(session.conn(), Feature::Clientauth).unwrap().is_empty());

        assert!(!register_feature_if_not_exists(&mut session, "pw_check", "passcheck").unwrap());
        let err = register_feature(&mut session, "pw_check(text)", "passcheck").unwrap_err();
        assert!(matches!(err, Error::DuplicateObject(_)));
    }

    #[test]
    fn test_registered_function_cannot_change() {
        let mut session = session_with_check();
        register_feature(&mut session, "pw_check", "passcheck").unwrap();
        let err = session
            .execute("ALTER FUNCTION pw_check(text) RENAME TO other")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "ALTER of function pw_check registered for the \"passcheck\" feature is not allowed"
        );

        unregister_feature(&mut session, "pw_check", "passcheck").unwrap();
        session.execute("ALTER FUNCTION pw_check(text) RENAME TO other").unwrap();
        assert!(!unregister_feature_if_exists(&mut session, "pw_check", "passcheck").unwrap());
    }

    #[test]
    fn test_bad_inputs() {
        let mut session = session_with_check();
        let err = register_feature(&mut session, "pw_check", "telepathy").unwrap_err();
        assert_eq!(err.to_string(), "invalid input value for feature: \"telepathy\"");
        let err = register_feature(&mut session, "missing", "passcheck").unwrap_err();
        assert_eq!(err.to_string(), "function missing does not exist");
    }

    #[test]
    fn test_semicolon_in_registry() {
        let session = session_with_check();
        FeatureEntry::new(
            Feature::Clientauth,
            "main".to_string(),
            "evil;drop".to_string(),
            "main.evil".to_string(),
        )
        .insert(session.conn())
        .unwrap();
        let err = feature_proc(session.conn(), Feature::Clientauth).unwrap_err();
        assert_eq!(
            err.to_string(),
            "\"clientauth\" feature does not support calling out to functions/schemas that contain \";\""
        );
    }
}
