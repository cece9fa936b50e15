// src/extension/intercept.rs

//! Stored-extension interceptor
//!
//! First link of the chain. While the engine extension is installed it
//! claims CREATE EXTENSION and ALTER EXTENSION UPDATE for names that only
//! exist as virtual files, and guards the reserved schema against function
//! DDL that does not come from the engine itself.

use super::bootstrap::{self, TLE_EXTENSION};
use super::source::ExtensionSource;
use super::{create, update};
use crate::db::TLE_NAMESPACE;
use crate::error::{Error, Result};
use crate::executor::resolve_function;
use crate::interceptor::{Next, Origin, StatementHandler};
use crate::session::Session;
use crate::sql::{AlterFunctionAction, QueryResult, Statement};
use tracing::debug;

pub struct TleInterceptor;

impl StatementHandler for TleInterceptor {
    fn name(&self) -> &'static str {
        "tle"
    }

    fn handle(&self, session: &mut Session, stmt: Statement, origin: Origin, next: Next<'_>) -> Result<QueryResult> {
        if !bootstrap::engine_installed(session.conn())? {
            return next.run(session, stmt, origin);
        }

        match &stmt {
            Statement::CreateExtension(cmd) if claims(session, &cmd.name)? => {
                debug!("Creating stored extension {}", cmd.name);
                return create::create_extension(session, &ExtensionSource::Stored, cmd);
            }
            Statement::AlterExtensionUpdate(cmd) if claims(session, &cmd.name)? => {
                debug!("Updating stored extension {}", cmd.name);
                return update::alter_extension_update(session, &ExtensionSource::Stored, cmd);
            }
            Statement::CreateFunction(def) => {
                // Unqualified names land in the first existing search_path schema
                let schema = match &def.name.schema {
                    Some(schema) => schema.clone(),
                    None => session.creation_namespace()?.1,
                };
                if schema == TLE_NAMESPACE {
                    check_reserved(session, origin, "tle schema reserved for tle functions")?;
                }
            }
            Statement::AlterFunction(alter) => {
                if let AlterFunctionAction::SetSchema(target) = &alter.action
                    && target == TLE_NAMESPACE
                {
                    check_reserved(session, origin, "tle schema reserved for tle functions")?;
                }
                if in_reserved_schema(session, &alter.name, alter.arg_types.as_deref())? {
                    check_reserved(session, origin, "altering tle functions in tle schema not allowed")?;
                }
            }
            Statement::DropFunction(drop) => {
                if in_reserved_schema(session, &drop.name, drop.arg_types.as_deref())? {
                    check_reserved(session, origin, "altering tle functions in tle schema not allowed")?;
                }
            }
            _ => {}
        }
        next.run(session, stmt, origin)
    }
}

/// True when `name` resolves to a stored extension rather than a file
fn claims(session: &Session, name: &str) -> Result<bool> {
    let source = ExtensionSource::resolve(session.conn(), session.config(), name)?;
    Ok(source.is_stored())
}

fn in_reserved_schema(
    session: &Session,
    name: &crate::sql::QualifiedName,
    arg_types: Option<&[String]>,
) -> Result<bool> {
    Ok(resolve_function(session, name, arg_types)?.is_some_and(|(_, schema)| schema == TLE_NAMESPACE))
}

/// Function DDL in the reserved schema is allowed for the engine's own
/// virtual files and for the engine extension's install script
fn check_reserved(session: &Session, origin: Origin, message: &str) -> Result<()> {
    match origin {
        Origin::ArtifactMutation => Ok(()),
        Origin::ExtensionScript
            if session
                .creating_extension()
                .is_some_and(|e| e.name == TLE_EXTENSION) =>
        {
            if bootstrap::engine_control_file_exists(session.config()) {
                Ok(())
            } else {
                Err(Error::permission_denied(
                    format!("control file not found for the {} extension", TLE_EXTENSION),
                    None,
                ))
            }
        }
        _ => Err(Error::permission_denied(message, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Extension;
    use crate::extension::names::VirtualFile;
    use crate::extension::store;
    use crate::testutil;

    #[test]
    fn test_stored_extension_is_claimed() {
        let mut session = testutil::session();
        testutil::install(&mut session, "demo", "1.0", "CREATE TABLE demo_t(a int);", &[]);
        session.execute("CREATE EXTENSION demo").unwrap();

        let ext = Extension::find_by_name(session.conn(), "demo").unwrap().unwrap();
        assert_eq!(ext.version, "1.0");
        session.execute("INSERT INTO demo_t VALUES (1)").unwrap();
    }

    #[test]
    fn test_unknown_extension_reports_file_error() {
        let mut session = testutil::session();
        let err = session.execute("CREATE EXTENSION nowhere").unwrap_err();
        assert_eq!(err.to_string(), "extension \"nowhere\" is not available");
        assert!(err.hint().unwrap().contains("on the system"));
    }

    #[test]
    fn test_reserved_schema_guard() {
        let mut session = testutil::session();
        let err = session
            .execute("CREATE FUNCTION tle.sneaky() RETURNS text LANGUAGE sql AS $$SELECT 'x'$$")
            .unwrap_err();
        assert_eq!(err.to_string(), "tle schema reserved for tle functions");

        session.execute("SET search_path = tle, main").unwrap();
        let err = session
            .execute("CREATE FUNCTION sneaky() RETURNS text LANGUAGE sql AS $$SELECT 'x'$$")
            .unwrap_err();
        assert_eq!(err.to_string(), "tle schema reserved for tle functions");
        session.execute("RESET search_path").unwrap();

        session
            .execute("CREATE FUNCTION mine() RETURNS text LANGUAGE sql AS $$SELECT 'x'$$")
            .unwrap();
        let err = session.execute("ALTER FUNCTION mine() SET SCHEMA tle").unwrap_err();
        assert_eq!(err.to_string(), "tle schema reserved for tle functions");

        testutil::install(&mut session, "demo", "1.0", "SELECT 1;", &[]);
        let err = session.execute("DROP FUNCTION tle.\"demo--1.0.sql\"()").unwrap_err();
        assert_eq!(err.to_string(), "altering tle functions in tle schema not allowed");
        let err = session
            .execute("ALTER FUNCTION tle.\"demo.control\"() RENAME TO other")
            .unwrap_err();
        assert_eq!(err.to_string(), "altering tle functions in tle schema not allowed");
    }

    #[test]
    fn test_missing_search_path_schema_is_skipped() {
        let mut session = testutil::session();
        session.execute("SET search_path = nosuch, tle").unwrap();
        let err = session
            .execute("CREATE FUNCTION \"forged.control\"() RETURNS text LANGUAGE sql AS $$SELECT 'x'$$")
            .unwrap_err();
        assert_eq!(err.to_string(), "tle schema reserved for tle functions");
        assert!(!store::exists(session.conn(), &VirtualFile::control("forged")).unwrap());

        // Nothing to create in at all
        session.execute("SET search_path = nosuch").unwrap();
        let err = session
            .execute("CREATE FUNCTION lost() RETURNS text LANGUAGE sql AS $$SELECT 'x'$$")
            .unwrap_err();
        assert_eq!(err.to_string(), "no schema has been selected to create in");
    }

    #[test]
    fn test_guard_inactive_without_engine() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = testutil::session_with_extension_dir(dir.path().to_path_buf());
        session
            .execute("CREATE FUNCTION tle.free() RETURNS text LANGUAGE sql AS $$SELECT 'x'$$")
            .unwrap();
    }
}
