// src/extension/store.rs

//! Virtual file store
//!
//! Each virtual file is a zero-argument `sql` function in the reserved schema
//! whose body returns the file text. Reads go straight to the catalog;
//! writes go through the statement pipeline as artifact mutations so the
//! reserved-schema guard sees them.

use super::names::VirtualFile;
use crate::db::models::{Function, Namespace, Role};
use crate::db::{TLE_ADMIN_ROLE, TLE_NAMESPACE};
use crate::error::{Error, Result};
use crate::interceptor::Origin;
use crate::session::Session;
use crate::sql::{Value, parse_statement, quote_identifier, quote_literal};
use rusqlite::Connection;
use tracing::debug;

/// Dollar-quote delimiter wrapping virtual file bodies
pub const BODY_DELIMITER: &str = "$_tle_o_$";

pub fn tle_namespace_oid(conn: &Connection) -> Result<i64> {
    Namespace::lookup_oid(conn, TLE_NAMESPACE)?
        .ok_or_else(|| Error::Internal(format!("schema \"{}\" is missing", TLE_NAMESPACE)))
}

/// The function backing a virtual file, if it exists
pub fn find(conn: &Connection, file: &VirtualFile) -> Result<Option<Function>> {
    let ns = tle_namespace_oid(conn)?;
    Function::find(conn, ns, &file.file_name(), &[])
}

pub fn exists(conn: &Connection, file: &VirtualFile) -> Result<bool> {
    Ok(find(conn, file)?.is_some())
}

/// File text; `None` when the file is missing or returns nothing
pub fn read(conn: &Connection, file: &VirtualFile) -> Result<Option<String>> {
    let Some(func) = find(conn, file)? else {
        return Ok(None);
    };
    match func.call_sql(conn, &[])? {
        Value::Null => Ok(None),
        other => Ok(Some(other.render())),
    }
}

/// Names of every function in the reserved schema
pub fn list_names(conn: &Connection) -> Result<Vec<String>> {
    let ns = tle_namespace_oid(conn)?;
    Function::names_in_namespace(conn, ns)
}

/// Text that cannot be stored because it would end the function body early
pub fn check_content(text: &str) -> Result<()> {
    if text.contains(BODY_DELIMITER) {
        return Err(Error::InvalidParameter(
            "invalid character in extension definition".to_string(),
        ));
    }
    Ok(())
}

/// `CREATE [OR REPLACE] FUNCTION` statement text for a virtual file
pub fn create_statement(file: &VirtualFile, content: &str, replace: bool) -> String {
    format!(
        "CREATE {}FUNCTION {}.{}() RETURNS text LANGUAGE sql AS {d}SELECT {}{d}",
        if replace { "OR REPLACE " } else { "" },
        quote_identifier(TLE_NAMESPACE),
        quote_identifier(&file.file_name()),
        quote_literal(content),
        d = BODY_DELIMITER,
    )
}

/// Create or replace a virtual file; returns the function oid.
/// Without `replace`, an existing file fails with `DuplicateObject`.
pub fn create(session: &mut Session, file: &VirtualFile, content: &str, replace: bool) -> Result<i64> {
    check_content(content)?;
    let stmt = parse_statement(&create_statement(file, content, replace))?;
    session.dispatch(stmt, Origin::ArtifactMutation)?;

    let func = find(session.conn(), file)?
        .ok_or_else(|| Error::Internal(format!("virtual file {} was not created", file)))?;
    let oid = func
        .oid
        .ok_or_else(|| Error::Internal(format!("function {} has no oid", func.name)))?;

    let admin = Role::find_by_name(session.conn(), TLE_ADMIN_ROLE)?
        .and_then(|r| r.oid)
        .ok_or_else(|| Error::Internal(format!("role \"{}\" is missing", TLE_ADMIN_ROLE)))?;
    Function::set_owner(session.conn(), oid, admin)?;

    debug!("Stored virtual file {}", file);
    Ok(oid)
}

/// Drop a virtual file; returns false when it did not exist
pub fn drop(session: &mut Session, file: &VirtualFile) -> Result<bool> {
    if !exists(session.conn(), file)? {
        return Ok(false);
    }
    let sql = format!(
        "DROP FUNCTION {}.{}()",
        quote_identifier(TLE_NAMESPACE),
        quote_identifier(&file.file_name())
    );
    session.dispatch(parse_statement(&sql)?, Origin::ArtifactMutation)?;
    debug!("Dropped virtual file {}", file);
    Ok(true)
}
