// src/executor.rs

//! Standard statement execution
//!
//! The last link of the interceptor chain. Schema and function DDL update
//! the catalog tables; function calls run stored bodies or built-ins;
//! everything else goes to SQLite with logical schema qualifiers removed.
//! While an extension script runs, relations it creates are recorded as
//! members of that extension.

use crate::db::models::{Dependency, DependencyType, ExtensionMember, Function, Namespace, ObjectClass, Role};
use crate::db::schema::CATALOG_TABLES;
use crate::db::DEFAULT_NAMESPACE;
use crate::error::{Error, Result};
use crate::extension::manage;
use crate::feature;
use crate::interceptor::{Next, Origin, StatementHandler};
use crate::session::Session;
use crate::settings::MessageLevel;
use crate::sql::lexer::{Token, TokenExt, tokenize};
use crate::sql::{
    AlterFunction, AlterFunctionAction, Call, CreateFunction, DropFunction, QualifiedName, QueryResult, Statement,
    Value, strip_schema_qualifiers,
};
use std::collections::HashSet;
use tracing::{debug, info};

/// Relation kinds tracked as extension members
const MEMBER_TYPES: &[&str] = &["table", "view", "index", "trigger"];

pub struct StandardExecutor;

impl StatementHandler for StandardExecutor {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn handle(&self, session: &mut Session, stmt: Statement, origin: Origin, _next: Next<'_>) -> Result<QueryResult> {
        debug!("Executing {} ({})", stmt.tag(), origin);
        match stmt {
            Statement::CreateSchema { name, if_not_exists } => create_schema(session, &name, if_not_exists),
            Statement::CreateFunction(def) => create_function(session, def),
            Statement::AlterFunction(alter) => alter_function(session, alter),
            Statement::DropFunction(drop) => drop_function(session, drop),
            Statement::Call(call) => call_function(session, call),
            Statement::Set { name, value } => {
                if name == "role" {
                    session.set_role(value.as_deref())?;
                } else {
                    session.settings_mut().set(&name, value.as_deref())?;
                }
                Ok(QueryResult::command("SET"))
            }
            Statement::Show(name) => {
                let value = if name == "role" {
                    session.current_user().name.clone()
                } else {
                    session.settings().show(&name)?
                };
                Ok(QueryResult::scalar(&name, Value::Text(value)))
            }
            Statement::Other(sql) => execute_sql(session, &sql),
            Statement::Transaction(_) => Err(Error::InvalidTransactionState(
                "transaction control must be issued by the client".to_string(),
            )),
            other => Err(Error::Internal(format!("no handler accepted {} statement", other.tag()))),
        }
    }
}

pub(crate) fn create_schema(session: &mut Session, name: &str, if_not_exists: bool) -> Result<QueryResult> {
    let role = session.current_role()?;
    if !role.superuser && !role.can_create {
        return Err(Error::permission_denied("permission denied to create schema", None));
    }

    if Namespace::lookup_oid(session.conn(), name)?.is_some() {
        if if_not_exists {
            session.notice(
                MessageLevel::Notice,
                format!("schema \"{}\" already exists, skipping", name),
                None,
            );
            return Ok(QueryResult::command("CREATE SCHEMA"));
        }
        return Err(Error::DuplicateObject(format!("schema \"{}\" already exists", name)));
    }

    let owner = session.current_user().oid;
    Namespace::new(name.to_string(), owner).insert(session.conn())?;
    info!("Created schema {}", name);
    Ok(QueryResult::command("CREATE SCHEMA"))
}

/// Namespace a new object lands in: the named one, or the first existing
/// `search_path` entry
fn target_namespace(session: &Session, schema: Option<&str>) -> Result<Namespace> {
    let name = match schema {
        Some(name) => name.to_string(),
        None => session.creation_namespace()?.1,
    };
    Namespace::find_by_name(session.conn(), &name)?
        .ok_or_else(|| Error::undefined(format!("schema \"{}\" does not exist", name)))
}

fn check_create_in(session: &Session, ns: &Namespace) -> Result<()> {
    if session.has_privs_of(ns.owner_oid)? {
        return Ok(());
    }
    if ns.name == DEFAULT_NAMESPACE && session.current_role()?.can_create {
        return Ok(());
    }
    Err(Error::permission_denied(
        format!("permission denied for schema {}", ns.name),
        None,
    ))
}

fn check_owner(session: &Session, func: &Function) -> Result<()> {
    if session.has_privs_of(func.owner_oid)? {
        Ok(())
    } else {
        Err(Error::permission_denied(
            format!("must be owner of function {}", func.name),
            None,
        ))
    }
}

fn function_oid(func: &Function) -> Result<i64> {
    func.oid
        .ok_or_else(|| Error::Internal(format!("function {} has no oid", func.name)))
}

fn create_function(session: &mut Session, def: CreateFunction) -> Result<QueryResult> {
    let ns = target_namespace(session, def.name.schema.as_deref())?;
    let ns_oid = ns
        .oid
        .ok_or_else(|| Error::Internal(format!("schema {} has no oid", ns.name)))?;
    check_create_in(session, &ns)?;

    match def.language.as_str() {
        "sql" => {
            check_catalog_access(session, &def.body)?;
            if session.settings().check_function_bodies() {
                session.conn().prepare(&def.body)?;
            }
        }
        "internal" => {
            if !session.is_superuser()? {
                return Err(Error::permission_denied("permission denied for language internal", None));
            }
            if !manage::is_builtin(def.body.trim()) {
                return Err(Error::undefined(format!(
                    "there is no built-in function named \"{}\"",
                    def.body.trim()
                )));
            }
        }
        other => return Err(Error::undefined(format!("language \"{}\" does not exist", other))),
    }

    let body = if def.language == "internal" {
        def.body.trim().to_string()
    } else {
        def.body
    };

    if let Some(mut existing) = Function::find(session.conn(), ns_oid, &def.name.name, &def.arg_types)? {
        if !def.replace {
            return Err(Error::DuplicateObject(format!(
                "function {} already exists with same argument types",
                existing.signature()
            )));
        }
        check_owner(session, &existing)?;
        feature::check_alterable(session.conn(), &existing, &ns.name)?;
        if existing.return_type != def.returns {
            return Err(Error::InvalidParameter(
                "cannot change return type of existing function".to_string(),
            ));
        }
        existing.language = def.language;
        existing.body = body;
        existing.update_definition(session.conn())?;
        debug!("Replaced function {}.{}", ns.name, existing.signature());
        return Ok(QueryResult::command("CREATE FUNCTION"));
    }

    let mut func = Function::new(ns_oid, def.name.name.clone(), session.current_user().oid);
    func.arg_types = def.arg_types;
    func.return_type = def.returns;
    func.language = def.language;
    func.body = body;
    let oid = func.insert(session.conn())?;

    if let Some(ext) = session.creating_extension() {
        Dependency::new(
            ObjectClass::Function,
            oid,
            ObjectClass::Extension,
            ext.oid,
            DependencyType::Extension,
        )
        .insert(session.conn())?;
    }
    debug!("Created function {}.{}", ns.name, func.signature());
    Ok(QueryResult::command("CREATE FUNCTION"))
}

/// Schemas to search for an unqualified or qualified function name
fn lookup_namespaces(session: &Session, name: &QualifiedName) -> Result<Vec<(i64, String)>> {
    let candidates: Vec<String> = match &name.schema {
        Some(schema) => vec![schema.clone()],
        None => session.settings().search_path().to_vec(),
    };
    let mut found = Vec::new();
    for schema in candidates {
        match Namespace::lookup_oid(session.conn(), &schema)? {
            Some(oid) => found.push((oid, schema)),
            None if name.schema.is_some() => {
                return Err(Error::undefined(format!("schema \"{}\" does not exist", schema)));
            }
            None => {}
        }
    }
    Ok(found)
}

/// Resolve a function reference to exactly one function and its schema name.
/// `None` when nothing matches.
pub(crate) fn resolve_function(
    session: &Session,
    name: &QualifiedName,
    arg_types: Option<&[String]>,
) -> Result<Option<(Function, String)>> {
    for (ns_oid, schema) in lookup_namespaces(session, name)? {
        match arg_types {
            Some(args) => {
                if let Some(func) = Function::find(session.conn(), ns_oid, &name.name, args)? {
                    return Ok(Some((func, schema)));
                }
            }
            None => {
                let mut overloads = Function::find_by_name(session.conn(), ns_oid, &name.name)?;
                match overloads.len() {
                    0 => {}
                    1 => return Ok(overloads.pop().map(|f| (f, schema))),
                    _ => {
                        return Err(Error::InvalidParameter(format!(
                            "function name \"{}\" is not unique",
                            name
                        )));
                    }
                }
            }
        }
    }
    Ok(None)
}

fn describe(name: &QualifiedName, arg_types: Option<&[String]>) -> String {
    match arg_types {
        Some(args) => format!("{}({})", name, args.join(", ")),
        None => name.to_string(),
    }
}

fn alter_function(session: &mut Session, alter: AlterFunction) -> Result<QueryResult> {
    let Some((func, schema)) = resolve_function(session, &alter.name, alter.arg_types.as_deref())? else {
        return Err(Error::undefined(format!(
            "function {} does not exist",
            describe(&alter.name, alter.arg_types.as_deref())
        )));
    };
    let oid = function_oid(&func)?;
    check_owner(session, &func)?;
    feature::check_alterable(session.conn(), &func, &schema)?;

    match alter.action {
        AlterFunctionAction::Rename(new_name) => {
            if Function::find(session.conn(), func.namespace_oid, &new_name, &func.arg_types)?.is_some() {
                return Err(Error::DuplicateObject(format!(
                    "function {}({}) already exists in schema \"{}\"",
                    new_name,
                    func.arg_types.join(", "),
                    schema
                )));
            }
            Function::rename(session.conn(), oid, &new_name)?;
            debug!("Renamed function {}.{} to {}", schema, func.name, new_name);
        }
        AlterFunctionAction::OwnerTo(role_name) => {
            let role = Role::find_by_name(session.conn(), &role_name)?
                .ok_or_else(|| Error::undefined(format!("role \"{}\" does not exist", role_name)))?;
            let role_oid = role
                .oid
                .ok_or_else(|| Error::Internal(format!("role {} has no oid", role.name)))?;
            if !session.has_privs_of(role_oid)? {
                return Err(Error::permission_denied(
                    format!("must be able to SET ROLE \"{}\"", role_name),
                    None,
                ));
            }
            Function::set_owner(session.conn(), oid, role_oid)?;
        }
        AlterFunctionAction::SetSchema(new_schema) => {
            let ns = Namespace::find_by_name(session.conn(), &new_schema)?
                .ok_or_else(|| Error::undefined(format!("schema \"{}\" does not exist", new_schema)))?;
            let ns_oid = ns
                .oid
                .ok_or_else(|| Error::Internal(format!("schema {} has no oid", ns.name)))?;
            check_create_in(session, &ns)?;
            if Function::find(session.conn(), ns_oid, &func.name, &func.arg_types)?.is_some() {
                return Err(Error::DuplicateObject(format!(
                    "function {} already exists in schema \"{}\"",
                    func.signature(),
                    new_schema
                )));
            }
            Function::set_namespace(session.conn(), oid, ns_oid)?;
        }
        AlterFunctionAction::Options => {}
    }
    Ok(QueryResult::command("ALTER FUNCTION"))
}

fn drop_function(session: &mut Session, drop: DropFunction) -> Result<QueryResult> {
    let Some((func, schema)) = resolve_function(session, &drop.name, drop.arg_types.as_deref())? else {
        let what = describe(&drop.name, drop.arg_types.as_deref());
        if drop.if_exists {
            session.notice(
                MessageLevel::Notice,
                format!("function {} does not exist, skipping", what),
                None,
            );
            return Ok(QueryResult::command("DROP FUNCTION"));
        }
        return Err(Error::undefined(format!("function {} does not exist", what)));
    };
    let oid = function_oid(&func)?;
    check_owner(session, &func)?;
    if drop.cascade {
        return Err(Error::FeatureNotSupported(
            "DROP FUNCTION ... CASCADE is not supported".to_string(),
        ));
    }

    let signature = func.signature();
    let creating = session.creating_extension().map(|e| e.oid);
    for edge in Dependency::find_for_object(session.conn(), ObjectClass::Function, oid, Some(ObjectClass::Extension))? {
        if edge.deptype == DependencyType::Extension && Some(edge.refobjid) != creating {
            let ext = crate::db::models::Extension::get(session.conn(), edge.refobjid)?;
            return Err(Error::DependentObjects {
                message: format!("cannot drop function {} because extension {} requires it", signature, ext.name),
                hint: Some(format!("You can drop extension {} instead.", ext.name)),
            });
        }
    }

    let pinned_by: Vec<i64> = Dependency::find_referencing(session.conn(), ObjectClass::Function, oid)?
        .into_iter()
        .filter(|d| d.classid == ObjectClass::Extension && d.deptype == DependencyType::Normal)
        .map(|d| d.objid)
        .collect();
    if let Some(ext_oid) = pinned_by.first() {
        let ext = crate::db::models::Extension::get(session.conn(), *ext_oid)?;
        return Err(Error::DependentObjects {
            message: format!("cannot drop function {} because other objects depend on it", signature),
            hint: Some(format!("extension {} depends on function {}", ext.name, signature)),
        });
    }

    Function::delete(session.conn(), oid)?;
    Dependency::delete_for_object(session.conn(), ObjectClass::Function, oid, None)?;
    Dependency::delete_referencing(session.conn(), ObjectClass::Function, oid)?;
    debug!("Dropped function {}.{}", schema, signature);
    Ok(QueryResult::command("DROP FUNCTION"))
}

fn call_function(session: &mut Session, call: Call) -> Result<QueryResult> {
    let mut target = None;
    for (ns_oid, _) in lookup_namespaces(session, &call.name)? {
        if let Some(func) = Function::find_by_name(session.conn(), ns_oid, &call.name.name)?
            .into_iter()
            .find(|f| f.arg_types.len() == call.args.len())
        {
            target = Some(func);
            break;
        }
    }

    match target {
        Some(func) if func.language == "internal" => manage::call_builtin(session, &func.body, &call.args),
        Some(func) => {
            check_catalog_access(session, &func.body)?;
            let value = func.call_sql(session.conn(), &call.args)?;
            Ok(QueryResult::scalar(&func.name, value))
        }
        None => match &call.name.schema {
            Some(schema) if schema != DEFAULT_NAMESPACE && schema != "temp" => Err(Error::undefined(format!(
                "function {}() does not exist",
                call.name
            ))),
            _ => execute_sql(session, &call.text),
        },
    }
}

/// Unquoted words, lowercased
fn words(tokens: &[Token]) -> impl Iterator<Item = String> + '_ {
    tokens.iter().filter_map(|t| match t {
        Token::Word(w) if w.quote_style.is_none() => Some(w.value.to_lowercase()),
        _ => None,
    })
}

/// First catalog table named anywhere in `sql`
///
/// Every word is compared, quoted or not, ignoring case, and so is every
/// string literal: SQLite accepts `"t"`, `[t]`, `` `t` `` and `'t'` as
/// table names and folds their case.
pub(crate) fn catalog_table_in(sql: &str) -> Result<Option<&'static str>> {
    let tokens = tokenize(sql)?;
    Ok(tokens.iter().find_map(|tok| {
        let name = match tok {
            Token::Word(w) => w.value.as_str(),
            other => other.string_value()?,
        };
        CATALOG_TABLES.iter().copied().find(|t| t.eq_ignore_ascii_case(name))
    }))
}

/// Only superusers may touch catalog tables directly
pub(crate) fn check_catalog_access(session: &Session, sql: &str) -> Result<()> {
    if session.is_superuser()? {
        return Ok(());
    }
    match catalog_table_in(sql)? {
        Some(table) => Err(Error::permission_denied(
            format!("permission denied for table {}", table),
            None,
        )),
        None => Ok(()),
    }
}

/// `DROP TABLE|VIEW|INDEX|TRIGGER [IF EXISTS] name`: object type and name
fn dropped_relation(tokens: &[Token]) -> Option<(String, String)> {
    let mut iter = tokens.iter();
    if !iter.next()?.is_keyword("drop") {
        return None;
    }
    let kind = iter.next()?.ident()?;
    if !MEMBER_TYPES.contains(&kind.as_str()) {
        return None;
    }
    let mut rest: Vec<&Token> = iter.collect();
    if rest.len() >= 2 && rest[0].is_keyword("if") && rest[1].is_keyword("exists") {
        rest.drain(..2);
    }
    // Skip a schema qualifier
    let name = match rest.as_slice() {
        [_, dot, name, ..] if **dot == Token::Period => name.ident()?,
        [name, ..] => name.ident()?,
        [] => return None,
    };
    Some((kind, name))
}

fn command_tag(tokens: &[Token], changes: usize) -> String {
    let mut words = words(tokens);
    let Some(first) = words.next() else {
        return "OK".to_string();
    };
    match first.as_str() {
        "create" | "drop" | "alter" => {
            let object = words.find(|w| {
                !matches!(w.as_str(), "or" | "replace" | "temp" | "temporary" | "unique" | "virtual")
            });
            match object {
                Some(object) => format!("{} {}", first, object).to_uppercase(),
                None => first.to_uppercase(),
            }
        }
        "insert" | "update" | "delete" => format!("{} {}", first.to_uppercase(), changes),
        _ => first.to_uppercase(),
    }
}

fn relation_snapshot(session: &Session) -> Result<HashSet<(String, String)>> {
    let mut stmt = session.conn().prepare("SELECT type, name FROM sqlite_master")?;
    let set = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<HashSet<(String, String)>, _>>()?;
    Ok(set)
}

/// Run plain SQL against SQLite
fn execute_sql(session: &mut Session, sql: &str) -> Result<QueryResult> {
    check_catalog_access(session, sql)?;
    let tokens = tokenize(sql)?;

    if let Some((kind, name)) = dropped_relation(&tokens)
        && let Some(ext_oid) = ExtensionMember::owning_extension(session.conn(), &kind, &name)?
        && session.creating_extension().map(|e| e.oid) != Some(ext_oid)
    {
        let ext = crate::db::models::Extension::get(session.conn(), ext_oid)?;
        return Err(Error::DependentObjects {
            message: format!("cannot drop {} {} because extension {} requires it", kind, name, ext.name),
            hint: Some(format!("You can drop extension {} instead.", ext.name)),
        });
    }

    let logical: Vec<String> = Namespace::list_names(session.conn())?
        .into_iter()
        .filter(|n| n != DEFAULT_NAMESPACE && n != "temp")
        .collect();
    let text = strip_schema_qualifiers(sql, &logical)?;

    let before = match session.creating_extension() {
        Some(_) => Some(relation_snapshot(session)?),
        None => None,
    };

    let result = {
        let conn = session.conn();
        let mut stmt = conn.prepare(&text)?;
        if stmt.column_count() > 0 {
            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
            let width = columns.len();
            let mut rows = Vec::new();
            let mut cursor = stmt.raw_query();
            while let Some(row) = cursor.next()? {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(Value::from(row.get_ref(i)?));
                }
                rows.push(values);
            }
            let names: Vec<&str> = columns.iter().map(String::as_str).collect();
            QueryResult::table(&names, rows)
        } else {
            let changes = stmt.raw_execute()?;
            QueryResult::command(&command_tag(&tokens, changes))
        }
    };

    if let (Some(before), Some(ext)) = (before, session.creating_extension().cloned()) {
        let schema = session
            .settings()
            .search_path()
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        for (kind, name) in relation_snapshot(session)?.difference(&before) {
            if !MEMBER_TYPES.contains(&kind.as_str()) || name.starts_with("sqlite_") || name.starts_with("tle_") {
                continue;
            }
            ExtensionMember::new(ext.oid, kind.clone(), schema.clone(), name.clone()).insert(session.conn())?;
            debug!("Recorded {} {} as member of {}", kind, name, ext.name);
        }
    }

    if tokens
        .first()
        .is_some_and(|t| t.is_keyword("drop") || t.is_keyword("alter"))
    {
        ExtensionMember::prune_missing(session.conn())?;
    }

    Ok(result)
}
