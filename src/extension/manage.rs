// src/extension/manage.rs

//! Management functions
//!
//! Install, update-path and uninstall operations on virtual files, the
//! default-version switch, the listings, and the built-in dispatcher that
//! backs the `LANGUAGE internal` functions created by the engine extension.

use super::available;
use super::bootstrap;
use super::catalog;
use super::control::{ExtensionControl, REQUIRES_LIMIT};
use super::graph::VersionGraph;
use super::names::{VirtualFile, check_valid_extension_name, check_valid_version_name};
use super::source::ExtensionSource;
use super::store;
use crate::db::models::{Dependency, DependencyType, Extension, ExtensionMember, ObjectClass};
use crate::db::{TLE_ADMIN_ROLE, TLE_NAMESPACE};
use crate::error::{Error, Result};
use crate::feature;
use crate::session::Session;
use crate::sql::{QueryResult, Value};
use tracing::{debug, info};

/// Built-in names accepted as `LANGUAGE internal` bodies
const BUILTINS: &[&str] = &[
    "install_extension",
    "install_extension_version_sql",
    "install_update_path",
    "uninstall_update_path",
    "uninstall_update_path_if_exists",
    "uninstall",
    "uninstall_if_exists",
    "set_default_version",
    "available_extensions",
    "available_extension_versions",
    "extension_update_paths",
    "extension_config_dump",
    "register_feature",
    "register_feature_if_not_exists",
    "unregister_feature",
    "unregister_feature_if_exists",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

fn not_installed(name: &str) -> Error {
    Error::UndefinedObject {
        message: format!("extension \"{}\" is not installed", name),
        hint: Some(format!(
            "Try installing the extension with \"{}.install_extension\".",
            TLE_NAMESPACE
        )),
    }
}

/// Only members of the admin role may change virtual files
fn require_admin(session: &Session, function: &str) -> Result<()> {
    if session.is_member_of(TLE_ADMIN_ROLE)? {
        return Ok(());
    }
    Err(Error::PermissionDenied {
        message: format!("permission denied for function {}", function),
        hint: Some(format!(
            "Grant the \"{}\" role to use this function.",
            TLE_ADMIN_ROLE
        )),
    })
}

/// Virtual files hang off the engine extension, so it must be installed
fn require_engine(session: &Session) -> Result<()> {
    if bootstrap::engine_installed(session.conn())? {
        return Ok(());
    }
    Err(Error::UndefinedObject {
        message: format!("extension \"{}\" is not installed", bootstrap::TLE_EXTENSION),
        hint: Some(format!("Run CREATE EXTENSION {} first.", bootstrap::TLE_EXTENSION)),
    })
}

/// A file-based extension of the same name shadows any stored one
fn check_not_file_based(session: &Session, name: &str) -> Result<()> {
    let files = ExtensionSource::files(session.config());
    if files.control_exists(session.conn(), name)? {
        return Err(Error::DuplicateObject(format!(
            "control file already exists for the {} extension",
            name
        )));
    }
    Ok(())
}

/// Record function -> engine extension edges for new virtual files
fn depend_on_engine(session: &Session, files: &[VirtualFile]) -> Result<()> {
    let engine = bootstrap::engine_oid(session.conn())?;
    for file in files {
        let func = store::find(session.conn(), file)?
            .ok_or_else(|| Error::Internal(format!("virtual file {} was not created", file)))?;
        let oid = func
            .oid
            .ok_or_else(|| Error::Internal(format!("function {} has no oid", func.name)))?;
        Dependency::new(
            ObjectClass::Function,
            oid,
            ObjectClass::Extension,
            engine,
            DependencyType::Normal,
        )
        .insert(session.conn())?;
    }
    Ok(())
}

/// Store a new file, turning a duplicate into `already`
fn create_new(session: &mut Session, file: &VirtualFile, content: &str, already: impl FnOnce() -> Error) -> Result<()> {
    match store::create(session, file, content, false) {
        Ok(_) => Ok(()),
        Err(Error::DuplicateObject(_)) => Err(already()),
        Err(e) => Err(e),
    }
}

/// Remove a virtual file and every edge pinning it; false if it was missing
fn remove_file(session: &mut Session, file: &VirtualFile) -> Result<bool> {
    let Some(func) = store::find(session.conn(), file)? else {
        return Ok(false);
    };
    if let Some(oid) = func.oid {
        Dependency::delete_referencing(session.conn(), ObjectClass::Function, oid)?;
    }
    store::drop(session, file)
}

/// Install a new stored extension: its control file and first install script
pub fn install_extension(
    session: &mut Session,
    name: &str,
    version: &str,
    description: &str,
    script: &str,
    requires: &[String],
) -> Result<()> {
    require_admin(session, "install_extension")?;
    require_engine(session)?;
    session.atomically(|session| {
        check_valid_extension_name(name)?;
        check_not_file_based(session, name)?;
        check_valid_version_name(version)?;

        if requires.len() > REQUIRES_LIMIT {
            return Err(Error::DataException(format!(
                "\"requires\" limited to {} entries for \"{}\" extensions",
                REQUIRES_LIMIT,
                bootstrap::TLE_EXTENSION
            )));
        }

        let mut control = ExtensionControl::new(name);
        control.default_version = Some(version.to_string());
        control.comment = Some(description.to_string());
        control.requires = requires.to_vec();
        if !control.requires.iter().any(|r| r == bootstrap::TLE_EXTENSION) {
            control.requires.push(bootstrap::TLE_EXTENSION.to_string());
        }
        control.force_stored_values()?;
        let control_text = control.to_stored_text();

        store::check_content(&control_text)?;
        store::check_content(script)?;

        let script_file = VirtualFile::install_script(name, version);
        let control_file = VirtualFile::control(name);
        create_new(session, &script_file, script, || Error::AlreadyInstalled {
            message: format!("extension \"{}\" already installed", name),
            hint: None,
        })?;
        store::create(session, &control_file, &control_text, true)?;
        depend_on_engine(session, &[control_file, script_file])?;

        info!("Installed extension {} version {}", name, version);
        Ok(())
    })
}

/// Add another installable version to a stored extension
pub fn install_extension_version_sql(session: &mut Session, name: &str, version: &str, script: &str) -> Result<()> {
    require_admin(session, "install_extension_version_sql")?;
    require_engine(session)?;
    session.atomically(|session| {
        check_valid_extension_name(name)?;
        if ExtensionSource::files(session.config()).control_exists(session.conn(), name)? {
            return Err(Error::InvalidParameter(format!(
                "extension {} is not a {} extension",
                name,
                bootstrap::TLE_EXTENSION
            )));
        }
        if !store::exists(session.conn(), &VirtualFile::control(name))? {
            return Err(not_installed(name));
        }
        check_valid_version_name(version)?;
        store::check_content(script)?;

        let file = VirtualFile::install_script(name, version);
        create_new(session, &file, script, || Error::AlreadyInstalled {
            message: format!("version \"{}\" of extension \"{}\" already installed", version, name),
            hint: None,
        })?;
        depend_on_engine(session, &[file])?;

        info!("Installed extension {} version {}", name, version);
        Ok(())
    })
}

/// Store an update script from `from` to `to`
pub fn install_update_path(session: &mut Session, name: &str, from: &str, to: &str, script: &str) -> Result<()> {
    require_admin(session, "install_update_path")?;
    require_engine(session)?;
    session.atomically(|session| {
        check_valid_extension_name(name)?;
        check_not_file_based(session, name)?;
        check_valid_version_name(from)?;
        check_valid_version_name(to)?;
        store::check_content(script)?;

        let file = VirtualFile::update_script(name, from, to);
        create_new(session, &file, script, || Error::AlreadyInstalled {
            message: format!("extension \"{}\" update path \"{}-{}\" already installed", name, from, to),
            hint: Some(format!(
                "To update this specific install path, first use \"{}.uninstall_update_path\".",
                TLE_NAMESPACE
            )),
        })?;
        depend_on_engine(session, &[file])?;

        info!("Installed update path {}-{} for extension {}", from, to, name);
        Ok(())
    })
}

/// Remove an update script; false when it does not exist
pub fn uninstall_update_path_if_exists(session: &mut Session, name: &str, from: &str, to: &str) -> Result<bool> {
    require_admin(session, "uninstall_update_path")?;
    require_engine(session)?;
    session.atomically(|session| {
        check_valid_extension_name(name)?;
        check_valid_version_name(from)?;
        check_valid_version_name(to)?;

        let removed = remove_file(session, &VirtualFile::update_script(name, from, to))?;
        if removed {
            info!("Uninstalled update path {}-{} for extension {}", from, to, name);
        }
        Ok(removed)
    })
}

pub fn uninstall_update_path(session: &mut Session, name: &str, from: &str, to: &str) -> Result<()> {
    if !uninstall_update_path_if_exists(session, name, from, to)? {
        return Err(Error::undefined(format!(
            "extension \"{}\" update path \"{}-{}\" is not installed",
            name, from, to
        )));
    }
    Ok(())
}

/// Every virtual file belonging to `name`
fn files_of(session: &Session, name: &str) -> Result<Vec<VirtualFile>> {
    Ok(store::list_names(session.conn())?
        .iter()
        .filter_map(|n| VirtualFile::parse(n))
        .filter(|f| f.extension() == name)
        .collect())
}

fn remove_all(session: &mut Session, name: &str) -> Result<()> {
    for file in files_of(session, name)? {
        remove_file(session, &file)?;
    }
    info!("Uninstalled extension {}", name);
    Ok(())
}

/// Remove a stored extension, or one installable version of it. A created
/// instance is left in place. Returns false when there was nothing to remove.
pub fn uninstall_if_exists(session: &mut Session, name: &str, version: Option<&str>) -> Result<bool> {
    require_admin(session, "uninstall")?;
    require_engine(session)?;
    session.atomically(|session| {
        check_valid_extension_name(name)?;
        if !store::exists(session.conn(), &VirtualFile::control(name))? {
            return Ok(false);
        }

        let Some(version) = version else {
            remove_all(session, name)?;
            return Ok(true);
        };
        check_valid_version_name(version)?;

        let script = VirtualFile::install_script(name, version);
        if !store::exists(session.conn(), &script)? {
            return Ok(false);
        }

        let source = ExtensionSource::Stored;
        let control = source.read_control(session.conn(), name)?;
        let names = source.script_names(session.conn(), &control)?;
        let graph = VersionGraph::build(name, &names);
        let installable = graph.nodes().filter(|(_, node)| node.installable).count();

        if installable <= 1 {
            remove_all(session, name)?;
            return Ok(true);
        }
        if control.default_version.as_deref() == Some(version) {
            return Err(Error::InvalidParameter(format!(
                "cannot uninstall the default version \"{}\" of extension \"{}\"",
                version, name
            )));
        }

        remove_file(session, &script)?;
        remove_file(session, &VirtualFile::aux_control(name, version))?;
        info!("Uninstalled extension {} version {}", name, version);
        Ok(true)
    })
}

pub fn uninstall(session: &mut Session, name: &str, version: Option<&str>) -> Result<()> {
    if uninstall_if_exists(session, name, version)? {
        return Ok(());
    }
    match version {
        Some(version) if store::exists(session.conn(), &VirtualFile::control(name))? => {
            Err(Error::UndefinedObject {
                message: format!("version \"{}\" of extension \"{}\" is not installed", version, name),
                hint: None,
            })
        }
        _ => Err(not_installed(name)),
    }
}

/// Point the stored control file at another available version
pub fn set_default_version(session: &mut Session, name: &str, version: &str) -> Result<()> {
    require_admin(session, "set_default_version")?;
    require_engine(session)?;
    session.atomically(|session| {
        check_valid_extension_name(name)?;
        check_not_file_based(session, name)?;
        check_valid_version_name(version)?;

        let missing = || Error::UndefinedObject {
            message: "extension and version do not exist".to_string(),
            hint: Some(format!(
                "Try installing the extension with \"{}.install_extension\".",
                TLE_NAMESPACE
            )),
        };

        let source = ExtensionSource::Stored;
        if !source.control_exists(session.conn(), name)? {
            return Err(missing());
        }
        let mut control = source.read_control(session.conn(), name)?;
        if !available::extension_versions(session.conn(), &control)?
            .iter()
            .any(|v| v.version == version)
        {
            return Err(missing());
        }

        control.default_version = Some(version.to_string());
        let text = control.to_stored_text();
        store::check_content(&text)?;
        store::create(session, &VirtualFile::control(name), &text, true)?;

        if let Some(oid) = Extension::oid_of(session.conn(), name)? {
            catalog::pin_default_path(session.conn(), &source, oid, &control)?;
        }
        info!("Set default version of extension {} to {}", name, version);
        Ok(())
    })
}

/// Mark a member table of the extension being created for data dumps.
/// Calling it again for the same table replaces the condition.
pub fn extension_config_dump(session: &mut Session, table: &str, condition: &str) -> Result<()> {
    let Some(creating) = session.creating_extension().cloned() else {
        return Err(Error::FeatureNotSupported(
            "extension_config_dump() can only be called from an SQL script executed by CREATE EXTENSION"
                .to_string(),
        ));
    };

    let exists: bool = session.conn().query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [table],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(Error::undefined(format!("relation \"{}\" does not exist", table)));
    }
    if ExtensionMember::owning_extension(session.conn(), "table", table)? != Some(creating.oid) {
        return Err(Error::InvalidParameter(format!(
            "table \"{}\" is not a member of the extension being created",
            table
        )));
    }

    let ext = Extension::get(session.conn(), creating.oid)?;
    let mut tables = ext.config_tables.unwrap_or_default();
    let mut conditions = ext.config_conditions.unwrap_or_default();
    conditions.resize(tables.len(), String::new());
    match tables.iter().position(|t| t == table) {
        Some(i) => conditions[i] = condition.to_string(),
        None => {
            tables.push(table.to_string());
            conditions.push(condition.to_string());
        }
    }
    Extension::set_config(session.conn(), creating.oid, &tables, &conditions)?;
    debug!("Registered config table {} for {}", table, creating.name);
    Ok(())
}

/// Positional arguments of a built-in call
struct Args<'a> {
    builtin: &'a str,
    values: &'a [Value],
}

impl Args<'_> {
    fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index).filter(|v| !v.is_null())
    }

    fn text(&self, index: usize, label: &str) -> Result<String> {
        self.value(index)
            .map(Value::render)
            .ok_or_else(|| Error::InvalidParameter(format!("\"{}\" is a required argument", label)))
    }

    fn opt_text(&self, index: usize) -> Option<String> {
        self.value(index).map(Value::render)
    }

    /// `ARRAY[...]`, a `{a,b}` literal, or NULL for an empty list
    fn text_array(&self, index: usize) -> Result<Vec<String>> {
        match self.value(index) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.iter().map(Value::render).collect()),
            Some(Value::Text(text)) => parse_array_literal(text).ok_or_else(|| {
                Error::InvalidParameter(format!("malformed array literal: \"{}\"", text))
            }),
            Some(other) => Err(Error::InvalidParameter(format!(
                "argument {} of {} must be a text array, not {}",
                index + 1,
                self.builtin,
                other
            ))),
        }
    }
}

/// Parse `{a,"b c"}` into its elements
fn parse_array_literal(text: &str) -> Option<Vec<String>> {
    let inner = text.trim().strip_prefix('{')?.strip_suffix('}')?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }

    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let mut item = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next()? {
                    '\\' => item.push(chars.next()?),
                    '"' => break,
                    c => item.push(c),
                }
            }
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                item.push(c);
                chars.next();
            }
            item = item.trim().to_string();
            if item.is_empty() {
                return None;
            }
        }
        items.push(item);
        match chars.next() {
            None => return Some(items),
            Some(',') => {}
            Some(_) => return None,
        }
    }
}

fn ok(builtin: &str) -> QueryResult {
    QueryResult::scalar(builtin, Value::Bool(true))
}

/// Run the built-in named by an internal function body
pub fn call_builtin(session: &mut Session, builtin: &str, values: &[Value]) -> Result<QueryResult> {
    let args = Args { builtin, values };
    debug!("Calling built-in {} with {} arguments", builtin, values.len());

    match builtin {
        "install_extension" => {
            install_extension(
                session,
                &args.text(0, "name")?,
                &args.text(1, "version")?,
                &args.text(2, "description")?,
                &args.text(3, "ext")?,
                &args.text_array(4)?,
            )?;
            Ok(ok(builtin))
        }
        "install_extension_version_sql" => {
            install_extension_version_sql(
                session,
                &args.text(0, "name")?,
                &args.text(1, "version")?,
                &args.text(2, "ext")?,
            )?;
            Ok(ok(builtin))
        }
        "install_update_path" => {
            install_update_path(
                session,
                &args.text(0, "name")?,
                &args.text(1, "fromvers")?,
                &args.text(2, "tovers")?,
                &args.text(3, "ext")?,
            )?;
            Ok(ok(builtin))
        }
        "uninstall_update_path" => {
            uninstall_update_path(
                session,
                &args.text(0, "name")?,
                &args.text(1, "fromvers")?,
                &args.text(2, "tovers")?,
            )?;
            Ok(ok(builtin))
        }
        "uninstall_update_path_if_exists" => {
            let removed = uninstall_update_path_if_exists(
                session,
                &args.text(0, "name")?,
                &args.text(1, "fromvers")?,
                &args.text(2, "tovers")?,
            )?;
            Ok(QueryResult::scalar(builtin, Value::Bool(removed)))
        }
        "uninstall" => {
            uninstall(session, &args.text(0, "name")?, args.opt_text(1).as_deref())?;
            Ok(ok(builtin))
        }
        "uninstall_if_exists" => {
            let removed = uninstall_if_exists(session, &args.text(0, "name")?, args.opt_text(1).as_deref())?;
            Ok(QueryResult::scalar(builtin, Value::Bool(removed)))
        }
        "set_default_version" => {
            set_default_version(session, &args.text(0, "name")?, &args.text(1, "version")?)?;
            Ok(ok(builtin))
        }
        "available_extensions" => Ok(available::extensions_result(&available::available_extensions(
            session.conn(),
        )?)),
        "available_extension_versions" => Ok(available::versions_result(
            &available::available_extension_versions(session.conn())?,
        )),
        "extension_update_paths" => {
            let name = args.text(0, "name")?;
            Ok(available::update_paths_result(&available::extension_update_paths(
                session.conn(),
                &name,
            )?))
        }
        "extension_config_dump" => {
            extension_config_dump(
                session,
                &args.text(0, "table")?,
                &args.opt_text(1).unwrap_or_default(),
            )?;
            Ok(QueryResult::command("SELECT 1"))
        }
        "register_feature" => {
            require_admin(session, builtin)?;
            feature::register_feature(session, &args.text(0, "proc")?, &args.text(1, "feature")?)?;
            Ok(ok(builtin))
        }
        "register_feature_if_not_exists" => {
            require_admin(session, builtin)?;
            let added =
                feature::register_feature_if_not_exists(session, &args.text(0, "proc")?, &args.text(1, "feature")?)?;
            Ok(QueryResult::scalar(builtin, Value::Bool(added)))
        }
        "unregister_feature" => {
            require_admin(session, builtin)?;
            feature::unregister_feature(session, &args.text(0, "proc")?, &args.text(1, "feature")?)?;
            Ok(ok(builtin))
        }
        "unregister_feature_if_exists" => {
            require_admin(session, builtin)?;
            let removed =
                feature::unregister_feature_if_exists(session, &args.text(0, "proc")?, &args.text(1, "feature")?)?;
            Ok(QueryResult::scalar(builtin, Value::Bool(removed)))
        }
        other => Err(Error::undefined(format!(
            "there is no built-in function named \"{}\"",
            other
        ))),
    }
}
