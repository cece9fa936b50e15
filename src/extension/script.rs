// src/extension/script.rs

//! Running install and update scripts
//!
//! A script runs inside a [`ScriptScope`]: a guard that opens a settings
//! nest level, sets the creating-extension marker and, for trusted
//! extensions, switches to the bootstrap role. Dropping the guard undoes all
//! of it, whether the script finished or failed.

use super::control::ExtensionControl;
use super::names::VirtualFile;
use super::source::ExtensionSource;
use crate::db::models::Role;
use crate::error::{Error, Result};
use crate::interceptor::Origin;
use crate::session::{CreatingExtension, RoleRef, Session};
use crate::settings::MessageLevel;
use crate::sql::{Statement, parse_statement, quote_identifier, split_statements};
use regex::Regex;
use std::ops::{Deref, DerefMut};
use std::sync::LazyLock;
use tracing::{debug, info};

static ECHO_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\\echo.*$").unwrap());

/// Session state for the duration of one script
pub struct ScriptScope<'a> {
    session: &'a mut Session,
    nest_level: usize,
    saved_user: Option<RoleRef>,
    saved_marker: Option<CreatingExtension>,
}

impl<'a> ScriptScope<'a> {
    pub fn enter(
        session: &'a mut Session,
        extension: CreatingExtension,
        search_path: Vec<String>,
        run_as: Option<RoleRef>,
    ) -> Self {
        let settings = session.settings_mut();
        let nest_level = settings.new_nest_level();
        if settings.client_min_messages() < MessageLevel::Warning {
            settings.set_client_min_messages(MessageLevel::Warning);
        }
        settings.set_check_function_bodies(false);
        settings.set_search_path(search_path);

        let saved_marker = session.replace_creating_extension(Some(extension));
        let saved_user = run_as.map(|role| session.replace_current_user(role));

        Self {
            session,
            nest_level,
            saved_user,
            saved_marker,
        }
    }
}

impl Deref for ScriptScope<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &*self.session
    }
}

impl DerefMut for ScriptScope<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        &mut *self.session
    }
}

impl Drop for ScriptScope<'_> {
    fn drop(&mut self) {
        self.session.settings_mut().restore_nest_level(self.nest_level);
        if let Some(user) = self.saved_user.take() {
            self.session.replace_current_user(user);
        }
        self.session.replace_creating_extension(self.saved_marker.take());
    }
}

/// Everything needed to run one install or update step
pub struct ScriptStep<'a> {
    pub source: &'a ExtensionSource,
    pub control: &'a ExtensionControl,
    pub extension_oid: i64,
    /// `None` for an install script
    pub from_version: Option<&'a str>,
    pub version: &'a str,
    pub schema: &'a str,
    pub required_schemas: &'a [String],
}

/// Role to run as, or a permission error when the current role may not
/// run this extension's scripts
fn script_role(session: &Session, step: &ScriptStep<'_>) -> Result<Option<RoleRef>> {
    let control = step.control;
    let role = session.current_role()?;
    if !control.superuser || role.superuser {
        return Ok(None);
    }

    if control.trusted && session.config().trusted_extensions && role.can_create {
        let name = &session.config().bootstrap_role;
        let bootstrap = Role::find_by_name(session.conn(), name)?
            .ok_or_else(|| Error::Internal(format!("bootstrap role \"{}\" is missing", name)))?;
        let oid = bootstrap
            .oid
            .ok_or_else(|| Error::Internal(format!("role {} has no oid", bootstrap.name)))?;
        debug!("Running {} scripts as {}", control.name, bootstrap.name);
        return Ok(Some(RoleRef {
            oid,
            name: bootstrap.name,
        }));
    }

    let verb = if step.from_version.is_none() { "create" } else { "update" };
    let hint = if control.trusted {
        format!("Must have CREATE privilege on current database to {} this extension.", verb)
    } else {
        format!("Must be superuser to {} this extension.", verb)
    };
    Err(Error::permission_denied(
        format!("permission denied to {} extension \"{}\"", verb, control.name),
        Some(&hint),
    ))
}

/// Apply placeholder substitutions in order
pub fn substitute(text: &str, owner: &str, schema: &str, control: &ExtensionControl) -> String {
    let mut text = ECHO_LINE.replace_all(text, "").into_owned();
    text = text.replace("@extowner@", &quote_identifier(owner));
    if !control.relocatable {
        text = text.replace("@extschema@", &quote_identifier(schema));
    }
    if let Some(module) = &control.module_pathname {
        text = text.replace("MODULE_PATHNAME", module);
    }
    text
}

/// Parse a whole script up front; transaction control anywhere rejects it
pub fn parse_script(text: &str) -> Result<Vec<Statement>> {
    let statements = split_statements(text)?
        .iter()
        .map(|s| parse_statement(s))
        .collect::<Result<Vec<_>>>()?;
    if statements.iter().any(Statement::is_transaction_control) {
        return Err(Error::InvalidTransactionState(
            "transaction control statements are not allowed within an extension script".to_string(),
        ));
    }
    Ok(statements)
}

/// Read, substitute and run the script for one step
pub fn execute_extension_script(session: &mut Session, step: &ScriptStep<'_>) -> Result<()> {
    let control = step.control;
    let run_as = script_role(session, step)?;

    let file = VirtualFile::script(&control.name, step.from_version, step.version);
    let text = step.source.read_script(session.conn(), control, &file)?;
    let owner = session.current_user().name.clone();
    let statements = parse_script(&substitute(&text, &owner, step.schema, control))?;

    let mut search_path = vec![step.schema.to_string()];
    for schema in step.required_schemas {
        if !search_path.contains(schema) {
            search_path.push(schema.clone());
        }
    }

    info!("Running {} ({} statements)", file, statements.len());
    let marker = CreatingExtension {
        oid: step.extension_oid,
        name: control.name.clone(),
    };
    let mut scope = ScriptScope::enter(session, marker, search_path, run_as);
    for stmt in statements {
        scope.dispatch(stmt, Origin::ExtensionScript)?;
    }
    Ok(())
}
