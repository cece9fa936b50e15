// src/session.rs

//! Client sessions
//!
//! A session owns one catalog connection and the per-connection state the
//! engine needs: who is connected, who is acting, settings, queued notices
//! and the creating-extension marker. Every client statement runs inside a
//! savepoint, so a failed statement leaves no trace in the catalog.

use crate::config::Config;
use crate::db::models::{Namespace, Role};
use crate::db::{self, schema};
use crate::error::{Error, Result};
use crate::interceptor::{InterceptorChain, Origin};
use crate::settings::{MessageLevel, Notice, Settings};
use crate::sql::{QueryResult, Statement, TransactionKind, parse_statement, quote_identifier, split_statements};
use rusqlite::Connection;
use std::rc::Rc;
use tracing::{debug, info};

/// A role as the session refers to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRef {
    pub oid: i64,
    pub name: String,
}

impl RoleRef {
    fn from_role(role: &Role) -> Result<Self> {
        Ok(Self {
            oid: role
                .oid
                .ok_or_else(|| Error::Internal(format!("role {} has no oid", role.name)))?,
            name: role.name.clone(),
        })
    }
}

/// The extension whose script is currently running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatingExtension {
    pub oid: i64,
    pub name: String,
}

pub struct Session {
    conn: Connection,
    config: Config,
    session_user: RoleRef,
    current_user: RoleRef,
    settings: Settings,
    notices: Vec<Notice>,
    creating_extension: Option<CreatingExtension>,
    in_transaction: bool,
    savepoint_seq: u64,
    chain: Rc<InterceptorChain>,
}

impl Session {
    /// Open the configured catalog as `user` (the bootstrap role by default)
    pub fn open(config: Config, user: Option<&str>) -> Result<Self> {
        let conn = db::open(&config.db_path)?;
        if schema::get_schema_version(&conn)? < schema::SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "catalog {} is not initialized; run `tlext init` first",
                config.db_path.display()
            )));
        }
        Self::open_with_connection(conn, config, user)
    }

    pub fn open_with_connection(conn: Connection, config: Config, user: Option<&str>) -> Result<Self> {
        let user = user.unwrap_or(&config.bootstrap_role).to_string();
        let role = Role::find_by_name(&conn, &user)?
            .ok_or_else(|| Error::undefined(format!("role \"{}\" does not exist", user)))?;
        let role = RoleRef::from_role(&role)?;
        debug!("Session opened as {}", role.name);

        Ok(Self {
            conn,
            config,
            session_user: role.clone(),
            current_user: role,
            settings: Settings::new(),
            notices: Vec::new(),
            creating_extension: None,
            in_transaction: false,
            savepoint_seq: 0,
            chain: Rc::new(InterceptorChain::standard()),
        })
    }

    /// Throwaway in-memory catalog with default configuration
    pub fn open_in_memory() -> Result<Self> {
        let config = Config::default();
        let conn = db::open_in_memory(&config.bootstrap_role)?;
        Self::open_with_connection(conn, config, None)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session_user(&self) -> &RoleRef {
        &self.session_user
    }

    pub fn current_user(&self) -> &RoleRef {
        &self.current_user
    }

    /// Switch the acting role without checks; returns the previous one
    pub(crate) fn replace_current_user(&mut self, role: RoleRef) -> RoleRef {
        std::mem::replace(&mut self.current_user, role)
    }

    pub fn current_role(&self) -> Result<Role> {
        Role::get(&self.conn, self.current_user.oid)
    }

    pub fn is_superuser(&self) -> Result<bool> {
        Ok(self.current_role()?.superuser)
    }

    /// True if the acting role holds the privileges of `role_oid`
    pub fn has_privs_of(&self, role_oid: i64) -> Result<bool> {
        Role::has_privs_of(&self.conn, self.current_user.oid, role_oid)
    }

    pub fn is_member_of(&self, role_name: &str) -> Result<bool> {
        match Role::find_by_name(&self.conn, role_name)?.and_then(|r| r.oid) {
            Some(oid) => self.has_privs_of(oid),
            None => Ok(false),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn creating_extension(&self) -> Option<&CreatingExtension> {
        self.creating_extension.as_ref()
    }

    pub(crate) fn replace_creating_extension(
        &mut self,
        marker: Option<CreatingExtension>,
    ) -> Option<CreatingExtension> {
        std::mem::replace(&mut self.creating_extension, marker)
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Queue a message for the client, unless `client_min_messages` hides it
    pub fn notice(&mut self, level: MessageLevel, message: impl Into<String>, hint: Option<String>) {
        let message = message.into();
        debug!("{}: {}", level, message);
        if level >= self.settings.client_min_messages() {
            self.notices.push(Notice {
                level,
                message,
                hint,
            });
        }
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// First schema in `search_path` that exists
    pub fn creation_namespace(&self) -> Result<(i64, String)> {
        for name in self.settings.search_path() {
            if let Some(oid) = Namespace::lookup_oid(&self.conn, name)? {
                return Ok((oid, name.clone()));
            }
        }
        Err(Error::undefined("no schema has been selected to create in"))
    }

    /// Run every statement in `sql`, stopping at the first error
    pub fn execute(&mut self, sql: &str) -> Result<Vec<QueryResult>> {
        let mut results = Vec::new();
        for text in split_statements(sql)? {
            let stmt = parse_statement(&text)?;
            results.push(self.run_statement(stmt)?);
        }
        Ok(results)
    }

    /// Run `sql` and return the result of its last statement
    pub fn query(&mut self, sql: &str) -> Result<QueryResult> {
        self.execute(sql)?
            .pop()
            .ok_or_else(|| Error::syntax("empty query"))
    }

    /// Run one client statement in its own savepoint
    pub fn run_statement(&mut self, stmt: Statement) -> Result<QueryResult> {
        if let Statement::Transaction(kind) = stmt {
            return self.transaction_control(kind);
        }

        self.atomically(|session| session.dispatch(stmt, Origin::Client))
    }

    /// Run `f` inside a savepoint; its writes are undone if it fails
    pub fn atomically<T>(&mut self, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        let savepoint = format!("tlext_stmt_{}", self.savepoint_seq);
        self.savepoint_seq += 1;
        self.conn.execute_batch(&format!("SAVEPOINT {}", savepoint))?;

        match f(self) {
            Ok(value) => {
                self.conn.execute_batch(&format!("RELEASE {}", savepoint))?;
                Ok(value)
            }
            Err(e) => {
                self.conn
                    .execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0}", savepoint))?;
                Err(e)
            }
        }
    }

    /// Push a statement through the interceptor chain
    pub fn dispatch(&mut self, stmt: Statement, origin: Origin) -> Result<QueryResult> {
        let chain = Rc::clone(&self.chain);
        chain.run(self, stmt, origin)
    }

    fn transaction_control(&mut self, kind: TransactionKind) -> Result<QueryResult> {
        let tag = Statement::Transaction(kind.clone()).tag();
        let outside = |what: &str| {
            Error::InvalidTransactionState(format!("{} can only be used in transaction blocks", what))
        };

        match kind {
            TransactionKind::Begin => {
                if self.in_transaction {
                    self.notice(MessageLevel::Warning, "there is already a transaction in progress", None);
                } else {
                    self.conn.execute_batch("BEGIN")?;
                    self.in_transaction = true;
                }
            }
            TransactionKind::Commit | TransactionKind::Rollback => {
                if !self.in_transaction {
                    self.notice(MessageLevel::Warning, "there is no transaction in progress", None);
                } else {
                    let command = if kind == TransactionKind::Commit { "COMMIT" } else { "ROLLBACK" };
                    self.conn.execute_batch(command)?;
                    self.in_transaction = false;
                    info!("Transaction {}", command.to_lowercase());
                }
            }
            TransactionKind::Savepoint(name) => {
                if !self.in_transaction {
                    return Err(outside("SAVEPOINT"));
                }
                self.conn
                    .execute_batch(&format!("SAVEPOINT {}", quote_identifier(&name)))?;
            }
            TransactionKind::Release(name) => {
                if !self.in_transaction {
                    return Err(outside("RELEASE SAVEPOINT"));
                }
                self.conn
                    .execute_batch(&format!("RELEASE {}", quote_identifier(&name)))?;
            }
            TransactionKind::RollbackTo(name) => {
                if !self.in_transaction {
                    return Err(outside("ROLLBACK TO SAVEPOINT"));
                }
                self.conn
                    .execute_batch(&format!("ROLLBACK TO {}", quote_identifier(&name)))?;
            }
        }

        Ok(QueryResult::command(tag))
    }

    /// `SET ROLE`; `None` returns to the session user
    pub fn set_role(&mut self, name: Option<&str>) -> Result<()> {
        let Some(name) = name else {
            self.current_user = self.session_user.clone();
            return Ok(());
        };

        let role = Role::find_by_name(&self.conn, name)?
            .ok_or_else(|| Error::undefined(format!("role \"{}\" does not exist", name)))?;
        let role = RoleRef::from_role(&role)?;
        if !Role::has_privs_of(&self.conn, self.session_user.oid, role.oid)? {
            return Err(Error::permission_denied(
                format!("permission denied to set role \"{}\"", name),
                None,
            ));
        }
        self.current_user = role;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_statement_rolls_back() {
        let mut session = Session::open_in_memory().unwrap();
        session.execute("CREATE TABLE t (a integer)").unwrap();
        let err = session
            .execute("INSERT INTO t VALUES (1); INSERT INTO missing VALUES (2)")
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));

        let count = session.query("SELECT count(*) FROM t").unwrap();
        assert_eq!(count.first_value(), Some(&crate::sql::Value::Integer(1)));
    }

    #[test]
    fn test_atomically_undoes_partial_work() {
        let mut session = Session::open_in_memory().unwrap();
        session.execute("CREATE TABLE t (a integer)").unwrap();
        let result: Result<()> = session.atomically(|s| {
            s.execute("INSERT INTO t VALUES (1)")?;
            Err(Error::Internal("abort".to_string()))
        });
        assert!(result.is_err());

        let kept = session
            .atomically(|s| s.query("INSERT INTO t VALUES (2) RETURNING a"))
            .unwrap();
        assert_eq!(kept.first_value(), Some(&crate::sql::Value::Integer(2)));
        let count = session.query("SELECT count(*) FROM t").unwrap();
        assert_eq!(count.first_value(), Some(&crate::sql::Value::Integer(1)));
    }

    #[test]
    fn test_explicit_transaction() {
        let mut session = Session::open_in_memory().unwrap();
        session.execute("CREATE TABLE t (a integer)").unwrap();
        session.execute("BEGIN; INSERT INTO t VALUES (1)").unwrap();
        assert!(session.in_transaction());
        session.execute("ROLLBACK").unwrap();
        assert!(!session.in_transaction());

        let count = session.query("SELECT count(*) FROM t").unwrap();
        assert_eq!(count.first_value(), Some(&crate::sql::Value::Integer(0)));
    }

    #[test]
    fn test_transaction_warnings() {
        let mut session = Session::open_in_memory().unwrap();
        session.execute("COMMIT").unwrap();
        session.execute("BEGIN; BEGIN; COMMIT").unwrap();
        let notices = session.take_notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].message, "there is no transaction in progress");
        assert_eq!(notices[1].message, "there is already a transaction in progress");
        assert!(matches!(
            session.execute("SAVEPOINT sp"),
            Err(Error::InvalidTransactionState(_))
        ));
    }

    #[test]
    fn test_set_role() {
        let mut session = Session::open_in_memory().unwrap();
        Role::new("alice".to_string()).insert(session.conn()).unwrap();
        Role::new("bob".to_string()).insert(session.conn()).unwrap();

        session.execute("SET ROLE alice").unwrap();
        assert_eq!(session.current_user().name, "alice");
        assert!(!session.is_superuser().unwrap());
        session.execute("RESET role").unwrap();
        assert_eq!(session.current_user().name, "tle_bootstrap");

        session.execute("SET ROLE alice").unwrap();
        session.session_user = session.current_user.clone();
        let err = session.execute("SET ROLE bob").unwrap_err();
        assert_eq!(err.to_string(), "permission denied to set role \"bob\"");
    }

    #[test]
    fn test_notice_filtering() {
        let mut session = Session::open_in_memory().unwrap();
        session.notice(MessageLevel::Debug, "hidden", None);
        session.notice(MessageLevel::Notice, "shown", Some("hint".to_string()));
        let notices = session.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].hint.as_deref(), Some("hint"));
        assert!(session.take_notices().is_empty());
    }

    #[test]
    fn test_creation_namespace() {
        let mut session = Session::open_in_memory().unwrap();
        assert_eq!(session.creation_namespace().unwrap().1, "main");
        session.execute("SET search_path = nowhere, tle").unwrap();
        assert_eq!(session.creation_namespace().unwrap().1, "tle");
        session.execute("SET search_path = nowhere").unwrap();
        assert!(session.creation_namespace().is_err());
    }
}
