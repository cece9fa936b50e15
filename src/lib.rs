// src/lib.rs

//! tlext: trusted language extensions for SQLite
//!
//! A catalog of roles, schemas, functions and extensions kept in one SQLite
//! database, with an extension engine that installs extensions either from
//! control files on disk or from control files and scripts stored as
//! functions in the reserved `tle` schema.
//!
//! # Architecture
//!
//! - Sessions: every client statement goes through an interceptor chain
//! - Catalog: roles, namespaces, functions, extensions and dependency edges
//! - Extension engine: control files, version graph, script runner
//! - Management functions: `tle.install_extension` and friends, callable
//!   from SQL once the `tle` extension is installed
//! - Feature registry: hook functions for password checks and client auth

pub mod conf;
pub mod config;
pub mod db;
mod error;
pub mod executor;
pub mod extension;
pub mod feature;
pub mod interceptor;
pub mod session;
pub mod settings;
pub mod sql;

pub use config::Config;
pub use error::{Error, Result};
pub use extension::{AvailableExtension, AvailableVersion, ExtensionControl, UpdatePath};
pub use session::Session;
pub use settings::{MessageLevel, Notice};
pub use sql::{QueryResult, Value};

#[cfg(test)]
pub(crate) mod testutil {
    use crate::config::Config;
    use crate::db::{self, models::Role};
    use crate::extension::{bootstrap, manage};
    use crate::session::Session;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// The shipped extension directory holding `tle.control`
    pub fn share_extension_dir() -> PathBuf {
        PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/share/extension"))
    }

    /// In-memory session with the engine extension installed
    pub fn session() -> Session {
        session_with_extension_dir(share_extension_dir())
    }

    /// In-memory session reading files from `dir`; the engine is installed
    /// when `dir` holds its control file
    pub fn session_with_extension_dir(dir: PathBuf) -> Session {
        let config = Config {
            db_path: PathBuf::from(":memory:"),
            extension_dir: dir,
            ..Config::default()
        };
        let conn = db::open_in_memory(&config.bootstrap_role).unwrap();
        let mut session = Session::open_with_connection(conn, config, None).unwrap();
        if bootstrap::engine_control_file_exists(session.config()) {
            bootstrap::install_engine(&mut session).unwrap();
        }
        session
    }

    /// Temporary extension directory with the engine files plus `files`
    pub fn extension_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for entry in std::fs::read_dir(share_extension_dir()).unwrap() {
            let entry = entry.unwrap();
            std::fs::copy(entry.path(), dir.path().join(entry.file_name())).unwrap();
        }
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    /// Store an extension whose description is its name
    pub fn install(session: &mut Session, name: &str, version: &str, script: &str, requires: &[&str]) {
        let requires: Vec<String> = requires.iter().map(|r| r.to_string()).collect();
        manage::install_extension(session, name, version, name, script, &requires).unwrap();
    }

    pub fn create_role(session: &Session, name: &str, can_create: bool) -> i64 {
        let mut role = Role::new(name.to_string());
        role.can_create = can_create;
        role.insert(session.conn()).unwrap()
    }
}
