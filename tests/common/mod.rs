// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tlext::db::models::Role;
use tlext::extension::{bootstrap, manage};
use tlext::{Config, Session};

/// Shipped extension directory holding the `tle` files
pub fn share_extension_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/share/extension"))
}

/// Create an initialized catalog in a temp directory.
///
/// The extension directory is a copy of the shipped one plus `files`.
/// Returns (TempDir, Config) - keep the TempDir alive to prevent cleanup.
pub fn setup_catalog(files: &[(&str, &str)]) -> (TempDir, Config) {
    let temp_dir = tempfile::tempdir().unwrap();
    let extension_dir = temp_dir.path().join("extension");
    std::fs::create_dir_all(&extension_dir).unwrap();

    for entry in std::fs::read_dir(share_extension_dir()).unwrap() {
        let entry = entry.unwrap();
        std::fs::copy(entry.path(), extension_dir.join(entry.file_name())).unwrap();
    }
    for (name, content) in files {
        std::fs::write(extension_dir.join(name), content).unwrap();
    }

    let config = Config {
        db_path: temp_dir.path().join("catalog.db"),
        extension_dir,
        ..Config::default()
    };
    bootstrap::initialize(&config).unwrap();
    (temp_dir, config)
}

/// Session on the catalog as `user`, or the bootstrap role
pub fn open(config: &Config, user: Option<&str>) -> Session {
    Session::open(config.clone(), user).unwrap()
}

/// Store an extension whose description is its name
pub fn install(session: &mut Session, name: &str, version: &str, script: &str, requires: &[&str]) {
    let requires: Vec<String> = requires.iter().map(|r| r.to_string()).collect();
    manage::install_extension(session, name, version, name, script, &requires).unwrap();
}

/// Create a role, optionally granting it `tle_admin`
pub fn create_role(session: &Session, name: &str, can_create: bool, admin: bool) -> i64 {
    let mut role = Role::new(name.to_string());
    role.can_create = can_create;
    let oid = role.insert(session.conn()).unwrap();
    if admin {
        let admin_oid = Role::find_by_name(session.conn(), "tle_admin")
            .unwrap()
            .unwrap()
            .oid
            .unwrap();
        Role::grant_membership(session.conn(), admin_oid, oid).unwrap();
    }
    oid
}

/// Number of rows `sql` returns
pub fn count(session: &mut Session, sql: &str) -> i64 {
    match session.query(sql).unwrap().first_value() {
        Some(tlext::Value::Integer(n)) => *n,
        other => panic!("unexpected count result {:?}", other),
    }
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
