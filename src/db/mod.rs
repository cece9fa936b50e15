// src/db/mod.rs

//! Catalog database access
//!
//! The catalog is a single SQLite database. `init` creates it and seeds the
//! roles and namespaces every session relies on; `open` only opens it.

pub mod migrations;
pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use models::{Namespace, Role};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

/// Default schema for client objects
pub const DEFAULT_NAMESPACE: &str = "main";

/// Reserved schema holding virtual files and management functions
pub const TLE_NAMESPACE: &str = "tle";

/// Role whose members may call the management functions
pub const TLE_ADMIN_ROLE: &str = "tle_admin";

/// Create the database file, run migrations and seed the catalog
pub fn init(db_path: &Path, bootstrap_role: &str) -> Result<()> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let conn = open(db_path)?;
    schema::migrate(&conn)?;
    seed_catalog(&conn, bootstrap_role)?;
    info!("Initialized catalog at {}", db_path.display());
    Ok(())
}

/// Open an existing catalog database
pub fn open(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    Ok(conn)
}

/// Open a throwaway in-memory catalog, migrated and seeded
pub fn open_in_memory(bootstrap_role: &str) -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    seed_catalog(&conn, bootstrap_role)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

/// Seed the bootstrap superuser, the admin role and the fixed namespaces.
/// Safe to call repeatedly.
pub fn seed_catalog(conn: &Connection, bootstrap_role: &str) -> Result<()> {
    let bootstrap_oid = match Role::find_by_name(conn, bootstrap_role)? {
        Some(role) => role.oid.ok_or_else(|| Error::Internal("role without oid".to_string()))?,
        None => {
            let mut role = Role::new(bootstrap_role.to_string());
            role.superuser = true;
            role.can_create = true;
            debug!("Creating bootstrap role {}", bootstrap_role);
            role.insert(conn)?
        }
    };

    let admin_oid = match Role::find_by_name(conn, TLE_ADMIN_ROLE)? {
        Some(role) => role.oid.ok_or_else(|| Error::Internal("role without oid".to_string()))?,
        None => Role::new(TLE_ADMIN_ROLE.to_string()).insert(conn)?,
    };

    // The reserved schema belongs to the admin role
    for (name, owner) in [(DEFAULT_NAMESPACE, bootstrap_oid), (TLE_NAMESPACE, admin_oid)] {
        if Namespace::find_by_name(conn, name)?.is_none() {
            Namespace::new(name.to_string(), owner).insert(conn)?;
        }
    }

    Ok(())
}
