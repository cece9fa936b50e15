// src/db/migrations.rs
//! Catalog migrations
//!
//! Each function upgrades the catalog by exactly one version.

use crate::error::Result;
use rusqlite::Connection;
use tracing::debug;

/// Initial catalog - Version 1
///
/// Creates the host catalog:
/// - tle_role / tle_role_member: roles and role membership
/// - tle_namespace: logical schemas
/// - tle_proc: stored functions (virtual files live here)
/// - tle_extension: installed extension instances
/// - tle_depend: dependency edges between extensions and functions; 'n' is a
///   normal edge, 'e' marks a function as a member of an extension
pub fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating catalog version 1");

    conn.execute_batch(
        "
        CREATE TABLE tle_role (
            oid INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            superuser INTEGER NOT NULL DEFAULT 0,
            can_create INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE tle_role_member (
            role_oid INTEGER NOT NULL,
            member_oid INTEGER NOT NULL,
            PRIMARY KEY (role_oid, member_oid),
            FOREIGN KEY (role_oid) REFERENCES tle_role(oid) ON DELETE CASCADE,
            FOREIGN KEY (member_oid) REFERENCES tle_role(oid) ON DELETE CASCADE
        );

        CREATE TABLE tle_namespace (
            oid INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            owner_oid INTEGER NOT NULL,
            FOREIGN KEY (owner_oid) REFERENCES tle_role(oid)
        );

        -- Stored functions. arg_types is a JSON array of normalized type names.
        CREATE TABLE tle_proc (
            oid INTEGER PRIMARY KEY AUTOINCREMENT,
            namespace_oid INTEGER NOT NULL,
            name TEXT NOT NULL,
            arg_types TEXT NOT NULL DEFAULT '[]',
            return_type TEXT NOT NULL,
            language TEXT NOT NULL,
            body TEXT NOT NULL,
            owner_oid INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(namespace_oid, name, arg_types),
            FOREIGN KEY (namespace_oid) REFERENCES tle_namespace(oid),
            FOREIGN KEY (owner_oid) REFERENCES tle_role(oid)
        );

        CREATE INDEX idx_tle_proc_name ON tle_proc(name);

        -- requires, config_tables and config_conditions are JSON arrays
        CREATE TABLE tle_extension (
            oid INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            owner_oid INTEGER NOT NULL,
            namespace_oid INTEGER NOT NULL,
            relocatable INTEGER NOT NULL DEFAULT 0,
            version TEXT NOT NULL,
            requires TEXT NOT NULL DEFAULT '[]',
            config_tables TEXT,
            config_conditions TEXT,
            comment TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (owner_oid) REFERENCES tle_role(oid),
            FOREIGN KEY (namespace_oid) REFERENCES tle_namespace(oid)
        );

        CREATE TABLE tle_depend (
            classid TEXT NOT NULL CHECK(classid IN ('extension', 'function')),
            objid INTEGER NOT NULL,
            refclassid TEXT NOT NULL CHECK(refclassid IN ('extension', 'function')),
            refobjid INTEGER NOT NULL,
            deptype TEXT NOT NULL CHECK(deptype IN ('n', 'e')),
            PRIMARY KEY (classid, objid, refclassid, refobjid, deptype)
        );

        CREATE INDEX idx_tle_depend_ref ON tle_depend(refclassid, refobjid);
        ",
    )?;

    Ok(())
}

/// Version 2
///
/// Adds member-object tracking for extension scripts and the feature
/// registry shared with the hook subsystem.
pub fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Creating catalog version 2");

    conn.execute_batch(
        "
        CREATE TABLE tle_extension_member (
            extension_oid INTEGER NOT NULL,
            object_type TEXT NOT NULL CHECK(object_type IN ('table', 'view', 'index', 'trigger')),
            schema_name TEXT NOT NULL,
            object_name TEXT NOT NULL,
            PRIMARY KEY (object_type, schema_name, object_name),
            FOREIGN KEY (extension_oid) REFERENCES tle_extension(oid) ON DELETE CASCADE
        );

        CREATE INDEX idx_tle_extension_member_ext ON tle_extension_member(extension_oid);

        CREATE TABLE tle_feature_info (
            feature TEXT NOT NULL CHECK(feature IN ('passcheck', 'clientauth')),
            schema_name TEXT NOT NULL,
            proname TEXT NOT NULL,
            obj_identity TEXT NOT NULL,
            PRIMARY KEY (feature, schema_name, proname)
        );
        ",
    )?;

    Ok(())
}
