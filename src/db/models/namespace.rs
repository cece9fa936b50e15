// src/db/models/namespace.rs

//! Logical schemas

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub oid: Option<i64>,
    pub name: String,
    pub owner_oid: i64,
}

impl Namespace {
    pub fn new(name: String, owner_oid: i64) -> Self {
        Self {
            oid: None,
            name,
            owner_oid,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO tle_namespace (name, owner_oid) VALUES (?1, ?2)",
            params![&self.name, self.owner_oid],
        )?;

        let oid = conn.last_insert_rowid();
        self.oid = Some(oid);
        Ok(oid)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare("SELECT oid, name, owner_oid FROM tle_namespace WHERE name = ?1")?;
        let ns = stmt.query_row([name], Self::from_row).optional()?;
        Ok(ns)
    }

    pub fn find_by_oid(conn: &Connection, oid: i64) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare("SELECT oid, name, owner_oid FROM tle_namespace WHERE oid = ?1")?;
        let ns = stmt.query_row([oid], Self::from_row).optional()?;
        Ok(ns)
    }

    /// Oid of a schema, if it exists
    pub fn lookup_oid(conn: &Connection, name: &str) -> Result<Option<i64>> {
        Ok(Self::find_by_name(conn, name)?.and_then(|ns| ns.oid))
    }

    /// Name of a schema that must exist
    pub fn name_of(conn: &Connection, oid: i64) -> Result<String> {
        Self::find_by_oid(conn, oid)?
            .map(|ns| ns.name)
            .ok_or_else(|| Error::Internal(format!("cache lookup failed for schema {}", oid)))
    }

    pub fn list_names(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT name FROM tle_namespace ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            oid: Some(row.get(0)?),
            name: row.get(1)?,
            owner_oid: row.get(2)?,
        })
    }
}
