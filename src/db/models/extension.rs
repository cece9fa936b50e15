// src/db/models/extension.rs

//! Installed extension instances

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "oid, name, owner_oid, namespace_oid, relocatable, version, requires, \
                       config_tables, config_conditions, comment";

/// One row of the extension catalog
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    pub oid: Option<i64>,
    pub name: String,
    pub owner_oid: i64,
    pub namespace_oid: i64,
    pub relocatable: bool,
    pub version: String,
    /// Oids of required extensions
    pub requires: Vec<i64>,
    /// Tables whose data is dumped with the extension
    pub config_tables: Option<Vec<String>>,
    pub config_conditions: Option<Vec<String>>,
    pub comment: Option<String>,
}

impl Extension {
    pub fn new(name: String, owner_oid: i64, namespace_oid: i64, version: String) -> Self {
        Self {
            oid: None,
            name,
            owner_oid,
            namespace_oid,
            relocatable: false,
            version,
            requires: Vec::new(),
            config_tables: None,
            config_conditions: None,
            comment: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO tle_extension
                 (name, owner_oid, namespace_oid, relocatable, version, requires,
                  config_tables, config_conditions, comment)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &self.name,
                self.owner_oid,
                self.namespace_oid,
                self.relocatable,
                &self.version,
                serde_json::to_string(&self.requires)?,
                self.config_tables.as_ref().map(serde_json::to_string).transpose()?,
                self.config_conditions.as_ref().map(serde_json::to_string).transpose()?,
                &self.comment,
            ],
        )?;

        let oid = conn.last_insert_rowid();
        self.oid = Some(oid);
        Ok(oid)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM tle_extension WHERE name = ?1"))?;
        let ext = stmt.query_row([name], Self::from_row).optional()?;
        Ok(ext)
    }

    pub fn find_by_oid(conn: &Connection, oid: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM tle_extension WHERE oid = ?1"))?;
        let ext = stmt.query_row([oid], Self::from_row).optional()?;
        Ok(ext)
    }

    /// Look up a row that must exist
    pub fn get(conn: &Connection, oid: i64) -> Result<Self> {
        Self::find_by_oid(conn, oid)?
            .ok_or_else(|| Error::Internal(format!("could not find tuple for extension {}", oid)))
    }

    pub fn oid_of(conn: &Connection, name: &str) -> Result<Option<i64>> {
        Ok(Self::find_by_name(conn, name)?.and_then(|e| e.oid))
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM tle_extension ORDER BY name"))?;
        let exts = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(exts)
    }

    /// Rewrite the fields an update step is allowed to change
    pub fn update_version(
        conn: &Connection,
        oid: i64,
        version: &str,
        relocatable: bool,
        requires: &[i64],
    ) -> Result<()> {
        let changed = conn.execute(
            "UPDATE tle_extension SET version = ?1, relocatable = ?2, requires = ?3 WHERE oid = ?4",
            params![version, relocatable, serde_json::to_string(requires)?, oid],
        )?;
        if changed == 0 {
            return Err(Error::Internal(format!(
                "could not find tuple for extension {}",
                oid
            )));
        }
        Ok(())
    }

    pub fn set_comment(conn: &Connection, oid: i64, comment: Option<&str>) -> Result<()> {
        conn.execute(
            "UPDATE tle_extension SET comment = ?1 WHERE oid = ?2",
            params![comment, oid],
        )?;
        Ok(())
    }

    pub fn set_config(
        conn: &Connection,
        oid: i64,
        tables: &[String],
        conditions: &[String],
    ) -> Result<()> {
        conn.execute(
            "UPDATE tle_extension SET config_tables = ?1, config_conditions = ?2 WHERE oid = ?3",
            params![
                serde_json::to_string(tables)?,
                serde_json::to_string(conditions)?,
                oid
            ],
        )?;
        Ok(())
    }

    pub fn delete(conn: &Connection, oid: i64) -> Result<()> {
        conn.execute("DELETE FROM tle_extension WHERE oid = ?1", [oid])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let requires: String = row.get(6)?;
        let tables: Option<String> = row.get(7)?;
        let conditions: Option<String> = row.get(8)?;

        Ok(Self {
            oid: Some(row.get(0)?),
            name: row.get(1)?,
            owner_oid: row.get(2)?,
            namespace_oid: row.get(3)?,
            relocatable: row.get(4)?,
            version: row.get(5)?,
            requires: parse_json(6, &requires)?,
            config_tables: tables.map(|t| parse_json(7, &t)).transpose()?,
            config_conditions: conditions.map(|c| parse_json(8, &c)).transpose()?,
            comment: row.get(9)?,
        })
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(column: usize, text: &str) -> rusqlite::Result<T> {
    serde_json::from_str(text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}
