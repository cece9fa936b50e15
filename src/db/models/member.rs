// src/db/models/member.rs

//! Relations created by extension scripts

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionMember {
    pub extension_oid: i64,
    /// `table`, `view`, `index` or `trigger`, as in `sqlite_master.type`
    pub object_type: String,
    pub schema_name: String,
    pub object_name: String,
}

impl ExtensionMember {
    pub fn new(
        extension_oid: i64,
        object_type: String,
        schema_name: String,
        object_name: String,
    ) -> Self {
        Self {
            extension_oid,
            object_type,
            schema_name,
            object_name,
        }
    }

    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO tle_extension_member
                 (extension_oid, object_type, schema_name, object_name)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.extension_oid,
                &self.object_type,
                &self.schema_name,
                &self.object_name,
            ],
        )?;
        Ok(())
    }

    pub fn list_for_extension(conn: &Connection, extension_oid: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT extension_oid, object_type, schema_name, object_name
             FROM tle_extension_member WHERE extension_oid = ?1
             ORDER BY object_type, object_name",
        )?;
        let members = stmt
            .query_map([extension_oid], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(members)
    }

    /// Extension owning a relation, if any
    pub fn owning_extension(conn: &Connection, object_type: &str, object_name: &str) -> Result<Option<i64>> {
        let oid = conn
            .query_row(
                "SELECT extension_oid FROM tle_extension_member
                 WHERE object_type = ?1 AND object_name = ?2",
                params![object_type, object_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(oid)
    }

    /// Forget members whose objects no longer exist
    pub fn prune_missing(conn: &Connection) -> Result<usize> {
        let removed = conn.execute(
            "DELETE FROM tle_extension_member
             WHERE NOT EXISTS (
                 SELECT 1 FROM sqlite_master m
                 WHERE m.type = tle_extension_member.object_type
                   AND m.name = tle_extension_member.object_name
             )",
            [],
        )?;
        Ok(removed)
    }

    pub fn delete_for_extension(conn: &Connection, extension_oid: i64) -> Result<()> {
        conn.execute(
            "DELETE FROM tle_extension_member WHERE extension_oid = ?1",
            [extension_oid],
        )?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            extension_oid: row.get(0)?,
            object_type: row.get(1)?,
            schema_name: row.get(2)?,
            object_name: row.get(3)?,
        })
    }
}
