// src/db/models/role.rs

//! Roles and role membership

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub oid: Option<i64>,
    pub name: String,
    pub superuser: bool,
    /// Ordinary object-creation privilege on the database
    pub can_create: bool,
}

impl Role {
    pub fn new(name: String) -> Self {
        Self {
            oid: None,
            name,
            superuser: false,
            can_create: false,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        if Self::find_by_name(conn, &self.name)?.is_some() {
            return Err(Error::DuplicateObject(format!(
                "role \"{}\" already exists",
                self.name
            )));
        }

        conn.execute(
            "INSERT INTO tle_role (name, superuser, can_create) VALUES (?1, ?2, ?3)",
            params![&self.name, self.superuser, self.can_create],
        )?;

        let oid = conn.last_insert_rowid();
        self.oid = Some(oid);
        Ok(oid)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare("SELECT oid, name, superuser, can_create FROM tle_role WHERE name = ?1")?;
        let role = stmt.query_row([name], Self::from_row).optional()?;
        Ok(role)
    }

    pub fn find_by_oid(conn: &Connection, oid: i64) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare("SELECT oid, name, superuser, can_create FROM tle_role WHERE oid = ?1")?;
        let role = stmt.query_row([oid], Self::from_row).optional()?;
        Ok(role)
    }

    /// Look up a role that must exist
    pub fn get(conn: &Connection, oid: i64) -> Result<Self> {
        Self::find_by_oid(conn, oid)?
            .ok_or_else(|| Error::Internal(format!("cache lookup failed for role {}", oid)))
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT oid, name, superuser, can_create FROM tle_role ORDER BY name")?;
        let roles = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(roles)
    }

    /// Make `member_oid` a member of `role_oid`
    pub fn grant_membership(conn: &Connection, role_oid: i64, member_oid: i64) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO tle_role_member (role_oid, member_oid) VALUES (?1, ?2)",
            params![role_oid, member_oid],
        )?;
        Ok(())
    }

    pub fn revoke_membership(conn: &Connection, role_oid: i64, member_oid: i64) -> Result<()> {
        conn.execute(
            "DELETE FROM tle_role_member WHERE role_oid = ?1 AND member_oid = ?2",
            params![role_oid, member_oid],
        )?;
        Ok(())
    }

    /// Names of the roles `member_oid` was granted directly
    pub fn member_of(conn: &Connection, member_oid: i64) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT r.name FROM tle_role_member m JOIN tle_role r ON r.oid = m.role_oid
             WHERE m.member_oid = ?1 ORDER BY r.name",
        )?;
        let names = stmt
            .query_map([member_oid], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// True if `member_oid` holds the privileges of `role_oid`: it is that
    /// role, a direct or indirect member of it, or a superuser.
    pub fn has_privs_of(conn: &Connection, member_oid: i64, role_oid: i64) -> Result<bool> {
        if member_oid == role_oid {
            return Ok(true);
        }
        if Self::get(conn, member_oid)?.superuser {
            return Ok(true);
        }

        let found: Option<i64> = conn
            .query_row(
                "WITH RECURSIVE granted(oid) AS (
                     SELECT role_oid FROM tle_role_member WHERE member_oid = ?1
                     UNION
                     SELECT m.role_oid FROM tle_role_member m JOIN granted g ON m.member_oid = g.oid
                 )
                 SELECT oid FROM granted WHERE oid = ?2",
                params![member_oid, role_oid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            oid: Some(row.get(0)?),
            name: row.get(1)?,
            superuser: row.get(2)?,
            can_create: row.get(3)?,
        })
    }
}
