// src/db/models/function.rs

//! Stored functions
//!
//! A `sql` function body is one query; calling the function runs it with
//! `$1..$n` bound to the arguments and returns the first column of the first
//! row. `internal` functions name a built-in routine instead.

use crate::error::{Error, Result};
use crate::sql::Value;
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "oid, namespace_oid, name, arg_types, return_type, language, body, owner_oid";

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub oid: Option<i64>,
    pub namespace_oid: i64,
    pub name: String,
    pub arg_types: Vec<String>,
    pub return_type: String,
    pub language: String,
    pub body: String,
    pub owner_oid: i64,
}

impl Function {
    pub fn new(namespace_oid: i64, name: String, owner_oid: i64) -> Self {
        Self {
            oid: None,
            namespace_oid,
            name,
            arg_types: Vec::new(),
            return_type: "text".to_string(),
            language: "sql".to_string(),
            body: String::new(),
            owner_oid,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO tle_proc (namespace_oid, name, arg_types, return_type, language, body, owner_oid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.namespace_oid,
                &self.name,
                serde_json::to_string(&self.arg_types)?,
                &self.return_type,
                &self.language,
                &self.body,
                self.owner_oid,
            ],
        )?;

        let oid = conn.last_insert_rowid();
        self.oid = Some(oid);
        Ok(oid)
    }

    /// Replace return type, language and body of an existing function
    pub fn update_definition(&self, conn: &Connection) -> Result<()> {
        let oid = self.require_oid()?;
        conn.execute(
            "UPDATE tle_proc SET return_type = ?1, language = ?2, body = ?3 WHERE oid = ?4",
            params![&self.return_type, &self.language, &self.body, oid],
        )?;
        Ok(())
    }

    pub fn find_by_oid(conn: &Connection, oid: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM tle_proc WHERE oid = ?1"))?;
        let func = stmt.query_row([oid], Self::from_row).optional()?;
        Ok(func)
    }

    /// Find by exact signature
    pub fn find(
        conn: &Connection,
        namespace_oid: i64,
        name: &str,
        arg_types: &[String],
    ) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM tle_proc WHERE namespace_oid = ?1 AND name = ?2 AND arg_types = ?3"
        ))?;
        let func = stmt
            .query_row(
                params![namespace_oid, name, serde_json::to_string(arg_types)?],
                Self::from_row,
            )
            .optional()?;
        Ok(func)
    }

    /// All overloads of a name in one schema
    pub fn find_by_name(conn: &Connection, namespace_oid: i64, name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM tle_proc WHERE namespace_oid = ?1 AND name = ?2 ORDER BY oid"
        ))?;
        let funcs = stmt
            .query_map(params![namespace_oid, name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(funcs)
    }

    /// Names of every function in a schema, sorted
    pub fn names_in_namespace(conn: &Connection, namespace_oid: i64) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT name FROM tle_proc WHERE namespace_oid = ?1 ORDER BY name",
        )?;
        let names = stmt
            .query_map([namespace_oid], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn rename(conn: &Connection, oid: i64, new_name: &str) -> Result<()> {
        conn.execute(
            "UPDATE tle_proc SET name = ?1 WHERE oid = ?2",
            params![new_name, oid],
        )?;
        Ok(())
    }

    pub fn set_owner(conn: &Connection, oid: i64, owner_oid: i64) -> Result<()> {
        conn.execute(
            "UPDATE tle_proc SET owner_oid = ?1 WHERE oid = ?2",
            params![owner_oid, oid],
        )?;
        Ok(())
    }

    pub fn set_namespace(conn: &Connection, oid: i64, namespace_oid: i64) -> Result<()> {
        conn.execute(
            "UPDATE tle_proc SET namespace_oid = ?1 WHERE oid = ?2",
            params![namespace_oid, oid],
        )?;
        Ok(())
    }

    pub fn delete(conn: &Connection, oid: i64) -> Result<()> {
        conn.execute("DELETE FROM tle_proc WHERE oid = ?1", [oid])?;
        Ok(())
    }

    /// `name(type, type)` as shown in messages
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.arg_types.join(", "))
    }

    /// Run a `sql` function body
    pub fn call_sql(&self, conn: &Connection, args: &[Value]) -> Result<Value> {
        let mut stmt = conn.prepare(&self.body)?;
        for (i, arg) in args.iter().enumerate() {
            if let Some(index) = stmt.parameter_index(&format!("${}", i + 1))? {
                stmt.raw_bind_parameter(index, arg)?;
            }
        }

        let mut rows = stmt.raw_query();
        match rows.next()? {
            Some(row) => Ok(Value::from(row.get_ref(0)?)),
            None => Ok(Value::Null),
        }
    }

    fn require_oid(&self) -> Result<i64> {
        self.oid
            .ok_or_else(|| Error::Internal(format!("function {} has no oid", self.name)))
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let arg_json: String = row.get(3)?;
        let arg_types = serde_json::from_str(&arg_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Self {
            oid: Some(row.get(0)?),
            namespace_oid: row.get(1)?,
            name: row.get(2)?,
            arg_types,
            return_type: row.get(4)?,
            language: row.get(5)?,
            body: row.get(6)?,
            owner_oid: row.get(7)?,
        })
    }
}
