// src/db/models/depend.rs

//! Dependency edges between catalog objects

use crate::error::Result;
use rusqlite::{Connection, Row, params};
use std::str::FromStr;

/// Kind of object on either end of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Extension,
    Function,
}

impl ObjectClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectClass::Extension => "extension",
            ObjectClass::Function => "function",
        }
    }
}

impl FromStr for ObjectClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "extension" => Ok(ObjectClass::Extension),
            "function" => Ok(ObjectClass::Function),
            _ => Err(format!("Invalid object class: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyType {
    /// Referenced object cannot be dropped without dropping the dependent
    Normal,
    /// Dependent object is a member of the referenced extension
    Extension,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::Normal => "n",
            DependencyType::Extension => "e",
        }
    }
}

impl FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "n" => Ok(DependencyType::Normal),
            "e" => Ok(DependencyType::Extension),
            _ => Err(format!("Invalid dependency type: {s}")),
        }
    }
}

/// One edge: (classid, objid) depends on (refclassid, refobjid)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub classid: ObjectClass,
    pub objid: i64,
    pub refclassid: ObjectClass,
    pub refobjid: i64,
    pub deptype: DependencyType,
}

impl Dependency {
    pub fn new(
        classid: ObjectClass,
        objid: i64,
        refclassid: ObjectClass,
        refobjid: i64,
        deptype: DependencyType,
    ) -> Self {
        Self {
            classid,
            objid,
            refclassid,
            refobjid,
            deptype,
        }
    }

    /// Record the edge; recording an existing edge is a no-op
    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO tle_depend (classid, objid, refclassid, refobjid, deptype)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.classid.as_str(),
                self.objid,
                self.refclassid.as_str(),
                self.refobjid,
                self.deptype.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Edges going out of an object, optionally limited to one referenced class
    pub fn find_for_object(
        conn: &Connection,
        classid: ObjectClass,
        objid: i64,
        refclassid: Option<ObjectClass>,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT classid, objid, refclassid, refobjid, deptype FROM tle_depend
             WHERE classid = ?1 AND objid = ?2 AND (?3 IS NULL OR refclassid = ?3)
             ORDER BY refclassid, refobjid",
        )?;
        let deps = stmt
            .query_map(
                params![classid.as_str(), objid, refclassid.map(|c| c.as_str())],
                Self::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(deps)
    }

    /// Edges pointing at an object
    pub fn find_referencing(
        conn: &Connection,
        refclassid: ObjectClass,
        refobjid: i64,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT classid, objid, refclassid, refobjid, deptype FROM tle_depend
             WHERE refclassid = ?1 AND refobjid = ?2
             ORDER BY classid, objid",
        )?;
        let deps = stmt
            .query_map(params![refclassid.as_str(), refobjid], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(deps)
    }

    /// Delete edges going out of an object, optionally limited to one referenced class
    pub fn delete_for_object(
        conn: &Connection,
        classid: ObjectClass,
        objid: i64,
        refclassid: Option<ObjectClass>,
    ) -> Result<usize> {
        let removed = conn.execute(
            "DELETE FROM tle_depend
             WHERE classid = ?1 AND objid = ?2 AND (?3 IS NULL OR refclassid = ?3)",
            params![classid.as_str(), objid, refclassid.map(|c| c.as_str())],
        )?;
        Ok(removed)
    }

    /// Delete every edge pointing at an object
    pub fn delete_referencing(
        conn: &Connection,
        refclassid: ObjectClass,
        refobjid: i64,
    ) -> Result<usize> {
        let removed = conn.execute(
            "DELETE FROM tle_depend WHERE refclassid = ?1 AND refobjid = ?2",
            params![refclassid.as_str(), refobjid],
        )?;
        Ok(removed)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let classid: String = row.get(0)?;
        let refclassid: String = row.get(2)?;
        let deptype: String = row.get(4)?;
        let conversion = |col: usize, e: String| {
            rusqlite::Error::FromSqlConversionFailure(
                col,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        };

        Ok(Self {
            classid: classid.parse().map_err(|e| conversion(0, e))?,
            objid: row.get(1)?,
            refclassid: refclassid.parse().map_err(|e| conversion(2, e))?,
            refobjid: row.get(3)?,
            deptype: deptype.parse().map_err(|e| conversion(4, e))?,
        })
    }
}
