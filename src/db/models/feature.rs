// src/db/models/feature.rs

//! Feature registry rows

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

/// Hook points a registered function can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Passcheck,
    Clientauth,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Passcheck => "passcheck",
            Feature::Clientauth => "clientauth",
        }
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "passcheck" => Ok(Feature::Passcheck),
            "clientauth" => Ok(Feature::Clientauth),
            _ => Err(format!("Invalid feature: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureEntry {
    pub feature: String,
    pub schema_name: String,
    pub proname: String,
    /// `schema.name(args)` of the registered function
    pub obj_identity: String,
}

impl FeatureEntry {
    pub fn new(feature: Feature, schema_name: String, proname: String, obj_identity: String) -> Self {
        Self {
            feature: feature.as_str().to_string(),
            schema_name,
            proname,
            obj_identity,
        }
    }

    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO tle_feature_info (feature, schema_name, proname, obj_identity)
             VALUES (?1, ?2, ?3, ?4)",
            params![&self.feature, &self.schema_name, &self.proname, &self.obj_identity],
        )?;
        Ok(())
    }

    pub fn find(
        conn: &Connection,
        feature: Feature,
        schema_name: &str,
        proname: &str,
    ) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT feature, schema_name, proname, obj_identity FROM tle_feature_info
             WHERE feature = ?1 AND schema_name = ?2 AND proname = ?3",
        )?;
        let entry = stmt
            .query_row(params![feature.as_str(), schema_name, proname], Self::from_row)
            .optional()?;
        Ok(entry)
    }

    pub fn list_for_feature(conn: &Connection, feature: Feature) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT feature, schema_name, proname, obj_identity FROM tle_feature_info
             WHERE feature = ?1 ORDER BY schema_name, proname",
        )?;
        let entries = stmt
            .query_map([feature.as_str()], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Features a function is registered for
    pub fn features_for_function(
        conn: &Connection,
        schema_name: &str,
        proname: &str,
    ) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT feature FROM tle_feature_info WHERE schema_name = ?1 AND proname = ?2
             ORDER BY feature",
        )?;
        let features = stmt
            .query_map(params![schema_name, proname], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(features)
    }

    pub fn delete(conn: &Connection, feature: Feature, schema_name: &str, proname: &str) -> Result<bool> {
        let removed = conn.execute(
            "DELETE FROM tle_feature_info WHERE feature = ?1 AND schema_name = ?2 AND proname = ?3",
            params![feature.as_str(), schema_name, proname],
        )?;
        Ok(removed > 0)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            feature: row.get(0)?,
            schema_name: row.get(1)?,
            proname: row.get(2)?,
            obj_identity: row.get(3)?,
        })
    }
}
