// src/extension/available.rs

//! Listings of stored extensions, their versions and update paths

use super::control::ExtensionControl;
use super::graph::VersionGraph;
use super::source::ExtensionSource;
use crate::error::{Error, Result};
use crate::sql::{QueryResult, Value};
use rusqlite::Connection;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableExtension {
    pub name: String,
    pub default_version: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableVersion {
    pub name: String,
    pub version: String,
    pub superuser: bool,
    pub trusted: bool,
    pub relocatable: bool,
    pub schema: Option<String>,
    pub requires: Vec<String>,
    pub comment: Option<String>,
}

impl AvailableVersion {
    fn from_control(control: &ExtensionControl, version: &str) -> Self {
        Self {
            name: control.name.clone(),
            version: version.to_string(),
            superuser: control.superuser,
            trusted: control.trusted,
            relocatable: control.relocatable,
            schema: control.schema.clone(),
            requires: control.requires.clone(),
            comment: control.comment.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatePath {
    pub source: String,
    pub target: String,
    /// `a--b--c`, or `None` when there is no path
    pub path: Option<String>,
}

/// Primary controls of every stored extension; unreadable ones are skipped
fn stored_controls(conn: &Connection) -> Result<Vec<ExtensionControl>> {
    let source = ExtensionSource::Stored;
    let mut controls = Vec::new();
    for name in source.control_names(conn)? {
        if super::names::check_valid_extension_name(&name).is_err() {
            continue;
        }
        match source.read_control(conn, &name) {
            Ok(control) => controls.push(control),
            Err(e) => warn!("Skipping stored extension {}: {}", name, e),
        }
    }
    Ok(controls)
}

pub fn available_extensions(conn: &Connection) -> Result<Vec<AvailableExtension>> {
    Ok(stored_controls(conn)?
        .into_iter()
        .map(|c| AvailableExtension {
            name: c.name,
            default_version: c.default_version,
            comment: c.comment,
        })
        .collect())
}

/// Versions of one extension. Each installable version is followed by the
/// versions whose best install path starts from it. Every row reads the
/// primary control overlaid with that version's own auxiliary control.
pub fn extension_versions(conn: &Connection, control: &ExtensionControl) -> Result<Vec<AvailableVersion>> {
    let source = ExtensionSource::Stored;
    let names = source.script_names(conn, control)?;
    let mut graph = VersionGraph::build(&control.name, &names);
    let ids: Vec<_> = graph.nodes().map(|(id, _)| id).collect();

    let mut rows = Vec::new();
    for &start in &ids {
        if !graph.node(start).installable {
            continue;
        }
        let version = graph.node(start).name.clone();
        let start_control = source.read_aux_control(conn, control, &version)?;
        rows.push(AvailableVersion::from_control(&start_control, &version));

        for &other in &ids {
            if graph.node(other).installable {
                continue;
            }
            if graph.find_install_path(other).map(|(best, _)| best) != Some(start) {
                continue;
            }
            let reached = graph.node(other).name.clone();
            let aux = source.read_aux_control(conn, control, &reached)?;
            rows.push(AvailableVersion::from_control(&aux, &reached));
        }
    }
    Ok(rows)
}

pub fn available_extension_versions(conn: &Connection) -> Result<Vec<AvailableVersion>> {
    let mut rows = Vec::new();
    for control in stored_controls(conn)? {
        rows.extend(extension_versions(conn, &control)?);
    }
    Ok(rows)
}

/// Every ordered pair of distinct versions with the path between them
pub fn extension_update_paths(conn: &Connection, name: &str) -> Result<Vec<UpdatePath>> {
    super::names::check_valid_extension_name(name)?;
    let source = ExtensionSource::Stored;
    if !source.control_exists(conn, name)? {
        return Err(Error::undefined(format!("extension \"{}\" is not installed", name)));
    }
    let control = source.read_control(conn, name)?;
    let names = source.script_names(conn, &control)?;
    let mut graph = VersionGraph::build(name, &names);

    let ids: Vec<_> = graph.nodes().map(|(id, _)| id).collect();
    let mut rows = Vec::new();
    for &from in &ids {
        for &to in &ids {
            if from == to {
                continue;
            }
            let path = graph.find_update_path(from, to, false).map(|steps| {
                let mut all = vec![graph.node(from).name.clone()];
                all.extend(steps);
                all.join("--")
            });
            rows.push(UpdatePath {
                source: graph.node(from).name.clone(),
                target: graph.node(to).name.clone(),
                path,
            });
        }
    }
    Ok(rows)
}

fn opt_text(value: &Option<String>) -> Value {
    value.as_ref().map_or(Value::Null, |v| Value::Text(v.clone()))
}

pub fn extensions_result(rows: &[AvailableExtension]) -> QueryResult {
    QueryResult::table(
        &["name", "default_version", "comment"],
        rows.iter()
            .map(|r| vec![Value::Text(r.name.clone()), opt_text(&r.default_version), opt_text(&r.comment)])
            .collect(),
    )
}

pub fn versions_result(rows: &[AvailableVersion]) -> QueryResult {
    QueryResult::table(
        &["name", "version", "superuser", "trusted", "relocatable", "schema", "requires", "comment"],
        rows.iter()
            .map(|r| {
                vec![
                    Value::Text(r.name.clone()),
                    Value::Text(r.version.clone()),
                    Value::Bool(r.superuser),
                    Value::Bool(r.trusted),
                    Value::Bool(r.relocatable),
                    opt_text(&r.schema),
                    Value::Array(r.requires.iter().map(|s| Value::Text(s.clone())).collect()),
                    opt_text(&r.comment),
                ]
            })
            .collect(),
    )
}

pub fn update_paths_result(rows: &[UpdatePath]) -> QueryResult {
    QueryResult::table(
        &["source", "target", "path"],
        rows.iter()
            .map(|r| vec![Value::Text(r.source.clone()), Value::Text(r.target.clone()), opt_text(&r.path)])
            .collect(),
    )
}
