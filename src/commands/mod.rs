// src/commands/mod.rs
//! Command handlers for the tlext CLI

mod exec;
mod extension;
mod feature;
mod role;

pub use exec::{cmd_exec, cmd_init};
pub use extension::{
    cmd_available, cmd_install, cmd_install_local, cmd_install_update_path, cmd_install_version,
    cmd_set_default_version, cmd_uninstall, cmd_uninstall_update_path, cmd_update_paths,
    cmd_versions,
};
pub use feature::{cmd_feature_list, cmd_feature_register, cmd_feature_unregister};
pub use role::{cmd_role_create, cmd_role_grant, cmd_role_list, cmd_role_revoke};

use anyhow::{Context as _, Result};
use tlext::{Config, QueryResult, Session, Value};

/// Options shared by every command
pub struct Context {
    pub config: Config,
    pub user: Option<String>,
    pub json: bool,
}

impl Context {
    /// Open a session on the configured catalog
    pub fn session(&self) -> Result<Session> {
        Session::open(self.config.clone(), self.user.as_deref())
            .with_context(|| format!("Failed to open catalog {}", self.config.db_path.display()))
    }
}

/// Print queued notices to stderr
pub fn print_notices(session: &mut Session) {
    for notice in session.take_notices() {
        eprintln!("{}:  {}", notice.level, notice.message);
        if let Some(hint) = &notice.hint {
            eprintln!("HINT:  {}", hint);
        }
    }
}

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(r) => serde_json::Value::from(*r),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(json_value).collect()),
    }
}

/// Rows as an array of objects keyed by column name
pub fn result_to_json(result: &QueryResult) -> serde_json::Value {
    let rows = result
        .rows
        .iter()
        .map(|row| {
            let object = result
                .columns
                .iter()
                .zip(row)
                .map(|(column, value)| (column.clone(), json_value(value)))
                .collect::<serde_json::Map<_, _>>();
            serde_json::Value::Object(object)
        })
        .collect();
    serde_json::Value::Array(rows)
}

/// Aligned text table, or the command tag for results without columns
pub fn format_result(result: &QueryResult) -> String {
    if result.columns.is_empty() {
        return result.tag.clone();
    }

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(Value::render).collect())
        .collect();
    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!(" {:<width$} ", value, width = *width))
            .collect::<Vec<_>>()
            .join("|")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::new();
    out.push(line(&result.columns));
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+"),
    );
    for row in &cells {
        out.push(line(row));
    }
    out.push(format!(
        "({} row{})",
        cells.len(),
        if cells.len() == 1 { "" } else { "s" }
    ));
    out.join("\n")
}

pub fn print_result(result: &QueryResult, json: bool) -> Result<()> {
    if json {
        if result.columns.is_empty() {
            println!("{}", serde_json::json!({ "tag": result.tag }));
        } else {
            println!("{}", serde_json::to_string_pretty(&result_to_json(result))?);
        }
    } else {
        println!("{}", format_result(result));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table() {
        let result = QueryResult::table(
            &["name", "version"],
            vec![vec![Value::Text("demo".into()), Value::Text("1.0".into())]],
        );
        let text = format_result(&result);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], " name | version");
        assert_eq!(lines[1], "------+---------");
        assert_eq!(lines[2], " demo | 1.0");
        assert_eq!(lines[3], "(1 row)");
    }

    #[test]
    fn test_json_rows() {
        let result = QueryResult::table(
            &["name", "requires"],
            vec![vec![
                Value::Text("demo".into()),
                Value::Array(vec![Value::Text("tle".into())]),
            ]],
        );
        assert_eq!(
            result_to_json(&result),
            serde_json::json!([{ "name": "demo", "requires": ["tle"] }])
        );
    }

    #[test]
    fn test_command_tag() {
        assert_eq!(format_result(&QueryResult::command("CREATE EXTENSION")), "CREATE EXTENSION");
    }
}
