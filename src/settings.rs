// src/settings.rs

//! Session settings with nestable save/restore
//!
//! Extension scripts run with relaxed settings. `new_nest_level` snapshots the
//! current values and `restore_nest_level` puts them back, whichever way the
//! script ends.

use crate::db::DEFAULT_NAMESPACE;
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Severity of a message sent back to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageLevel {
    Debug,
    Log,
    Info,
    Notice,
    Warning,
    Error,
}

impl MessageLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageLevel::Debug => "debug",
            MessageLevel::Log => "log",
            MessageLevel::Info => "info",
            MessageLevel::Notice => "notice",
            MessageLevel::Warning => "warning",
            MessageLevel::Error => "error",
        }
    }
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

impl FromStr for MessageLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "debug1" | "debug2" | "debug3" | "debug4" | "debug5" => Ok(MessageLevel::Debug),
            "log" => Ok(MessageLevel::Log),
            "info" => Ok(MessageLevel::Info),
            "notice" => Ok(MessageLevel::Notice),
            "warning" => Ok(MessageLevel::Warning),
            "error" => Ok(MessageLevel::Error),
            _ => Err(Error::InvalidParameter(format!(
                "invalid value for parameter \"client_min_messages\": \"{}\"",
                s
            ))),
        }
    }
}

/// A message queued for the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: MessageLevel,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Values {
    client_min_messages: MessageLevel,
    check_function_bodies: bool,
    search_path: Vec<String>,
}

impl Default for Values {
    fn default() -> Self {
        Self {
            client_min_messages: MessageLevel::Notice,
            check_function_bodies: true,
            search_path: vec![DEFAULT_NAMESPACE.to_string()],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    current: Values,
    stack: Vec<Values>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_min_messages(&self) -> MessageLevel {
        self.current.client_min_messages
    }

    pub fn check_function_bodies(&self) -> bool {
        self.current.check_function_bodies
    }

    pub fn search_path(&self) -> &[String] {
        &self.current.search_path
    }

    pub fn set_client_min_messages(&mut self, level: MessageLevel) {
        self.current.client_min_messages = level;
    }

    pub fn set_check_function_bodies(&mut self, on: bool) {
        self.current.check_function_bodies = on;
    }

    pub fn set_search_path(&mut self, path: Vec<String>) {
        self.current.search_path = path;
    }

    /// Apply `SET name = value`; `None` resets to the default
    pub fn set(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        let defaults = Values::default();
        match name {
            "client_min_messages" => {
                self.current.client_min_messages = match value {
                    Some(v) => v.parse()?,
                    None => defaults.client_min_messages,
                };
            }
            "check_function_bodies" => {
                self.current.check_function_bodies = match value {
                    Some(v) => parse_bool(v).ok_or_else(|| {
                        Error::InvalidParameter(
                            "parameter \"check_function_bodies\" requires a Boolean value"
                                .to_string(),
                        )
                    })?,
                    None => defaults.check_function_bodies,
                };
            }
            "search_path" => {
                self.current.search_path = match value {
                    Some(v) => parse_search_path(v),
                    None => defaults.search_path,
                };
            }
            other => {
                return Err(Error::undefined(format!(
                    "unrecognized configuration parameter \"{}\"",
                    other
                )));
            }
        }
        Ok(())
    }

    /// Current value as shown by `SHOW`
    pub fn show(&self, name: &str) -> Result<String> {
        match name {
            "client_min_messages" => Ok(self.current.client_min_messages.as_str().to_string()),
            "check_function_bodies" => Ok(if self.current.check_function_bodies { "on" } else { "off" }.to_string()),
            "search_path" => Ok(self.current.search_path.join(", ")),
            other => Err(Error::undefined(format!(
                "unrecognized configuration parameter \"{}\"",
                other
            ))),
        }
    }

    /// Snapshot the current values; returns the level to restore to
    pub fn new_nest_level(&mut self) -> usize {
        self.stack.push(self.current.clone());
        self.stack.len()
    }

    /// Restore the values saved by the matching `new_nest_level` and drop
    /// any deeper levels
    pub fn restore_nest_level(&mut self, level: usize) {
        if level == 0 || level > self.stack.len() {
            return;
        }
        self.stack.truncate(level);
        if let Some(saved) = self.stack.pop() {
            self.current = saved;
        }
    }

    pub fn nest_level(&self) -> usize {
        self.stack.len()
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" | "t" | "y" => Some(true),
        "false" | "off" | "no" | "0" | "f" | "n" => Some(false),
        _ => None,
    }
}

/// Split a `search_path` value; quoted entries keep their case
fn parse_search_path(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
                s[1..s.len() - 1].replace("\"\"", "\"")
            } else {
                s.to_lowercase()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nest_levels_restore() {
        let mut settings = Settings::new();
        let outer = settings.new_nest_level();
        settings.set_client_min_messages(MessageLevel::Warning);
        settings.set_search_path(vec!["ext".to_string()]);

        let inner = settings.new_nest_level();
        settings.set_check_function_bodies(false);
        assert_eq!(settings.nest_level(), 2);

        settings.restore_nest_level(inner);
        assert!(settings.check_function_bodies());
        assert_eq!(settings.client_min_messages(), MessageLevel::Warning);

        settings.restore_nest_level(outer);
        assert_eq!(settings.client_min_messages(), MessageLevel::Notice);
        assert_eq!(settings.search_path(), &["main".to_string()]);
        assert_eq!(settings.nest_level(), 0);
    }

    #[test]
    fn test_restoring_outer_level_discards_inner() {
        let mut settings = Settings::new();
        let outer = settings.new_nest_level();
        settings.set_check_function_bodies(false);
        settings.new_nest_level();
        settings.set_client_min_messages(MessageLevel::Error);

        settings.restore_nest_level(outer);
        assert!(settings.check_function_bodies());
        assert_eq!(settings.client_min_messages(), MessageLevel::Notice);
        assert_eq!(settings.nest_level(), 0);
    }

    #[test]
    fn test_set_and_show() {
        let mut settings = Settings::new();
        settings.set("search_path", Some("Ext, \"Mixed\"")).unwrap();
        assert_eq!(settings.show("search_path").unwrap(), "ext, Mixed");

        settings.set("client_min_messages", Some("WARNING")).unwrap();
        assert_eq!(settings.show("client_min_messages").unwrap(), "warning");
        settings.set("client_min_messages", None).unwrap();
        assert_eq!(settings.client_min_messages(), MessageLevel::Notice);

        assert!(settings.set("check_function_bodies", Some("maybe")).is_err());
        assert!(settings.set("work_mem", Some("1MB")).is_err());
    }

    #[test]
    fn test_level_ordering() {
        assert!(MessageLevel::Warning > MessageLevel::Notice);
        assert_eq!(MessageLevel::Notice.to_string(), "NOTICE");
    }
}
