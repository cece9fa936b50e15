// src/extension/control.rs

//! Extension control metadata
//!
//! A primary control file (`name.control`) gives the defaults for every
//! version; an auxiliary file (`name--version.control`) overrides fields for
//! one version and may not set `directory` or `default_version`.

use crate::conf::parse_config_text;
use crate::error::{Error, Result};
use crate::settings::parse_bool;
use crate::sql::quote_literal;

/// Most entries a stored extension may list in `requires`
pub const REQUIRES_LIMIT: usize = 1024;

/// Source encoding of a script file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Latin1,
    SqlAscii,
}

impl Encoding {
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "UTF8" | "UNICODE" => Some(Encoding::Utf8),
            "LATIN1" | "ISO88591" => Some(Encoding::Latin1),
            "SQLASCII" => Some(Encoding::SqlAscii),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF8",
            Encoding::Latin1 => "LATIN1",
            Encoding::SqlAscii => "SQL_ASCII",
        }
    }

    /// Convert script bytes to the database encoding
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| {
                Error::InvalidParameter(format!(
                    "invalid byte sequence for encoding \"UTF8\" at offset {}",
                    e.utf8_error().valid_up_to()
                ))
            }),
            Encoding::Latin1 => Ok(bytes.iter().map(|b| char::from(*b)).collect()),
            Encoding::SqlAscii => Ok(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionControl {
    pub name: String,
    /// Script directory for file-based extensions
    pub directory: Option<String>,
    pub default_version: Option<String>,
    pub module_pathname: Option<String>,
    pub comment: Option<String>,
    pub schema: Option<String>,
    pub relocatable: bool,
    pub superuser: bool,
    pub trusted: bool,
    /// `None` means the database encoding
    pub encoding: Option<Encoding>,
    pub requires: Vec<String>,
}

impl ExtensionControl {
    /// Defaults before any control file is read
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            directory: None,
            default_version: None,
            module_pathname: None,
            comment: None,
            schema: None,
            relocatable: false,
            superuser: true,
            trusted: false,
            encoding: None,
            requires: Vec::new(),
        }
    }

    /// Overwrite fields from control file text. `file_name` is used in
    /// messages; `auxiliary` rejects the primary-only keys.
    pub fn apply(&mut self, text: &str, file_name: &str, auxiliary: bool) -> Result<()> {
        for item in parse_config_text(text, file_name)? {
            let primary_only = || {
                if auxiliary {
                    Err(Error::syntax(format!(
                        "parameter \"{}\" cannot be set in a secondary extension control file",
                        item.name
                    )))
                } else {
                    Ok(())
                }
            };
            let boolean = || {
                parse_bool(&item.value).ok_or_else(|| {
                    Error::InvalidParameter(format!(
                        "parameter \"{}\" requires a Boolean value",
                        item.name
                    ))
                })
            };

            match item.name.as_str() {
                "directory" => {
                    primary_only()?;
                    self.directory = Some(item.value.clone());
                }
                "default_version" => {
                    primary_only()?;
                    self.default_version = Some(item.value.clone());
                }
                "module_pathname" => self.module_pathname = Some(item.value.clone()),
                "comment" => self.comment = Some(item.value.clone()),
                "schema" => self.schema = Some(item.value.clone()),
                "relocatable" => self.relocatable = boolean()?,
                "superuser" => self.superuser = boolean()?,
                "trusted" => self.trusted = boolean()?,
                "encoding" => {
                    let encoding = Encoding::from_name(&item.value).ok_or_else(|| {
                        Error::undefined(format!("\"{}\" is not a valid encoding name", item.value))
                    })?;
                    self.encoding = Some(encoding);
                }
                "requires" => {
                    self.requires = split_identifier_list(&item.value).ok_or_else(|| {
                        Error::InvalidParameter(format!(
                            "parameter \"{}\" must be a list of extension names",
                            item.name
                        ))
                    })?;
                }
                other => {
                    return Err(Error::syntax(format!(
                        "unrecognized parameter \"{}\" in file \"{}\"",
                        other, file_name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Stored extensions cannot ship modules, move, or run as superuser
    pub fn force_stored_values(&mut self) -> Result<()> {
        self.directory = None;
        self.module_pathname = None;
        self.relocatable = false;
        self.superuser = false;
        self.trusted = false;
        self.encoding = None;
        self.schema = None;

        if self.requires.len() > REQUIRES_LIMIT {
            return Err(Error::DataException(format!(
                "\"requires\" limited to {} entries for \"{}\" extensions",
                REQUIRES_LIMIT,
                crate::db::TLE_NAMESPACE
            )));
        }
        Ok(())
    }

    /// Cross-field checks run after every parse
    pub fn validate(&self) -> Result<()> {
        if self.relocatable && self.schema.is_some() {
            return Err(Error::syntax(
                "parameter \"schema\" cannot be specified when \"relocatable\" is true",
            ));
        }
        Ok(())
    }

    /// Render the text of a stored control file
    pub fn to_stored_text(&self) -> String {
        let mut text = String::new();
        if let Some(version) = &self.default_version {
            text.push_str(&format!("default_version = {}\n", quote_literal(version)));
        }
        text.push_str(&format!(
            "comment = {}\n",
            quote_literal(self.comment.as_deref().unwrap_or(""))
        ));
        text.push_str("relocatable = false\nsuperuser = false\ntrusted = false\n");
        if !self.requires.is_empty() {
            text.push_str(&format!(
                "requires = {}\n",
                quote_literal(&self.requires.join(","))
            ));
        }
        text
    }
}

/// Split `a, "B", c` into identifiers; unquoted names are lowercased.
/// Returns `None` on an empty entry or an unterminated quote.
pub fn split_identifier_list(text: &str) -> Option<Vec<String>> {
    let mut names = Vec::new();
    let mut chars = text.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            // An empty value means no entries; a trailing comma is an error
            return if names.is_empty() { Some(names) } else { None };
        }

        let mut name = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next()? {
                    '"' if chars.peek() == Some(&'"') => {
                        chars.next();
                        name.push('"');
                    }
                    '"' => break,
                    c => name.push(c),
                }
            }
            if name.is_empty() {
                return None;
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' || c.is_whitespace() {
                    break;
                }
                name.push(c.to_ascii_lowercase());
                chars.next();
            }
            if name.is_empty() {
                return None;
            }
        }
        names.push(name);

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => return Some(names),
            Some(',') => continue,
            Some(_) => return None,
        }
    }
}
