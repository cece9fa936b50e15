// src/conf.rs

//! Parser for `name = value` configuration text
//!
//! This is the line format used by control files:
//!
//! ```text
//! # comment
//! default_version = '1.0'
//! relocatable = false
//! requires 'foo, bar'
//! ```
//!
//! The `=` is optional. Values are single-quoted strings (`''` and backslash
//! escapes), or unquoted words and numbers. Each item remembers its line.

use crate::error::{Error, Result};

/// One `name = value` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigItem {
    pub name: String,
    pub value: String,
    pub line: usize,
}

/// Parse configuration text; `source` names the input in error messages
pub fn parse_config_text(text: &str, source: &str) -> Result<Vec<ConfigItem>> {
    let mut items = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let mut cursor = LineCursor::new(raw_line);

        cursor.skip_blank();
        if cursor.at_end_or_comment() {
            continue;
        }

        let name = cursor
            .name()
            .ok_or_else(|| syntax_error(source, line_no, cursor.near()))?;

        cursor.skip_blank();
        if cursor.peek() == Some('=') {
            cursor.bump();
            cursor.skip_blank();
        }

        let value = cursor
            .value()
            .map_err(|_| syntax_error(source, line_no, cursor.near()))?
            .ok_or_else(|| syntax_error(source, line_no, cursor.near()))?;

        cursor.skip_blank();
        if !cursor.at_end_or_comment() {
            return Err(syntax_error(source, line_no, cursor.near()));
        }

        items.push(ConfigItem {
            name,
            value,
            line: line_no,
        });
    }

    Ok(items)
}

fn syntax_error(source: &str, line: usize, near: Option<String>) -> Error {
    let message = match near {
        Some(token) => format!(
            "syntax error in file \"{}\" line {}, near token \"{}\"",
            source, line, token
        ),
        None => format!(
            "syntax error in file \"{}\" line {}, near end of line",
            source, line
        ),
    };
    Error::Syntax {
        message,
        line: Some(line),
    }
}

struct LineCursor {
    chars: Vec<char>,
    pos: usize,
}

impl LineCursor {
    fn new(line: &str) -> Self {
        Self {
            chars: line.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_blank(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn at_end_or_comment(&self) -> bool {
        matches!(self.peek(), None | Some('#'))
    }

    /// Remaining token for error messages
    fn near(&self) -> Option<String> {
        let rest: String = self.chars[self.pos.min(self.chars.len())..]
            .iter()
            .take_while(|c| !c.is_whitespace())
            .collect();
        if rest.is_empty() { None } else { Some(rest) }
    }

    fn name(&mut self) -> Option<String> {
        let first = self.peek()?;
        if !(first.is_alphabetic() || first == '_') {
            return None;
        }
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '.') {
            self.pos += 1;
        }
        Some(self.chars[start..self.pos].iter().collect())
    }

    fn value(&mut self) -> std::result::Result<Option<String>, ()> {
        match self.peek() {
            None | Some('#') => Ok(None),
            Some('\'') => self.quoted().map(Some),
            Some(_) => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if is_unquoted_char(c)) {
                    self.pos += 1;
                }
                if self.pos == start {
                    return Ok(None);
                }
                Ok(Some(self.chars[start..self.pos].iter().collect()))
            }
        }
    }

    fn quoted(&mut self) -> std::result::Result<String, ()> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(()),
                Some('\'') => {
                    if self.peek() == Some('\'') {
                        self.bump();
                        out.push('\'');
                    } else {
                        return Ok(out);
                    }
                }
                Some('\\') => match self.bump() {
                    None => return Err(()),
                    Some('b') => out.push('\u{0008}'),
                    Some('f') => out.push('\u{000C}'),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some(d) if d.is_digit(8) => {
                        let mut code = d.to_digit(8).unwrap_or(0);
                        for _ in 0..2 {
                            match self.peek().and_then(|c| c.to_digit(8)) {
                                Some(next) => {
                                    code = code * 8 + next;
                                    self.bump();
                                }
                                None => break,
                            }
                        }
                        out.push(char::from_u32(code).unwrap_or('?'));
                    }
                    Some(other) => out.push(other),
                },
                Some(c) => out.push(c),
            }
        }
    }
}

fn is_unquoted_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '/' | '+')
}
