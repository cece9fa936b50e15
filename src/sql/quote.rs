// src/sql/quote.rs

//! Identifier and literal quoting

use super::lexer::{Token, TokenExt, tokenize_all};
use crate::error::Result;

const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "authorization", "begin",
    "between", "both", "case", "cast", "check", "collate", "column", "constraint", "create",
    "current_date", "current_role", "current_time", "current_timestamp", "current_user",
    "default", "deferrable", "desc", "distinct", "do", "else", "end", "except", "false",
    "fetch", "for", "foreign", "from", "grant", "group", "having", "in", "index", "initially",
    "intersect", "into", "is", "join", "lateral", "leading", "limit", "not", "null", "offset",
    "on", "only", "or", "order", "placing", "primary", "references", "returning", "select",
    "session_user", "some", "symmetric", "table", "then", "to", "trailing", "true", "union",
    "unique", "user", "using", "variadic", "when", "where", "window", "with",
];

/// Quote an identifier only when it would not survive unquoted
pub fn quote_identifier(ident: &str) -> String {
    let mut chars = ident.chars();
    let plain = match chars.next() {
        Some(first) => {
            (first.is_ascii_lowercase() || first == '_')
                && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$')
        }
        None => false,
    };

    if plain && !RESERVED.contains(&ident) {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// Quote text as a string literal
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Remove `schema.` qualifiers naming logical schemas, so the statement
/// resolves against the single SQLite database.
pub fn strip_schema_qualifiers(sql: &str, schemas: &[String]) -> Result<String> {
    if schemas.is_empty() {
        return Ok(sql.to_string());
    }

    let tokens = tokenize_all(sql)?;
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;
    while i < tokens.len() {
        let qualifies = tokens[i]
            .ident()
            .is_some_and(|name| schemas.iter().any(|s| *s == name))
            && tokens.get(i + 1) == Some(&Token::Period)
            && matches!(tokens.get(i + 2), Some(Token::Word(_)))
            && (i == 0 || tokens[i - 1] != Token::Period);
        if qualifies {
            i += 2;
            continue;
        }
        out.push_str(&tokens[i].render());
        i += 1;
    }
    Ok(out)
}
