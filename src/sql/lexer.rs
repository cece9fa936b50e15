// src/sql/lexer.rs

//! Tokenizing
//!
//! Scripts are tokenized with sqlparser's PostgreSQL dialect, which knows
//! dollar quoting, nested comments and positional parameters. Statement
//! text handed to SQLite is rebuilt from the tokens with [`TokenExt::render`].

use super::quote::quote_literal;
use crate::error::{Error, Result};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::Tokenizer;

pub use sqlparser::tokenizer::{Token, Word};

/// Engine-side helpers over sqlparser tokens
pub trait TokenExt {
    /// Case-insensitive keyword test for unquoted words
    fn is_keyword(&self, keyword: &str) -> bool;

    /// Identifier value: unquoted words fold to lower case
    fn ident(&self) -> Option<String>;

    /// Decoded text of a string literal in any quoting style
    fn string_value(&self) -> Option<&str>;

    /// Whitespace, comments and end of input
    fn is_trivia(&self) -> bool;

    /// SQL text for the token; literals and quoted identifiers are re-quoted
    fn render(&self) -> String;
}

impl TokenExt for Token {
    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(keyword))
    }

    fn ident(&self) -> Option<String> {
        match self {
            Token::Word(w) if w.quote_style.is_none() => Some(w.value.to_lowercase()),
            Token::Word(w) => Some(w.value.clone()),
            _ => None,
        }
    }

    fn string_value(&self) -> Option<&str> {
        match self {
            Token::SingleQuotedString(s) | Token::EscapedStringLiteral(s) | Token::NationalStringLiteral(s) => {
                Some(s)
            }
            Token::DollarQuotedString(d) => Some(&d.value),
            _ => None,
        }
    }

    fn is_trivia(&self) -> bool {
        matches!(self, Token::Whitespace(_) | Token::EOF)
    }

    fn render(&self) -> String {
        match self {
            Token::SingleQuotedString(s) | Token::EscapedStringLiteral(s) | Token::NationalStringLiteral(s) => {
                quote_literal(s)
            }
            Token::Word(Word {
                value,
                quote_style: Some(_),
                ..
            }) => format!("\"{}\"", value.replace('"', "\"\"")),
            Token::EOF => String::new(),
            other => other.to_string(),
        }
    }
}

/// Every token of `sql`, whitespace and comments included
pub fn tokenize_all(sql: &str) -> Result<Vec<Token>> {
    let dialect = PostgreSqlDialect {};
    Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| Error::syntax(e.to_string()))
}

/// Significant tokens of `sql`
pub fn tokenize(sql: &str) -> Result<Vec<Token>> {
    Ok(tokenize_all(sql)?
        .into_iter()
        .filter(|t| !t.is_trivia())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings_and_identifiers() {
        let toks = tokenize(r#"SELECT 'it''s', "Mixed ""Case""" -- trailing"#).unwrap();
        assert!(toks[0].is_keyword("select"));
        assert_eq!(toks[1].string_value(), Some("it's"));
        assert_eq!(toks[2], Token::Comma);
        assert_eq!(toks[3].ident().as_deref(), Some("Mixed \"Case\""));
        assert_eq!(toks.len(), 4);
    }

    #[test]
    fn test_words_fold_unless_quoted() {
        let toks = tokenize("Foo \"Foo\"").unwrap();
        assert_eq!(toks[0].ident().as_deref(), Some("foo"));
        assert_eq!(toks[1].ident().as_deref(), Some("Foo"));
        assert!(!toks[1].is_keyword("foo"));
    }

    #[test]
    fn test_dollar_quotes_and_params() {
        let toks = tokenize("AS $fn$ SELECT 'x'; $fn$ , $1, $$;$$").unwrap();
        assert_eq!(toks[1].string_value(), Some(" SELECT 'x'; "));
        assert_eq!(toks[3], Token::Placeholder("$1".to_string()));
        assert_eq!(toks[5].string_value(), Some(";"));
    }

    #[test]
    fn test_comments_are_trivia() {
        let toks = tokenize("a /* x */ b -- c\n").unwrap();
        assert_eq!(toks.len(), 2);
        assert!(tokenize("a /* open").is_err());
    }

    #[test]
    fn test_unterminated_string() {
        assert!(tokenize("SELECT 'abc").is_err());
        assert!(tokenize("SELECT $$abc").is_err());
    }

    #[test]
    fn test_render_requotes() {
        let rendered: String = tokenize_all("SELECT 'it''s' AS \"a\"\"b\", $$x$$")
            .unwrap()
            .iter()
            .map(TokenExt::render)
            .collect();
        assert_eq!(rendered, "SELECT 'it''s' AS \"a\"\"b\", $$x$$");
    }
}
