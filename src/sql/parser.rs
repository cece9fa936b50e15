// src/sql/parser.rs

//! Statement splitting and classification
//!
//! Only the statements the engine acts on are parsed in detail. Extension
//! and function DDL is read from the token stream; function calls are read
//! from the sqlparser AST. Everything else is handed through as
//! [`Statement::Other`] for SQLite to execute.

use super::lexer::{Token, TokenExt, tokenize, tokenize_all};
use super::value::Value;
use crate::error::{Error, Result};
use sqlparser::ast::{
    self, Expr, FunctionArg, FunctionArgExpr, ObjectName, SelectItem, SetExpr, TableFactor, UnaryOperator,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser as SqlParser;
use std::fmt;

/// Possibly schema-qualified object name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub schema: Option<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn new(schema: Option<&str>, name: &str) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateExtension {
    pub name: String,
    pub if_not_exists: bool,
    pub schema: Option<String>,
    pub version: Option<String>,
    pub cascade: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterExtensionUpdate {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropExtension {
    pub names: Vec<String>,
    pub if_exists: bool,
    pub cascade: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFunction {
    pub replace: bool,
    pub name: QualifiedName,
    pub arg_types: Vec<String>,
    pub returns: String,
    pub language: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlterFunctionAction {
    Rename(String),
    OwnerTo(String),
    SetSchema(String),
    /// Attribute changes such as STRICT or IMMUTABLE
    Options,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterFunction {
    pub name: QualifiedName,
    pub arg_types: Option<Vec<String>>,
    pub action: AlterFunctionAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropFunction {
    pub name: QualifiedName,
    pub arg_types: Option<Vec<String>>,
    pub if_exists: bool,
    pub cascade: bool,
}

/// `SELECT fn(literal, ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: QualifiedName,
    pub args: Vec<Value>,
    /// Original text, run by SQLite when no stored function matches
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionKind {
    Begin,
    Commit,
    Rollback,
    Savepoint(String),
    Release(String),
    RollbackTo(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateExtension(CreateExtension),
    AlterExtensionUpdate(AlterExtensionUpdate),
    DropExtension(DropExtension),
    CreateSchema { name: String, if_not_exists: bool },
    CreateFunction(CreateFunction),
    AlterFunction(AlterFunction),
    DropFunction(DropFunction),
    Call(Call),
    /// `SET name = value`; `value` is `None` for RESET
    Set { name: String, value: Option<String> },
    Show(String),
    Transaction(TransactionKind),
    Other(String),
}

impl Statement {
    pub fn is_transaction_control(&self) -> bool {
        matches!(self, Statement::Transaction(_))
    }

    /// Command tag reported after execution
    pub fn tag(&self) -> &'static str {
        match self {
            Statement::CreateExtension(_) => "CREATE EXTENSION",
            Statement::AlterExtensionUpdate(_) => "ALTER EXTENSION",
            Statement::DropExtension(_) => "DROP EXTENSION",
            Statement::CreateSchema { .. } => "CREATE SCHEMA",
            Statement::CreateFunction(_) => "CREATE FUNCTION",
            Statement::AlterFunction(_) => "ALTER FUNCTION",
            Statement::DropFunction(_) => "DROP FUNCTION",
            Statement::Call(_) | Statement::Show(_) => "SELECT",
            Statement::Set { .. } => "SET",
            Statement::Transaction(kind) => match kind {
                TransactionKind::Begin => "BEGIN",
                TransactionKind::Commit => "COMMIT",
                TransactionKind::Rollback | TransactionKind::RollbackTo(_) => "ROLLBACK",
                TransactionKind::Savepoint(_) => "SAVEPOINT",
                TransactionKind::Release(_) => "RELEASE",
            },
            Statement::Other(_) => "OK",
        }
    }
}

/// Split a script into statement texts on top-level semicolons
///
/// Semicolons inside a `CREATE TRIGGER ... BEGIN ... END` body do not end
/// the statement. Leading and trailing comments are dropped.
pub fn split_statements(sql: &str) -> Result<Vec<String>> {
    let tokens = tokenize_all(sql)?;
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut end = 0;
    let mut head: Vec<&Token> = Vec::new();
    let mut in_trigger = false;
    let mut depth = 0usize;

    for tok in &tokens {
        if tok.is_trivia() {
            if end > 0 {
                current.push_str(&tok.render());
            }
            continue;
        }

        if *tok == Token::SemiColon && depth == 0 {
            if end > 0 {
                statements.push(current[..end].to_string());
            }
            current.clear();
            end = 0;
            head.clear();
            in_trigger = false;
            continue;
        }

        if head.len() < 3 {
            head.push(tok);
            in_trigger = starts_trigger(&head);
        }
        if in_trigger {
            if tok.is_keyword("begin") || tok.is_keyword("case") {
                depth += 1;
            } else if tok.is_keyword("end") && depth > 0 {
                depth -= 1;
            }
        }

        current.push_str(&tok.render());
        end = current.len();
    }

    if end > 0 {
        statements.push(current[..end].to_string());
    }
    Ok(statements)
}

fn starts_trigger(head: &[&Token]) -> bool {
    match head {
        [create, trigger, ..] if create.is_keyword("create") && trigger.is_keyword("trigger") => true,
        [create, temp, trigger]
            if create.is_keyword("create")
                && (temp.is_keyword("temp") || temp.is_keyword("temporary"))
                && trigger.is_keyword("trigger") =>
        {
            true
        }
        _ => false,
    }
}

/// Classify one statement
pub fn parse_statement(text: &str) -> Result<Statement> {
    let tokens = tokenize(text)?;
    let mut p = Parser::new(&tokens);

    let Some(first) = p.peek() else {
        return Ok(Statement::Other(text.to_string()));
    };

    let stmt = if first.is_keyword("create") {
        p.parse_create(text)?
    } else if first.is_keyword("alter") {
        p.parse_alter(text)?
    } else if first.is_keyword("drop") {
        p.parse_drop(text)?
    } else if first.is_keyword("select") {
        match parse_call(text) {
            Some(call) => Statement::Call(call),
            None => Statement::Other(text.to_string()),
        }
    } else if first.is_keyword("set") || first.is_keyword("reset") {
        p.parse_set()?
    } else if first.is_keyword("show") {
        p.advance();
        Statement::Show(p.expect_ident()?)
    } else if let Some(kind) = p.parse_transaction()? {
        Statement::Transaction(kind)
    } else {
        Statement::Other(text.to_string())
    };

    Ok(stmt)
}

/// `SELECT fn(literals)` or `SELECT * FROM fn(literals)`, read from the
/// sqlparser AST. `None` for any other query.
fn parse_call(text: &str) -> Option<Call> {
    let mut statements = SqlParser::parse_sql(&PostgreSqlDialect {}, text).ok()?;
    if statements.len() != 1 {
        return None;
    }
    let ast::Statement::Query(query) = statements.pop()? else {
        return None;
    };
    let query = *query;
    let SetExpr::Select(select) = *query.body else {
        return None;
    };
    if select.selection.is_some() || select.projection.len() != 1 {
        return None;
    }

    let (name, args) = match (&select.projection[0], select.from.as_slice()) {
        (SelectItem::UnnamedExpr(Expr::Function(function)), []) => (&function.name, &function.args),
        (SelectItem::Wildcard(..), [from]) if from.joins.is_empty() => match &from.relation {
            TableFactor::Table {
                name, args: Some(args), ..
            } => (name, args),
            _ => return None,
        },
        _ => return None,
    };

    Some(Call {
        name: object_name(name)?,
        args: args.iter().map(argument_value).collect::<Option<Vec<_>>>()?,
        text: text.to_string(),
    })
}

fn object_name(name: &ObjectName) -> Option<QualifiedName> {
    let parts: Vec<String> = name
        .0
        .iter()
        .map(|ident| match ident.quote_style {
            Some(_) => ident.value.clone(),
            None => ident.value.to_lowercase(),
        })
        .collect();
    match parts.as_slice() {
        [name] => Some(QualifiedName::new(None, name)),
        [schema, name] => Some(QualifiedName::new(Some(schema.as_str()), name)),
        _ => None,
    }
}

fn argument_value(arg: &FunctionArg) -> Option<Value> {
    match arg {
        FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => literal(expr),
        _ => None,
    }
}

/// Constant argument; casts are accepted and ignored
fn literal(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Value(value) => match value {
            ast::Value::SingleQuotedString(s)
            | ast::Value::EscapedStringLiteral(s)
            | ast::Value::NationalStringLiteral(s) => Some(Value::Text(s.clone())),
            ast::Value::DollarQuotedString(d) => Some(Value::Text(d.value.clone())),
            ast::Value::Number(n, _) => number_value(n),
            ast::Value::Boolean(b) => Some(Value::Bool(*b)),
            ast::Value::Null => Some(Value::Null),
            _ => None,
        },
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match literal(expr)? {
            Value::Integer(i) => Some(Value::Integer(-i)),
            Value::Real(r) => Some(Value::Real(-r)),
            _ => None,
        },
        Expr::Cast { expr, .. } | Expr::Nested(expr) => literal(expr),
        Expr::Array(array) => array
            .elem
            .iter()
            .map(literal)
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        _ => None,
    }
}

const FUNCTION_OPTION_KEYWORDS: &[&str] = &[
    "language", "as", "immutable", "stable", "volatile", "strict", "called", "security",
    "parallel", "cost", "rows", "set", "leakproof", "not", "window", "support", "transform",
    "external", "return", "begin", "returns",
];

const MULTIWORD_TYPE_STARTS: &[&str] = &[
    "double", "character", "char", "bit", "national", "time", "timestamp", "interval",
];

/// Cursor over the significant tokens of one statement
struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(tok)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn at_semicolon(&self) -> bool {
        self.peek() == Some(&Token::SemiColon)
    }

    fn accept_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_keyword(keyword)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn accept_keywords(&mut self, keywords: &[&str]) -> bool {
        let matches = keywords
            .iter()
            .enumerate()
            .all(|(i, kw)| self.peek_at(i).is_some_and(|t| t.is_keyword(kw)));
        if matches {
            self.pos += keywords.len();
        }
        matches
    }

    fn accept(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error_here(&self) -> Error {
        match self.peek() {
            Some(tok) => Error::syntax(format!("syntax error at or near \"{}\"", tok)),
            None => Error::syntax("syntax error at end of input"),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek().and_then(TokenExt::ident) {
            Some(ident) => {
                self.pos += 1;
                Ok(ident)
            }
            None => Err(self.error_here()),
        }
    }

    /// Identifier, string literal or number, as accepted for version names
    fn expect_name_or_literal(&mut self) -> Result<String> {
        let literal = match self.peek() {
            Some(Token::Number(n, _)) => Some(n.clone()),
            Some(Token::DollarQuotedString(_)) | None => None,
            Some(tok) => tok.string_value().map(str::to_string),
        };
        match literal {
            Some(value) => {
                self.pos += 1;
                Ok(value)
            }
            None => self.expect_ident(),
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        self.accept(&Token::SemiColon);
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error_here())
        }
    }

    fn qualified_name(&mut self) -> Result<QualifiedName> {
        let first = self.expect_ident()?;
        if self.accept(&Token::Period) {
            let name = self.expect_ident()?;
            Ok(QualifiedName {
                schema: Some(first),
                name,
            })
        } else {
            Ok(QualifiedName {
                schema: None,
                name: first,
            })
        }
    }

    fn parse_create(&mut self, text: &str) -> Result<Statement> {
        self.advance();
        let replace = self.accept_keywords(&["or", "replace"]);

        if !replace && self.accept_keyword("extension") {
            return self.parse_create_extension();
        }
        if !replace && self.accept_keyword("schema") {
            let if_not_exists = self.accept_keywords(&["if", "not", "exists"]);
            let name = self.expect_ident()?;
            if self.accept_keyword("authorization") {
                self.expect_ident()?;
            }
            self.expect_end()?;
            return Ok(Statement::CreateSchema {
                name,
                if_not_exists,
            });
        }
        if self.accept_keyword("function") {
            return self.parse_create_function(replace);
        }

        Ok(Statement::Other(text.to_string()))
    }

    fn parse_create_extension(&mut self) -> Result<Statement> {
        let if_not_exists = self.accept_keywords(&["if", "not", "exists"]);
        let name = self.expect_ident()?;
        self.accept_keyword("with");

        let mut stmt = CreateExtension {
            name,
            if_not_exists,
            schema: None,
            version: None,
            cascade: false,
        };
        let mut seen_cascade = false;

        while !self.at_end() && !self.at_semicolon() {
            if self.accept_keyword("schema") {
                if stmt.schema.is_some() {
                    return Err(redundant_options());
                }
                stmt.schema = Some(self.expect_ident()?);
            } else if self.accept_keyword("version") {
                if stmt.version.is_some() {
                    return Err(redundant_options());
                }
                stmt.version = Some(self.expect_name_or_literal()?);
            } else if self.accept_keyword("cascade") {
                if seen_cascade {
                    return Err(redundant_options());
                }
                seen_cascade = true;
                stmt.cascade = true;
            } else {
                return Err(self.error_here());
            }
        }
        self.expect_end()?;

        Ok(Statement::CreateExtension(stmt))
    }

    fn parse_create_function(&mut self, replace: bool) -> Result<Statement> {
        let name = self.qualified_name()?;
        let arg_types = self.function_args()?.unwrap_or_default();

        let mut returns = None;
        if self.accept_keyword("returns") {
            returns = Some(self.type_until_option()?);
        }

        let mut language = None;
        let mut body = None;
        while !self.at_end() && !self.at_semicolon() {
            if self.accept_keyword("language") {
                language = Some(self.expect_name_or_literal()?.to_lowercase());
            } else if self.accept_keyword("as") {
                let first = self.string_literal()?;
                if self.accept(&Token::Comma) {
                    let link = self.string_literal()?;
                    body = Some(format!("{}, {}", first, link));
                } else {
                    body = Some(first);
                }
            } else {
                self.advance();
            }
        }
        self.expect_end()?;

        let body = body.ok_or_else(|| Error::InvalidParameter("no function body specified".to_string()))?;

        Ok(Statement::CreateFunction(CreateFunction {
            replace,
            name,
            arg_types,
            returns: returns.unwrap_or_else(|| "void".to_string()),
            language: language.unwrap_or_else(|| "sql".to_string()),
            body,
        }))
    }

    fn string_literal(&mut self) -> Result<String> {
        match self.peek().and_then(TokenExt::string_value) {
            Some(value) => {
                self.pos += 1;
                Ok(value.to_string())
            }
            None => Err(self.error_here()),
        }
    }

    /// Parenthesized argument list; `None` when no list follows
    fn function_args(&mut self) -> Result<Option<Vec<String>>> {
        if !self.accept(&Token::LParen) {
            return Ok(None);
        }

        let mut args = Vec::new();
        let mut current: Vec<&'t Token> = Vec::new();
        let mut depth = 0usize;
        loop {
            let tok = self.advance().ok_or_else(|| self.error_here())?;
            if depth == 0 && (*tok == Token::Comma || *tok == Token::RParen) {
                if !current.is_empty() {
                    if let Some(arg) = argument_type(&current) {
                        args.push(arg);
                    }
                    current.clear();
                }
                if *tok == Token::RParen {
                    break;
                }
                continue;
            }
            if *tok == Token::LParen {
                depth += 1;
            } else if *tok == Token::RParen {
                depth -= 1;
            }
            current.push(tok);
        }

        Ok(Some(args))
    }

    /// Return type tokens up to the first option keyword at depth zero
    fn type_until_option(&mut self) -> Result<String> {
        let mut collected: Vec<&'t Token> = Vec::new();
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if depth == 0
                && (*tok == Token::SemiColon || FUNCTION_OPTION_KEYWORDS.iter().any(|kw| tok.is_keyword(kw)))
            {
                break;
            }
            if *tok == Token::LParen {
                depth += 1;
            } else if *tok == Token::RParen {
                depth = depth.saturating_sub(1);
            }
            collected.push(tok);
            self.pos += 1;
        }
        if collected.is_empty() {
            return Err(self.error_here());
        }
        Ok(normalize_type(&collected))
    }

    fn parse_alter(&mut self, text: &str) -> Result<Statement> {
        self.advance();

        if self.accept_keyword("extension") {
            let name = self.expect_ident()?;
            if !self.accept_keyword("update") {
                return Err(Error::FeatureNotSupported(format!(
                    "ALTER EXTENSION {} supports only UPDATE [TO version]",
                    name
                )));
            }
            let version = if self.accept_keyword("to") {
                Some(self.expect_name_or_literal()?)
            } else {
                None
            };
            self.expect_end()?;
            return Ok(Statement::AlterExtensionUpdate(AlterExtensionUpdate {
                name,
                version,
            }));
        }

        if self.accept_keyword("function") {
            let name = self.qualified_name()?;
            let arg_types = self.function_args()?;
            let action = if self.accept_keywords(&["rename", "to"]) {
                AlterFunctionAction::Rename(self.expect_ident()?)
            } else if self.accept_keywords(&["owner", "to"]) {
                AlterFunctionAction::OwnerTo(self.expect_ident()?)
            } else if self.accept_keywords(&["set", "schema"]) {
                AlterFunctionAction::SetSchema(self.expect_ident()?)
            } else {
                while !self.at_end() {
                    self.advance();
                }
                AlterFunctionAction::Options
            };
            self.expect_end()?;
            return Ok(Statement::AlterFunction(AlterFunction {
                name,
                arg_types,
                action,
            }));
        }

        Ok(Statement::Other(text.to_string()))
    }

    fn parse_drop(&mut self, text: &str) -> Result<Statement> {
        self.advance();

        if self.accept_keyword("extension") {
            let if_exists = self.accept_keywords(&["if", "exists"]);
            let mut names = vec![self.expect_ident()?];
            while self.accept(&Token::Comma) {
                names.push(self.expect_ident()?);
            }
            let cascade = self.drop_behavior();
            self.expect_end()?;
            return Ok(Statement::DropExtension(DropExtension {
                names,
                if_exists,
                cascade,
            }));
        }

        if self.accept_keyword("function") {
            let if_exists = self.accept_keywords(&["if", "exists"]);
            let name = self.qualified_name()?;
            let arg_types = self.function_args()?;
            if self.peek() == Some(&Token::Comma) {
                return Err(Error::FeatureNotSupported(
                    "dropping more than one function per statement is not supported".to_string(),
                ));
            }
            let cascade = self.drop_behavior();
            self.expect_end()?;
            return Ok(Statement::DropFunction(DropFunction {
                name,
                arg_types,
                if_exists,
                cascade,
            }));
        }

        Ok(Statement::Other(text.to_string()))
    }

    fn drop_behavior(&mut self) -> bool {
        if self.accept_keyword("cascade") {
            true
        } else {
            self.accept_keyword("restrict");
            false
        }
    }

    fn parse_set(&mut self) -> Result<Statement> {
        let reset = self.advance().is_some_and(|t| t.is_keyword("reset"));

        if reset {
            let name = self.expect_ident()?;
            self.expect_end()?;
            return Ok(Statement::Set { name, value: None });
        }

        if !self.accept_keyword("session") {
            self.accept_keyword("local");
        }

        if self.accept_keyword("role") {
            let role = self.expect_name_or_literal()?;
            self.expect_end()?;
            let value = if role.eq_ignore_ascii_case("none") { None } else { Some(role) };
            return Ok(Statement::Set {
                name: "role".to_string(),
                value,
            });
        }

        let name = self.expect_ident()?;
        if !self.accept(&Token::Eq) && !self.accept_keyword("to") {
            return Err(self.error_here());
        }

        if self.accept_keyword("default") {
            self.expect_end()?;
            return Ok(Statement::Set { name, value: None });
        }

        let mut parts = vec![self.expect_name_or_literal()?];
        while self.accept(&Token::Comma) {
            parts.push(self.expect_name_or_literal()?);
        }
        self.expect_end()?;

        Ok(Statement::Set {
            name,
            value: Some(parts.join(", ")),
        })
    }

    fn parse_transaction(&mut self) -> Result<Option<TransactionKind>> {
        let Some(first) = self.peek() else {
            return Ok(None);
        };

        let kind = if first.is_keyword("begin") || first.is_keyword("start") {
            TransactionKind::Begin
        } else if first.is_keyword("commit") || first.is_keyword("end") {
            TransactionKind::Commit
        } else if first.is_keyword("abort") {
            TransactionKind::Rollback
        } else if first.is_keyword("rollback") {
            self.advance();
            if !self.accept_keyword("work") {
                self.accept_keyword("transaction");
            }
            if self.accept_keyword("to") {
                self.accept_keyword("savepoint");
                return Ok(Some(TransactionKind::RollbackTo(self.expect_ident()?)));
            }
            return Ok(Some(TransactionKind::Rollback));
        } else if first.is_keyword("savepoint") {
            self.advance();
            return Ok(Some(TransactionKind::Savepoint(self.expect_ident()?)));
        } else if first.is_keyword("release") {
            self.advance();
            self.accept_keyword("savepoint");
            return Ok(Some(TransactionKind::Release(self.expect_ident()?)));
        } else {
            return Ok(None);
        };

        Ok(Some(kind))
    }
}

fn redundant_options() -> Error {
    Error::syntax("conflicting or redundant options")
}

fn number_value(text: &str) -> Option<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::Integer(i));
    }
    text.parse::<f64>().ok().map(Value::Real)
}

fn is_name(tok: &Token) -> bool {
    matches!(tok, Token::Word(_))
}

/// Type of one argument declaration; OUT arguments are not part of the signature
fn argument_type(tokens: &[&Token]) -> Option<String> {
    let mut rest = tokens;

    if let Some(first) = rest.first() {
        if first.is_keyword("out") {
            return None;
        }
        if first.is_keyword("in") || first.is_keyword("inout") || first.is_keyword("variadic") {
            rest = &rest[1..];
        }
    }

    if let Some(cut) = rest
        .iter()
        .position(|t| t.is_keyword("default") || **t == Token::Eq)
    {
        rest = &rest[..cut];
    }

    let has_name = rest.len() >= 2
        && is_name(rest[0])
        && is_name(rest[1])
        && !MULTIWORD_TYPE_STARTS.iter().any(|kw| rest[0].is_keyword(kw));
    if has_name {
        rest = &rest[1..];
    }

    if rest.is_empty() {
        None
    } else {
        Some(normalize_type(rest))
    }
}

/// Canonical spelling of a type name
pub fn normalize_type(tokens: &[&Token]) -> String {
    let mut out = String::new();
    let mut prev_word = false;
    for tok in tokens {
        let is_word = is_name(tok);
        if is_word && prev_word {
            out.push(' ');
        }
        match tok.ident() {
            Some(ident) => out.push_str(&ident),
            None => out.push_str(&tok.to_string()),
        }
        prev_word = is_word;
    }

    match out.as_str() {
        "int" | "int4" => "integer".to_string(),
        "int8" => "bigint".to_string(),
        "int2" => "smallint".to_string(),
        "bool" => "boolean".to_string(),
        "float8" => "double precision".to_string(),
        "float4" => "real".to_string(),
        "varchar" => "character varying".to_string(),
        _ => out,
    }
}

/// Parse a comma-separated list of type names, as written inside `(...)`
pub fn parse_type_list(text: &str) -> Result<Vec<String>> {
    let wrapped = format!("({})", text);
    let tokens = tokenize(&wrapped)?;
    let mut p = Parser::new(&tokens);
    p.function_args().map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_statements() {
        let sql = "CREATE TABLE t (a text DEFAULT ';');\n-- comment ;\nINSERT INTO t VALUES ($$;$$);;  ";
        let stmts = split_statements(sql).unwrap();
        assert_eq!(
            stmts,
            vec![
                "CREATE TABLE t (a text DEFAULT ';')".to_string(),
                "INSERT INTO t VALUES ($$;$$)".to_string(),
            ]
        );
    }

    #[test]
    fn test_split_trigger_body() {
        let sql = "CREATE TRIGGER trg AFTER INSERT ON t BEGIN \
                   UPDATE t SET a = CASE WHEN a IS NULL THEN 'x' ELSE a END; \
                   DELETE FROM u; END; SELECT 1";
        let stmts = split_statements(sql).unwrap();
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].ends_with("END"));
        assert_eq!(stmts[1], "SELECT 1");
    }

    #[test]
    fn test_create_extension() {
        let stmt = parse_statement(
            "CREATE EXTENSION IF NOT EXISTS \"My_Ext\" WITH SCHEMA ext VERSION '1.1' CASCADE;",
        )
        .unwrap();
        assert_eq!(
            stmt,
            Statement::CreateExtension(CreateExtension {
                name: "My_Ext".to_string(),
                if_not_exists: true,
                schema: Some("ext".to_string()),
                version: Some("1.1".to_string()),
                cascade: true,
            })
        );

        let plain = parse_statement("create extension Foo version 2").unwrap();
        match plain {
            Statement::CreateExtension(c) => {
                assert_eq!(c.name, "foo");
                assert_eq!(c.version.as_deref(), Some("2"));
                assert!(!c.cascade);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_create_extension_redundant_options() {
        let err = parse_statement("CREATE EXTENSION a VERSION '1' VERSION '2'").unwrap_err();
        assert_eq!(err.to_string(), "conflicting or redundant options");
        assert!(parse_statement("CREATE EXTENSION a FROM '1'").is_err());
    }

    #[test]
    fn test_alter_extension() {
        assert_eq!(
            parse_statement("ALTER EXTENSION foo UPDATE TO '2.0'").unwrap(),
            Statement::AlterExtensionUpdate(AlterExtensionUpdate {
                name: "foo".to_string(),
                version: Some("2.0".to_string()),
            })
        );
        assert_eq!(
            parse_statement("ALTER EXTENSION foo UPDATE").unwrap(),
            Statement::AlterExtensionUpdate(AlterExtensionUpdate {
                name: "foo".to_string(),
                version: None,
            })
        );
        assert!(matches!(
            parse_statement("ALTER EXTENSION foo SET SCHEMA bar"),
            Err(Error::FeatureNotSupported(_))
        ));
    }

    #[test]
    fn test_drop_extension() {
        assert_eq!(
            parse_statement("DROP EXTENSION IF EXISTS a, b CASCADE").unwrap(),
            Statement::DropExtension(DropExtension {
                names: vec!["a".to_string(), "b".to_string()],
                if_exists: true,
                cascade: true,
            })
        );
    }

    #[test]
    fn test_create_function() {
        let stmt = parse_statement(
            "CREATE OR REPLACE FUNCTION tle.\"e--1.0.sql\"(name text, n int DEFAULT 1, OUT r text) \
             RETURNS text LANGUAGE SQL STRICT AS $_tle_$SELECT 'x'$_tle_$",
        )
        .unwrap();
        match stmt {
            Statement::CreateFunction(f) => {
                assert!(f.replace);
                assert_eq!(f.name, QualifiedName::new(Some("tle"), "e--1.0.sql"));
                assert_eq!(f.arg_types, vec!["text".to_string(), "integer".to_string()]);
                assert_eq!(f.returns, "text");
                assert_eq!(f.language, "sql");
                assert_eq!(f.body, "SELECT 'x'");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_create_function_types() {
        let stmt = parse_statement(
            "CREATE FUNCTION f(double precision, character varying(10), text[]) RETURNS SETOF text AS 'SELECT 1'",
        )
        .unwrap();
        match stmt {
            Statement::CreateFunction(f) => {
                assert_eq!(
                    f.arg_types,
                    vec![
                        "double precision".to_string(),
                        "character varying(10)".to_string(),
                        "text[]".to_string()
                    ]
                );
                assert_eq!(f.returns, "setof text");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(parse_statement("CREATE FUNCTION f() RETURNS text LANGUAGE sql").is_err());
    }

    #[test]
    fn test_alter_and_drop_function() {
        assert_eq!(
            parse_statement("ALTER FUNCTION tle.f(text) RENAME TO g").unwrap(),
            Statement::AlterFunction(AlterFunction {
                name: QualifiedName::new(Some("tle"), "f"),
                arg_types: Some(vec!["text".to_string()]),
                action: AlterFunctionAction::Rename("g".to_string()),
            })
        );
        assert_eq!(
            parse_statement("ALTER FUNCTION f OWNER TO bob").unwrap(),
            Statement::AlterFunction(AlterFunction {
                name: QualifiedName::new(None, "f"),
                arg_types: None,
                action: AlterFunctionAction::OwnerTo("bob".to_string()),
            })
        );
        assert!(matches!(
            parse_statement("ALTER FUNCTION f() SET search_path = tle").unwrap(),
            Statement::AlterFunction(AlterFunction {
                action: AlterFunctionAction::Options,
                ..
            })
        ));
        assert_eq!(
            parse_statement("DROP FUNCTION IF EXISTS s.f()").unwrap(),
            Statement::DropFunction(DropFunction {
                name: QualifiedName::new(Some("s"), "f"),
                arg_types: Some(vec![]),
                if_exists: true,
                cascade: false,
            })
        );
    }

    #[test]
    fn test_select_call() {
        let stmt = parse_statement(
            "SELECT tle.install_extension('e', '1.0', 'desc', $$SELECT 1$$, ARRAY['a', 'b']::text[])",
        )
        .unwrap();
        match stmt {
            Statement::Call(call) => {
                assert_eq!(call.name, QualifiedName::new(Some("tle"), "install_extension"));
                assert_eq!(call.args.len(), 5);
                assert_eq!(
                    call.args[4],
                    Value::Array(vec![Value::Text("a".into()), Value::Text("b".into())])
                );
            }
            other => panic!("unexpected: {other:?}"),
        }

        match parse_statement("SELECT * FROM tle.available_extensions()").unwrap() {
            Statement::Call(call) => assert!(call.args.is_empty()),
            other => panic!("unexpected: {other:?}"),
        }

        match parse_statement("SELECT f(NULL, -2, true, 1.5)").unwrap() {
            Statement::Call(call) => assert_eq!(
                call.args,
                vec![Value::Null, Value::Integer(-2), Value::Bool(true), Value::Real(1.5)]
            ),
            other => panic!("unexpected: {other:?}"),
        }

        assert!(matches!(
            parse_statement("SELECT count(*) FROM t").unwrap(),
            Statement::Other(_)
        ));
        assert!(matches!(
            parse_statement("SELECT f(a) FROM t").unwrap(),
            Statement::Other(_)
        ));
    }

    #[test]
    fn test_set_and_transactions() {
        assert_eq!(
            parse_statement("SET search_path TO ext, main").unwrap(),
            Statement::Set {
                name: "search_path".to_string(),
                value: Some("ext, main".to_string()),
            }
        );
        assert_eq!(
            parse_statement("SET ROLE alice").unwrap(),
            Statement::Set {
                name: "role".to_string(),
                value: Some("alice".to_string()),
            }
        );
        assert_eq!(
            parse_statement("RESET client_min_messages").unwrap(),
            Statement::Set {
                name: "client_min_messages".to_string(),
                value: None,
            }
        );
        assert_eq!(
            parse_statement("BEGIN TRANSACTION").unwrap(),
            Statement::Transaction(TransactionKind::Begin)
        );
        assert_eq!(
            parse_statement("ROLLBACK TO SAVEPOINT sp").unwrap(),
            Statement::Transaction(TransactionKind::RollbackTo("sp".to_string()))
        );
        assert_eq!(
            parse_statement("END").unwrap(),
            Statement::Transaction(TransactionKind::Commit)
        );
        assert!(parse_statement("COMMIT").unwrap().is_transaction_control());
    }

    #[test]
    fn test_parse_type_list() {
        assert_eq!(
            parse_type_list("text, int").unwrap(),
            vec!["text".to_string(), "integer".to_string()]
        );
        assert!(parse_type_list("").unwrap().is_empty());
    }
}
