// src/sql/mod.rs

//! SQL front end: tokenizing, statement splitting, classification and quoting

pub mod lexer;
pub mod parser;
mod quote;
mod value;

pub use parser::{
    AlterExtensionUpdate, AlterFunction, AlterFunctionAction, Call, CreateExtension,
    CreateFunction, DropExtension, DropFunction, QualifiedName, Statement, TransactionKind,
    parse_statement, parse_type_list, split_statements,
};
pub use quote::{quote_identifier, quote_literal, strip_schema_qualifiers};
pub use value::{QueryResult, Value};
