// src/error.rs

//! Error types for tlext
//!
//! Variants follow the failure classes the extension engine can report. Each
//! carries the user-facing message; some also carry a detail or hint line the
//! CLI prints underneath, the same way a database server reports them.

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed extension or version name
    #[error("{message}")]
    InvalidName { message: String, detail: String },

    /// A control file or script is missing
    #[error("{message}")]
    NotAvailable {
        message: String,
        detail: Option<String>,
        hint: Option<String>,
    },

    /// No install or update path through the version graph
    #[error("{0}")]
    NoPath(String),

    /// Insufficient privilege or a protected object
    #[error("{message}")]
    PermissionDenied {
        message: String,
        hint: Option<String>,
    },

    /// A virtual file for this name/version already exists
    #[error("{message}")]
    AlreadyInstalled {
        message: String,
        hint: Option<String>,
    },

    /// Catalog object already exists
    #[error("{0}")]
    DuplicateObject(String),

    /// Re-entrant CREATE/ALTER EXTENSION
    #[error("{0}")]
    Nested(String),

    /// CASCADE walked back into an extension already being installed
    #[error("cyclic dependency detected between extensions \"{required}\" and \"{extension}\"")]
    CyclicDependency { extension: String, required: String },

    /// Catalog object does not exist
    #[error("{message}")]
    UndefinedObject {
        message: String,
        hint: Option<String>,
    },

    /// Syntax error in a control file or SQL text
    #[error("{message}")]
    Syntax {
        message: String,
        line: Option<usize>,
    },

    /// Bad parameter value
    #[error("{0}")]
    InvalidParameter(String),

    /// Value outside an allowed bound
    #[error("{0}")]
    DataException(String),

    /// Statement form not supported in this context
    #[error("{0}")]
    FeatureNotSupported(String),

    /// Object cannot be dropped while something depends on it
    #[error("{message}")]
    DependentObjects {
        message: String,
        hint: Option<String>,
    },

    /// Object is in use by an operation in progress
    #[error("{0}")]
    ObjectInUse(String),

    /// Transaction control outside of a valid state
    #[error("{0}")]
    InvalidTransactionState(String),

    /// Configuration file problems
    #[error("Configuration error: {0}")]
    Config(String),

    /// An expected catalog row was not found
    #[error("internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn permission_denied(message: impl Into<String>, hint: Option<&str>) -> Self {
        Error::PermissionDenied {
            message: message.into(),
            hint: hint.map(str::to_string),
        }
    }

    pub fn undefined(message: impl Into<String>) -> Self {
        Error::UndefinedObject {
            message: message.into(),
            hint: None,
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Error::Syntax {
            message: message.into(),
            line: None,
        }
    }

    /// Hint line, if the error carries one
    pub fn hint(&self) -> Option<&str> {
        match self {
            Error::NotAvailable { hint, .. }
            | Error::PermissionDenied { hint, .. }
            | Error::AlreadyInstalled { hint, .. }
            | Error::UndefinedObject { hint, .. }
            | Error::DependentObjects { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }

    /// Detail line, if the error carries one
    pub fn detail(&self) -> Option<&str> {
        match self {
            Error::InvalidName { detail, .. } => Some(detail),
            Error::NotAvailable { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Five-character condition code in the style of SQLSTATE
    pub fn sqlstate(&self) -> &'static str {
        match self {
            Error::InvalidName { .. } | Error::InvalidParameter(_) => "22023",
            Error::NotAvailable { .. } => "58P01",
            Error::NoPath(_) => "22023",
            Error::PermissionDenied { .. } => "42501",
            Error::AlreadyInstalled { .. } | Error::DuplicateObject(_) => "42710",
            Error::Nested(_) | Error::FeatureNotSupported(_) => "0A000",
            Error::CyclicDependency { .. } => "42P17",
            Error::UndefinedObject { .. } => "42704",
            Error::Syntax { .. } => "42601",
            Error::DataException(_) => "22000",
            Error::DependentObjects { .. } => "2BP01",
            Error::ObjectInUse(_) => "55006",
            Error::InvalidTransactionState(_) => "25000",
            Error::Config(_) => "F0000",
            Error::Internal(_) => "XX000",
            Error::Database(_) | Error::Io(_) | Error::Json(_) => "58000",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_and_sqlstate() {
        let err = Error::permission_denied("permission denied to create extension \"x\"", Some("Must be superuser."));
        assert_eq!(err.hint(), Some("Must be superuser."));
        assert_eq!(err.sqlstate(), "42501");
        assert_eq!(err.to_string(), "permission denied to create extension \"x\"");
    }

    #[test]
    fn test_cyclic_message() {
        let err = Error::CyclicDependency {
            extension: "a".to_string(),
            required: "b".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cyclic dependency detected between extensions \"b\" and \"a\""
        );
        assert!(err.hint().is_none());
    }
}
