//! Common error types for WTF Dial
//!
//! Every error maps to exactly one [`ErrorCode`]. Presentation layers render
//! messages from the code, so a validation failure must never surface as
//! `Internal` and a storage failure must never surface as anything else.

use crate::DialId;
use thiserror::Error;

/// Common result type for WTF Dial operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error classification consumed by presentation layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Target dial or membership absent
    NotFound,
    /// Malformed input value
    Invalid,
    /// Uniqueness violation
    Conflict,
    /// Caller lacks permission
    Unauthorized,
    /// Storage or transport failure
    Internal,
}

impl ErrorCode {
    /// Stable machine-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "not_found",
            ErrorCode::Invalid => "invalid",
            ErrorCode::Conflict => "conflict",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common error types across WTF Dial crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error without dial context
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Storage failure inside a dial operation
    ///
    /// Display names the operation and dial only. The driver error stays
    /// reachable through `source()` for logs.
    #[error("Storage failure during {operation} (dial {dial_id})")]
    Storage {
        operation: &'static str,
        dial_id: DialId,
        #[source]
        source: sqlx::Error,
    },

    /// Storage failure in a query not tied to a single dial
    #[error("Storage failure during {operation}")]
    Query {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Uniqueness violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller lacks permission for the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Classification of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::InvalidInput(_) => ErrorCode::Invalid,
            Error::Conflict(_) => ErrorCode::Conflict,
            Error::Unauthorized(_) => ErrorCode::Unauthorized,
            Error::Database(_)
            | Error::Storage { .. }
            | Error::Query { .. }
            | Error::Io(_)
            | Error::Config(_)
            | Error::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Message safe to show to an end user
    ///
    /// Internal errors collapse to a generic message so driver text never
    /// leaks past the service boundary.
    pub fn user_message(&self) -> String {
        match self {
            Error::NotFound(msg)
            | Error::InvalidInput(msg)
            | Error::Conflict(msg)
            | Error::Unauthorized(msg) => msg.clone(),
            _ => "Internal error.".to_string(),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match classify(&err) {
            Some(ErrorCode::Conflict) => Error::Conflict("Record already exists.".to_string()),
            Some(ErrorCode::NotFound) => Error::NotFound("Referenced record not found.".to_string()),
            _ => Error::Database(err),
        }
    }
}

/// Map constraint violations onto client-facing kinds
fn classify(err: &sqlx::Error) -> Option<ErrorCode> {
    match err {
        sqlx::Error::RowNotFound => Some(ErrorCode::NotFound),
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Some(ErrorCode::Conflict),
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            Some(ErrorCode::NotFound)
        }
        _ => None,
    }
}

/// Attach operation context to storage results
pub trait StorageContext<T> {
    /// Context for a statement on one dial
    fn storage_context(self, operation: &'static str, dial_id: DialId) -> Result<T>;

    /// Context for a statement spanning many dials, or looked up by another key
    fn query_context(self, operation: &'static str) -> Result<T>;
}

impl<T> StorageContext<T> for std::result::Result<T, sqlx::Error> {
    fn storage_context(self, operation: &'static str, dial_id: DialId) -> Result<T> {
        self.map_err(|source| {
            constraint_error(&source, operation).unwrap_or(Error::Storage {
                operation,
                dial_id,
                source,
            })
        })
    }

    fn query_context(self, operation: &'static str) -> Result<T> {
        self.map_err(|source| {
            constraint_error(&source, operation).unwrap_or(Error::Query { operation, source })
        })
    }
}

fn constraint_error(source: &sqlx::Error, operation: &str) -> Option<Error> {
    match classify(source) {
        Some(ErrorCode::Conflict) => Some(Error::Conflict(format!("Conflict during {}.", operation))),
        Some(ErrorCode::NotFound) => Some(Error::NotFound("Dial not found.".to_string())),
        _ => None,
    }
}
