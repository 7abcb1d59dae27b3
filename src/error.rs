//! Error types for sqlgold.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Connection and database errors carry a suggestion that points at the most
//! likely fix (usually something in the configuration file).

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Config section '{section}' was not found")]
    SectionNotFound { section: String },

    #[error("Unsupported driver '{driver}' in connection string")]
    UnsupportedDriver { driver: String },

    #[error("No database registered under alias '{alias}'")]
    AliasNotFound { alias: String },

    #[error("No main database specified")]
    NoMainDatabase,

    #[error("Timeout: {operation} exceeded {limit:?}")]
    Timeout { operation: String, limit: Duration },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a section not found error.
    pub fn section_not_found(section: impl Into<String>) -> Self {
        Self::SectionNotFound {
            section: section.into(),
        }
    }

    pub fn unsupported_driver(driver: impl Into<String>) -> Self {
        Self::UnsupportedDriver {
            driver: driver.into(),
        }
    }

    pub fn alias_not_found(alias: impl Into<String>) -> Self {
        Self::AliasNotFound {
            alias: alias.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, limit: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            limit,
        }
    }

    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::SectionNotFound { .. } => {
                Some("Check the section path against the loaded config.toml")
            }
            Self::UnsupportedDriver { .. } => {
                Some("Use a mysql://, postgres:// or sqlite: connection string")
            }
            _ => None,
        }
    }
}

/// Suggestion for a database error, keyed by SQLSTATE or vendor code.
fn database_suggestion(code: Option<&str>) -> &'static str {
    match code {
        // invalid_catalog_name
        Some("3D000") => {
            "The database does not exist yet; create the handle through the factory so it is bootstrapped"
        }
        // PostgreSQL undefined_table, MySQL base table not found
        Some("42P01") | Some("42S02") => {
            "The table is missing; call create_all() on the handle or enable create_all"
        }
        Some("42P04") => "The database already exists",
        Some("55006") => "Close every other connection to the database before dropping it",
        Some("28P01") | Some("28000") => "Verify the username and password in the config section",
        _ => "Check the statement and the objects it refers to",
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => {
                DbError::config(format!("Invalid connection options: {}", msg))
            }
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned());
                let suggestion = database_suggestion(code.as_deref());
                DbError::database(db_err.message(), code, suggestion)
            }
            sqlx::Error::RowNotFound => DbError::database(
                "Query returned no rows",
                None,
                "Scalar queries must return exactly one row",
            ),
            sqlx::Error::PoolTimedOut => DbError::connection(
                "Timed out waiting for a pooled connection",
                "Raise acquire_timeout or max_connections in the pool options",
            ),
            sqlx::Error::PoolClosed => DbError::connection(
                "The handle's connection pool is closed",
                "The database was dropped or closed; create the handle again",
            ),
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check that the database server is reachable",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Build with the tls-native or tls-rustls feature and check the certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check that the URL scheme matches the server",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            other => DbError::internal(format!("Database driver error: {}", other)),
        }
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        DbError::config(format!("Invalid TOML: {}", err.message()))
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
