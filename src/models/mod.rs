//! Data models for sqlgold.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod source;

// Re-export commonly used types
pub use connection::{
    ConnectionUrl, DEFAULT_MYSQL_CHARSET, DriverType, SQLITE_MEMORY, SqliteLocation,
    mask_password,
};
pub use source::{DEFAULT_ALIAS, DbSource};
