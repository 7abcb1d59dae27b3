//! sqlgold library
//!
//! Config-driven database handles: build a [`Db`] from a connection URL, a
//! dictionary of settings or a section of `config.toml`, bootstrap the
//! database for its dialect (SQLite, MySQL, PostgreSQL) and keep it in a
//! process-wide registry under an alias.

pub mod cli;
pub mod config;
pub mod db;
pub mod dialects;
pub mod error;
pub mod factory;
pub mod manager;
pub mod models;
pub mod orm;
pub mod testing;

pub use config::{Config, DatabaseConfig, PoolOptions, set_database_config};
pub use db::{Db, Session, SessionOptions};
pub use error::{DbError, DbResult};
pub use factory::{CreateOptions, DbFactory, create_db};
pub use manager::{DbManager, DbOption};
pub use models::{DbSource, DriverType};
pub use orm::{Base, Column, Table, declarative_base};
