//! Database access layer.
//!
//! This module provides:
//! - Driver-specific connection pools
//! - Sessions with per-statement timeouts
//! - Database handles tying a pool to its declarative base
//! - Database dispatch macros for reducing code duplication

pub mod handle;
#[macro_use]
pub mod macros;
pub mod pool;
pub mod session;

pub use handle::{Db, DbSummary};
pub use pool::{DbPool, connect_server};
pub use session::{DbTransaction, Session, SessionFactory, SessionOptions};
