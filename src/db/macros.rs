//! Database dispatch macros for reducing code duplication.
//!
//! This module provides declarative macros that generate driver-specific
//! match arms over [`DbPool`](crate::db::pool::DbPool) while keeping the
//! call sites linear. The macros expand at compile time with zero runtime overhead.

/// Macro for generating database dispatch match arms.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(pool, {
///     MySql(p) => do_mysql(p),
///     Postgres(p) => do_postgres(p),
///     SQLite(p) => do_sqlite(p),
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $pool {
            $(
                $crate::db::pool::DbPool::$variant($p) => $body,
            )+
        }
    };
}

/// Same as [`impl_db_dispatch!`] with one body shared by every driver.
#[macro_export]
macro_rules! db_dispatch_all {
    ($pool:expr, $p:ident => $body:expr) => {
        $crate::impl_db_dispatch!($pool, {
            MySql($p) => $body,
            Postgres($p) => $body,
            SQLite($p) => $body,
        })
    };
}

pub use db_dispatch_all;
pub use impl_db_dispatch;
