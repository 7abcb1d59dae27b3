//! Per-vendor database bootstrap and teardown.
//!
//! A handle's pool connects to its database eagerly, so the database must
//! exist first: the factory runs [`Dialect::create_database`] before
//! connecting, and [`Dialect::drop_database`] tears a handle's database down.

mod generic;
mod mysql;
mod sqlite;

use async_trait::async_trait;
use url::Url;

use crate::db::Db;
use crate::error::DbResult;
use crate::models::{ConnectionUrl, DriverType};

pub use generic::GenericDialect;
pub use mysql::MySqlDialect;
pub use sqlite::SqliteDialect;

/// Vendor-specific behaviour around a database's lifetime.
#[async_trait(?Send)]
pub trait Dialect: Send + Sync + std::fmt::Debug {
    /// The driver family this dialect serves.
    fn driver(&self) -> DriverType;

    /// Server-level URL used to create and drop databases.
    ///
    /// `None` when the dialect does not talk to a server.
    fn connection_url(&self, url: &ConnectionUrl) -> Option<Url>;

    /// Make sure the database named by `url` exists.
    async fn create_database(&self, url: &ConnectionUrl) -> DbResult<()>;

    /// Remove the handle's database and everything in it.
    async fn drop_database(&self, db: &Db) -> DbResult<()>;
}

static GENERIC: GenericDialect = GenericDialect;
static MYSQL: MySqlDialect = MySqlDialect;
static SQLITE: SqliteDialect = SqliteDialect;

/// The dialect for a driver family.
pub fn dialect_for(driver: DriverType) -> &'static dyn Dialect {
    match driver {
        DriverType::NoSpecific => &GENERIC,
        DriverType::MySql => &MYSQL,
        DriverType::Sqlite3 => &SQLITE,
    }
}

/// Drop the base's tables before the database itself goes away.
async fn drop_base_tables(db: &Db) -> DbResult<()> {
    if db.base().is_some() {
        db.drop_all(None, true).await?;
    }
    Ok(())
}
