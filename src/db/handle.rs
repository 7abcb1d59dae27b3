//! Database handles.
//!
//! A [`Db`] bundles everything an application needs to talk to one database:
//! the classified URL, the connection pool, a session factory and the
//! declarative base whose tables live there.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::db::pool::DbPool;
use crate::db::session::{Session, SessionFactory, SessionOptions};
use crate::dialects::{Dialect, dialect_for};
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionUrl, DriverType};
use crate::orm::Base;

/// Handle information safe to print (no secrets exposed).
#[derive(Debug, Clone, Serialize)]
pub struct DbSummary {
    pub driver: DriverType,
    /// Connection URL with the password masked.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
}

/// A ready-to-use database handle. Cloning is cheap and shares the pool.
#[derive(Debug, Clone)]
pub struct Db {
    url: Arc<ConnectionUrl>,
    pool: DbPool,
    sessions: SessionFactory,
    base: Option<Arc<Base>>,
}

impl Db {
    pub fn new(
        url: ConnectionUrl,
        pool: DbPool,
        base: Option<Arc<Base>>,
        session_options: SessionOptions,
    ) -> Self {
        debug!(url = %url, "Database handle created");
        Self {
            url: Arc::new(url),
            sessions: SessionFactory::new(pool.clone(), session_options),
            pool,
            base,
        }
    }

    pub fn url(&self) -> &ConnectionUrl {
        &self.url
    }

    pub fn driver(&self) -> DriverType {
        self.url.driver()
    }

    /// Database name, or the file path for SQLite.
    pub fn database(&self) -> Option<String> {
        self.url.database()
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn base(&self) -> Option<&Arc<Base>> {
        self.base.as_ref()
    }

    /// The session factory bound to this handle's pool.
    pub fn sessions(&self) -> &SessionFactory {
        &self.sessions
    }

    /// Start a new session.
    pub async fn session(&self) -> DbResult<Session> {
        self.sessions.begin().await
    }

    /// The dialect that bootstraps and tears down this database.
    pub fn dialect(&self) -> &'static dyn Dialect {
        dialect_for(self.driver())
    }

    fn require_base(&self) -> DbResult<&Arc<Base>> {
        self.base.as_ref().ok_or_else(|| {
            DbError::config(format!("{} has no declarative base to create tables from", self))
        })
    }

    /// Create the base's tables (all of them when `tables` is `None`).
    ///
    /// With `checkfirst`, tables that already exist are left alone.
    pub async fn create_all(&self, tables: Option<&[&str]>, checkfirst: bool) -> DbResult<()> {
        let base = self.require_base()?;
        let tables = base.select_tables(tables)?;
        let driver = self.driver();

        let mut session = self.session().await?;
        for table in &tables {
            session.execute(&table.create_sql(driver, checkfirst)).await?;
        }
        session.commit().await?;

        info!(db = %self, base = base.name(), count = tables.len(), "Created tables");
        Ok(())
    }

    /// Drop the base's tables in reverse declaration order.
    pub async fn drop_all(&self, tables: Option<&[&str]>, checkfirst: bool) -> DbResult<()> {
        let base = self.require_base()?;
        let tables = base.select_tables(tables)?;
        let driver = self.driver();

        let mut session = self.session().await?;
        for table in tables.iter().rev() {
            session.execute(&table.drop_sql(driver, checkfirst)).await?;
        }
        session.commit().await?;

        info!(db = %self, base = base.name(), count = tables.len(), "Dropped tables");
        Ok(())
    }

    /// Drop the database itself using the dialect's teardown.
    pub async fn drop_db(&self) -> DbResult<()> {
        self.dialect().drop_database(self).await
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn summary(&self) -> DbSummary {
        DbSummary {
            driver: self.driver(),
            url: self.url.masked(),
            database: self.database(),
            base: self.base.as_ref().map(|b| b.name().to_string()),
            server_version: self.pool.server_version().await,
        }
    }
}

impl std::fmt::Display for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.database() {
            Some(database) => write!(f, "DB(database={})", database),
            None => write!(f, "DB(database=None)"),
        }
    }
}
