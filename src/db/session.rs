//! Session factory and transactional sessions.
//!
//! A [`Session`] holds a dedicated connection inside a transaction until it is
//! committed or rolled back. Dropping a session without committing rolls it back.

use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};
use crate::models::DriverType;
use sqlx::{MySql, Postgres, Sqlite, Transaction};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Options applied to every session a factory hands out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Per-statement timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl SessionOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Driver-specific transaction wrapper.
pub enum DbTransaction {
    MySql(Transaction<'static, MySql>),
    Postgres(Transaction<'static, Postgres>),
    SQLite(Transaction<'static, Sqlite>),
}

impl DbTransaction {
    /// Begin a transaction on a pooled connection.
    pub async fn begin(pool: &DbPool) -> DbResult<Self> {
        Ok(match pool {
            DbPool::MySql(p) => DbTransaction::MySql(p.begin().await?),
            DbPool::Postgres(p) => DbTransaction::Postgres(p.begin().await?),
            DbPool::SQLite(p) => DbTransaction::SQLite(p.begin().await?),
        })
    }

    pub fn driver(&self) -> DriverType {
        match self {
            DbTransaction::MySql(_) => DriverType::MySql,
            DbTransaction::Postgres(_) => DriverType::NoSpecific,
            DbTransaction::SQLite(_) => DriverType::Sqlite3,
        }
    }

    /// Commit the transaction.
    pub async fn commit(self) -> DbResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.commit().await.map_err(DbError::from),
            DbTransaction::Postgres(tx) => tx.commit().await.map_err(DbError::from),
            DbTransaction::SQLite(tx) => tx.commit().await.map_err(DbError::from),
        }
    }

    /// Rollback the transaction.
    pub async fn rollback(self) -> DbResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.rollback().await.map_err(DbError::from),
            DbTransaction::Postgres(tx) => tx.rollback().await.map_err(DbError::from),
            DbTransaction::SQLite(tx) => tx.rollback().await.map_err(DbError::from),
        }
    }
}

impl std::fmt::Debug for DbTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DbTransaction").field(&self.driver()).finish()
    }
}

/// Hands out sessions bound to one pool.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    pool: DbPool,
    options: SessionOptions,
}

impl SessionFactory {
    pub fn new(pool: DbPool, options: SessionOptions) -> Self {
        Self { pool, options }
    }

    /// Replace the options used for sessions created from now on.
    pub fn configure(&mut self, options: SessionOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Start a new session.
    pub async fn begin(&self) -> DbResult<Session> {
        let tx = with_timeout(
            "begin session",
            self.options.timeout,
            DbTransaction::begin(&self.pool),
        )
        .await?;
        debug!(driver = %tx.driver(), "Session started");
        Ok(Session {
            tx,
            timeout: self.options.timeout,
        })
    }
}

/// A unit of work inside one transaction.
#[derive(Debug)]
pub struct Session {
    tx: DbTransaction,
    timeout: Option<Duration>,
}

impl Session {
    pub fn driver(&self) -> DriverType {
        self.tx.driver()
    }

    /// Execute a statement that returns no rows.
    pub async fn execute(&mut self, sql: &str) -> DbResult<u64> {
        let timeout = self.timeout;
        let fut = async {
            let affected = match &mut self.tx {
                DbTransaction::MySql(tx) => {
                    sqlx::raw_sql(sql).execute(&mut **tx).await?.rows_affected()
                }
                DbTransaction::Postgres(tx) => {
                    sqlx::raw_sql(sql).execute(&mut **tx).await?.rows_affected()
                }
                DbTransaction::SQLite(tx) => {
                    sqlx::raw_sql(sql).execute(&mut **tx).await?.rows_affected()
                }
            };
            Ok::<_, DbError>(affected)
        };
        with_timeout("execute", timeout, fut).await
    }

    /// Fetch a single integer, e.g. from `SELECT COUNT(*)`.
    pub async fn fetch_i64(&mut self, sql: &str) -> DbResult<i64> {
        let timeout = self.timeout;
        let fut = async {
            let value = match &mut self.tx {
                DbTransaction::MySql(tx) => {
                    sqlx::query_scalar::<_, i64>(sql).fetch_one(&mut **tx).await?
                }
                DbTransaction::Postgres(tx) => {
                    sqlx::query_scalar::<_, i64>(sql).fetch_one(&mut **tx).await?
                }
                DbTransaction::SQLite(tx) => {
                    sqlx::query_scalar::<_, i64>(sql).fetch_one(&mut **tx).await?
                }
            };
            Ok::<_, DbError>(value)
        };
        with_timeout("fetch", timeout, fut).await
    }

    /// Commit the session's transaction.
    pub async fn commit(self) -> DbResult<()> {
        with_timeout("commit", self.timeout, self.tx.commit()).await
    }

    /// Roll back the session's transaction.
    pub async fn rollback(self) -> DbResult<()> {
        with_timeout("rollback", self.timeout, self.tx.rollback()).await
    }
}

/// Run `fut`, failing with [`DbError::Timeout`] when it exceeds `limit`.
async fn with_timeout<T, E, F>(operation: &str, limit: Option<Duration>, fut: F) -> DbResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<DbError>,
{
    let result = match limit {
        Some(limit) => timeout(limit, fut)
            .await
            .map_err(|_| DbError::timeout(operation, limit))?,
        None => fut.await,
    };
    result.map_err(Into::into)
}
