//! Databases without a specific dialect, served by PostgreSQL.

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use super::{Dialect, drop_base_tables};
use crate::db::{Db, connect_server};
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionUrl, DriverType};

/// Maintenance database every PostgreSQL server has.
const MAINTENANCE_DATABASE: &str = "postgres";

#[derive(Debug, Default, Clone, Copy)]
pub struct GenericDialect;

impl GenericDialect {
    fn server_pool_url(&self, url: &ConnectionUrl) -> DbResult<Url> {
        self.connection_url(url)
            .ok_or_else(|| DbError::config(format!("'{}' is not a server URL", url)))
    }
}

fn database_exists_sql(database: &str) -> String {
    format!(
        "SELECT COUNT(*) FROM pg_database WHERE datname = '{}'",
        database.replace('\'', "''")
    )
}

fn create_database_sql(database: &str) -> String {
    format!(
        "CREATE DATABASE {}",
        DriverType::NoSpecific.quote_ident(database)
    )
}

#[async_trait(?Send)]
impl Dialect for GenericDialect {
    fn driver(&self) -> DriverType {
        DriverType::NoSpecific
    }

    fn connection_url(&self, url: &ConnectionUrl) -> Option<Url> {
        url.with_database(Some(MAINTENANCE_DATABASE))
    }

    async fn create_database(&self, url: &ConnectionUrl) -> DbResult<()> {
        let Some(database) = url.database() else {
            debug!(url = %url, "No database named, nothing to create");
            return Ok(());
        };
        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(DbError::unsupported_driver(url.scheme()));
        }
        if database == MAINTENANCE_DATABASE {
            return Ok(());
        }

        let pool = connect_server(&self.server_pool_url(url)?).await?;
        let result = async {
            let exists = pool.fetch_i64(&database_exists_sql(&database)).await?;
            if exists == 0 {
                // CREATE DATABASE cannot run inside a transaction block
                pool.execute(&create_database_sql(&database)).await?;
                info!(database = %database, "Database created");
            }
            Ok::<_, DbError>(())
        }
        .await;
        pool.close().await;
        result
    }

    async fn drop_database(&self, db: &Db) -> DbResult<()> {
        let Some(database) = db.database() else {
            return Ok(());
        };
        drop_base_tables(db).await?;
        // The server refuses to drop a database with open connections
        db.close().await;

        let pool = connect_server(&self.server_pool_url(db.url())?).await?;
        let result = pool
            .execute(&format!(
                "DROP DATABASE IF EXISTS {}",
                DriverType::NoSpecific.quote_ident(&database)
            ))
            .await;
        pool.close().await;
        result?;

        info!(database = %database, "Database dropped");
        Ok(())
    }
}
