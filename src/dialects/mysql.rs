//! MySQL and MariaDB.

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use super::{Dialect, drop_base_tables};
use crate::db::{Db, SessionFactory, SessionOptions, connect_server};
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionUrl, DriverType};

#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDialect;

impl MySqlDialect {
    fn server_pool_url(&self, url: &ConnectionUrl) -> DbResult<Url> {
        self.connection_url(url)
            .ok_or_else(|| DbError::config(format!("'{}' is not a server URL", url)))
    }
}

fn create_database_sql(database: &str, charset: &str) -> String {
    format!(
        "CREATE DATABASE IF NOT EXISTS {} CHARACTER SET = '{}'",
        DriverType::MySql.quote_ident(database),
        charset
    )
}

fn use_database_sql(database: &str) -> String {
    format!("USE {}", DriverType::MySql.quote_ident(database))
}

/// Character sets are interpolated into DDL, so only plain names are accepted.
fn validate_charset(charset: &str) -> DbResult<()> {
    if charset.is_empty()
        || !charset
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(DbError::invalid_input(format!(
            "Invalid character set '{}'",
            charset
        )));
    }
    Ok(())
}

#[async_trait(?Send)]
impl Dialect for MySqlDialect {
    fn driver(&self) -> DriverType {
        DriverType::MySql
    }

    fn connection_url(&self, url: &ConnectionUrl) -> Option<Url> {
        let mut server = url.with_database(None)?;
        server.set_query(None);
        Some(server)
    }

    async fn create_database(&self, url: &ConnectionUrl) -> DbResult<()> {
        let Some(database) = url.database() else {
            debug!(url = %url, "No database named, nothing to create");
            return Ok(());
        };
        let charset = url.charset();
        validate_charset(&charset)?;

        let pool = connect_server(&self.server_pool_url(url)?).await?;
        let result = async {
            let sessions = SessionFactory::new(pool.clone(), SessionOptions::default());
            let mut session = sessions.begin().await?;
            session
                .execute(&create_database_sql(&database, &charset))
                .await?;
            session.execute(&use_database_sql(&database)).await?;
            session.commit().await
        }
        .await;
        pool.close().await;
        result?;

        info!(database = %database, charset = %charset, "MySQL database ready");
        Ok(())
    }

    async fn drop_database(&self, db: &Db) -> DbResult<()> {
        let Some(database) = db.database() else {
            return Ok(());
        };
        drop_base_tables(db).await?;

        let pool = connect_server(&self.server_pool_url(db.url())?).await?;
        let result = pool
            .execute(&format!(
                "DROP DATABASE IF EXISTS {}",
                DriverType::MySql.quote_ident(&database)
            ))
            .await;
        pool.close().await;
        result?;

        db.close().await;
        info!(database = %database, "MySQL database dropped");
        Ok(())
    }
}
