//! SQLite files and in-memory databases.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use super::Dialect;
use crate::db::Db;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionUrl, DriverType, SqliteLocation};

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

#[async_trait(?Send)]
impl Dialect for SqliteDialect {
    fn driver(&self) -> DriverType {
        DriverType::Sqlite3
    }

    fn connection_url(&self, _url: &ConnectionUrl) -> Option<Url> {
        None
    }

    /// The file itself is created on connect; only its directory is made here.
    async fn create_database(&self, url: &ConnectionUrl) -> DbResult<()> {
        let Some(SqliteLocation::File(path)) = url.sqlite_location() else {
            return Ok(());
        };
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!(dir = %parent.display(), "Creating database directory");
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DbError::io(parent.display().to_string(), e))?;
            }
        }
        Ok(())
    }

    async fn drop_database(&self, db: &Db) -> DbResult<()> {
        let path = match db.url().sqlite_location() {
            Some(SqliteLocation::File(path)) => path.clone(),
            // Nothing on disk
            _ => return Ok(()),
        };

        db.close().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                for suffix in ["-wal", "-shm", "-journal"] {
                    // Usually gone already once the last connection closed
                    let _ = tokio::fs::remove_file(format!("{}{}", path, suffix)).await;
                }
                info!(path = %path, "SQLite database removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path, "SQLite database file already gone");
                Ok(())
            }
            Err(e) => Err(DbError::io(path, e)),
        }
    }
}
