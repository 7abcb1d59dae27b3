//! Throwaway databases for tests.
//!
//! [`create_test_db`] creates a database named after the calling test's file
//! and line, creates the tables of its base and hands back a [`TestDb`].
//! Calling [`TestDb::finish`] drops the database again. Databases whose
//! `finish` never ran are tracked and removed by [`cleanup_test_dbs`].

use std::collections::HashMap;
use std::ops::Deref;
use std::panic::Location;
use std::path::Path;
use std::sync::{LazyLock, Mutex, PoisonError};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::db::Db;
use crate::error::{DbError, DbResult};
use crate::factory::{CreateOptions, DbFactory};
use crate::models::{DbSource, DriverType, mask_password};

/// Longest database name accepted by MySQL and PostgreSQL.
pub const MAX_DATABASE_NAME_LEN: usize = 64;

/// Username used in generated names when no username is configured.
const FALLBACK_USERNAME: &str = "sqlgold";

/// Test databases that still have to be dropped, by alias.
static PENDING: LazyLock<Mutex<HashMap<String, Db>>> = LazyLock::new(|| Mutex::new(HashMap::new()));

/// How to build a test database.
///
/// With nothing set, the `test` sub-section of the configured default driver
/// is used (`sqlite3.test` when `default = "sqlite3"`).
#[derive(Debug, Clone)]
pub struct TestDbOptions {
    pub url: Option<String>,
    pub config: Option<DatabaseConfig>,
    pub config_section: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub driver: Option<String>,
    pub host: Option<String>,
    /// Drop the database in [`TestDb::finish`] (default: true).
    pub drop: bool,
    /// Append four random hex digits to generated names.
    pub random_suffix: bool,
    pub create: CreateOptions,
    caller: &'static Location<'static>,
}

impl TestDbOptions {
    /// Options for a database named after the caller's file and line.
    #[track_caller]
    pub fn new() -> Self {
        Self {
            url: None,
            config: None,
            config_section: None,
            database: None,
            username: None,
            password: None,
            driver: None,
            host: None,
            drop: true,
            random_suffix: false,
            create: CreateOptions::default(),
            caller: Location::caller(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_config(mut self, config: DatabaseConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.config_section = Some(section.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_drop(mut self, drop: bool) -> Self {
        self.drop = drop;
        self
    }

    pub fn with_random_suffix(mut self, random_suffix: bool) -> Self {
        self.random_suffix = random_suffix;
        self
    }

    pub fn with_create(mut self, create: CreateOptions) -> Self {
        self.create = create;
        self
    }

    /// Where [`new`](Self::new) was called from.
    pub fn caller(&self) -> &'static Location<'static> {
        self.caller
    }
}

impl Default for TestDbOptions {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

/// Database name for a test: `{username}_{file}_line_{line}[_{hex}]`.
///
/// Names longer than [`MAX_DATABASE_NAME_LEN`] are shortened in the middle so
/// the username and the random suffix survive.
pub fn make_db_name(
    username: &str,
    caller: &Location<'_>,
    random_suffix: bool,
) -> DbResult<String> {
    let stem = Path::new(caller.file())
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "test".to_string());
    let label = format!("{}_line_{}", stem, caller.line());
    let suffix = if random_suffix {
        format!("_{}", &Uuid::new_v4().simple().to_string()[..4])
    } else {
        String::new()
    };

    let mut name = format!("{}_{}{}", username, label, suffix);
    if name.len() > MAX_DATABASE_NAME_LEN {
        let keep = MAX_DATABASE_NAME_LEN.saturating_sub(username.len() + 1 + suffix.len());
        let label: String = label.chars().take(keep).collect();
        name = format!("{}_{}{}", username, label, suffix);
    }
    if name.len() > MAX_DATABASE_NAME_LEN {
        return Err(DbError::invalid_input(format!(
            "Database name '{}' is longer than {} characters",
            name, MAX_DATABASE_NAME_LEN
        )));
    }
    Ok(name)
}

/// A database created for one test.
#[derive(Debug)]
pub struct TestDb {
    db: Db,
    alias: String,
    drop: bool,
    factory: DbFactory,
    finished: bool,
}

impl TestDb {
    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Drop the database (unless dropping was turned off) and unregister it.
    pub async fn finish(mut self) -> DbResult<()> {
        self.finished = true;
        if !self.drop {
            return Ok(());
        }
        pending().remove(&self.alias);
        self.factory.manager().remove_database(&self.alias);
        self.db.drop_db().await
    }
}

impl Deref for TestDb {
    type Target = Db;

    fn deref(&self) -> &Db {
        &self.db
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        if self.drop && !self.finished {
            warn!(
                alias = %mask_password(&self.alias),
                "Test database was not finished; cleanup_test_dbs() will drop it"
            );
        }
    }
}

fn pending() -> std::sync::MutexGuard<'static, HashMap<String, Db>> {
    PENDING.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolve the settings for a test database from the options and the factory's config.
fn test_source(factory: &DbFactory, options: &TestDbOptions) -> DbResult<DbSource> {
    if let Some(url) = &options.url {
        return Ok(DbSource::Url(url.clone()));
    }

    let mut config = match &options.config {
        Some(config) => config.clone(),
        None => {
            let section = match &options.config_section {
                Some(section) => section.clone(),
                None => {
                    let driver = match &options.driver {
                        Some(driver) => driver.clone(),
                        None => factory
                            .config()
                            .default_entry()?
                            .as_str()
                            .map(str::to_string)
                            .ok_or_else(|| {
                                DbError::config(
                                    "'default' must name a driver section to find its test settings",
                                )
                            })?,
                    };
                    format!("{}.test", driver)
                }
            };
            factory.config().database_config(&section)?
        }
    };

    if let Some(url) = config.url.take() {
        return Ok(DbSource::Url(url));
    }

    if options.driver.is_some() {
        config.driver = options.driver.clone();
    }
    if options.username.is_some() {
        config.username = options.username.clone();
    }
    if options.password.is_some() {
        config.password = options.password.clone();
    }
    if options.host.is_some() {
        config.host = options.host.clone();
    }

    let database = match &options.database {
        Some(database) => database.clone(),
        None => {
            let username = config.username.as_deref().unwrap_or(FALLBACK_USERNAME);
            make_db_name(username, options.caller, options.random_suffix)?
        }
    };
    let is_sqlite = config
        .driver
        .as_deref()
        .is_some_and(|d| DriverType::from_driver_name(d) == DriverType::Sqlite3);
    if !is_sqlite && database.len() > MAX_DATABASE_NAME_LEN {
        return Err(DbError::invalid_input(format!(
            "Database name '{}' is longer than {} characters",
            database, MAX_DATABASE_NAME_LEN
        )));
    }
    config.database = Some(database);
    Ok(DbSource::Dict(config))
}

/// Create a test database and the tables of its base.
pub async fn create_test_db(factory: &DbFactory, options: TestDbOptions) -> DbResult<TestDb> {
    let source = test_source(factory, &options)?;
    let alias = match &options.create.alias {
        Some(alias) => alias.clone(),
        None => source.implied_alias()?,
    };
    let create = options.create.clone().with_alias(alias.clone());
    let db = factory.create_db(source, create).await?;

    if options.drop {
        pending().insert(alias.clone(), db.clone());
    }
    if db.base().is_some() {
        db.create_all(None, true).await?;
    }
    debug!(alias = %mask_password(&alias), db = %db, "Test database ready");

    Ok(TestDb {
        db,
        alias,
        drop: options.drop,
        factory: factory.clone(),
        finished: false,
    })
}

/// Drop every test database whose [`TestDb::finish`] never ran.
///
/// Returns how many were dropped. Failures are logged and skipped.
pub async fn cleanup_test_dbs() -> usize {
    let leftovers: Vec<(String, Db)> = pending().drain().collect();
    let mut dropped = 0;
    for (alias, db) in leftovers {
        debug!(alias = %mask_password(&alias), db = %db, "Dropping an unfinished test database");
        match db.drop_db().await {
            Ok(()) => dropped += 1,
            Err(e) => warn!(alias = %mask_password(&alias), error = %e, "Failed to drop test database"),
        }
    }
    dropped
}

/// Number of rows in `table`.
pub async fn count(db: &Db, table: &str) -> DbResult<i64> {
    let mut session = db.session().await?;
    let count = session
        .fetch_i64(&format!(
            "SELECT COUNT(*) FROM {}",
            db.driver().quote_ident(table)
        ))
        .await?;
    session.rollback().await?;
    Ok(count)
}
