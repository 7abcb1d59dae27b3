//! Builds database handles from URLs, dictionaries and config sections.
//!
//! Every handle is created at most once per alias: asking again for an alias
//! that is already registered returns the registered handle. Handles whose
//! pool was closed by a drop are replaced.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{self, Config, DatabaseConfig, PoolOptions};
use crate::db::{Db, DbPool, SessionOptions};
use crate::dialects::dialect_for;
use crate::error::{DbError, DbResult};
use crate::manager::{DbManager, DbOption};
use crate::models::{ConnectionUrl, DbSource, mask_password};
use crate::orm::Base;

/// Per-call options for [`DbFactory::create_db`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Declarative base for the handle. Falls back to the base registered for
    /// the alias, then to the default base.
    pub base: Option<Arc<Base>>,
    /// Create the base's tables after connecting.
    pub create_all: bool,
    /// Alias to register the handle under, instead of the implied one.
    pub alias: Option<String>,
    pub session: SessionOptions,
    /// Pool settings, overriding the URL and dictionary ones.
    pub pool: PoolOptions,
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(mut self, base: Arc<Base>) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_create_all(mut self, create_all: bool) -> Self {
        self.create_all = create_all;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_session(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }

    pub fn with_pool(mut self, pool: PoolOptions) -> Self {
        self.pool = pool;
        self
    }
}

/// A connection URL resolved from a [`DbSource`], with the pool settings
/// that came along with it.
#[derive(Debug)]
struct Resolved {
    url: String,
    pool: PoolOptions,
}

/// Creates handles and registers them with a [`DbManager`].
#[derive(Debug, Clone)]
pub struct DbFactory {
    manager: DbManager,
    config: Config,
}

impl DbFactory {
    pub fn new(manager: DbManager, config: Config) -> Self {
        Self { manager, config }
    }

    /// A factory over the process-wide registry and configuration.
    pub fn global() -> Self {
        Self::new(DbManager::global(), config::current())
    }

    pub fn manager(&self) -> &DbManager {
        &self.manager
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn create_db_from_url(&self, url: &str, options: CreateOptions) -> DbResult<Db> {
        self.create_db(DbSource::Url(url.to_string()), options).await
    }

    pub async fn create_db_from_dict(
        &self,
        config: DatabaseConfig,
        options: CreateOptions,
    ) -> DbResult<Db> {
        self.create_db(DbSource::Dict(config), options).await
    }

    /// Create a handle from a dotted section path such as `mysql.test`.
    pub async fn create_db_from_section(
        &self,
        section: &str,
        options: CreateOptions,
    ) -> DbResult<Db> {
        self.create_db(DbSource::Section(section.to_string()), options)
            .await
    }

    /// Create (or look up) the handle for `source`.
    pub async fn create_db(
        &self,
        source: impl Into<DbSource>,
        options: CreateOptions,
    ) -> DbResult<Db> {
        let source = source.into();
        let alias = match &options.alias {
            Some(alias) => alias.clone(),
            None => source.implied_alias()?,
        };
        let create_all =
            options.create_all || self.manager.has_default_option(DbOption::CreateAll);

        // A dropped database leaves a closed handle behind; build a fresh one
        self.manager.remove_if_closed(&alias);

        if let Some(existing) = self.manager.get_database(&alias) {
            debug!(alias = %mask_password(&alias), db = %existing, "Database already registered");
            check_base(&alias, &existing, options.base.as_ref())?;
            if create_all && existing.base().is_some() {
                existing.create_all(None, true).await?;
            }
            return Ok(existing);
        }

        let base = options.base.clone().or_else(|| self.implied_base(&alias));
        let resolved = self.resolve(&source)?;
        let db = self.build(&resolved, base, &options).await?;

        if create_all && db.base().is_some() {
            if let Err(e) = db.create_all(None, true).await {
                db.close().await;
                return Err(e);
            }
        }

        if let Some(winner) = self.manager.register(&alias, db.clone()) {
            // Lost a race with another caller creating the same alias
            warn!(alias = %mask_password(&alias), "Database registered concurrently, discarding new handle");
            db.close().await;
            check_base(&alias, &winner, options.base.as_ref())?;
            return Ok(winner);
        }

        if let Some(base) = options.base {
            self.manager.set_base(alias.as_str(), Arc::clone(&base));
            self.manager.set_default_base_if_unset(base);
        }

        info!(
            alias = %mask_password(&alias),
            source = source.kind(),
            driver = %db.driver(),
            db = %db,
            "Database created"
        );
        Ok(db)
    }

    /// The base registered for the alias, then the default base.
    fn implied_base(&self, alias: &str) -> Option<Arc<Base>> {
        self.manager
            .get_base(alias)
            .or_else(|| self.manager.default_base())
    }

    fn resolve(&self, source: &DbSource) -> DbResult<Resolved> {
        match source {
            DbSource::Url(url) => Ok(Resolved {
                url: url.clone(),
                pool: PoolOptions::default(),
            }),
            DbSource::Dict(config) => Ok(Resolved {
                url: config.connection_url()?,
                pool: config.pool.clone(),
            }),
            DbSource::Section(path) => {
                let config = self.config.database_config(path)?;
                self.resolve(&DbSource::Dict(config))
            }
            DbSource::Default => match self.config.default_entry()? {
                toml::Value::String(section) => {
                    self.resolve(&DbSource::Section(section.clone()))
                }
                toml::Value::Table(table) => {
                    let config: DatabaseConfig = toml::Value::Table(table.clone()).try_into()?;
                    self.resolve(&DbSource::Dict(config))
                }
                other => Err(DbError::config(format!(
                    "'default' must name a section or be a table, got {}",
                    other.type_str()
                ))),
            },
        }
    }

    /// Bootstrap the database, then connect to it.
    async fn build(
        &self,
        resolved: &Resolved,
        base: Option<Arc<Base>>,
        options: &CreateOptions,
    ) -> DbResult<Db> {
        let url = ConnectionUrl::parse(&resolved.url)?;
        let pool_options = url
            .pool_options()
            .merged_with(&resolved.pool)
            .merged_with(&options.pool);
        pool_options.validate().map_err(DbError::config)?;

        dialect_for(url.driver()).create_database(&url).await?;
        let pool = DbPool::connect(&url, &pool_options).await?;
        Ok(Db::new(url, pool, base, options.session.clone()))
    }
}

/// An explicit base must be the one the registered handle already carries.
fn check_base(alias: &str, db: &Db, explicit: Option<&Arc<Base>>) -> DbResult<()> {
    let Some(explicit) = explicit else {
        return Ok(());
    };
    if db.base().is_some_and(|base| Arc::ptr_eq(base, explicit)) {
        return Ok(());
    }
    Err(DbError::invalid_input(format!(
        "Database '{}' is already registered with a base other than '{}'",
        mask_password(alias),
        explicit.name()
    )))
}

/// Create a handle with the process-wide registry and configuration.
pub async fn create_db(source: impl Into<DbSource>, options: CreateOptions) -> DbResult<Db> {
    DbFactory::global().create_db(source, options).await
}
