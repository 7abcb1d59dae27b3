//! Registry of database handles and declarative bases.
//!
//! Handles and bases are registered under an alias. The first handle ever
//! registered becomes the main database, and the first base declared becomes
//! the default base for handles created without one.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::db::Db;
use crate::error::{DbError, DbResult};
use crate::models::mask_password;
use crate::orm::Base;

/// Behaviour applied to every handle the factory creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbOption {
    /// Create the base's tables even when the caller did not ask for it.
    CreateAll,
}

#[derive(Debug, Default)]
struct Registry {
    databases: HashMap<String, Db>,
    main_database: Option<String>,
    bases: HashMap<String, Arc<Base>>,
    default_base: Option<Arc<Base>>,
    default_options: HashSet<DbOption>,
}

/// Shared alias registry. Clones share the same maps.
#[derive(Debug, Clone, Default)]
pub struct DbManager {
    inner: Arc<RwLock<Registry>>,
}

static GLOBAL_MANAGER: LazyLock<RwLock<DbManager>> =
    LazyLock::new(|| RwLock::new(DbManager::new()));

impl DbManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> DbManager {
        GLOBAL_MANAGER
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the process-wide registry, returning the previous one.
    pub fn set_global(manager: DbManager) -> DbManager {
        let mut global = GLOBAL_MANAGER.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *global, manager)
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a handle, replacing any handle under the same alias.
    pub fn set_database(&self, alias: impl Into<String>, db: Db) {
        let alias = alias.into();
        debug!(alias = %mask_password(&alias), db = %db, "Registering database");
        let mut registry = self.write();
        if registry.main_database.is_none() {
            registry.main_database = Some(alias.clone());
        }
        registry.databases.insert(alias, db);
    }

    /// Register a handle unless the alias is taken.
    ///
    /// Returns the handle already registered under `alias`, in which case `db`
    /// is not registered.
    pub fn register(&self, alias: &str, db: Db) -> Option<Db> {
        let mut registry = self.write();
        if let Some(existing) = registry.databases.get(alias) {
            return Some(existing.clone());
        }
        if registry.main_database.is_none() {
            info!(alias = %mask_password(&alias), "Main database set");
            registry.main_database = Some(alias.to_string());
        }
        registry.databases.insert(alias.to_string(), db);
        None
    }

    pub fn get_database(&self, alias: &str) -> Option<Db> {
        self.read().databases.get(alias).cloned()
    }

    /// Like [`get_database`](Self::get_database) but unknown aliases are an error.
    pub fn database(&self, alias: &str) -> DbResult<Db> {
        self.get_database(alias)
            .ok_or_else(|| DbError::alias_not_found(alias))
    }

    pub fn has_database(&self, alias: &str) -> bool {
        self.read().databases.contains_key(alias)
    }

    /// Forget a handle. The main database is cleared when it is the one removed.
    pub fn remove_database(&self, alias: &str) -> Option<Db> {
        let mut registry = self.write();
        let removed = registry.databases.remove(alias);
        if registry.main_database.as_deref() == Some(alias) {
            registry.main_database = None;
        }
        removed
    }

    /// Forget the handle under `alias` if its pool has been closed, e.g. after
    /// its database was dropped. Returns whether a handle was removed.
    pub fn remove_if_closed(&self, alias: &str) -> bool {
        let mut registry = self.write();
        if !registry
            .databases
            .get(alias)
            .is_some_and(|db| db.pool().is_closed())
        {
            return false;
        }
        registry.databases.remove(alias);
        if registry.main_database.as_deref() == Some(alias) {
            registry.main_database = None;
        }
        debug!(alias = %mask_password(alias), "Removed closed database");
        true
    }

    pub fn has_main_database(&self) -> bool {
        let registry = self.read();
        registry
            .main_database
            .as_ref()
            .is_some_and(|alias| registry.databases.contains_key(alias))
    }

    /// Make an already registered alias the main database.
    pub fn set_main_database(&self, alias: &str) -> DbResult<()> {
        let mut registry = self.write();
        if !registry.databases.contains_key(alias) {
            return Err(DbError::alias_not_found(alias));
        }
        registry.main_database = Some(alias.to_string());
        Ok(())
    }

    pub fn get_main_database(&self) -> DbResult<Db> {
        let registry = self.read();
        registry
            .main_database
            .as_ref()
            .and_then(|alias| registry.databases.get(alias))
            .cloned()
            .ok_or(DbError::NoMainDatabase)
    }

    pub fn main_alias(&self) -> Option<String> {
        self.read().main_database.clone()
    }

    /// Registered aliases, sorted.
    pub fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.read().databases.keys().cloned().collect();
        aliases.sort();
        aliases
    }

    pub fn set_base(&self, alias: impl Into<String>, base: Arc<Base>) {
        self.write().bases.insert(alias.into(), base);
    }

    pub fn get_base(&self, alias: &str) -> Option<Arc<Base>> {
        self.read().bases.get(alias).cloned()
    }

    pub fn default_base(&self) -> Option<Arc<Base>> {
        self.read().default_base.clone()
    }

    /// Set the default base unless one is already set. Returns whether it was set.
    pub fn set_default_base_if_unset(&self, base: Arc<Base>) -> bool {
        let mut registry = self.write();
        if registry.default_base.is_some() {
            return false;
        }
        debug!(base = base.name(), "Default base set");
        registry.default_base = Some(base);
        true
    }

    /// Replace the default base unconditionally.
    pub fn set_default_base(&self, base: Option<Arc<Base>>) {
        self.write().default_base = base;
    }

    pub fn set_default_option(&self, option: DbOption, enabled: bool) {
        let mut registry = self.write();
        if enabled {
            registry.default_options.insert(option);
        } else {
            registry.default_options.remove(&option);
        }
    }

    pub fn has_default_option(&self, option: DbOption) -> bool {
        self.read().default_options.contains(&option)
    }

    /// Unregister every handle and close its pool.
    pub async fn close_all(&self) {
        let databases: Vec<(String, Db)> = {
            let mut registry = self.write();
            registry.main_database = None;
            registry.databases.drain().collect()
        };
        for (alias, db) in databases {
            debug!(alias = %mask_password(&alias), "Closing database");
            db.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolOptions;
    use crate::db::{DbPool, SessionOptions};
    use crate::models::ConnectionUrl;

    async fn memory_db() -> Db {
        let url = ConnectionUrl::parse("sqlite:///:memory:").unwrap();
        let pool = DbPool::connect(&url, &PoolOptions::default()).await.unwrap();
        Db::new(url, pool, None, SessionOptions::default())
    }

    #[tokio::test]
    async fn test_first_registered_is_main() {
        let manager = DbManager::new();
        assert!(!manager.has_main_database());
        assert!(matches!(
            manager.get_main_database(),
            Err(DbError::NoMainDatabase)
        ));

        assert!(manager.register("a", memory_db().await).is_none());
        assert!(manager.register("b", memory_db().await).is_none());
        assert_eq!(manager.main_alias().as_deref(), Some("a"));
        assert_eq!(manager.aliases(), vec!["a".to_string(), "b".to_string()]);

        manager.set_main_database("b").unwrap();
        assert_eq!(manager.main_alias().as_deref(), Some("b"));
        assert!(manager.set_main_database("missing").is_err());
    }

    #[tokio::test]
    async fn test_register_keeps_existing() {
        let manager = DbManager::new();
        let first = memory_db().await;
        first.pool().execute("CREATE TABLE marker (id INTEGER)").await.unwrap();
        manager.register("x", first);

        let winner = manager.register("x", memory_db().await).unwrap();
        assert_eq!(
            winner
                .pool()
                .fetch_i64("SELECT COUNT(*) FROM sqlite_master WHERE name = 'marker'")
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_remove_and_close_all() {
        let manager = DbManager::new();
        let db = memory_db().await;
        manager.register("x", db.clone());
        assert!(manager.remove_database("x").is_some());
        assert!(!manager.has_main_database());
        assert!(matches!(manager.database("x"), Err(DbError::AliasNotFound { .. })));

        manager.register("y", db.clone());
        manager.close_all().await;
        assert!(manager.aliases().is_empty());
        assert!(db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_remove_if_closed() {
        let manager = DbManager::new();
        let db = memory_db().await;
        manager.register("x", db.clone());
        assert!(!manager.remove_if_closed("x"));
        assert!(!manager.remove_if_closed("missing"));

        db.close().await;
        assert!(manager.remove_if_closed("x"));
        assert!(!manager.has_database("x"));
        assert_eq!(manager.main_alias(), None);
    }

    #[test]
    fn test_default_base_first_write_wins() {
        let manager = DbManager::new();
        let first = Arc::new(Base::new("First"));
        let second = Arc::new(Base::new("Second"));
        assert!(manager.set_default_base_if_unset(first));
        assert!(!manager.set_default_base_if_unset(Arc::clone(&second)));
        assert_eq!(manager.default_base().unwrap().name(), "First");

        manager.set_base("alias", second);
        assert_eq!(manager.get_base("alias").unwrap().name(), "Second");
        assert!(manager.get_base("other").is_none());
    }

    #[test]
    fn test_default_options() {
        let manager = DbManager::new();
        assert!(!manager.has_default_option(DbOption::CreateAll));
        manager.set_default_option(DbOption::CreateAll, true);
        assert!(manager.has_default_option(DbOption::CreateAll));
        manager.set_default_option(DbOption::CreateAll, false);
        assert!(!manager.has_default_option(DbOption::CreateAll));
    }

    #[test]
    fn test_clones_share_state() {
        let manager = DbManager::new();
        let clone = manager.clone();
        clone.set_base("a", Arc::new(Base::new("B")));
        assert!(manager.get_base("a").is_some());
    }
}
