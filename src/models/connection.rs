//! Connection-related data models.
//!
//! This module classifies connection strings into driver families and
//! normalises them into something the sqlx drivers accept.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::PoolOptions;
use crate::error::{DbError, DbResult};

/// Path used for in-memory SQLite databases.
pub const SQLITE_MEMORY: &str = ":memory:";

/// Default MySQL character set for created databases.
pub const DEFAULT_MYSQL_CHARSET: &str = "utf8mb4";

/// Driver families with their own bootstrap and teardown behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverType {
    /// Anything without a specific dialect. Served by PostgreSQL.
    NoSpecific,
    /// Includes MariaDB
    MySql,
    Sqlite3,
}

impl DriverType {
    /// Classify a driver name such as `mysql+pymysql` or `sqlite`.
    pub fn from_driver_name(driver: &str) -> Self {
        let lower = driver.trim().to_ascii_lowercase();
        match lower.as_str() {
            "nospecific" => Self::NoSpecific,
            "mysql" | "mariadb" | "pymysql" => Self::MySql,
            "sqlite" | "sqlite3" => Self::Sqlite3,
            s if s.starts_with("mysql+") || s.starts_with("mariadb+") => Self::MySql,
            s if s.starts_with("sqlite+") => Self::Sqlite3,
            _ => Self::NoSpecific,
        }
    }

    /// Classify a connection string by its scheme.
    pub fn from_connection_string(connection_string: &str) -> Self {
        Self::from_driver_name(scheme_of(connection_string))
    }

    /// Get the display name for this driver.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::NoSpecific => "generic",
            Self::MySql => "MySQL",
            Self::Sqlite3 => "SQLite",
        }
    }

    /// Quote an identifier for this dialect.
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
            _ => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }
}

impl std::fmt::Display for DriverType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

fn scheme_of(connection_string: &str) -> &str {
    connection_string
        .split_once(':')
        .map(|(scheme, _)| scheme)
        .unwrap_or(connection_string)
}

/// Base scheme without a `+dbapi` suffix.
fn base_scheme(scheme: &str) -> &str {
    scheme.split_once('+').map(|(base, _)| base).unwrap_or(scheme)
}

/// Where a SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteLocation {
    /// `sqlite://` with no path at all.
    Anonymous,
    /// `:memory:`
    Memory,
    File(String),
}

/// A classified and normalised connection URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionUrl {
    original: String,
    driver: DriverType,
    /// Parsed URL for network databases. `None` for SQLite.
    url: Option<Url>,
    sqlite: Option<SqliteLocation>,
    /// SQLite query pairs left over once pool options are taken out.
    sqlite_params: Option<String>,
    pool_options: PoolOptions,
}

impl ConnectionUrl {
    /// Parse and normalise a connection string.
    ///
    /// `mysql+pymysql://` and `mariadb://` become `mysql://`,
    /// `postgresql://` and `postgresql+psycopg://` become `postgres://`, and pool
    /// options in the query string are taken out for the pool builder.
    pub fn parse(connection_string: &str) -> DbResult<Self> {
        let original = connection_string.to_string();
        let driver = DriverType::from_connection_string(connection_string);

        if driver == DriverType::Sqlite3 {
            let (location, sqlite_params, pool_options) = parse_sqlite(connection_string)?;
            return Ok(Self {
                original,
                driver,
                url: None,
                sqlite: Some(location),
                sqlite_params,
                pool_options,
            });
        }

        let mut url = Url::parse(connection_string).map_err(|e| {
            DbError::config(format!(
                "Invalid connection URL '{}': {}",
                mask_password(connection_string),
                e
            ))
        })?;

        let scheme = match (driver, base_scheme(url.scheme())) {
            (DriverType::MySql, _) => "mysql".to_string(),
            (_, "postgresql") => "postgres".to_string(),
            (_, base) => base.to_string(),
        };
        if url.scheme() != scheme {
            url.set_scheme(&scheme).map_err(|_| {
                DbError::config(format!("Cannot normalise scheme '{}'", url.scheme()))
            })?;
        }

        let pool_options = PoolOptions::extract_from_url(&mut url);
        pool_options.validate().map_err(DbError::config)?;

        Ok(Self {
            original,
            driver,
            url: Some(url),
            sqlite: None,
            sqlite_params: None,
            pool_options,
        })
    }

    /// The connection string as given by the caller.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn driver(&self) -> DriverType {
        self.driver
    }

    /// The normalised scheme (`mysql`, `postgres`, `sqlite`, ...).
    pub fn scheme(&self) -> &str {
        match &self.url {
            Some(url) => url.scheme(),
            None => "sqlite",
        }
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn sqlite_location(&self) -> Option<&SqliteLocation> {
        self.sqlite.as_ref()
    }

    /// Pool options given in the query string.
    pub fn pool_options(&self) -> &PoolOptions {
        &self.pool_options
    }

    /// The database name (file path for SQLite).
    pub fn database(&self) -> Option<String> {
        match &self.sqlite {
            Some(SqliteLocation::Anonymous) => None,
            Some(SqliteLocation::Memory) => Some(SQLITE_MEMORY.to_string()),
            Some(SqliteLocation::File(path)) => Some(path.clone()),
            None => self
                .url
                .as_ref()
                .map(|url| url.path().trim_start_matches('/').to_string())
                .filter(|db| !db.is_empty()),
        }
    }

    /// True for SQLite databases that only exist in memory.
    pub fn is_in_memory(&self) -> bool {
        matches!(
            self.sqlite,
            Some(SqliteLocation::Anonymous) | Some(SqliteLocation::Memory)
        )
    }

    /// Query string handed to the SQLite driver (`mode=ro`, `cache=shared`, ...).
    pub fn sqlite_params(&self) -> Option<&str> {
        self.sqlite_params.as_deref()
    }

    /// Value of a driver query parameter.
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.url.as_ref().and_then(|url| {
            url.query_pairs()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.into_owned())
        })
    }

    /// Character set requested for MySQL databases.
    pub fn charset(&self) -> String {
        self.query_param("charset")
            .unwrap_or_else(|| DEFAULT_MYSQL_CHARSET.to_string())
    }

    /// The normalised URL with the database path replaced.
    ///
    /// `None` removes the database, giving a server-level URL.
    pub fn with_database(&self, database: Option<&str>) -> Option<Url> {
        let mut url = self.url.clone()?;
        match database {
            Some(db) => url.set_path(&format!("/{}", db)),
            None => url.set_path(""),
        }
        Some(url)
    }

    /// The normalised connection string (credentials included, never log it).
    pub fn connection_string(&self) -> String {
        match (&self.url, &self.sqlite) {
            (Some(url), _) => url.to_string(),
            (None, Some(SqliteLocation::File(path))) => match &self.sqlite_params {
                Some(params) => format!("sqlite://{}?{}", path, params),
                None => format!("sqlite://{}", path),
            },
            (None, _) => "sqlite::memory:".to_string(),
        }
    }

    /// Display-safe version of the original connection string.
    pub fn masked(&self) -> String {
        mask_password(&self.original)
    }
}

impl std::fmt::Display for ConnectionUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.masked())
    }
}

/// Split a SQLite connection string into its location, the driver's query
/// string and pool options.
fn parse_sqlite(
    connection_string: &str,
) -> DbResult<(SqliteLocation, Option<String>, PoolOptions)> {
    let rest = connection_string
        .split_once(':')
        .map(|(_, rest)| rest)
        .unwrap_or_default();

    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    let (params, pool_options) = match query {
        Some(query) => {
            // Reuse the URL query parser on a placeholder URL
            let mut url = Url::parse(&format!("sqlite://localhost/?{}", query))
                .map_err(|e| DbError::config(format!("Invalid SQLite query string: {}", e)))?;
            let pool_options = PoolOptions::extract_from_url(&mut url);
            (url.query().map(str::to_string), pool_options)
        }
        None => (None, PoolOptions::default()),
    };

    let path = if let Some(stripped) = path.strip_prefix("///") {
        stripped
    } else if let Some(stripped) = path.strip_prefix("//") {
        stripped
    } else {
        path
    };

    let location = match path {
        "" => SqliteLocation::Anonymous,
        SQLITE_MEMORY => SqliteLocation::Memory,
        file => SqliteLocation::File(file.to_string()),
    };
    Ok((location, params, pool_options))
}

/// Replace the password of a URL-like string with `****`.
pub fn mask_password(connection_string: &str) -> String {
    if let Some(at_pos) = connection_string.find('@') {
        let scheme_end = connection_string.find("://").map(|p| p + 3).unwrap_or(0);
        if let Some(colon_pos) = connection_string[scheme_end..at_pos].rfind(':') {
            let colon_pos = scheme_end + colon_pos;
            let prefix = &connection_string[..colon_pos + 1];
            let suffix = &connection_string[at_pos..];
            return format!("{}****{}", prefix, suffix);
        }
    }
    connection_string.to_string()
}
