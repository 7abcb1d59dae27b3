//! Request shapes accepted by the database factory.

use crate::config::DatabaseConfig;
use crate::error::DbResult;

/// Implied alias used when nothing at all is given.
pub const DEFAULT_ALIAS: &str = "default";

/// What a caller asked a database handle to be built from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DbSource {
    /// A connection URL such as `sqlite:///:memory:`.
    Url(String),
    /// Connection settings in dictionary form.
    Dict(DatabaseConfig),
    /// A dotted section path inside the configuration (`mysql.test`).
    Section(String),
    /// Use the section named by the configuration's `default` key.
    #[default]
    Default,
}

impl DbSource {
    /// Classify a string: anything with a scheme is a URL, otherwise a section path.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            Self::Default
        } else if s.contains("://") || s.starts_with("sqlite:") {
            Self::Url(s.to_string())
        } else {
            Self::Section(s.to_string())
        }
    }

    /// The alias a handle is registered under when the caller gives none.
    pub fn implied_alias(&self) -> DbResult<String> {
        match self {
            Self::Url(url) => Ok(url.clone()),
            Self::Section(section) => Ok(section.clone()),
            Self::Dict(config) => config.connection_url(),
            Self::Default => Ok(DEFAULT_ALIAS.to_string()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Url(_) => "url",
            Self::Dict(_) => "dict",
            Self::Section(_) => "section",
            Self::Default => "default",
        }
    }
}

impl From<&str> for DbSource {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for DbSource {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<DatabaseConfig> for DbSource {
    fn from(config: DatabaseConfig) -> Self {
        Self::Dict(config)
    }
}

impl<T: Into<DbSource>> From<Option<T>> for DbSource {
    fn from(source: Option<T>) -> Self {
        source.map(Into::into).unwrap_or_default()
    }
}
