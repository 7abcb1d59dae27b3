//! Command line interface for the `sqlgold` binary.

use clap::{Parser, Subcommand};

use crate::config::{self, APP_NAME, Config};
use crate::error::{DbError, DbResult};
use crate::factory::{CreateOptions, DbFactory};
use crate::manager::DbManager;
use crate::models::{ConnectionUrl, DbSource, mask_password};

/// Create, drop and inspect databases described by a config.toml.
#[derive(Debug, Parser)]
#[command(name = "sqlgold", version, about)]
pub struct Cli {
    /// Path to a config.toml, or an application name to look up
    #[arg(long, short = 'c', env = "SG_CONFIG", default_value = APP_NAME)]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SG_LOGLEVEL")]
    pub log_level: Option<String>,

    /// Output logs in JSON format
    #[arg(long, env = "SG_JSON_LOGS", default_value = "false")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a database (if needed) and print a summary of it
    Create {
        /// Connection URL or config section; the `default` section when omitted
        target: Option<String>,

        /// Alias to register the handle under
        #[arg(long)]
        alias: Option<String>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop a database and everything in it
    Drop {
        /// Connection URL or config section; the `default` section when omitted
        target: Option<String>,
    },
    /// Show how a connection URL is classified
    Driver {
        url: String,
    },
    /// Print the configuration, or one section of it, with secrets masked
    ShowConfig {
        section: Option<String>,
    },
}

impl Cli {
    /// Load the configuration named by `--config` as the process-wide one.
    pub fn load_config(&self) -> DbResult<Config> {
        config::set_database_config(self.config.as_str())
    }
}

/// Run a parsed command line.
pub async fn run(cli: Cli) -> DbResult<()> {
    let config = cli.load_config()?;
    match cli.command {
        Command::Create {
            target,
            alias,
            json,
        } => {
            let factory = DbFactory::new(DbManager::global(), config);
            let mut options = CreateOptions::new();
            if let Some(alias) = alias {
                options = options.with_alias(alias);
            }
            let db = factory.create_db(DbSource::from(target), options).await?;
            let summary = db.summary().await;
            if json {
                let rendered = serde_json::to_string_pretty(&summary)
                    .map_err(|e| DbError::internal(format!("Failed to render summary: {}", e)))?;
                println!("{}", rendered);
            } else {
                println!("{}", db);
                println!("  driver:  {}", summary.driver);
                println!("  url:     {}", summary.url);
                if let Some(version) = &summary.server_version {
                    println!("  version: {}", version);
                }
            }
            factory.manager().close_all().await;
        }
        Command::Drop { target } => {
            let factory = DbFactory::new(DbManager::global(), config);
            let db = factory
                .create_db(DbSource::from(target), CreateOptions::new())
                .await?;
            db.drop_db().await?;
            println!("Dropped {}", db);
            factory.manager().close_all().await;
        }
        Command::Driver { url } => {
            let url = ConnectionUrl::parse(&url)?;
            println!("driver:   {}", url.driver());
            println!("scheme:   {}", url.scheme());
            println!(
                "database: {}",
                url.database().as_deref().unwrap_or("None")
            );
            println!("url:      {}", url);
        }
        Command::ShowConfig { section } => {
            let mut table = match &section {
                Some(path) => config.section(path)?.clone(),
                None => config.table().clone(),
            };
            mask_secrets(&mut table);
            let rendered = toml::to_string_pretty(&table)
                .map_err(|e| DbError::internal(format!("Failed to render config: {}", e)))?;
            print!("{}", rendered);
        }
    }
    Ok(())
}

/// Replace passwords, including those inside URLs, throughout a table.
fn mask_secrets(table: &mut toml::Table) {
    for (key, value) in table.iter_mut() {
        match value {
            toml::Value::Table(inner) => mask_secrets(inner),
            toml::Value::String(s) if key == "password" => *s = "****".to_string(),
            toml::Value::String(s) if key == "url" => *s = mask_password(s),
            _ => {}
        }
    }
}
