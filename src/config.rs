//! Runtime configuration shared by the CLI and the server.
//!
//! Values come from command-line flags, then environment variables, then defaults.

use crate::db::Store;
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_DB_PATH: &str = "animals.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("database not found at {}", .0.display())]
    DatabaseNotFound(PathBuf),

    #[error("invalid bind address '{addr}': {source}")]
    InvalidBindAddr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Path to the livestock SQLite database
    #[arg(long = "db", env = "FARM_REPORT_DB", default_value = DEFAULT_DB_PATH, global = true)]
    pub db_path: PathBuf,

    /// Address the HTTP server binds to
    #[arg(long = "addr", env = "FARM_REPORT_ADDR", default_value = DEFAULT_BIND_ADDR, global = true)]
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl Config {
    /// The database must already exist; this crate never creates it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.db_path.exists() {
            return Err(ConfigError::DatabaseNotFound(self.db_path.clone()));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddr {
                addr: self.bind_addr.clone(),
                source,
            })
    }

    pub fn store(&self) -> Store {
        Store::open(&self.db_path)
    }
}
