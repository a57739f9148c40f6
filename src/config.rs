//! Configuration management
//!
//! Loads configuration from config.toml with support for:
//! - Server binding settings
//! - SQLite database location
//! - Payment ledger endpoint and system account
//! - Transaction wait/timeout budget

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub transactions: TransactionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Read-only connections serving queries alongside the single writer
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: u32,
}

/// Payment ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Base URL of the balance service (empty = in-process ledger)
    #[serde(default)]
    pub endpoint: String,
    /// Reserved platform account bounty payouts are drawn from
    #[serde(default)]
    pub system_account_id: i64,
    #[serde(default = "default_ledger_timeout")]
    pub timeout_secs: u64,
}

/// Wait and runtime budget for a single unit of work
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransactionConfig {
    pub max_wait_ms: u64,
    pub timeout_ms: u64,
}

fn default_ledger_timeout() -> u64 {
    5
}

fn default_read_pool_size() -> u32 {
    4
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            system_account_id: 0,
            timeout_secs: default_ledger_timeout(),
        }
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: 5_000,
            timeout_ms: 10_000,
        }
    }
}

impl TransactionConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load from config.toml or use defaults
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load from specific path, then apply environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config: Config = if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            toml::from_str(DEFAULT_CONFIG).context("Failed to parse default config")?
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// A ledger call runs inside a unit of work, so it must fit in the
    /// transaction budget.
    pub fn validate(&self) -> Result<()> {
        let ledger_ms = self.ledger.timeout_secs.saturating_mul(1_000);
        if ledger_ms >= self.transactions.timeout_ms {
            bail!(
                "ledger.timeout_secs ({}s) must be shorter than transactions.timeout_ms ({}ms)",
                self.ledger.timeout_secs,
                self.transactions.timeout_ms
            );
        }
        if self.database.read_pool_size == 0 {
            bail!("database.read_pool_size must be at least 1");
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("BOUNTY_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = PathBuf::from(path);
            }
        }
        if let Ok(endpoint) = std::env::var("BUZZ_ENDPOINT") {
            self.ledger.endpoint = endpoint;
        }
        if let Ok(host) = std::env::var("BOUNTY_HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }
        if let Some(port) = std::env::var("BOUNTY_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            self.server.port = port;
        }
    }

    /// Ledger endpoint, if a remote balance service is configured
    pub fn ledger_endpoint(&self) -> Option<&str> {
        let endpoint = self.ledger.endpoint.trim();
        if endpoint.is_empty() {
            None
        } else {
            Some(endpoint)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|_| Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                path: PathBuf::from("bounty-board.db"),
                read_pool_size: default_read_pool_size(),
            },
            ledger: LedgerConfig::default(),
            transactions: TransactionConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_default_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ledger.system_account_id, 0);
        assert_eq!(config.transactions.max_wait(), Duration::from_secs(5));
        assert_eq!(config.transactions.timeout(), Duration::from_secs(10));
        assert!(config.ledger_endpoint().is_none());
    }

    #[test]
    fn test_optional_sections_default() {
        let config: Config = toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [database]
            path = "/tmp/bounty.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.transactions.max_wait_ms, 5_000);
        assert_eq!(config.ledger.timeout_secs, 5);
        assert_eq!(config.database.read_pool_size, 4);
        config.validate().unwrap();
    }

    #[test]
    fn test_ledger_timeout_must_fit_transaction_budget() {
        let mut config = Config::default();
        config.validate().unwrap();

        config.ledger.timeout_secs = 10;
        config.transactions.timeout_ms = 10_000;
        assert!(config.validate().is_err());

        config.transactions.timeout_ms = 10_001;
        config.validate().unwrap();
    }
}
