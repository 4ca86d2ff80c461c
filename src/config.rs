use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::engine::FeeSchedule;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageConfig {
    /// Where derived entities are written
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Protocol fee written onto newly seen rounds
#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
    #[serde(default = "default_fee_bps")]
    pub bps: u32,
    #[serde(default = "default_fee_precision")]
    pub precision: u32,
}

fn default_fee_bps() -> u32 {
    crate::engine::reward::PROTOCOL_FEE_BPS
}

fn default_fee_precision() -> u32 {
    crate::engine::reward::PROTOCOL_FEE_PRECISION
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            bps: default_fee_bps(),
            precision: default_fee_precision(),
        }
    }
}

impl FeeConfig {
    pub fn schedule(&self) -> FeeSchedule {
        FeeSchedule {
            bps: self.bps,
            precision: self.precision,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    /// Delay between polls once caught up
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Maximum block span per log request
    #[serde(default = "default_block_batch_size")]
    pub block_batch_size: u64,
    /// Blocks to stay behind the head
    #[serde(default)]
    pub confirmations: u64,
    /// Wait after a failed poll before retrying from the cursor
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_block_batch_size() -> u64 {
    1000
}

fn default_retry_backoff() -> u64 {
    5000
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            block_batch_size: default_block_batch_size(),
            confirmations: 0,
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

/// One deployment of the arena contract
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    /// JSON-RPC HTTP endpoint
    pub rpc_url: String,
    /// Arena contract address (0x-prefixed)
    pub contract_address: String,
    /// First block to index when no cursor exists
    #[serde(default)]
    pub start_block: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a directory, then the environment
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("storage.backend", "memory")?
            .set_default("indexer.poll_interval_ms", default_poll_interval())?
            .set_default("indexer.block_batch_size", default_block_batch_size())?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("PREDICTRON_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (PREDICTRON__DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("PREDICTRON")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Configuration for local replays: in-memory store, no chains
    pub fn in_memory() -> Self {
        Self {
            storage: StorageConfig::default(),
            database: None,
            fees: FeeConfig::default(),
            indexer: IndexerConfig::default(),
            chains: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.fees.precision == 0 {
            errors.push("fees.precision must be positive".to_string());
        }
        if self.fees.bps > self.fees.precision {
            errors.push(format!(
                "fees.bps ({}) cannot exceed fees.precision ({})",
                self.fees.bps, self.fees.precision
            ));
        }

        if self.indexer.block_batch_size == 0 {
            errors.push("indexer.block_batch_size must be positive".to_string());
        }

        if self.storage.backend == StorageBackend::Postgres && self.database.is_none() {
            errors.push("storage.backend = \"postgres\" requires a [database] section".to_string());
        }

        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                errors.push(format!("chain {} is configured twice", chain.chain_id));
            }
            if chain.contract_address.parse::<alloy::primitives::Address>().is_err() {
                errors.push(format!(
                    "chain {}: invalid contract_address {}",
                    chain.chain_id, chain.contract_address
                ));
            }
            if chain.rpc_url.trim().is_empty() {
                errors.push(format!("chain {}: rpc_url is empty", chain.chain_id));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
