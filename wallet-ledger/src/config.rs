//! Configuration for the wallet ledger

use crate::types::Currency;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Currency assigned to newly opened wallets
    pub default_currency: Currency,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Row lock configuration
    pub locking: LockingConfig,

    /// Wallet number provisioning
    pub provisioning: ProvisioningConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/wallet-ledger"),
            service_name: "wallet-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            default_currency: Currency::NGN,
            rocksdb: RocksDBConfig::default(),
            locking: LockingConfig::default(),
            provisioning: ProvisioningConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            enable_statistics: false,
        }
    }
}

/// Pessimistic row lock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockingConfig {
    /// Maximum wait for a row lock before failing with a retryable error
    pub lock_timeout_ms: i64,

    /// Let RocksDB detect lock cycles instead of waiting out the timeout
    pub deadlock_detect: bool,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 3_000,
            deadlock_detect: true,
        }
    }
}

/// Wallet number provisioning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Assign the wallet number when the wallet is opened.
    /// When false it is assigned on the first balance query.
    pub eager: bool,

    /// Attempts at drawing an unused number before giving up
    pub max_attempts: u32,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            eager: true,
            max_attempts: 5,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("WALLET_LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(timeout) = std::env::var("WALLET_LEDGER_LOCK_TIMEOUT_MS") {
            config.locking.lock_timeout_ms = timeout.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid WALLET_LEDGER_LOCK_TIMEOUT_MS: {}", e))
            })?;
        }

        if let Ok(code) = std::env::var("WALLET_LEDGER_CURRENCY") {
            config.default_currency = Currency::from_code(&code)
                .ok_or_else(|| crate::Error::Config(format!("Unknown currency: {}", code)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the ledger cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.locking.lock_timeout_ms <= 0 {
            return Err(crate::Error::Config(
                "locking.lock_timeout_ms must be positive".to_string(),
            ));
        }
        if self.provisioning.max_attempts == 0 {
            return Err(crate::Error::Config(
                "provisioning.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
