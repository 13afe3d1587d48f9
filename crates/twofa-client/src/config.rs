//! Configuration management for the twofa client

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use twofa_types::{Balance, Gas};

use crate::twofactor::{
    MultisigSettings, DEFAULT_ACCESS_KEY_FUNDING_AMOUNT, DEFAULT_CHANGE_GAS,
    DEFAULT_LAK_ALLOWANCE,
};

/// Environment variable overriding the gas of the contract initializer
pub const LAK_ALLOWANCE_ENV: &str = "LAK_ALLOWANCE";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error
    #[error("io error:: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml parsing error:: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("toml serialization error:: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Unknown key or unparsable value given to `set`
    #[error("invalid value for {key}:: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl From<ConfigError> for twofa_errors::Error {
    fn from(err: ConfigError) -> Self {
        twofa_errors::Error::Config(err.to_string())
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Primary account
    pub account_id: String,
    /// Account operations execute against instead of the primary one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_account_id: Option<String>,
    /// Chain JSON-RPC endpoint
    pub rpc_url: String,
    /// Verification backend base URL
    pub verification_url: String,
    /// Whether a two-factor method is already enrolled
    pub has_2fa: bool,
    /// Request timeout in seconds
    pub timeout: u64,
    /// Gas of the contract initializer call
    pub lak_allowance: Gas,
    /// Allowance of limited keys added through requests
    pub access_key_funding_amount: Balance,
    /// Gas attached to contract change calls
    pub change_gas: Gas,
    /// Pending request store; relative to the home directory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
    /// File holding the hex encoded ed25519 secret key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            recovery_account_id: None,
            rpc_url: "https://rpc.testnet.near.org".to_string(),
            verification_url: "https://helper.testnet.near.org".to_string(),
            has_2fa: false,
            timeout: 30,
            lak_allowance: DEFAULT_LAK_ALLOWANCE,
            access_key_funding_amount: DEFAULT_ACCESS_KEY_FUNDING_AMOUNT,
            change_gas: DEFAULT_CHANGE_GAS,
            store_path: None,
            signing_key: None,
        }
    }
}

fn invalid(key: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn optional_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

impl ClientConfig {
    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get default configuration directory
    pub fn default_config_dir() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            home.join(".twofa")
        } else {
            PathBuf::from(".twofa")
        }
    }

    /// Configuration file inside `home`
    pub fn config_file(home: &Path) -> PathBuf {
        home.join("config.toml")
    }

    /// Load the configuration in `home`, or the defaults when there is none
    pub fn load_or_default(home: &Path) -> Result<Self, ConfigError> {
        let config_path = Self::config_file(home);

        if config_path.exists() {
            Self::load_from_file(config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Initialize configuration directory and file
    pub fn init(home: &Path, overwrite: bool) -> Result<Self, ConfigError> {
        let config_file = Self::config_file(home);

        if !home.exists() {
            fs::create_dir_all(home)?;
        }

        if config_file.exists() && !overwrite {
            return Self::load_from_file(config_file);
        }

        let config = Self::default();
        config.save_to_file(config_file)?;
        Ok(config)
    }

    /// Set a configuration value
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "account_id" => self.account_id = value.to_string(),
            "recovery_account_id" => {
                self.recovery_account_id = (!value.is_empty()).then(|| value.to_string())
            }
            "rpc_url" => self.rpc_url = value.to_string(),
            "verification_url" => self.verification_url = value.to_string(),
            "has_2fa" => self.has_2fa = value.parse().map_err(|e| invalid(key, e))?,
            "timeout" => self.timeout = value.parse().map_err(|e| invalid(key, e))?,
            "lak_allowance" => self.lak_allowance = value.parse().map_err(|e| invalid(key, e))?,
            "access_key_funding_amount" => {
                self.access_key_funding_amount = value.parse().map_err(|e| invalid(key, e))?
            }
            "change_gas" => self.change_gas = value.parse().map_err(|e| invalid(key, e))?,
            "store_path" => self.store_path = optional_path(value),
            "signing_key" => self.signing_key = optional_path(value),
            _ => return Err(invalid(key, "unknown configuration key")),
        }
        Ok(())
    }

    /// Pending request file, resolved against `home`
    pub fn store_file(&self, home: &Path) -> PathBuf {
        match &self.store_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => home.join(path),
            None => home.join("pending.json"),
        }
    }

    /// Request settings, honouring the `LAK_ALLOWANCE` environment override
    pub fn to_settings(&self) -> Result<MultisigSettings, ConfigError> {
        let lak_allowance = match std::env::var(LAK_ALLOWANCE_ENV) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e| invalid(LAK_ALLOWANCE_ENV, e))?,
            Err(_) => self.lak_allowance,
        };
        Ok(MultisigSettings {
            has_2fa: self.has_2fa,
            lak_allowance,
            access_key_funding_amount: self.access_key_funding_amount,
            change_gas: self.change_gas,
        })
    }
}
