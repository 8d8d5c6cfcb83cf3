//! Configuration management for the transaction submitter
//!
//! Loads configuration from a TOML file with environment variable substitution.
//! Variables are read from the process environment after `.env` has been loaded.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub network: NetworkConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    pub deploy: Option<DeployConfig>,
    pub batch_mint: Option<BatchMintConfig>,
    pub static_call: Option<StaticCallConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub rpc_url: String,
    /// Chain the node must report; unchecked when absent
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub gas_price_strategy: GasPriceStrategy,
    #[serde(default = "default_max_gas_price_gwei")]
    pub max_gas_price_gwei: u64,
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
    pub explorer_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum GasPriceStrategy {
    #[default]
    Legacy,
    Eip1559,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Name of the environment variable holding the private key
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: default_private_key_env(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionConfig {
    #[serde(default = "default_true")]
    pub simulate_before_broadcast: bool,
    #[serde(default = "default_gas_limit_buffer_percent")]
    pub gas_limit_buffer_percent: u64,
    #[serde(default)]
    pub gas_price_buffer_percent: u64,
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            simulate_before_broadcast: true,
            gas_limit_buffer_percent: default_gas_limit_buffer_percent(),
            gas_price_buffer_percent: 0,
            confirmations: default_confirmations(),
            poll_interval_ms: default_poll_interval_ms(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployConfig {
    /// Hardhat/Foundry artifact carrying `abi` and `bytecode`
    pub artifact: PathBuf,
    #[serde(default)]
    pub constructor_args: Vec<serde_json::Value>,
    pub gas_price: Option<String>,
    pub gas_limit: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchMintConfig {
    pub contract: String,
    pub abi: PathBuf,
    #[serde(default = "default_batch_function")]
    pub function: String,
    pub recipient: String,
    /// Token URI template; `{index}` is replaced by the item index
    pub uri_template: String,
    pub count: usize,
    #[serde(default)]
    pub start_index: usize,
    pub gas_price: Option<String>,
    pub gas_limit: Option<String>,
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticCallConfig {
    pub contract: String,
    pub abi: PathBuf,
    pub function: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    pub value: Option<String>,
    /// Overrides `wallet.private_key_env` for this call
    pub private_key_env: Option<String>,
}

fn default_max_gas_price_gwei() -> u64 {
    500
}

fn default_native_symbol() -> String {
    "ETH".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_private_key_env() -> String {
    "DEPLOYER".to_string()
}

fn default_true() -> bool {
    true
}

fn default_gas_limit_buffer_percent() -> u64 {
    20
}

fn default_confirmations() -> u64 {
    1
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_confirmation_timeout_secs() -> u64 {
    300
}

fn default_batch_function() -> String {
    "batchMint".to_string()
}

impl Settings {
    /// Load settings from the given path, `SUBMITTER_CONFIG`, or `config/default.toml`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => env::var("SUBMITTER_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("config/default.toml")),
        };

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let settings = Self::from_toml(&config_str)
            .with_context(|| format!("Invalid configuration in {:?}", config_path))?;

        Ok(settings)
    }

    /// Parse settings from TOML text, substituting `${VAR}` references first
    pub fn from_toml(input: &str) -> Result<Self> {
        let config_str = substitute_env_vars(input);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.network.rpc_url.trim().is_empty() {
            anyhow::bail!(
                "network.rpc_url is empty for {} (is RPC_URL set?)",
                self.network.name
            );
        }

        if self.submission.poll_interval_ms == 0 {
            anyhow::bail!("submission.poll_interval_ms must be greater than zero");
        }

        if self.submission.confirmations == 0 {
            anyhow::bail!("submission.confirmations must be at least 1");
        }

        if let Some(batch) = &self.batch_mint {
            if !batch.uri_template.contains("{index}") {
                anyhow::bail!("batch_mint.uri_template must contain an {{index}} placeholder");
            }
            if batch.count == 0 {
                tracing::warn!("batch_mint.count is 0 - the batch will be empty");
            }
        }

        Ok(())
    }

    /// Build the connection parameters for this run
    ///
    /// `key_env` overrides the variable named by `wallet.private_key_env`.
    pub fn connection(&self, key_env: Option<&str>) -> Result<ConnectionConfig> {
        let var = key_env.unwrap_or(&self.wallet.private_key_env);
        let signing_key = env::var(var)
            .with_context(|| format!("Signing key variable {} is not set", var))?;

        Ok(ConnectionConfig {
            rpc_url: self.network.rpc_url.clone(),
            signing_key,
            expected_chain_id: self.network.chain_id,
            request_timeout: Duration::from_secs(self.network.request_timeout_secs),
        })
    }

    /// Explorer link for an address, if an explorer is configured
    pub fn explorer_address_url(&self, address: &str) -> Option<String> {
        self.network
            .explorer_url
            .as_ref()
            .map(|base| format!("{}/address/{}", base.trim_end_matches('/'), address))
    }
}

/// Connection parameters for one run
#[derive(Clone)]
pub struct ConnectionConfig {
    pub rpc_url: String,
    pub signing_key: String,
    pub expected_chain_id: Option<u64>,
    pub request_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(rpc_url: impl Into<String>, signing_key: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            signing_key: signing_key.into(),
            expected_chain_id: None,
            request_timeout: Duration::from_secs(default_request_timeout_secs()),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("rpc_url", &self.rpc_url)
            .field("signing_key", &"<redacted>")
            .field("expected_chain_id", &self.expected_chain_id)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
