//! Configuration for the Telopay client.
//!
//! Configuration comes from an optional JSON file. Every field has a serde
//! default that falls back to an environment variable and then to a hardcoded
//! value, so running without a file works off the environment (and `.env`) alone:
//!
//! | Variable                  | Field                         | Default                       |
//! |---------------------------|-------------------------------|-------------------------------|
//! | `TELOPAY_CONTRACT`        | `contract`                    | none                          |
//! | `TELOPAY_WALLET_KEY`      | `signer`                      | none                          |
//! | `WALLETCONNECT_PROJECT_ID`| `walletconnect_project_id`    | `demo`                        |
//! | `BASE_RPC_URL`            | `networks.base.rpc`           | `https://mainnet.base.org`    |
//! | `BASE_SEPOLIA_RPC_URL`    | `networks.base-sepolia.rpc`   | `https://sepolia.base.org`    |
//! | `USDC_CONTRACT_BASE`      | `networks.base.usdc`          | canonical USDC on Base        |
//! | `USDC_CONTRACT_SEPOLIA`   | `networks.base-sepolia.usdc`  | canonical USDC on Base Sepolia|
//!
//! String values inside the file may reference the environment with `$VAR` or
//! `${VAR}`, see [`LiteralOrEnv`]:
//!
//! ```json
//! {
//!   "contract": "$TELOPAY_CONTRACT",
//!   "signer": "${TELOPAY_WALLET_KEY}",
//!   "networks": {
//!     "base": { "rpc": [{ "http": "$BASE_RPC_URL", "rate_limit": 10 }] }
//!   },
//!   "confirmations": 2
//! }
//! ```

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::chain::Network;

/// RPC provider configuration for a single endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcConfig {
    /// HTTP URL for the RPC endpoint.
    pub http: LiteralOrEnv<Url>,
    /// Rate limit for requests per second (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
}

/// Per-network settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// RPC endpoints, used with fallback in the given order.
    pub rpc: Vec<RpcConfig>,
    /// USDC token contract on this network.
    pub usdc: LiteralOrEnv<Address>,
}

impl NetworkConfig {
    pub fn usdc(&self) -> Address {
        *self.usdc.inner()
    }
}

/// Settings for both supported networks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworksConfig {
    #[serde(default = "config_defaults::default_base")]
    pub base: NetworkConfig,
    #[serde(rename = "base-sepolia", default = "config_defaults::default_base_sepolia")]
    pub base_sepolia: NetworkConfig,
}

impl Default for NetworksConfig {
    fn default() -> Self {
        Self {
            base: config_defaults::default_base(),
            base_sepolia: config_defaults::default_base_sepolia(),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address of the deployed Telopay contract.
    #[serde(default = "config_defaults::default_contract")]
    contract: Option<LiteralOrEnv<Address>>,
    /// Private key of the paying wallet.
    #[serde(default = "config_defaults::default_signer")]
    signer: Option<LiteralOrEnv<EvmPrivateKey>>,
    /// Project id for WalletConnect-based connectors.
    #[serde(default = "config_defaults::default_walletconnect_project_id")]
    walletconnect_project_id: LiteralOrEnv<String>,
    #[serde(default)]
    networks: NetworksConfig,
    /// Block confirmations required before a payment counts as successful.
    #[serde(default = "config_defaults::default_confirmations")]
    confirmations: u64,
    /// How long to follow a transaction before giving up.
    #[serde(default = "config_defaults::default_receipt_timeout_secs")]
    receipt_timeout_secs: u64,
    /// Delay between two receipt polls.
    #[serde(default = "config_defaults::default_poll_interval_ms")]
    poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            contract: config_defaults::default_contract(),
            signer: config_defaults::default_signer(),
            walletconnect_project_id: config_defaults::default_walletconnect_project_id(),
            networks: NetworksConfig::default(),
            confirmations: config_defaults::default_confirmations(),
            receipt_timeout_secs: config_defaults::default_receipt_timeout_secs(),
            poll_interval_ms: config_defaults::default_poll_interval_ms(),
        }
    }
}

pub mod config_defaults {
    use alloy_primitives::{Address, address};
    use std::env;
    use std::str::FromStr;
    use url::Url;

    use super::{EvmPrivateKey, LiteralOrEnv, NetworkConfig, RpcConfig};

    pub const DEFAULT_BASE_RPC: &str = "https://mainnet.base.org";
    pub const DEFAULT_BASE_SEPOLIA_RPC: &str = "https://sepolia.base.org";
    pub const DEFAULT_USDC_BASE: Address = address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
    pub const DEFAULT_USDC_BASE_SEPOLIA: Address =
        address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e");
    pub const DEFAULT_WALLETCONNECT_PROJECT_ID: &str = "demo";
    pub const DEFAULT_CONFIRMATIONS: u64 = 2;
    pub const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 120;
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

    pub(crate) fn from_env<T: FromStr>(name: &str) -> Option<T> {
        let value = env::var(name).ok()?;
        let parsed = value.trim().parse().ok();
        if parsed.is_none() {
            tracing::warn!(var = name, "Ignoring malformed environment variable");
        }
        parsed
    }

    /// `$TELOPAY_CONTRACT` if it holds a valid address.
    pub fn default_contract() -> Option<LiteralOrEnv<Address>> {
        from_env("TELOPAY_CONTRACT").map(LiteralOrEnv::from_literal)
    }

    /// `$TELOPAY_WALLET_KEY` if it holds a valid private key.
    pub fn default_signer() -> Option<LiteralOrEnv<EvmPrivateKey>> {
        from_env("TELOPAY_WALLET_KEY").map(LiteralOrEnv::from_literal)
    }

    /// `$WALLETCONNECT_PROJECT_ID` -> `demo`
    pub fn default_walletconnect_project_id() -> LiteralOrEnv<String> {
        let id = env::var("WALLETCONNECT_PROJECT_ID")
            .unwrap_or_else(|_| DEFAULT_WALLETCONNECT_PROJECT_ID.to_string());
        LiteralOrEnv::from_literal(id)
    }

    fn network(rpc_var: &str, rpc_default: &str, usdc_var: &str, usdc_default: Address) -> NetworkConfig {
        let rpc: Url = from_env(rpc_var)
            .unwrap_or_else(|| Url::parse(rpc_default).expect("valid default RPC url"));
        let usdc: Address = from_env(usdc_var).unwrap_or(usdc_default);
        NetworkConfig {
            rpc: vec![RpcConfig {
                http: LiteralOrEnv::from_literal(rpc),
                rate_limit: None,
            }],
            usdc: LiteralOrEnv::from_literal(usdc),
        }
    }

    /// `$BASE_RPC_URL` / `$USDC_CONTRACT_BASE` -> public Base endpoints
    pub fn default_base() -> NetworkConfig {
        network(
            "BASE_RPC_URL",
            DEFAULT_BASE_RPC,
            "USDC_CONTRACT_BASE",
            DEFAULT_USDC_BASE,
        )
    }

    /// `$BASE_SEPOLIA_RPC_URL` / `$USDC_CONTRACT_SEPOLIA` -> public Base Sepolia endpoints
    pub fn default_base_sepolia() -> NetworkConfig {
        network(
            "BASE_SEPOLIA_RPC_URL",
            DEFAULT_BASE_SEPOLIA_RPC,
            "USDC_CONTRACT_SEPOLIA",
            DEFAULT_USDC_BASE_SEPOLIA,
        )
    }

    pub fn default_confirmations() -> u64 {
        DEFAULT_CONFIRMATIONS
    }

    pub fn default_receipt_timeout_secs() -> u64 {
        DEFAULT_RECEIPT_TIMEOUT_SECS
    }

    pub fn default_poll_interval_ms() -> u64 {
        DEFAULT_POLL_INTERVAL_MS
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Config {
    /// Loads the configuration from `path`, or from the environment alone when
    /// no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Ok(Self::default()),
        }
    }

    fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        Ok(config)
    }

    pub fn contract(&self) -> Option<Address> {
        self.contract.as_ref().map(|c| *c.inner())
    }

    pub fn signer(&self) -> Option<&EvmPrivateKey> {
        self.signer.as_ref().map(|s| s.inner())
    }

    pub fn walletconnect_project_id(&self) -> &str {
        self.walletconnect_project_id.inner()
    }

    pub fn network(&self, network: Network) -> &NetworkConfig {
        match network {
            Network::Base => &self.networks.base,
            Network::BaseSepolia => &self.networks.base_sepolia,
        }
    }

    pub fn confirmations(&self) -> u64 {
        self.confirmations
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ============================================================================
// EVM Private Key
// ============================================================================

/// A validated EVM private key (32 bytes).
///
/// Never printed: `Debug` and `Serialize` redact the key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EvmPrivateKey(B256);

impl EvmPrivateKey {
    /// Get the raw 32 bytes of the private key.
    pub fn as_b256(&self) -> &B256 {
        &self.0
    }
}

impl FromStr for EvmPrivateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid evm private key: {}", e))
    }
}

impl fmt::Debug for EvmPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EvmPrivateKey(<redacted>)")
    }
}

impl Serialize for EvmPrivateKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("<redacted>")
    }
}

// ============================================================================
// Environment Variable Resolution
// ============================================================================

/// A transparent wrapper that resolves environment variables during deserialization.
///
/// Supports both literal values and environment variable references:
/// - Literal: `"https://mainnet.base.org"`
/// - Simple env var: `"$BASE_RPC_URL"`
/// - Braced env var: `"${BASE_RPC_URL}"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    /// Returns the variable name if the string matches `$VAR` or `${VAR}` syntax.
    fn parse_env_var_syntax(s: &str) -> Option<&str> {
        if let Some(braced) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            return Some(braced);
        }
        let name = s.strip_prefix('$')?;
        let is_name = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
        is_name.then_some(name)
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        let value = match Self::parse_env_var_syntax(&s) {
            Some(var_name) => std::env::var(var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{}' not found (referenced as '{}')",
                    var_name, s
                ))
            })?,
            None => s,
        };

        let parsed = value
            .trim()
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {}", e)))?;

        Ok(LiteralOrEnv(parsed))
    }
}

impl<T> Serialize for LiteralOrEnv<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const KEY: &str = "0xcafe000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_malformed_env_value_is_ignored() {
        unsafe {
            std::env::set_var("TELOPAY_TEST_BAD_CONTRACT", "0xnot-an-address");
            std::env::set_var(
                "TELOPAY_TEST_GOOD_CONTRACT",
                " 0x1234567890123456789012345678901234567890 ",
            );
        }
        assert_eq!(config_defaults::from_env::<Address>("TELOPAY_TEST_BAD_CONTRACT"), None);
        assert_eq!(
            config_defaults::from_env::<Address>("TELOPAY_TEST_GOOD_CONTRACT"),
            Some(address!("0x1234567890123456789012345678901234567890"))
        );
        assert_eq!(config_defaults::from_env::<Address>("TELOPAY_TEST_UNSET_CONTRACT"), None);
    }

    #[test]
    fn test_env_var_syntax() {
        assert_eq!(LiteralOrEnv::<String>::parse_env_var_syntax("$RPC_URL"), Some("RPC_URL"));
        assert_eq!(LiteralOrEnv::<String>::parse_env_var_syntax("${RPC_URL}"), Some("RPC_URL"));
        assert_eq!(LiteralOrEnv::<String>::parse_env_var_syntax("$"), None);
        assert_eq!(LiteralOrEnv::<String>::parse_env_var_syntax("$a-b"), None);
        assert_eq!(
            LiteralOrEnv::<String>::parse_env_var_syntax("https://mainnet.base.org"),
            None
        );
    }

    #[test]
    fn test_literal_values() {
        let json = format!(
            r#"{{
                "contract": "0x1111111111111111111111111111111111111111",
                "signer": "{KEY}",
                "walletconnect_project_id": "abc123",
                "networks": {{
                    "base": {{
                        "rpc": [{{ "http": "http://localhost:8545", "rate_limit": 5 }}],
                        "usdc": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
                    }}
                }},
                "confirmations": 3,
                "receipt_timeout_secs": 60,
                "poll_interval_ms": 500
            }}"#
        );
        let config = Config::from_json(&json).unwrap();
        assert_eq!(
            config.contract(),
            Some(address!("0x1111111111111111111111111111111111111111"))
        );
        assert!(config.signer().is_some());
        assert_eq!(config.walletconnect_project_id(), "abc123");
        let base = config.network(Network::Base);
        assert_eq!(base.rpc.len(), 1);
        assert_eq!(base.rpc[0].http.as_str(), "http://localhost:8545/");
        assert_eq!(base.rpc[0].rate_limit, Some(5));
        assert_eq!(config.confirmations(), 3);
        assert_eq!(config.receipt_timeout(), Duration::from_secs(60));
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = Config::from_json(r#"{ "confirmations": 1 }"#).unwrap();
        assert_eq!(config.confirmations(), 1);
        assert_eq!(
            config.receipt_timeout(),
            Duration::from_secs(config_defaults::DEFAULT_RECEIPT_TIMEOUT_SECS)
        );
        assert!(!config.network(Network::BaseSepolia).rpc.is_empty());
    }

    #[test]
    fn test_missing_env_var_is_an_error() {
        let json = r#"{ "contract": "$TELOPAY_TEST_SURELY_UNSET_CONTRACT_VAR" }"#;
        let err = Config::from_json(json).unwrap_err();
        assert!(err.to_string().contains("TELOPAY_TEST_SURELY_UNSET_CONTRACT_VAR"));
    }

    #[test]
    fn test_invalid_address_is_an_error() {
        let err = Config::from_json(r#"{ "contract": "0x..." }"#).unwrap_err();
        assert!(matches!(err, ConfigError::JsonParse(_)));
    }

    #[test]
    fn test_private_key_is_redacted() {
        let key: EvmPrivateKey = KEY.parse().unwrap();
        assert_eq!(format!("{key:?}"), "EvmPrivateKey(<redacted>)");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"<redacted>\"");
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/telopay.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(_, _)));
    }
}
