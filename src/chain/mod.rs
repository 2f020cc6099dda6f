//! Base network support.
//!
//! Telopay runs on two EIP-155 networks: Base mainnet (chain id `8453`) and
//! Base Sepolia (chain id `84532`). This module names them, maps them to their
//! block explorers, and builds the alloy provider used for every RPC call.
//!
//! # Submodules
//!
//! - [`types`] - Token deployments and conversion between decimal amounts and base units
//! - [`provider`] - The RPC provider with fallback transports and optional wallet
//! - [`erc20`] - The ERC-20 subset needed for USDC balances and allowances

pub mod erc20;
pub mod provider;
pub mod types;

pub use provider::*;
pub use types::*;

use alloy_primitives::TxHash;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The CAIP-2 namespace for EVM-compatible chains.
pub const EIP155_NAMESPACE: &str = "eip155";

/// Explorer link used when a transaction is on a chain we do not know.
pub const UNKNOWN_EXPLORER_URL: &str = "#";

/// A network Telopay can pay on.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    #[default]
    Base,
    BaseSepolia,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::Base, Network::BaseSepolia];

    /// Numeric EIP-155 chain id.
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Base => 8453,
            Network::BaseSepolia => 84532,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.chain_id() == chain_id)
    }

    /// Machine name, as accepted on the command line (`base`, `base-sepolia`).
    pub fn name(&self) -> &'static str {
        match self {
            Network::Base => "base",
            Network::BaseSepolia => "base-sepolia",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Base => "Base",
            Network::BaseSepolia => "Base Sepolia",
        }
    }

    pub fn is_testnet(&self) -> bool {
        matches!(self, Network::BaseSepolia)
    }

    /// CAIP-2 identifier, e.g. `eip155:8453`.
    pub fn caip2(&self) -> String {
        format!("{}:{}", EIP155_NAMESPACE, self.chain_id())
    }

    /// Block explorer root.
    pub fn explorer_url(&self) -> &'static str {
        match self {
            Network::Base => "https://basescan.org",
            Network::BaseSepolia => "https://sepolia.basescan.org",
        }
    }

    pub fn explorer_tx_url(&self, hash: &TxHash) -> String {
        format!("{}/tx/{}", self.explorer_url(), hash)
    }
}

/// Explorer link for a transaction on `chain_id`, or `#` for unknown chains.
pub fn explorer_tx_url(chain_id: u64, hash: &TxHash) -> String {
    match Network::from_chain_id(chain_id) {
        Some(network) => network.explorer_tx_url(hash),
        None => UNKNOWN_EXPLORER_URL.to_string(),
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown network {0}, expected one of: base, base-sepolia")]
pub struct UnknownNetworkError(String);

impl FromStr for Network {
    type Err = UnknownNetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|n| n.name() == needle || n.caip2() == needle || n.chain_id().to_string() == needle)
            .ok_or_else(|| UnknownNetworkError(s.to_string()))
    }
}

/// Shortens an address or hash for display: keeps `head` leading and `tail`
/// trailing characters around an ellipsis.
pub fn shorten(value: &str, head: usize, tail: usize) -> String {
    if value.len() <= head + tail {
        return value.to_string();
    }
    format!("{}...{}", &value[..head], &value[value.len() - tail..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    const HASH: TxHash = b256!("0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef");

    #[test]
    fn test_chain_ids() {
        assert_eq!(Network::Base.chain_id(), 8453);
        assert_eq!(Network::BaseSepolia.chain_id(), 84532);
        assert_eq!(Network::from_chain_id(84532), Some(Network::BaseSepolia));
        assert_eq!(Network::from_chain_id(1), None);
    }

    #[test]
    fn test_parse_network() {
        assert_eq!("base".parse::<Network>().unwrap(), Network::Base);
        assert_eq!("Base-Sepolia".parse::<Network>().unwrap(), Network::BaseSepolia);
        assert_eq!("eip155:8453".parse::<Network>().unwrap(), Network::Base);
        assert_eq!("84532".parse::<Network>().unwrap(), Network::BaseSepolia);
        assert!("polygon".parse::<Network>().is_err());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Network::BaseSepolia).unwrap(), "\"base-sepolia\"");
        let network: Network = serde_json::from_str("\"base\"").unwrap();
        assert_eq!(network, Network::Base);
    }

    #[test]
    fn test_explorer_urls() {
        assert_eq!(
            explorer_tx_url(8453, &HASH),
            format!("https://basescan.org/tx/{HASH}")
        );
        assert_eq!(
            explorer_tx_url(84532, &HASH),
            format!("https://sepolia.basescan.org/tx/{HASH}")
        );
        assert_eq!(explorer_tx_url(1, &HASH), "#");
    }

    #[test]
    fn test_shorten() {
        assert_eq!(
            shorten("0x1234567890123456789012345678901234567890", 6, 4),
            "0x1234...7890"
        );
        assert_eq!(shorten("0xabc", 6, 4), "0xabc");
    }
}
