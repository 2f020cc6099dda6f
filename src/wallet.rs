//! Wallet connection and balances.
//!
//! A connected wallet is represented by a [`WalletSession`] value that callers
//! pass explicitly to whatever needs it. Sessions come from a
//! [`WalletConnector`]; the one shipped here, [`LocalWalletConnector`], signs
//! with a locally configured private key.

use alloy_primitives::{Address, U256};
use alloy_provider::Provider;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::chain::erc20::IERC20;
use crate::chain::{ChainProvider, ETH_DECIMALS, Network, ProviderError, format_units, from_base_units};

/// Decimal places shown for wallet balances.
pub const BALANCE_DISPLAY_DECIMALS: u32 = 6;

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("No wallet configured")]
    NotConfigured,
    #[error("Wallet is on chain {actual}, expected {expected}")]
    WrongNetwork { expected: u64, actual: u64 },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Transport(#[from] alloy_transport::TransportError),
    #[error(transparent)]
    Call(#[from] alloy_contract::Error),
}

/// A connected wallet: who pays, and on which chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletSession {
    pub address: Address,
    pub chain_id: u64,
}

impl WalletSession {
    pub fn new(address: Address, chain_id: u64) -> Self {
        Self { address, chain_id }
    }

    pub fn network(&self) -> Option<Network> {
        Network::from_chain_id(self.chain_id)
    }
}

/// Something able to produce a wallet session on demand.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    async fn connect(&self) -> Result<WalletSession, WalletError>;
}

/// Connects the provider's signer, after making sure the RPC endpoint serves
/// the network the provider was built for.
#[derive(Debug, Clone)]
pub struct LocalWalletConnector {
    provider: ChainProvider,
}

impl LocalWalletConnector {
    pub fn new(provider: ChainProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl WalletConnector for LocalWalletConnector {
    async fn connect(&self) -> Result<WalletSession, WalletError> {
        let address = self
            .provider
            .signer_address()
            .ok_or(WalletError::NotConfigured)?;
        let expected = self.provider.network().chain_id();
        let actual = self.provider.remote_chain_id().await?;
        if actual != expected {
            tracing::warn!(expected, actual, "RPC endpoint serves a different chain");
            return Err(WalletError::WrongNetwork { expected, actual });
        }
        tracing::info!(chain=%self.provider.network().caip2(), %address, "Wallet connected");
        Ok(WalletSession::new(address, actual))
    }
}

/// A raw on-chain balance and the decimals needed to read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBalance {
    pub raw: U256,
    pub decimals: u8,
}

impl TokenBalance {
    pub fn new(raw: U256, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    pub fn value(&self) -> Option<Decimal> {
        from_base_units(self.raw, self.decimals)
    }

    /// Balance with six fractional digits, e.g. `0.020000`.
    pub fn formatted(&self) -> String {
        format_units(self.raw, self.decimals, BALANCE_DISPLAY_DECIMALS)
    }
}

/// Balances of the connected wallet. `None` means the read failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalletBalances {
    pub eth: Option<TokenBalance>,
    pub usdc: Option<TokenBalance>,
}

/// Reads native and ERC-20 balances.
#[async_trait]
pub trait BalanceReader: Send + Sync {
    async fn eth_balance(&self, owner: Address) -> Result<U256, WalletError>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, WalletError>;
}

#[async_trait]
impl BalanceReader for ChainProvider {
    async fn eth_balance(&self, owner: Address) -> Result<U256, WalletError> {
        Ok(self.inner().get_balance(owner).await?)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, WalletError> {
        let erc20 = IERC20::new(token, self.inner());
        Ok(erc20.balanceOf(owner).call().await?)
    }
}

/// Reads both balances of `session`. A failed read is logged and left unknown.
pub async fn read_balances<R: BalanceReader + ?Sized>(
    reader: &R,
    session: &WalletSession,
    usdc: Address,
) -> WalletBalances {
    let eth = match reader.eth_balance(session.address).await {
        Ok(raw) => Some(TokenBalance::new(raw, ETH_DECIMALS)),
        Err(error) => {
            tracing::warn!(address=%session.address, %error, "Failed to read ETH balance");
            None
        }
    };
    let usdc = match reader.token_balance(usdc, session.address).await {
        Ok(raw) => Some(TokenBalance::new(raw, 6)),
        Err(error) => {
            tracing::warn!(address=%session.address, token=%usdc, %error, "Failed to read USDC balance");
            None
        }
    };
    WalletBalances { eth, usdc }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use alloy_primitives::address;

    const OWNER: Address = address!("0x00000000000000000000000000000000000000b0");
    const USDC: Address = address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

    struct FakeBalances {
        eth: U256,
        usdc: Option<U256>,
    }

    #[async_trait]
    impl BalanceReader for FakeBalances {
        async fn eth_balance(&self, _owner: Address) -> Result<U256, WalletError> {
            Ok(self.eth)
        }

        async fn token_balance(&self, _token: Address, _owner: Address) -> Result<U256, WalletError> {
            self.usdc.ok_or(WalletError::NotConfigured)
        }
    }

    #[tokio::test]
    async fn test_read_balances() {
        let reader = FakeBalances {
            eth: U256::from(20_000_000_000_000_000u64),
            usdc: Some(U256::from(5_250_000u64)),
        };
        let session = WalletSession::new(OWNER, 8453);
        let balances = read_balances(&reader, &session, USDC).await;
        assert_eq!(balances.eth.unwrap().formatted(), "0.020000");
        assert_eq!(balances.usdc.unwrap().formatted(), "5.250000");
        assert_eq!(balances.usdc.unwrap().value(), Some(Decimal::new(525, 2)));
    }

    #[tokio::test]
    async fn test_failed_read_is_unknown() {
        let reader = FakeBalances {
            eth: U256::ZERO,
            usdc: None,
        };
        let session = WalletSession::new(OWNER, 8453);
        let balances = read_balances(&reader, &session, USDC).await;
        assert!(balances.eth.is_some());
        assert!(balances.usdc.is_none());
    }

    #[tokio::test]
    async fn test_connect_without_key() {
        let config = Config::default();
        let provider =
            ChainProvider::from_config(Network::Base, config.network(Network::Base), None).unwrap();
        let connector = LocalWalletConnector::new(provider);
        assert!(matches!(connector.connect().await, Err(WalletError::NotConfigured)));
    }

    #[test]
    fn test_session_network() {
        assert_eq!(WalletSession::new(OWNER, 84532).network(), Some(Network::BaseSepolia));
        assert_eq!(WalletSession::new(OWNER, 1).network(), None);
    }
}
