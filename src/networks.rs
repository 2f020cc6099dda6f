//! Well-known per-network values.
//!
//! [`KnownNetworkBase`] gives static access to an instance of some type for each
//! Base network, the same way for network ids and token deployments:
//!
//! ```
//! use telopay::chain::Network;
//! use telopay::networks::{KnownNetworkBase, USDC};
//!
//! assert_eq!(Network::base_sepolia().chain_id(), 84532);
//! assert_eq!(USDC::base().decimals, 6);
//! assert_eq!(USDC::on(Network::BaseSepolia).network, Network::BaseSepolia);
//! ```

use alloy_primitives::address;

use crate::chain::{Network, TokenDeployment};

/// Static instances of `A` for the Base networks.
pub trait KnownNetworkBase<A> {
    /// Returns the instance for Base mainnet (eip155:8453)
    fn base() -> A;
    /// Returns the instance for Base Sepolia testnet (eip155:84532)
    fn base_sepolia() -> A;

    fn on(network: Network) -> A {
        match network {
            Network::Base => Self::base(),
            Network::BaseSepolia => Self::base_sepolia(),
        }
    }
}

impl KnownNetworkBase<Network> for Network {
    fn base() -> Network {
        Network::Base
    }

    fn base_sepolia() -> Network {
        Network::BaseSepolia
    }
}

/// Marker for the native currency.
#[derive(Debug, Clone, Copy)]
pub struct ETH;

impl KnownNetworkBase<TokenDeployment> for ETH {
    fn base() -> TokenDeployment {
        TokenDeployment::native(Network::Base)
    }

    fn base_sepolia() -> TokenDeployment {
        TokenDeployment::native(Network::BaseSepolia)
    }
}

/// Marker for Circle's USDC deployments.
#[derive(Debug, Clone, Copy)]
pub struct USDC;

impl KnownNetworkBase<TokenDeployment> for USDC {
    fn base() -> TokenDeployment {
        TokenDeployment::erc20(
            Network::Base,
            address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            6,
        )
    }

    fn base_sepolia() -> TokenDeployment {
        TokenDeployment::erc20(
            Network::BaseSepolia,
            address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
            6,
        )
    }
}
