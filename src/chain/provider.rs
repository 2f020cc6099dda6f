use alloy_network::EthereumWallet;
use alloy_primitives::Address;
use alloy_provider::fillers::{
    BlobGasFiller, CachedNonceManager, ChainIdFiller, GasFiller, JoinFill, NonceFiller,
};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_client::RpcClient;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::TransportError;
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport_http::Http;
use std::num::NonZeroUsize;
use tower::ServiceBuilder;

use crate::chain::Network;
use crate::config::{EvmPrivateKey, NetworkConfig};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("No HTTP RPC endpoint configured for {0}")]
    NoRpcEndpoints(Network),
    #[error("Invalid signer key: {0}")]
    InvalidSigner(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// RPC access to one Base network.
///
/// Requests go through every configured HTTP endpoint with fallback, each
/// endpoint throttled to its `rate_limit`. When a signer key is given, the
/// provider also fills and signs transactions from that key.
#[derive(Clone)]
pub struct ChainProvider {
    network: Network,
    inner: DynProvider,
    signer_address: Option<Address>,
}

impl std::fmt::Debug for ChainProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainProvider")
            .field("network", &self.network)
            .field("signer_address", &self.signer_address)
            .finish_non_exhaustive()
    }
}

impl ChainProvider {
    pub fn from_config(
        network: Network,
        config: &NetworkConfig,
        signer: Option<&EvmPrivateKey>,
    ) -> Result<Self, ProviderError> {
        // 1. Signer
        let signer = signer
            .map(|key| {
                PrivateKeySigner::from_bytes(key.as_b256())
                    .map(|s| s.with_chain_id(Some(network.chain_id())))
                    .map_err(|e| ProviderError::InvalidSigner(e.to_string()))
            })
            .transpose()?;
        let signer_address = signer.as_ref().map(|s| s.address());

        // 2. Transports
        let transports = config
            .rpc
            .iter()
            .filter_map(|rpc_config| {
                let scheme = rpc_config.http.scheme();
                let is_http = scheme == "http" || scheme == "https";
                if !is_http {
                    return None;
                }
                let rpc_url = rpc_config.http.inner().clone();
                tracing::debug!(chain=%network.caip2(), rpc_url=%rpc_url, rate_limit=?rpc_config.rate_limit, "Using HTTP transport");
                let rate_limit = rpc_config.rate_limit.unwrap_or(u32::MAX);
                let service = ServiceBuilder::new()
                    .layer(ThrottleLayer::new(rate_limit))
                    .service(Http::new(rpc_url));
                Some(service)
            })
            .collect::<Vec<_>>();
        let active =
            NonZeroUsize::new(transports.len()).ok_or(ProviderError::NoRpcEndpoints(network))?;
        let fallback = ServiceBuilder::new()
            .layer(FallbackLayer::default().with_active_transport_count(active))
            .service(transports);
        let client = RpcClient::new(fallback, false);

        // 3. Provider
        let filler = JoinFill::new(
            GasFiller,
            JoinFill::new(
                BlobGasFiller::default(),
                JoinFill::new(
                    NonceFiller::new(CachedNonceManager::default()),
                    ChainIdFiller::new(Some(network.chain_id())),
                ),
            ),
        );
        let builder = ProviderBuilder::default().filler(filler);
        let inner = match signer {
            Some(signer) => builder
                .wallet(EthereumWallet::from(signer))
                .connect_client(client)
                .erased(),
            None => builder.connect_client(client).erased(),
        };

        tracing::debug!(chain=%network.caip2(), signer=?signer_address, "Initialized provider");

        Ok(Self {
            network,
            inner,
            signer_address,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn inner(&self) -> &DynProvider {
        &self.inner
    }

    /// Address of the configured signer, if any.
    pub fn signer_address(&self) -> Option<Address> {
        self.signer_address
    }

    /// Chain id reported by the RPC endpoint.
    pub async fn remote_chain_id(&self) -> Result<u64, ProviderError> {
        Ok(self.inner.get_chain_id().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LiteralOrEnv, RpcConfig, config_defaults};
    use std::str::FromStr;
    use url::Url;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn network_config(urls: &[&str]) -> NetworkConfig {
        NetworkConfig {
            rpc: urls
                .iter()
                .map(|url| RpcConfig {
                    http: LiteralOrEnv::from_literal(Url::parse(url).unwrap()),
                    rate_limit: Some(10),
                })
                .collect(),
            usdc: LiteralOrEnv::from_literal(config_defaults::DEFAULT_USDC_BASE),
        }
    }

    #[tokio::test]
    async fn test_signer_address_from_key() {
        let key = EvmPrivateKey::from_str(KEY).unwrap();
        let provider = ChainProvider::from_config(
            Network::BaseSepolia,
            &network_config(&["https://sepolia.base.org"]),
            Some(&key),
        )
        .unwrap();
        assert_eq!(provider.network(), Network::BaseSepolia);
        assert_eq!(
            provider.signer_address(),
            Some(Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap())
        );
    }

    #[tokio::test]
    async fn test_read_only_provider() {
        let provider =
            ChainProvider::from_config(Network::Base, &network_config(&["https://mainnet.base.org"]), None)
                .unwrap();
        assert!(provider.signer_address().is_none());
    }

    #[tokio::test]
    async fn test_requires_http_endpoint() {
        let result =
            ChainProvider::from_config(Network::Base, &network_config(&["wss://mainnet.base.org"]), None);
        assert!(matches!(result, Err(ProviderError::NoRpcEndpoints(Network::Base))));
    }
}
