//! Client for the Telopay payment contract.
//!
//! The contract accepts ETH through `payETH()` and USDC through
//! `payUSDC(amount)`, records every payment under a `bytes32` id, and emits
//! `PaymentReceived` for each one. [`TelopayClient`] is the seam the payment
//! form talks to; [`TelopayContract`] implements it over a [`ChainProvider`].

use alloy_primitives::{Address, B256, TxHash, U256};
use alloy_provider::PendingTransactionError;
use alloy_rpc_types_eth::Log;
use alloy_sol_types::sol;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::Instrument;

use crate::chain::erc20::IERC20;
use crate::chain::{ChainProvider, ETH_DECIMALS, Network, from_base_units};

sol! {
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface ITelopay {
        struct Payment {
            address payer;
            uint256 amount;
            bool isEth;
            uint256 timestamp;
            bool processed;
        }

        function payETH() external payable;
        function payUSDC(uint256 amount) external;
        function getBalance() external view returns (uint256 ethBalance, uint256 usdcBalance);
        function getPayment(bytes32 paymentId) external view returns (Payment memory);

        function MIN_ETH_PAYMENT() external view returns (uint256);
        function MAX_ETH_PAYMENT() external view returns (uint256);
        function MIN_USDC_PAYMENT() external view returns (uint256);
        function MAX_USDC_PAYMENT() external view returns (uint256);

        event PaymentReceived(address indexed payer, uint256 amount, bool isEth, bytes32 indexed paymentId, uint256 timestamp);
        event Withdrawal(address indexed owner, uint256 ethAmount, uint256 usdcAmount, uint256 timestamp);
    }
}

const USDC_DECIMALS: u8 = 6;

/// A payment as recorded by the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelopayPayment {
    pub payer: Address,
    /// Raw amount in wei or USDC base units, depending on `is_eth`.
    pub amount: U256,
    pub is_eth: bool,
    /// Unix timestamp of the block that recorded the payment.
    pub timestamp: U256,
    pub processed: bool,
}

impl From<ITelopay::Payment> for TelopayPayment {
    fn from(value: ITelopay::Payment) -> Self {
        Self {
            payer: value.payer,
            amount: value.amount,
            is_eth: value.isEth,
            timestamp: value.timestamp,
            processed: value.processed,
        }
    }
}

impl TelopayPayment {
    /// A lookup of an unknown id returns the zero record.
    pub fn exists(&self) -> bool {
        self.payer != Address::ZERO
    }

    pub fn token_symbol(&self) -> &'static str {
        if self.is_eth { "ETH" } else { "USDC" }
    }

    pub fn decimal_amount(&self) -> Option<Decimal> {
        let decimals = if self.is_eth { ETH_DECIMALS } else { USDC_DECIMALS };
        from_base_units(self.amount, decimals).map(|d| d.normalize())
    }
}

/// Payment bounds enforced by the contract, in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentLimits {
    pub min_eth: U256,
    pub max_eth: U256,
    pub min_usdc: U256,
    pub max_usdc: U256,
}

impl PaymentLimits {
    pub fn eth_range(&self) -> Option<(Decimal, Decimal)> {
        Some((
            from_base_units(self.min_eth, ETH_DECIMALS)?.normalize(),
            from_base_units(self.max_eth, ETH_DECIMALS)?.normalize(),
        ))
    }

    pub fn usdc_range(&self) -> Option<(Decimal, Decimal)> {
        Some((
            from_base_units(self.min_usdc, USDC_DECIMALS)?.normalize(),
            from_base_units(self.max_usdc, USDC_DECIMALS)?.normalize(),
        ))
    }
}

/// Funds held by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractBalance {
    pub eth_balance: U256,
    pub usdc_balance: U256,
}

#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("No wallet connected")]
    NoSigner,
    #[error(transparent)]
    Call(#[from] alloy_contract::Error),
    #[error(transparent)]
    PendingTransaction(#[from] PendingTransactionError),
    #[error("USDC approval {0} reverted")]
    ApprovalReverted(TxHash),
}

/// Reads from and pays into a Telopay contract.
#[async_trait]
pub trait TelopayClient: Send + Sync {
    /// Network the contract lives on.
    fn network(&self) -> Network;

    /// Contract address.
    fn address(&self) -> Address;

    async fn balance(&self) -> Result<ContractBalance, ContractError>;

    async fn payment(&self, payment_id: B256) -> Result<TelopayPayment, ContractError>;

    async fn limits(&self) -> Result<PaymentLimits, ContractError>;

    /// Sends `value` wei to `payETH()` and returns the transaction hash without
    /// waiting for it to be mined.
    async fn pay_eth(&self, value: U256) -> Result<TxHash, ContractError>;

    /// Pays `amount` USDC base units through `payUSDC(amount)`.
    async fn pay_usdc(&self, amount: U256) -> Result<TxHash, ContractError>;
}

/// [`TelopayClient`] backed by an RPC provider.
///
/// Payments are sent from the provider's signer. Before paying in USDC the
/// contract's allowance is checked, and an `approve` for the exact amount is
/// sent and awaited when it falls short.
#[derive(Debug, Clone)]
pub struct TelopayContract {
    address: Address,
    usdc: Address,
    provider: ChainProvider,
    approval_timeout: Duration,
}

impl TelopayContract {
    pub fn new(address: Address, usdc: Address, provider: ChainProvider) -> Self {
        Self {
            address,
            usdc,
            provider,
            approval_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = timeout;
        self
    }

    pub fn usdc(&self) -> Address {
        self.usdc
    }

    pub fn provider(&self) -> &ChainProvider {
        &self.provider
    }

    fn instance(&self) -> ITelopay::ITelopayInstance<&alloy_provider::DynProvider> {
        ITelopay::new(self.address, self.provider.inner())
    }

    fn payer(&self) -> Result<Address, ContractError> {
        self.provider.signer_address().ok_or(ContractError::NoSigner)
    }

    async fn ensure_allowance(&self, payer: Address, amount: U256) -> Result<(), ContractError> {
        let usdc = IERC20::new(self.usdc, self.provider.inner());
        let allowance = usdc
            .allowance(payer, self.address)
            .call()
            .into_future()
            .instrument(tracing::info_span!("allowance", token = %self.usdc))
            .await?;
        if allowance >= amount {
            return Ok(());
        }
        tracing::info!(chain=%self.provider.network().caip2(), %payer, %allowance, %amount, "Approving USDC");
        let receipt = usdc
            .approve(self.address, amount)
            .send()
            .await?
            .with_required_confirmations(1)
            .with_timeout(Some(self.approval_timeout))
            .get_receipt()
            .await?;
        if !receipt.status() {
            return Err(ContractError::ApprovalReverted(receipt.transaction_hash));
        }
        Ok(())
    }
}

#[async_trait]
impl TelopayClient for TelopayContract {
    fn network(&self) -> Network {
        self.provider.network()
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn balance(&self) -> Result<ContractBalance, ContractError> {
        let balance = self
            .instance()
            .getBalance()
            .call()
            .into_future()
            .instrument(tracing::info_span!("getBalance", contract = %self.address))
            .await?;
        Ok(ContractBalance {
            eth_balance: balance.ethBalance,
            usdc_balance: balance.usdcBalance,
        })
    }

    async fn payment(&self, payment_id: B256) -> Result<TelopayPayment, ContractError> {
        let payment = self
            .instance()
            .getPayment(payment_id)
            .call()
            .into_future()
            .instrument(tracing::info_span!("getPayment", contract = %self.address, %payment_id))
            .await?;
        Ok(payment.into())
    }

    async fn limits(&self) -> Result<PaymentLimits, ContractError> {
        let instance = self.instance();
        let min_eth = instance.MIN_ETH_PAYMENT().call().await?;
        let max_eth = instance.MAX_ETH_PAYMENT().call().await?;
        let min_usdc = instance.MIN_USDC_PAYMENT().call().await?;
        let max_usdc = instance.MAX_USDC_PAYMENT().call().await?;
        Ok(PaymentLimits {
            min_eth,
            max_eth,
            min_usdc,
            max_usdc,
        })
    }

    async fn pay_eth(&self, value: U256) -> Result<TxHash, ContractError> {
        let payer = self.payer()?;
        let pending = self
            .instance()
            .payETH()
            .value(value)
            .from(payer)
            .send()
            .instrument(tracing::info_span!("payETH", contract = %self.address, %value))
            .await?;
        let tx_hash = *pending.tx_hash();
        tracing::info!(chain=%self.provider.network().caip2(), %payer, tx=%tx_hash, "ETH payment sent");
        Ok(tx_hash)
    }

    async fn pay_usdc(&self, amount: U256) -> Result<TxHash, ContractError> {
        let payer = self.payer()?;
        self.ensure_allowance(payer, amount).await?;
        let pending = self
            .instance()
            .payUSDC(amount)
            .from(payer)
            .send()
            .instrument(tracing::info_span!("payUSDC", contract = %self.address, %amount))
            .await?;
        let tx_hash = *pending.tx_hash();
        tracing::info!(chain=%self.provider.network().caip2(), %payer, tx=%tx_hash, "USDC payment sent");
        Ok(tx_hash)
    }
}

/// Finds the id of a recorded payment among receipt logs, optionally only
/// considering events emitted by `contract`.
pub fn payment_id_from_logs(contract: Option<Address>, logs: &[Log]) -> Option<B256> {
    logs.iter()
        .filter(|log| contract.is_none_or(|contract| log.address() == contract))
        .find_map(|log| log.log_decode::<ITelopay::PaymentReceived>().ok())
        .map(|decoded| decoded.inner.data.paymentId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config_defaults;
    use crate::networks::{KnownNetworkBase, USDC};
    use alloy_primitives::{address, b256};
    use alloy_sol_types::SolEvent;

    const CONTRACT: Address = address!("0x1234567890123456789012345678901234567890");
    const PAYMENT_ID: B256 =
        b256!("0x00000000000000000000000000000000000000000000000000000000000000aa");

    fn payment_log(emitter: Address) -> Log {
        let event = ITelopay::PaymentReceived {
            payer: address!("0x00000000000000000000000000000000000000b0"),
            amount: U256::from(10_000_000_000_000_000u64),
            isEth: true,
            paymentId: PAYMENT_ID,
            timestamp: U256::from(1_700_000_000u64),
        };
        Log {
            inner: alloy_primitives::Log {
                address: emitter,
                data: event.encode_log_data(),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_payment_id_from_logs() {
        let logs = vec![payment_log(CONTRACT)];
        assert_eq!(payment_id_from_logs(Some(CONTRACT), &logs), Some(PAYMENT_ID));
        assert_eq!(payment_id_from_logs(None, &logs), Some(PAYMENT_ID));
    }

    #[test]
    fn test_payment_id_ignores_other_contracts() {
        let logs = vec![payment_log(Address::ZERO)];
        assert_eq!(payment_id_from_logs(Some(CONTRACT), &logs), None);
    }

    #[test]
    fn test_limit_ranges() {
        let limits = PaymentLimits {
            min_eth: U256::from(100_000_000_000_000u64),
            max_eth: U256::from(10u64) * U256::from(10).pow(U256::from(18)),
            min_usdc: U256::from(1_000_000u64),
            max_usdc: U256::from(1_000_000_000_000u64),
        };
        let (min, max) = limits.eth_range().unwrap();
        assert_eq!(min.to_string(), "0.0001");
        assert_eq!(max.to_string(), "10");
        let (min, max) = limits.usdc_range().unwrap();
        assert_eq!(min.to_string(), "1");
        assert_eq!(max.to_string(), "1000000");
    }

    #[test]
    fn test_unknown_payment_is_zero_record() {
        let payment = TelopayPayment::from(ITelopay::Payment {
            payer: Address::ZERO,
            amount: U256::ZERO,
            isEth: false,
            timestamp: U256::ZERO,
            processed: false,
        });
        assert!(!payment.exists());
        assert_eq!(payment.token_symbol(), "USDC");
    }

    #[tokio::test]
    async fn test_pay_without_signer() {
        let config = crate::config::Config::default();
        let provider =
            ChainProvider::from_config(Network::Base, config.network(Network::Base), None).unwrap();
        let contract = TelopayContract::new(CONTRACT, USDC::base().address().unwrap(), provider);
        assert_eq!(contract.usdc(), config_defaults::DEFAULT_USDC_BASE);
        let err = contract.pay_eth(U256::from(1u64)).await.unwrap_err();
        assert!(matches!(err, ContractError::NoSigner));
        let err = contract.pay_usdc(U256::from(1u64)).await.unwrap_err();
        assert!(matches!(err, ContractError::NoSigner));
    }
}
