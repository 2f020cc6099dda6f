//! Telopay: ETH and USDC micro-payments on Base.
//!
//! This crate lets a payer connect a wallet and send a small payment in ETH or
//! USDC to a Telopay contract on Base mainnet or Base Sepolia. Signing, gas,
//! nonces and RPC transport are handled by alloy; the contract does the rest.
//! What lives here is the client side: validating what the payer typed,
//! submitting it, and following the transaction until it is final.
//!
//! # Flow
//!
//! 1. A [`WalletConnector`](wallet::WalletConnector) produces a
//!    [`WalletSession`](wallet::WalletSession) and its balances are read.
//! 2. The [`PaymentForm`](payment::PaymentForm) validates token and amount
//!    against the payment bounds and the wallet balance.
//! 3. The form submits through a [`TelopayClient`](contract::TelopayClient),
//!    which returns a transaction hash.
//! 4. A [`TransactionWatcher`](watcher::TransactionWatcher) streams
//!    `pending → success | error`, rendered by a
//!    [`TransactionTracker`](status::TransactionTracker).
//!
//! # Modules
//!
//! - [`chain`]: Base networks, explorer links, token amounts, and the RPC provider.
//! - [`config`]: JSON configuration with environment variable fallbacks.
//! - [`contract`]: The Telopay contract binding and client.
//! - [`networks`]: Well-known per-network values such as USDC deployments.
//! - [`payment`]: The payment form: input, validation, submission.
//! - [`status`]: Rendering of a transaction's progress.
//! - [`util`]: Decimal amounts, logging setup, and signal handling.
//! - [`wallet`]: Wallet sessions, connectors, and balances.
//! - [`watcher`]: Receipt polling until the required confirmations.

pub mod chain;
pub mod config;
pub mod contract;
pub mod networks;
pub mod payment;
pub mod status;
pub mod util;
pub mod wallet;
pub mod watcher;
