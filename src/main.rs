//! Telopay command-line entrypoint.
//!
//! Commands:
//! - `info` – What Telopay is, supported networks, payment limits
//! - `pay --token eth|usdc --amount A` – Validate, submit and follow a payment
//! - `limits` – Payment bounds as enforced by the contract
//! - `balance` – Funds held by the contract
//! - `payment <id>` – Look up a recorded payment
//! - `status <tx-hash>` – Follow an existing transaction
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `TELOPAY_CONTRACT`, `TELOPAY_WALLET_KEY`, `BASE_RPC_URL`, ... see [`telopay::config`]
//! - `RUST_LOG` controls log output on stderr

use alloy_primitives::{B256, TxHash};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::error::Error;
use std::path::PathBuf;

use telopay::chain::{ChainProvider, Network, format_units, shorten};
use telopay::config::Config;
use telopay::contract::{TelopayClient, TelopayContract};
use telopay::payment::{PaymentForm, Token};
use telopay::status::TransactionTracker;
use telopay::util::{SigDown, Telemetry};
use telopay::wallet::{LocalWalletConnector, WalletConnector, WalletError, read_balances};
use telopay::watcher::{ReceiptSource, ReceiptWatcher, TransactionStatus};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(long, env = "CONFIG")]
    config: Option<PathBuf>,

    /// Network to pay on: base or base-sepolia
    #[arg(long, env = "TELOPAY_NETWORK", default_value = "base")]
    network: Network,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show what Telopay does and how to use it
    Info,
    /// Make a payment
    Pay {
        /// Token to pay with
        #[arg(long, default_value = "eth")]
        token: Token,
        /// Amount in whole tokens, e.g. 0.01
        #[arg(long)]
        amount: String,
    },
    /// Read the payment limits from the contract
    Limits,
    /// Read the funds held by the contract
    Balance,
    /// Look up a payment by id
    Payment {
        payment_id: B256,
    },
    /// Follow a transaction until it is confirmed or fails
    Status {
        tx_hash: TxHash,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load .env variables
    dotenv().ok();

    let _telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let network = cli.network;

    match cli.command {
        Command::Info => {
            print_info(&config, network);
            Ok(())
        }
        Command::Pay { token, amount } => pay(&config, network, token, &amount).await,
        Command::Limits => limits(&config, network).await,
        Command::Balance => balance(&config, network).await,
        Command::Payment { payment_id } => payment(&config, network, payment_id).await,
        Command::Status { tx_hash } => {
            let provider = ChainProvider::from_config(network, config.network(network), None)?;
            let status = follow(provider, &config, tx_hash, network.chain_id()).await?;
            exit_status(&status)
        }
    }
}

fn print_info(config: &Config, network: Network) {
    println!("Telopay: micro-payments for Web3");
    println!();
    println!("  Lightning Fast        Quick micro-payments processed on the Base network with minimal fees.");
    println!("  Secure & Transparent  All transactions are recorded on-chain.");
    println!("  Multiple Tokens       ETH and USDC payments on Base.");
    println!();
    println!("How it works:");
    println!("  1. Connect Wallet     Set TELOPAY_WALLET_KEY to pay from a local wallet.");
    println!("  2. Choose Payment     telopay pay --token eth|usdc --amount <amount>");
    println!("  3. Get Access         The payment is confirmed after {} blocks.", config.confirmations());
    println!();
    println!("Payment limits:");
    for token in Token::ALL {
        println!("  {:<4}  {} - {}", token, token.min_amount(), token.max_amount());
    }
    println!();
    println!("Networks:");
    for known in Network::ALL {
        let marker = if known == network { "*" } else { " " };
        println!(
            "{marker} {:<13} chain {:<6} {}",
            known.display_name(),
            known.chain_id(),
            known.explorer_url()
        );
    }
    println!();
    match config.contract() {
        Some(contract) => println!("Contract: {contract}"),
        None => println!("Contract: not configured (set TELOPAY_CONTRACT)"),
    }
    println!("WalletConnect project: {}", config.walletconnect_project_id());
}

fn print_connect_prompt() {
    println!("Connect Your Wallet");
    println!();
    println!("You need to connect your wallet to make payments on Telopay.");
    println!("Set TELOPAY_WALLET_KEY, or `signer` in the config file, to the private key");
    println!("of the wallet you want to pay from.");
}

fn contract_for(config: &Config, network: Network) -> Result<TelopayContract, Box<dyn Error>> {
    let address = config
        .contract()
        .ok_or("Contract configuration error: set TELOPAY_CONTRACT")?;
    let provider = ChainProvider::from_config(network, config.network(network), config.signer())?;
    Ok(TelopayContract::new(address, config.network(network).usdc(), provider)
        .with_approval_timeout(config.receipt_timeout()))
}

async fn pay(
    config: &Config,
    network: Network,
    token: Token,
    amount: &str,
) -> Result<(), Box<dyn Error>> {
    let provider = ChainProvider::from_config(network, config.network(network), config.signer())?;
    let session = match LocalWalletConnector::new(provider.clone()).connect().await {
        Ok(session) => session,
        Err(WalletError::NotConfigured) => {
            print_connect_prompt();
            return Err(WalletError::NotConfigured.into());
        }
        Err(error) => return Err(error.into()),
    };
    let usdc = config.network(network).usdc();
    let balances = read_balances(&provider, &session, usdc).await;

    let mut form = PaymentForm::new(network).with_contract(config.contract());
    form.connect(session, balances);
    form.select_token(token);
    if !form.set_amount(amount) {
        return Err(format!("Invalid amount {amount:?}").into());
    }

    println!("Make a Payment on {}", network.display_name());
    println!("Wallet: {}", shorten(&session.address.to_string(), 6, 4));
    for token in Token::ALL {
        println!("  {}", form.balance_label(token));
    }
    println!();
    println!("{}: {}", form.amount_label(), form.amount());
    println!("{}", form.range_hint());
    println!("{}", form.transaction_details());
    println!();

    if let Some(error) = form.error() {
        println!("{error}");
        return Err(error.into());
    }
    if !form.can_submit() {
        return Err("Enter an amount greater than zero".into());
    }

    let contract = config
        .contract()
        .map(|address| {
            TelopayContract::new(address, usdc, provider.clone())
                .with_approval_timeout(config.receipt_timeout())
        });
    println!("{}", form.submit_label());
    let submitted = form.submit(contract.as_ref()).await;
    let tx_hash = match submitted {
        Ok(tx_hash) => tx_hash,
        Err(error) => {
            if let Some(message) = form.error() {
                println!("{message}");
            }
            return Err(error.into());
        }
    };
    println!("{}", form.submit_label());

    let status = match contract {
        Some(contract) => follow(contract, config, tx_hash, session.chain_id).await?,
        None => follow(provider, config, tx_hash, session.chain_id).await?,
    };
    form.complete();
    exit_status(&status)
}

/// Prints the transaction's progress until it settles or the user interrupts.
async fn follow<S: ReceiptSource>(
    source: S,
    config: &Config,
    tx_hash: TxHash,
    chain_id: u64,
) -> Result<TransactionStatus, Box<dyn Error>> {
    let watcher = ReceiptWatcher::from_config(source, config);
    let mut tracker = TransactionTracker::new(tx_hash, chain_id)
        .with_required_confirmations(config.confirmations());
    println!();
    println!("{tracker}");

    let sig_down = SigDown::try_new()?;
    let cancel = sig_down.cancellation_token();
    let status = tracker
        .follow(&watcher, &cancel, |tracker| {
            println!();
            println!("{tracker}");
        })
        .await
        .clone();
    if sig_down.is_triggered() {
        println!();
        println!("Stopped following {tx_hash}; the transaction itself was not cancelled.");
    }
    sig_down.release().await;
    Ok(status)
}

/// Non-zero exit unless the transaction succeeded. A watch stopped while still
/// pending is not a success.
fn exit_status(status: &TransactionStatus) -> Result<(), Box<dyn Error>> {
    match status {
        TransactionStatus::Success(_) => Ok(()),
        TransactionStatus::Error { message } => Err(message.clone().into()),
        TransactionStatus::Pending { .. } => {
            Err("Stopped before the transaction was confirmed".into())
        }
    }
}

async fn limits(config: &Config, network: Network) -> Result<(), Box<dyn Error>> {
    let contract = contract_for(config, network)?;
    let limits = contract.limits().await?;
    println!("Payment limits of {} on {}:", contract.address(), network.display_name());
    match (limits.eth_range(), limits.usdc_range()) {
        (Some((min_eth, max_eth)), Some((min_usdc, max_usdc))) => {
            println!("  ETH   {min_eth} - {max_eth}");
            println!("  USDC  {min_usdc} - {max_usdc}");
        }
        _ => {
            println!("  ETH   {} - {} wei", limits.min_eth, limits.max_eth);
            println!("  USDC  {} - {} base units", limits.min_usdc, limits.max_usdc);
        }
    }
    Ok(())
}

async fn balance(config: &Config, network: Network) -> Result<(), Box<dyn Error>> {
    let contract = contract_for(config, network)?;
    let balance = contract.balance().await?;
    println!("Funds held by {} on {}:", contract.address(), network.display_name());
    println!("  ETH   {}", format_units(balance.eth_balance, Token::Eth.decimals(), 6));
    println!("  USDC  {}", format_units(balance.usdc_balance, Token::Usdc.decimals(), 6));
    Ok(())
}

async fn payment(config: &Config, network: Network, payment_id: B256) -> Result<(), Box<dyn Error>> {
    let contract = contract_for(config, network)?;
    let payment = contract.payment(payment_id).await?;
    if !payment.exists() {
        println!("Payment {payment_id} not found");
        return Ok(());
    }
    let amount = payment
        .decimal_amount()
        .map(|amount| amount.to_string())
        .unwrap_or_else(|| payment.amount.to_string());
    println!("Payment {payment_id}");
    println!("  Payer:      {}", payment.payer);
    println!("  Amount:     {} {}", amount, payment.token_symbol());
    println!("  Timestamp:  {}", payment.timestamp);
    println!("  Processed:  {}", if payment.processed { "yes" } else { "no" });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use telopay::watcher::ConfirmedPayment;

    #[test]
    fn test_exit_status() {
        let success = TransactionStatus::Success(ConfirmedPayment {
            tx_hash: TxHash::ZERO,
            block_number: 1,
            confirmations: 2,
            payment_id: None,
        });
        assert!(exit_status(&success).is_ok());

        let reverted = TransactionStatus::Error {
            message: "Transaction reverted".to_string(),
        };
        assert_eq!(exit_status(&reverted).unwrap_err().to_string(), "Transaction reverted");

        let interrupted = TransactionStatus::Pending { confirmations: 1 };
        assert_eq!(
            exit_status(&interrupted).unwrap_err().to_string(),
            "Stopped before the transaction was confirmed"
        );
    }
}
