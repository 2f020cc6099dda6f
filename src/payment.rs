//! The payment form.
//!
//! [`PaymentForm`] holds what the payer typed (token and amount), validates it
//! against the static payment bounds and the connected wallet's balance, and
//! submits it through a [`TelopayClient`]. Validation happens on every read, so
//! the form never holds a stale error.
//!
//! ```
//! use telopay::payment::{PaymentForm, Token};
//! use telopay::chain::Network;
//!
//! let mut form = PaymentForm::new(Network::Base);
//! form.set_amount("0.00005");
//! assert_eq!(form.error().unwrap().to_string(), "Minimum amount is 0.0001 ETH");
//!
//! form.select_token(Token::Usdc);
//! assert_eq!(form.amount(), "0.00005");
//! assert_eq!(form.amount_label(), "Amount (USDC)");
//! ```

use alloy_primitives::{Address, TxHash};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::chain::{ETH_DECIMALS, Network, shorten, to_base_units};
use crate::contract::{ContractError, TelopayClient};
use crate::util::money_amount::{MoneyAmount, MoneyAmountParseError};
use crate::wallet::{TokenBalance, WalletBalances, WalletSession};

/// Asset a payment is made in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Token {
    #[default]
    Eth,
    Usdc,
}

impl Token {
    pub const ALL: [Token; 2] = [Token::Eth, Token::Usdc];

    pub fn symbol(&self) -> &'static str {
        match self {
            Token::Eth => "ETH",
            Token::Usdc => "USDC",
        }
    }

    pub fn decimals(&self) -> u8 {
        match self {
            Token::Eth => ETH_DECIMALS,
            Token::Usdc => 6,
        }
    }

    /// Smallest accepted amount, as displayed.
    pub fn min_amount(&self) -> &'static str {
        match self {
            Token::Eth => "0.0001",
            Token::Usdc => "1",
        }
    }

    /// Largest accepted amount, as displayed.
    pub fn max_amount(&self) -> &'static str {
        match self {
            Token::Eth => "10",
            Token::Usdc => "1000000",
        }
    }

    pub fn min(&self) -> Decimal {
        match self {
            Token::Eth => Decimal::new(1, 4),
            Token::Usdc => Decimal::ONE,
        }
    }

    pub fn max(&self) -> Decimal {
        match self {
            Token::Eth => Decimal::TEN,
            Token::Usdc => Decimal::from(1_000_000u32),
        }
    }

    pub fn quick_amounts(&self) -> &'static [&'static str] {
        match self {
            Token::Eth => &["0.001", "0.01", "0.1", "1"],
            Token::Usdc => &["1", "10", "100", "1000"],
        }
    }

    /// Button caption of a quick amount: `0.01 ETH`, `$10`.
    pub fn quick_amount_label(&self, amount: &str) -> String {
        match self {
            Token::Eth => format!("{amount} ETH"),
            Token::Usdc => format!("${amount}"),
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown token {0}, expected ETH or USDC")]
pub struct UnknownTokenError(String);

impl FromStr for Token {
    type Err = UnknownTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ETH" => Ok(Token::Eth),
            "USDC" => Ok(Token::Usdc),
            _ => Err(UnknownTokenError(s.to_string())),
        }
    }
}

/// Message shown under the amount field. Only the first applicable one is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("Minimum amount is {} {}", .0.min_amount(), .0)]
    BelowMinimum(Token),
    #[error("Maximum amount is {} {}", .0.max_amount(), .0)]
    AboveMaximum(Token),
    #[error("Contract configuration error")]
    ContractConfiguration,
    #[error("Transaction failed")]
    TransactionFailed,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment form is not ready to submit")]
    NotReady,
    #[error("Contract configuration error: {0}")]
    Preparation(String),
    #[error("Transaction failed: {0}")]
    Write(#[from] ContractError),
}

/// State of the payment form.
#[derive(Debug, Clone)]
pub struct PaymentForm {
    network: Network,
    contract: Option<Address>,
    token: Token,
    amount: String,
    session: Option<WalletSession>,
    balances: WalletBalances,
    processing: bool,
    prepare_failed: bool,
    write_failed: bool,
}

impl PaymentForm {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            contract: None,
            token: Token::default(),
            amount: String::new(),
            session: None,
            balances: WalletBalances::default(),
            processing: false,
            prepare_failed: false,
            write_failed: false,
        }
    }

    /// Contract payments go to, shown in the transaction details.
    pub fn with_contract(mut self, contract: Option<Address>) -> Self {
        self.contract = contract;
        self
    }

    /// Attaches a connected wallet and its balances.
    pub fn connect(&mut self, session: WalletSession, balances: WalletBalances) {
        self.session = Some(session);
        self.balances = balances;
    }

    pub fn session(&self) -> Option<&WalletSession> {
        self.session.as_ref()
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// Switches the token. The typed amount is kept and checked against the new bounds.
    pub fn select_token(&mut self, token: Token) {
        if self.token != token {
            self.token = token;
            self.clear_failures();
        }
    }

    /// Replaces the amount if `input` looks like a plain decimal. Returns whether
    /// the input was taken.
    pub fn set_amount(&mut self, input: &str) -> bool {
        if !MoneyAmount::is_acceptable_input(input) {
            return false;
        }
        if self.amount != input {
            self.amount = input.to_string();
            self.clear_failures();
        }
        true
    }

    /// Applies the `index`-th quick amount of the selected token.
    pub fn apply_quick_amount(&mut self, index: usize) -> bool {
        match self.token.quick_amounts().get(index) {
            Some(amount) => self.set_amount(amount),
            None => false,
        }
    }

    fn clear_failures(&mut self) {
        self.prepare_failed = false;
        self.write_failed = false;
    }

    /// The typed amount, when it is a number.
    pub fn parsed_amount(&self) -> Option<MoneyAmount> {
        if self.amount.is_empty() {
            return None;
        }
        MoneyAmount::parse(&self.amount).ok()
    }

    /// Whether the typed amount is a number too large to represent.
    fn is_out_of_range(&self) -> bool {
        matches!(
            MoneyAmount::parse(&self.amount),
            Err(MoneyAmountParseError::OutOfRange)
        )
    }

    /// Balance of `token` in the connected wallet, if known.
    pub fn balance(&self, token: Token) -> Option<&TokenBalance> {
        match token {
            Token::Eth => self.balances.eth.as_ref(),
            Token::Usdc => self.balances.usdc.as_ref(),
        }
    }

    /// Whether the amount exceeds a known wallet balance. An unknown balance
    /// never counts as insufficient.
    pub fn is_balance_insufficient(&self) -> bool {
        if self.session.is_none() {
            return false;
        }
        let Some(balance) = self.balance(self.token).and_then(TokenBalance::value) else {
            return false;
        };
        match self.parsed_amount() {
            Some(amount) => amount.0 > balance,
            None => self.is_out_of_range(),
        }
    }

    pub fn error(&self) -> Option<FormError> {
        if self.is_balance_insufficient() {
            return Some(FormError::InsufficientBalance);
        }
        if let Some(amount) = self.parsed_amount() {
            if amount.0 < self.token.min() {
                return Some(FormError::BelowMinimum(self.token));
            }
            if amount.0 > self.token.max() {
                return Some(FormError::AboveMaximum(self.token));
            }
        } else if self.is_out_of_range() {
            return Some(FormError::AboveMaximum(self.token));
        }
        if self.prepare_failed {
            return Some(FormError::ContractConfiguration);
        }
        if self.write_failed {
            return Some(FormError::TransactionFailed);
        }
        None
    }

    pub fn can_submit(&self) -> bool {
        let positive = self.parsed_amount().is_some_and(|amount| !amount.is_zero());
        positive && !self.processing && self.error().is_none()
    }

    /// Sends the payment. On success the form stays in processing state until
    /// [`complete`](Self::complete) is called.
    ///
    /// `client` is `None` when no contract is configured, which is reported as
    /// a preparation failure like an amount the token cannot represent.
    pub async fn submit<C>(&mut self, client: Option<&C>) -> Result<TxHash, PaymentError>
    where
        C: TelopayClient + ?Sized,
    {
        if !self.can_submit() {
            return Err(PaymentError::NotReady);
        }
        let Some(amount) = self.parsed_amount() else {
            return Err(PaymentError::NotReady);
        };
        self.clear_failures();
        let Some(client) = client else {
            tracing::warn!("No contract configured");
            self.prepare_failed = true;
            return Err(PaymentError::Preparation("no contract configured".to_string()));
        };
        let units = match to_base_units(&amount, self.token.decimals()) {
            Ok(units) => units,
            Err(error) => {
                tracing::warn!(%error, amount=%self.amount, token=%self.token, "Cannot prepare payment");
                self.prepare_failed = true;
                return Err(PaymentError::Preparation(error.to_string()));
            }
        };
        self.processing = true;
        tracing::info!(token=%self.token, amount=%amount, contract=%client.address(), "Submitting payment");
        let result = match self.token {
            Token::Eth => client.pay_eth(units).await,
            Token::Usdc => client.pay_usdc(units).await,
        };
        match result {
            Ok(tx_hash) => Ok(tx_hash),
            Err(error) => {
                tracing::warn!(%error, "Payment transaction failed");
                self.processing = false;
                self.write_failed = true;
                Err(PaymentError::Write(error))
            }
        }
    }

    /// Marks the in-flight payment as settled, successfully or not.
    pub fn complete(&mut self) {
        self.processing = false;
    }

    pub fn amount_label(&self) -> String {
        format!("Amount ({})", self.token)
    }

    pub fn placeholder(&self) -> String {
        format!(
            "Enter amount ({} - {})",
            self.token.min_amount(),
            self.token.max_amount()
        )
    }

    pub fn range_hint(&self) -> String {
        format!(
            "Range: {} - {} {}",
            self.token.min_amount(),
            self.token.max_amount(),
            self.token
        )
    }

    /// `Balance: 0.020000 ETH`, or `0` when unknown.
    pub fn balance_label(&self, token: Token) -> String {
        let value = self
            .balance(token)
            .map(TokenBalance::formatted)
            .unwrap_or_else(|| "0".to_string());
        format!("Balance: {value} {token}")
    }

    fn display_amount(&self) -> &str {
        if self.amount.is_empty() {
            "0"
        } else {
            &self.amount
        }
    }

    pub fn submit_label(&self) -> String {
        if self.processing {
            "Processing...".to_string()
        } else {
            format!("Pay {} {}", self.display_amount(), self.token)
        }
    }

    pub fn transaction_details(&self) -> String {
        let contract = match self.contract {
            Some(contract) => shorten(&contract.to_string(), 6, 4),
            None => "Not configured".to_string(),
        };
        format!(
            "Transaction Details\n  Amount:   {} {}\n  Network:  {}\n  Contract: {}",
            self.display_amount(),
            self.token,
            self.network.display_name(),
            contract
        )
    }
}
