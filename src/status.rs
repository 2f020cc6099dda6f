//! Presentation of a transaction's progress.

use alloy_primitives::TxHash;
use futures_util::StreamExt;
use std::fmt::{Display, Formatter};
use tokio_util::sync::CancellationToken;

use crate::chain::{explorer_tx_url, shorten};
use crate::watcher::{TransactionStatus, TransactionWatcher};

/// Shown when a transaction failed without a more specific reason.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Your transaction was rejected or failed to process.";

/// Keeps the latest status of one transaction and renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionTracker {
    tx_hash: TxHash,
    chain_id: u64,
    required_confirmations: u64,
    status: TransactionStatus,
}

impl TransactionTracker {
    pub fn new(tx_hash: TxHash, chain_id: u64) -> Self {
        Self {
            tx_hash,
            chain_id,
            required_confirmations: 2,
            status: TransactionStatus::Pending { confirmations: 0 },
        }
    }

    pub fn with_required_confirmations(mut self, confirmations: u64) -> Self {
        self.required_confirmations = confirmations;
        self
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    pub fn status(&self) -> &TransactionStatus {
        &self.status
    }

    pub fn update(&mut self, status: TransactionStatus) {
        self.status = status;
    }

    /// Explorer link for the transaction, `#` on chains without one.
    pub fn explorer_url(&self) -> String {
        explorer_tx_url(self.chain_id, &self.tx_hash)
    }

    /// Hash shortened to its first 10 and last 8 characters.
    pub fn short_hash(&self) -> String {
        shorten(&self.tx_hash.to_string(), 10, 8)
    }

    /// Consumes the watcher's stream, calling `on_update` after every change,
    /// until a terminal state arrives or `cancel` fires.
    ///
    /// Cancelling only stops following; the transaction itself is unaffected.
    pub async fn follow<W, F>(
        &mut self,
        watcher: &W,
        cancel: &CancellationToken,
        mut on_update: F,
    ) -> &TransactionStatus
    where
        W: TransactionWatcher + ?Sized,
        F: FnMut(&TransactionTracker),
    {
        let mut updates = watcher.watch(self.tx_hash);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(tx=%self.tx_hash, "Stopped following transaction");
                    break;
                }
                next = updates.next() => next,
            };
            let Some(status) = next else { break };
            if status == self.status && !status.is_terminal() {
                continue;
            }
            let terminal = status.is_terminal();
            self.update(status);
            on_update(self);
            if terminal {
                break;
            }
        }
        &self.status
    }
}

impl Display for TransactionTracker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.status {
            TransactionStatus::Pending { confirmations } => {
                writeln!(f, "Transaction Pending")?;
                writeln!(f, "Your payment is being processed...")?;
                if *confirmations > 0 {
                    writeln!(
                        f,
                        "Confirmations: {}/{}",
                        confirmations, self.required_confirmations
                    )?;
                }
                write!(f, "{}", self.short_hash())
            }
            TransactionStatus::Success(payment) => {
                writeln!(f, "Payment Successful!")?;
                writeln!(f, "Your payment has been confirmed on the blockchain.")?;
                if let Some(payment_id) = payment.payment_id {
                    writeln!(f, "Payment ID: {payment_id}")?;
                }
                write!(f, "View on BaseScan → {}  {}", self.explorer_url(), self.short_hash())
            }
            TransactionStatus::Error { message } => {
                writeln!(f, "Payment Failed")?;
                let message = if message.is_empty() {
                    DEFAULT_FAILURE_MESSAGE
                } else {
                    message.as_str()
                };
                writeln!(f, "{message}")?;
                write!(f, "View Transaction → {}  {}", self.explorer_url(), self.short_hash())
            }
        }
    }
}
