//! Following a submitted transaction until it is final.
//!
//! [`ReceiptWatcher`] turns a transaction hash into a stream of
//! [`TransactionStatus`] values. The stream starts with `Pending`, reports every
//! change in the confirmation count, and ends with exactly one terminal state:
//! `Success` once the receipt has the required confirmations, or `Error` when
//! the transaction reverted, the RPC failed, or the timeout elapsed.

use alloy_primitives::{Address, B256, TxHash};
use alloy_provider::Provider;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::time::Duration;
use tokio::time::Instant;

use crate::chain::ChainProvider;
use crate::config::Config;
use crate::contract::{TelopayClient, TelopayContract, payment_id_from_logs};

pub const REVERTED_MESSAGE: &str = "Transaction reverted";
pub const TIMEOUT_MESSAGE: &str = "Timed out waiting for confirmation";

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error(transparent)]
    Transport(#[from] alloy_transport::TransportError),
}

/// A mined transaction, as far as the watcher is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub block_number: u64,
    pub success: bool,
    /// Id of the payment recorded by the transaction, when it emitted one.
    pub payment_id: Option<B256>,
}

/// A transaction that reached the required confirmations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedPayment {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub confirmations: u64,
    pub payment_id: Option<B256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending { confirmations: u64 },
    Success(ConfirmedPayment),
    Error { message: String },
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending { .. })
    }
}

/// Receipt and block height lookups.
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    /// `None` while the transaction is not mined yet.
    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<ReceiptSummary>, WatchError>;

    async fn block_number(&self) -> Result<u64, WatchError>;
}

async fn fetch_receipt(
    provider: &ChainProvider,
    tx_hash: TxHash,
    contract: Option<Address>,
) -> Result<Option<ReceiptSummary>, WatchError> {
    let Some(receipt) = provider.inner().get_transaction_receipt(tx_hash).await? else {
        return Ok(None);
    };
    let Some(block_number) = receipt.block_number else {
        return Ok(None);
    };
    Ok(Some(ReceiptSummary {
        block_number,
        success: receipt.status(),
        payment_id: payment_id_from_logs(contract, receipt.inner.logs()),
    }))
}

#[async_trait]
impl ReceiptSource for ChainProvider {
    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<ReceiptSummary>, WatchError> {
        fetch_receipt(self, tx_hash, None).await
    }

    async fn block_number(&self) -> Result<u64, WatchError> {
        Ok(self.inner().get_block_number().await?)
    }
}

#[async_trait]
impl ReceiptSource for TelopayContract {
    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<ReceiptSummary>, WatchError> {
        fetch_receipt(self.provider(), tx_hash, Some(self.address())).await
    }

    async fn block_number(&self) -> Result<u64, WatchError> {
        self.provider().block_number().await
    }
}

/// Produces the status stream of a transaction.
pub trait TransactionWatcher: Send + Sync {
    fn watch(&self, tx_hash: TxHash) -> BoxStream<'_, TransactionStatus>;
}

/// [`TransactionWatcher`] that polls a [`ReceiptSource`].
#[derive(Debug, Clone)]
pub struct ReceiptWatcher<S> {
    source: S,
    required_confirmations: u64,
    poll_interval: Duration,
    timeout: Duration,
}

enum Poll {
    Waiting(u64),
    Done(TransactionStatus),
}

struct PollState {
    last_confirmations: u64,
    polled: bool,
    done: bool,
}

impl<S: ReceiptSource> ReceiptWatcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            required_confirmations: 2,
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(source: S, config: &Config) -> Self {
        Self::new(source)
            .with_required_confirmations(config.confirmations())
            .with_poll_interval(config.poll_interval())
            .with_timeout(config.receipt_timeout())
    }

    /// Confirmations counted the usual way: the inclusion block is the first.
    pub fn with_required_confirmations(mut self, confirmations: u64) -> Self {
        self.required_confirmations = confirmations.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    async fn poll(&self, tx_hash: TxHash) -> Result<Poll, WatchError> {
        let Some(receipt) = self.source.receipt(tx_hash).await? else {
            return Ok(Poll::Waiting(0));
        };
        if !receipt.success {
            return Ok(Poll::Done(TransactionStatus::Error {
                message: REVERTED_MESSAGE.to_string(),
            }));
        }
        let head = self.source.block_number().await?;
        let confirmations = head.saturating_sub(receipt.block_number) + 1;
        if confirmations < self.required_confirmations {
            return Ok(Poll::Waiting(confirmations));
        }
        Ok(Poll::Done(TransactionStatus::Success(ConfirmedPayment {
            tx_hash,
            block_number: receipt.block_number,
            confirmations,
            payment_id: receipt.payment_id,
        })))
    }
}

impl<S: ReceiptSource> TransactionWatcher for ReceiptWatcher<S> {
    fn watch(&self, tx_hash: TxHash) -> BoxStream<'_, TransactionStatus> {
        let deadline = Instant::now() + self.timeout;
        let state = PollState {
            last_confirmations: 0,
            polled: false,
            done: false,
        };
        let updates = stream::unfold(state, move |mut state| async move {
            if state.done {
                return None;
            }
            loop {
                if state.polled {
                    tokio::time::sleep(self.poll_interval).await;
                }
                state.polled = true;
                let polled = if Instant::now() >= deadline {
                    None
                } else {
                    tokio::time::timeout_at(deadline, self.poll(tx_hash)).await.ok()
                };
                let Some(polled) = polled else {
                    tracing::warn!(tx=%tx_hash, "Gave up waiting for confirmation");
                    state.done = true;
                    let status = TransactionStatus::Error {
                        message: TIMEOUT_MESSAGE.to_string(),
                    };
                    return Some((status, state));
                };
                match polled {
                    Ok(Poll::Waiting(confirmations)) => {
                        if confirmations != state.last_confirmations {
                            tracing::debug!(tx=%tx_hash, confirmations, "Transaction confirmations");
                            state.last_confirmations = confirmations;
                            return Some((TransactionStatus::Pending { confirmations }, state));
                        }
                    }
                    Ok(Poll::Done(status)) => {
                        tracing::info!(tx=%tx_hash, ?status, "Transaction settled");
                        state.done = true;
                        return Some((status, state));
                    }
                    Err(error) => {
                        tracing::warn!(tx=%tx_hash, %error, "Failed to poll transaction");
                        state.done = true;
                        let status = TransactionStatus::Error {
                            message: error.to_string(),
                        };
                        return Some((status, state));
                    }
                }
            }
        });
        stream::once(async { TransactionStatus::Pending { confirmations: 0 } })
            .chain(updates)
            .boxed()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy_primitives::b256;
    use alloy_transport::TransportErrorKind;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub(crate) const HASH: TxHash =
        b256!("0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef");

    /// Replays scripted receipts and block heights; the last entry repeats.
    pub(crate) struct ScriptedSource {
        receipts: Mutex<VecDeque<Option<ReceiptSummary>>>,
        heads: Mutex<VecDeque<u64>>,
        fail: bool,
    }

    impl ScriptedSource {
        pub(crate) fn new(receipts: Vec<Option<ReceiptSummary>>, heads: Vec<u64>) -> Self {
            Self {
                receipts: Mutex::new(receipts.into()),
                heads: Mutex::new(heads.into()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(vec![None], vec![0])
            }
        }
    }

    fn next<T: Copy>(queue: &Mutex<VecDeque<T>>) -> T {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            *queue.front().unwrap()
        }
    }

    #[async_trait]
    impl ReceiptSource for ScriptedSource {
        async fn receipt(&self, _tx_hash: TxHash) -> Result<Option<ReceiptSummary>, WatchError> {
            if self.fail {
                return Err(TransportErrorKind::custom_str("connection refused").into());
            }
            Ok(next(&self.receipts))
        }

        async fn block_number(&self) -> Result<u64, WatchError> {
            Ok(next(&self.heads))
        }
    }

    pub(crate) fn mined(block_number: u64) -> Option<ReceiptSummary> {
        Some(ReceiptSummary {
            block_number,
            success: true,
            payment_id: None,
        })
    }

    pub(crate) fn fast<S: ReceiptSource>(source: S) -> ReceiptWatcher<S> {
        ReceiptWatcher::new(source).with_poll_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_pending_then_success() {
        let source = ScriptedSource::new(vec![None, mined(100), mined(100)], vec![100, 100, 101]);
        let watcher = fast(source);
        let statuses: Vec<_> = watcher.watch(HASH).collect().await;
        assert_eq!(
            statuses,
            vec![
                TransactionStatus::Pending { confirmations: 0 },
                TransactionStatus::Pending { confirmations: 1 },
                TransactionStatus::Success(ConfirmedPayment {
                    tx_hash: HASH,
                    block_number: 100,
                    confirmations: 2,
                    payment_id: None,
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_reverted() {
        let reverted = Some(ReceiptSummary {
            block_number: 7,
            success: false,
            payment_id: None,
        });
        let watcher = fast(ScriptedSource::new(vec![reverted], vec![9]));
        let statuses: Vec<_> = watcher.watch(HASH).collect().await;
        assert_eq!(
            statuses.last(),
            Some(&TransactionStatus::Error {
                message: REVERTED_MESSAGE.to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_rpc_error_is_terminal() {
        let watcher = fast(ScriptedSource::failing());
        let statuses: Vec<_> = watcher.watch(HASH).collect().await;
        assert_eq!(statuses.len(), 2);
        match &statuses[1] {
            TransactionStatus::Error { message } => assert!(message.contains("connection refused")),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let watcher = fast(ScriptedSource::new(vec![None], vec![0]))
            .with_timeout(Duration::from_millis(20));
        let statuses: Vec<_> = watcher.watch(HASH).collect().await;
        assert_eq!(statuses.first(), Some(&TransactionStatus::Pending { confirmations: 0 }));
        assert_eq!(
            statuses.last(),
            Some(&TransactionStatus::Error {
                message: TIMEOUT_MESSAGE.to_string()
            })
        );
        assert_eq!(statuses.len(), 2);
    }

    struct StalledSource;

    #[async_trait]
    impl ReceiptSource for StalledSource {
        async fn receipt(&self, _tx_hash: TxHash) -> Result<Option<ReceiptSummary>, WatchError> {
            std::future::pending().await
        }

        async fn block_number(&self) -> Result<u64, WatchError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_timeout_while_rpc_hangs() {
        let watcher = fast(StalledSource).with_timeout(Duration::from_millis(50));
        let statuses: Vec<_> =
            tokio::time::timeout(Duration::from_secs(2), watcher.watch(HASH).collect::<Vec<_>>())
                .await
                .expect("watch should end at its own deadline");
        assert_eq!(
            statuses,
            vec![
                TransactionStatus::Pending { confirmations: 0 },
                TransactionStatus::Error {
                    message: TIMEOUT_MESSAGE.to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_single_confirmation_required() {
        let watcher = fast(ScriptedSource::new(vec![mined(5)], vec![5])).with_required_confirmations(1);
        let statuses: Vec<_> = watcher.watch(HASH).collect().await;
        assert!(matches!(
            statuses.last(),
            Some(TransactionStatus::Success(ConfirmedPayment { confirmations: 1, .. }))
        ));
    }
}
