use tokio::signal::unix::SignalKind;
use tokio::signal::unix::signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Turns SIGTERM and SIGINT into a cancellation token.
///
/// The CLI uses it to stop following a transaction when the user presses
/// Ctrl-C. The transaction itself keeps going on chain; only the watcher stops.
pub struct SigDown {
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl SigDown {
    /// Registers the signal handlers.
    ///
    /// Returns an error if signal registration fails.
    pub fn try_new() -> Result<Self, std::io::Error> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let cancellation_token = CancellationToken::new();
        let trigger = cancellation_token.clone();
        let task_tracker = TaskTracker::new();
        task_tracker.spawn(async move {
            let signal_name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
                _ = trigger.cancelled() => return,
            };
            tracing::debug!(signal = signal_name, "Shutdown signal received");
            trigger.cancel();
        });
        task_tracker.close();
        Ok(Self {
            task_tracker,
            cancellation_token,
        })
    }

    /// Returns a clone of the cancellation token for distributing to subsystems.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Whether a shutdown signal has already been received.
    pub fn is_triggered(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Releases the signal handler task without waiting for a signal.
    pub async fn release(self) {
        self.cancellation_token.cancel();
        self.task_tracker.wait().await;
    }
}
