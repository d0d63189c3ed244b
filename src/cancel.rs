use std::future::Future;
use std::sync::{Arc, OnceLock};

use futures_util::future::select_all;
use tokio_util::sync::CancellationToken;

use crate::protocol::AdbError;

/// Cooperative abort signal honoured by [`Client::connect`] and
/// [`Client::wait_for`].
///
/// Cloning shares the signal. Timeouts are composed externally: abort the
/// signal from a timer task.
///
/// [`Client::connect`]: crate::client::Client::connect
/// [`Client::wait_for`]: crate::client::Client::wait_for
#[derive(Clone, Debug, Default)]
pub struct AbortSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<String>>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort with a reason. The first reason wins; later calls are no-ops.
    pub fn abort(&self, reason: impl Into<String>) {
        let _ = self.reason.set(reason.into());
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The stored abort reason, or a generic one if none was given.
    pub fn reason(&self) -> String {
        self.reason
            .get()
            .cloned()
            .unwrap_or_else(|| "operation aborted".to_string())
    }

    /// Resolves once the signal aborts.
    pub async fn aborted(&self) {
        self.token.cancelled().await
    }
}

/// Race `op` against any number of abort signals, first winner takes all.
///
/// A signal that is already aborted fails the race before `op` is polled.
/// If a signal aborts mid-flight the result is [`AdbError::Aborted`] with
/// that signal's reason; the caller owns cleanup of in-flight resources.
pub async fn race_with_signals<T, F>(op: F, signals: &[&AbortSignal]) -> Result<T, AdbError>
where
    F: Future<Output = Result<T, AdbError>>,
{
    for signal in signals {
        if signal.is_aborted() {
            return Err(AdbError::Aborted(signal.reason()));
        }
    }

    if signals.is_empty() {
        return op.await;
    }

    let aborts: Vec<_> = signals.iter().map(|s| Box::pin(s.aborted())).collect();

    tokio::select! {
        result = op => result,
        (_, index, _) = select_all(aborts) => Err(AdbError::Aborted(signals[index].reason())),
    }
}
