// ── Adapter state watcher ──
//
// Platform glue publishes adapter power transitions here; scans subscribe
// to an "off alarm" that fires on the first transition away from ON.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, warn};

use crate::error::ScanError;
use crate::model::AdapterState;

/// Multicast source of adapter state transitions.
///
/// Subscribers only see transitions published after they subscribed; there
/// is no replay of the current state.
#[derive(Debug, Clone)]
pub struct AdapterStateWatcher {
    tx: broadcast::Sender<AdapterState>,
}

impl AdapterStateWatcher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a transition. Returns the number of subscribers reached.
    pub fn publish(&self, state: AdapterState) -> usize {
        debug!(%state, "adapter state changed");
        self.tx.send(state).unwrap_or(0)
    }

    /// Publish a raw platform notification code.
    pub fn publish_raw(&self, code: i32) -> usize {
        self.publish(AdapterState::from_raw(code))
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Stream of transitions published from now on.
    pub fn changes(&self) -> AdapterStateStream {
        AdapterStateStream {
            inner: BroadcastStream::new(self.tx.subscribe()),
        }
    }

    /// Resolves with [`ScanError::BluetoothDisabled`] on the first
    /// published state that is not ON.
    ///
    /// The subscription is taken when this method is called, not when the
    /// future is first polled, so no transition in between is missed. If
    /// the watcher goes away the alarm never fires.
    pub fn off_alarm(&self) -> impl Future<Output = ScanError> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            loop {
                match rx.recv().await {
                    Ok(state) if !state.is_usable() => {
                        warn!(%state, "adapter left ON, failing scans");
                        return ScanError::BluetoothDisabled;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "off alarm lagged behind adapter state changes");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return std::future::pending().await;
                    }
                }
            }
        }
    }
}

// ── AdapterStateStream ───────────────────────────────────────────

/// Live adapter state transitions. Lagging subscribers skip ahead.
pub struct AdapterStateStream {
    inner: BroadcastStream<AdapterState>,
}

impl Stream for AdapterStateStream {
    type Item = AdapterState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(state))) => return Poll::Ready(Some(state)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(skipped, "adapter state subscriber lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::{FutureExt, StreamExt};

    #[tokio::test]
    async fn changes_only_see_later_transitions() {
        let watcher = AdapterStateWatcher::new(8);
        watcher.publish(AdapterState::Off);

        let mut changes = watcher.changes();
        watcher.publish_raw(AdapterState::RAW_TURNING_ON);
        watcher.publish_raw(AdapterState::RAW_ON);

        assert_eq!(changes.next().await, Some(AdapterState::TurningOn));
        assert_eq!(changes.next().await, Some(AdapterState::On));
    }

    #[tokio::test]
    async fn alarm_ignores_on_and_fires_on_turning_off() {
        let watcher = AdapterStateWatcher::new(8);
        let mut alarm = Box::pin(watcher.off_alarm());

        watcher.publish(AdapterState::On);
        assert!((&mut alarm).now_or_never().is_none());

        watcher.publish(AdapterState::TurningOff);
        assert_eq!(alarm.await, ScanError::BluetoothDisabled);
    }

    #[tokio::test]
    async fn alarm_subscribes_eagerly() {
        let watcher = AdapterStateWatcher::new(8);
        let alarm = watcher.off_alarm();
        watcher.publish(AdapterState::Off);

        assert_eq!(alarm.await, ScanError::BluetoothDisabled);
    }

    #[tokio::test]
    async fn unknown_codes_count_as_off() {
        let watcher = AdapterStateWatcher::new(8);
        let alarm = watcher.off_alarm();
        watcher.publish_raw(42);

        assert_eq!(alarm.await, ScanError::BluetoothDisabled);
    }

    #[tokio::test]
    async fn dropped_watcher_never_fires() {
        let watcher = AdapterStateWatcher::new(8);
        let mut alarm = Box::pin(watcher.off_alarm());
        drop(watcher);

        tokio::task::yield_now().await;
        assert!((&mut alarm).now_or_never().is_none());
    }

    #[test]
    fn publish_without_subscribers_reaches_nobody() {
        let watcher = AdapterStateWatcher::new(4);
        assert_eq!(watcher.publish(AdapterState::Off), 0);
        assert_eq!(watcher.subscriber_count(), 0);
    }
}
