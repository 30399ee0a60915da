//! Tick prompts for a running session.
//!
//! A tick only asks the engine to resync against its anchor; the number of
//! ticks delivered never affects the countdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// Interval between tick prompts.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Starts and cancels the periodic tick prompt.
pub trait TickScheduler: Send {
    /// Cancels any active tick source, then starts a new one.
    fn schedule(&mut self);

    /// Cancels the active tick source, if any.
    fn cancel(&mut self);

    /// Returns true while a tick source is active.
    fn is_active(&self) -> bool;
}

/// Tick source backed by a tokio task.
///
/// Each tick is delivered as `()` on the channel given at construction.
/// Must be scheduled from within a tokio runtime.
pub struct TokioTicker {
    tick_tx: mpsc::UnboundedSender<()>,
    handle: Option<JoinHandle<()>>,
}

impl TokioTicker {
    pub fn new(tick_tx: mpsc::UnboundedSender<()>) -> Self {
        Self {
            tick_tx,
            handle: None,
        }
    }
}

impl TickScheduler for TokioTicker {
    fn schedule(&mut self) {
        self.cancel();

        let tx = self.tick_tx.clone();
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(()).is_err() {
                    break;
                }
            }
        }));
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TokioTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Tick scheduler that only records calls. Used in tests and for engines
/// driven manually.
#[derive(Debug, Clone, Default)]
pub struct MockTicker {
    inner: Arc<MockTickerState>,
}

#[derive(Debug, Default)]
struct MockTickerState {
    scheduled: AtomicUsize,
    cancelled: AtomicUsize,
    active: std::sync::atomic::AtomicBool,
}

impl MockTicker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn schedule_count(&self) -> usize {
        self.inner.scheduled.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn cancel_count(&self) -> usize {
        self.inner.cancelled.load(Ordering::SeqCst)
    }
}

impl TickScheduler for MockTicker {
    fn schedule(&mut self) {
        self.cancel();
        self.inner.scheduled.fetch_add(1, Ordering::SeqCst);
        self.inner.active.store(true, Ordering::SeqCst);
    }

    fn cancel(&mut self) {
        if self.inner.active.swap(false, Ordering::SeqCst) {
            self.inner.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[test]
    fn test_mock_ticker_cancels_before_reschedule() {
        let mut ticker = MockTicker::new();
        let probe = ticker.clone();

        ticker.schedule();
        ticker.schedule();
        assert_eq!(probe.schedule_count(), 2);
        assert_eq!(probe.cancel_count(), 1);
        assert!(probe.is_active());

        ticker.cancel();
        ticker.cancel();
        assert_eq!(probe.cancel_count(), 2);
        assert!(!probe.is_active());
    }

    #[tokio::test]
    async fn test_tokio_ticker_delivers_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ticker = TokioTicker::new(tx);
        ticker.schedule();
        assert!(ticker.is_active());

        let tick = timeout(Duration::from_secs(3), rx.recv()).await;
        assert!(matches!(tick, Ok(Some(()))));

        ticker.cancel();
        assert!(!ticker.is_active());
    }

    #[tokio::test]
    async fn test_tokio_ticker_cancel_stops_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ticker = TokioTicker::new(tx);
        ticker.schedule();
        ticker.cancel();

        tokio::time::sleep(Duration::from_millis(1300)).await;
        assert!(rx.try_recv().is_err(), "no tick after cancel");
    }
}
