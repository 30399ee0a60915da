//! Channel-backed snapshot transport.
//!
//! The timer hands snapshots to a bounded channel without blocking; a
//! forwarder task drains the channel and delivers each snapshot to the
//! mirror's peer socket. When the mirror is unreachable the newest
//! undelivered snapshot is kept and retried until it goes through or a
//! newer one replaces it.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::cli::client::IpcClient;

use super::{SnapshotTransport, SyncSnapshot, TransportError};

/// Capacity of the snapshot channel.
pub const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;

/// Base delay between delivery retries (multiplied by the attempt number).
const RETRY_DELAY_MS: u64 = 500;

/// Upper bound for the retry delay.
const MAX_RETRY_DELAY_MS: u64 = 5_000;

/// Transport that queues snapshots for the forwarder task.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<SyncSnapshot>,
}

impl SnapshotTransport for ChannelTransport {
    fn send(&mut self, snapshot: &SyncSnapshot) -> Result<(), TransportError> {
        self.tx.try_send(snapshot.clone()).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Busy,
            TrySendError::Closed(_) => TransportError::Disconnected,
        })
    }
}

/// Creates a channel transport and the receiver the forwarder drains.
pub fn channel_transport(capacity: usize) -> (ChannelTransport, mpsc::Receiver<SyncSnapshot>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelTransport { tx }, rx)
}

/// Delivers snapshots from `rx` to the mirror until the channel closes.
pub async fn forward_snapshots(mut rx: mpsc::Receiver<SyncSnapshot>, client: IpcClient) {
    let mut pending: Option<SyncSnapshot> = None;
    let mut attempt: u64 = 0;

    loop {
        let snapshot = match pending.take() {
            Some(waiting) => {
                let delay = (RETRY_DELAY_MS * attempt).min(MAX_RETRY_DELAY_MS);
                tokio::select! {
                    newer = rx.recv() => match newer {
                        Some(newer) => newer,
                        None => return,
                    },
                    _ = tokio::time::sleep(Duration::from_millis(delay)) => waiting,
                }
            }
            None => match rx.recv().await {
                Some(next) => next,
                None => return,
            },
        };

        match client.send_snapshot(&snapshot).await {
            Ok(()) => {
                if attempt > 0 {
                    tracing::info!("ミラーへの接続が回復しました");
                }
                attempt = 0;
            }
            Err(e) => {
                attempt += 1;
                tracing::warn!(
                    "ミラーへのスナップショット送信に失敗しました (試行 {}): {}",
                    attempt,
                    e
                );
                pending = Some(snapshot);
            }
        }
    }
}
