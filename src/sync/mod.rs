//! State synchronization between a primary timer and its mirror.
//!
//! This module provides:
//! - [`SyncSnapshot`]: the wire shape exchanged between instances
//! - [`IncomingSnapshot`]: lenient, field-by-field parsing of peer payloads
//! - [`StateSynchronizer`]: outbound throttling and inbound latency compensation
//! - [`SnapshotTransport`]: the delivery seam, with a channel-backed
//!   implementation in [`forward`] and [`MockTransport`] for tests
//!
//! # Throttling
//!
//! ```text
//! candidate == last sent (ignoring updated_at)     -> suppressed
//! running, only remaining_seconds changed, < 5 s   -> suppressed
//! anything else                                    -> sent
//! ```

mod error;
pub mod forward;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::timer::cycle::CycleTracker;
use crate::timer::session::{ConfigureOutcome, SessionClock};
use crate::types::{DurationConfig, SessionKind};

pub use error::{SnapshotError, TransportError};
pub use forward::{channel_transport, forward_snapshots, ChannelTransport};

/// Minimum spacing between snapshots of a merely ticking clock.
pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_secs(5);

// ============================================================================
// SyncSnapshot
// ============================================================================

/// Compact copy of the timer state sent to the peer instance.
///
/// Field names are the compatibility contract between instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub focus_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    pub current_session: SessionKind,
    pub remaining_seconds: u32,
    pub is_running: bool,
    pub completed_focus_sessions: u32,
    pub did_complete_cycle: bool,
    /// Seconds since the Unix epoch at which the snapshot was taken
    pub updated_at: f64,
}

impl SyncSnapshot {
    /// Captures the state of a clock and a cycle tracker.
    pub fn capture(clock: &SessionClock, cycle: &CycleTracker, now: f64) -> Self {
        let durations = clock.durations();
        Self {
            focus_minutes: durations.focus_minutes,
            short_break_minutes: durations.short_break_minutes,
            long_break_minutes: durations.long_break_minutes,
            current_session: clock.current_session(),
            remaining_seconds: clock.remaining_seconds(),
            is_running: clock.is_running(),
            completed_focus_sessions: cycle.completed_focus_sessions(),
            did_complete_cycle: cycle.cycle_complete(),
            updated_at: now,
        }
    }

    pub fn durations(&self) -> DurationConfig {
        DurationConfig {
            focus_minutes: self.focus_minutes,
            short_break_minutes: self.short_break_minutes,
            long_break_minutes: self.long_break_minutes,
        }
    }

    /// True if every field except `remaining_seconds` and `updated_at` matches.
    fn same_except_remaining(&self, other: &Self) -> bool {
        self.durations() == other.durations()
            && self.current_session == other.current_session
            && self.is_running == other.is_running
            && self.completed_focus_sessions == other.completed_focus_sessions
            && self.did_complete_cycle == other.did_complete_cycle
    }

    /// True if every field except `updated_at` matches.
    pub fn same_state(&self, other: &Self) -> bool {
        self.same_except_remaining(other) && self.remaining_seconds == other.remaining_seconds
    }

    /// Serializes the snapshot into its wire form.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ============================================================================
// IncomingSnapshot
// ============================================================================

/// Timer fields of an incoming snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerFields {
    pub current_session: SessionKind,
    pub remaining_seconds: u32,
    pub is_running: bool,
    pub completed_focus_sessions: u32,
    pub did_complete_cycle: bool,
    pub updated_at: Option<f64>,
}

/// A peer payload parsed field by field.
///
/// Valid duration fields are usable even when the timer fields are not.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingSnapshot {
    pub focus_minutes: Option<i64>,
    pub short_break_minutes: Option<i64>,
    pub long_break_minutes: Option<i64>,
    pub timer: Result<TimerFields, SnapshotError>,
}

impl IncomingSnapshot {
    /// Parses a raw payload. Fails only if the payload is not an object.
    pub fn from_value(value: &Value) -> Result<Self, SnapshotError> {
        let map = value.as_object().ok_or(SnapshotError::NotAnObject)?;

        Ok(Self {
            focus_minutes: map.get("focus_minutes").and_then(Value::as_i64),
            short_break_minutes: map.get("short_break_minutes").and_then(Value::as_i64),
            long_break_minutes: map.get("long_break_minutes").and_then(Value::as_i64),
            timer: parse_timer_fields(map),
        })
    }

    /// Merges the valid duration fields over `current`.
    pub fn durations_over(&self, current: DurationConfig) -> DurationConfig {
        DurationConfig::sanitized(
            self.focus_minutes
                .unwrap_or_else(|| i64::from(current.focus_minutes)),
            self.short_break_minutes
                .unwrap_or_else(|| i64::from(current.short_break_minutes)),
            self.long_break_minutes
                .unwrap_or_else(|| i64::from(current.long_break_minutes)),
        )
    }
}

impl From<&SyncSnapshot> for IncomingSnapshot {
    fn from(snapshot: &SyncSnapshot) -> Self {
        Self {
            focus_minutes: Some(i64::from(snapshot.focus_minutes)),
            short_break_minutes: Some(i64::from(snapshot.short_break_minutes)),
            long_break_minutes: Some(i64::from(snapshot.long_break_minutes)),
            timer: Ok(TimerFields {
                current_session: snapshot.current_session,
                remaining_seconds: snapshot.remaining_seconds,
                is_running: snapshot.is_running,
                completed_focus_sessions: snapshot.completed_focus_sessions,
                did_complete_cycle: snapshot.did_complete_cycle,
                updated_at: Some(snapshot.updated_at),
            }),
        }
    }
}

fn parse_timer_fields(map: &Map<String, Value>) -> Result<TimerFields, SnapshotError> {
    let current_session = required(map, "current_session")?
        .as_str()
        .and_then(SessionKind::from_tag)
        .ok_or(SnapshotError::InvalidField {
            field: "current_session",
            expected: "session tag",
        })?;

    let remaining_seconds = count(required(map, "remaining_seconds")?, "remaining_seconds")?;

    let is_running = required(map, "is_running")?
        .as_bool()
        .ok_or(SnapshotError::InvalidField {
            field: "is_running",
            expected: "boolean",
        })?;

    let completed_focus_sessions = count(
        required(map, "completed_focus_sessions")?,
        "completed_focus_sessions",
    )?;

    let did_complete_cycle = match map.get("did_complete_cycle") {
        None | Some(Value::Null) => false,
        Some(v) => v.as_bool().ok_or(SnapshotError::InvalidField {
            field: "did_complete_cycle",
            expected: "boolean",
        })?,
    };

    let updated_at = match map.get("updated_at") {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.as_f64().filter(|t| t.is_finite()).ok_or(
            SnapshotError::InvalidField {
                field: "updated_at",
                expected: "seconds since epoch",
            },
        )?),
    };

    Ok(TimerFields {
        current_session,
        remaining_seconds,
        is_running,
        completed_focus_sessions,
        did_complete_cycle,
        updated_at,
    })
}

fn required<'a>(map: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, SnapshotError> {
    match map.get(field) {
        None | Some(Value::Null) => Err(SnapshotError::MissingField(field)),
        Some(v) => Ok(v),
    }
}

/// Reads a non-negative integer. Negative values clamp to zero.
fn count(value: &Value, field: &'static str) -> Result<u32, SnapshotError> {
    let raw = value.as_i64().ok_or(SnapshotError::InvalidField {
        field,
        expected: "integer",
    })?;
    Ok(raw.clamp(0, i64::from(u32::MAX)) as u32)
}

// ============================================================================
// SnapshotTransport
// ============================================================================

/// Delivery seam for outbound snapshots.
///
/// Implementations must not block: delivery is fire-and-forget and a failed
/// hand-off is retried by the synchronizer.
pub trait SnapshotTransport: Send {
    fn send(&mut self, snapshot: &SyncSnapshot) -> Result<(), TransportError>;
}

/// Recording transport for tests.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<SyncSnapshot>>>,
    should_fail: Arc<AtomicBool>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn sent(&self) -> Vec<SyncSnapshot> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn last(&self) -> Option<SyncSnapshot> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

impl SnapshotTransport for MockTransport {
    fn send(&mut self, snapshot: &SyncSnapshot) -> Result<(), TransportError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(TransportError::Delivery("Mock failure".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(snapshot.clone());
        Ok(())
    }
}

// ============================================================================
// StateSynchronizer
// ============================================================================

/// Result of a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Sent,
    Suppressed,
    /// The transport rejected the snapshot; it is kept for retry.
    Failed,
}

/// Result of applying an incoming snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// Seconds subtracted to compensate for transit time
    pub transfer_delay: f64,
    /// Error that kept the timer fields from being applied
    pub rejected: Option<SnapshotError>,
    /// A duration change alone ran the running session out
    pub reached_zero: bool,
}

impl ApplyOutcome {
    pub fn timer_applied(&self) -> bool {
        self.rejected.is_none()
    }
}

/// Produces throttled outbound snapshots and applies inbound ones.
#[derive(Debug, Clone)]
pub struct StateSynchronizer {
    throttle_interval: f64,
    last_sent: Option<SyncSnapshot>,
    pending: Option<SyncSnapshot>,
}

impl Default for StateSynchronizer {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_INTERVAL)
    }
}

impl StateSynchronizer {
    pub fn new(throttle_interval: Duration) -> Self {
        Self {
            throttle_interval: throttle_interval.as_secs_f64(),
            last_sent: None,
            pending: None,
        }
    }

    /// Last snapshot the transport accepted.
    pub fn last_sent(&self) -> Option<&SyncSnapshot> {
        self.last_sent.as_ref()
    }

    /// Snapshot waiting for a retry after a failed hand-off.
    pub fn pending(&self) -> Option<&SyncSnapshot> {
        self.pending.as_ref()
    }

    /// Returns true if `candidate` differs enough from the last sent snapshot.
    pub fn should_send(&self, candidate: &SyncSnapshot) -> bool {
        let Some(last) = &self.last_sent else {
            return true;
        };

        if candidate.same_state(last) {
            return false;
        }

        if candidate.is_running && last.is_running && candidate.same_except_remaining(last) {
            return candidate.updated_at - last.updated_at >= self.throttle_interval;
        }

        true
    }

    /// Sends `candidate` unless throttling suppresses it.
    ///
    /// A pending snapshot from an earlier failure always forces a send; the
    /// newer candidate supersedes it.
    pub fn publish(
        &mut self,
        candidate: SyncSnapshot,
        force: bool,
        transport: &mut dyn SnapshotTransport,
    ) -> PublishOutcome {
        if !force && self.pending.is_none() && !self.should_send(&candidate) {
            return PublishOutcome::Suppressed;
        }
        self.deliver(candidate, transport)
    }

    /// Retries the pending snapshot, e.g. after the transport reconnected.
    ///
    /// The original `updated_at` is kept so the receiver compensates for
    /// the full time the snapshot spent waiting.
    pub fn retry_pending(&mut self, transport: &mut dyn SnapshotTransport) -> PublishOutcome {
        match self.pending.take() {
            Some(snapshot) => self.deliver(snapshot, transport),
            None => PublishOutcome::Suppressed,
        }
    }

    fn deliver(
        &mut self,
        snapshot: SyncSnapshot,
        transport: &mut dyn SnapshotTransport,
    ) -> PublishOutcome {
        match transport.send(&snapshot) {
            Ok(()) => {
                tracing::debug!(
                    session = %snapshot.current_session,
                    remaining = snapshot.remaining_seconds,
                    running = snapshot.is_running,
                    "snapshot sent"
                );
                self.pending = None;
                self.last_sent = Some(snapshot);
                PublishOutcome::Sent
            }
            Err(e) => {
                tracing::warn!(
                    retryable = e.is_retryable(),
                    "スナップショットの送信に失敗しました: {}",
                    e
                );
                self.pending = Some(snapshot);
                PublishOutcome::Failed
            }
        }
    }

    /// Applies a peer snapshot to the local clock and cycle tracker.
    ///
    /// Durations are applied whenever they parse. Timer fields are applied
    /// only if all required ones are valid; the remaining time is reduced by
    /// the time the snapshot spent in transit.
    ///
    /// Without usable timer fields the durations go through
    /// [`SessionClock::configure`], so a running countdown keeps its elapsed
    /// time and is re-anchored.
    pub fn apply_incoming(
        &self,
        incoming: &IncomingSnapshot,
        clock: &mut SessionClock,
        cycle: &mut CycleTracker,
        now: f64,
    ) -> ApplyOutcome {
        let durations = incoming.durations_over(clock.durations());

        let fields = match &incoming.timer {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!("不正なスナップショットを受信しました: {}", e);
                let reached_zero = match clock.configure(durations, now) {
                    ConfigureOutcome::Applied { reached_zero } => reached_zero,
                    ConfigureOutcome::Unchanged => false,
                };
                return ApplyOutcome {
                    transfer_delay: 0.0,
                    rejected: Some(e.clone()),
                    reached_zero,
                };
            }
        };

        // `adopt` re-anchors right after, so no rebase is needed here.
        clock.set_durations(durations);

        let transfer_delay = fields
            .updated_at
            .map(|sent_at| (now - sent_at).max(0.0))
            .unwrap_or(0.0);
        let remaining = (f64::from(fields.remaining_seconds) - transfer_delay).max(0.0);

        if fields.did_complete_cycle {
            clock.adopt(fields.current_session, 0.0, false, now);
        } else {
            clock.adopt(fields.current_session, remaining, fields.is_running, now);
        }
        cycle.adopt(fields.completed_focus_sessions, fields.did_complete_cycle);

        tracing::debug!(
            session = %fields.current_session,
            remaining = clock.remaining_seconds(),
            running = clock.is_running(),
            transfer_delay,
            "snapshot applied"
        );

        ApplyOutcome {
            transfer_delay,
            rejected: None,
            reached_zero: false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
