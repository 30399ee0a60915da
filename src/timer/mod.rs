//! Timer engine for the cycle timer.
//!
//! This module provides the core timer functionality:
//! - Drift-free countdown anchored to wall-clock time ([`session`])
//! - Four-session cycle advancement ([`cycle`])
//! - Tick prompts that only trigger a resync ([`ticker`])
//! - Snapshot publishing and mirroring through [`crate::sync`]
//! - Event firing for presentation layers
//!
//! The same engine serves both the primary and the mirror instance; only
//! the wiring differs (a primary gets a transport, a mirror receives
//! snapshots).

pub mod clock;
pub mod cycle;
pub mod session;
pub mod ticker;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::sync::{
    ApplyOutcome, IncomingSnapshot, PublishOutcome, SnapshotError, SnapshotTransport,
    StateSynchronizer, SyncSnapshot, DEFAULT_THROTTLE_INTERVAL,
};
use crate::types::{DurationConfig, SessionKind};

use self::clock::{Clock, SystemClock};
use self::cycle::CycleTracker;
use self::session::{ConfigureOutcome, SessionClock};
use self::ticker::TickScheduler;

pub use self::clock::ManualClock;
pub use self::ticker::{MockTicker, TokioTicker};

// ============================================================================
// Role & Options
// ============================================================================

/// Which side of the synchronization an engine is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Owns the timer and publishes snapshots
    Primary,
    /// Follows the primary through incoming snapshots
    Mirror,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Mirror => "mirror",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Primary
    }
}

/// Options the embedding application passes into the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub role: Role,
    pub durations: DurationConfig,
    /// Start the next session automatically after a natural completion
    pub auto_advance: bool,
    /// Minimum spacing between snapshots of a merely ticking clock
    pub throttle_interval: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            role: Role::Primary,
            durations: DurationConfig::default(),
            auto_advance: false,
            throttle_interval: DEFAULT_THROTTLE_INTERVAL,
        }
    }
}

impl EngineOptions {
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_durations(mut self, durations: DurationConfig) -> Self {
        self.durations = durations;
        self
    }

    pub fn with_auto_advance(mut self, auto_advance: bool) -> Self {
        self.auto_advance = auto_advance;
        self
    }

    pub fn with_throttle_interval(mut self, interval: Duration) -> Self {
        self.throttle_interval = interval;
        self
    }
}

// ============================================================================
// TimerEvent
// ============================================================================

/// Timer events for presentation layers and external integrations.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    /// Countdown started or resumed
    Started {
        session: SessionKind,
        remaining_seconds: u32,
    },
    /// Countdown paused
    Paused {
        session: SessionKind,
        remaining_seconds: u32,
    },
    /// Tick prompt handled
    Tick { remaining_seconds: u32 },
    /// A session ran out naturally
    SessionCompleted {
        session: SessionKind,
        /// Monotonic count of natural completions
        sessions_completed: u64,
    },
    /// A new session was loaded (advance, skip, select or reset)
    SessionChanged {
        session: SessionKind,
        remaining_seconds: u32,
    },
    /// The long break closing a cycle finished
    CycleCompleted { completed_focus_sessions: u32 },
    /// Cycle progress was cleared
    CycleReset,
    /// Durations changed
    DurationsChanged { durations: DurationConfig },
    /// State was replaced by a peer snapshot
    SnapshotApplied {
        session: SessionKind,
        remaining_seconds: u32,
        is_running: bool,
    },
}

// ============================================================================
// TimerView
// ============================================================================

/// Observable state for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerView {
    pub role: Role,
    pub current_session: SessionKind,
    pub remaining_seconds: u32,
    pub is_running: bool,
    pub completed_focus_sessions: u32,
    pub cycle_complete: bool,
    /// Increments once per natural session completion
    pub sessions_completed: u64,
    pub last_completed_session: Option<SessionKind>,
    pub durations: DurationConfig,
}

impl TimerView {
    /// Remaining time as `mm:ss`.
    pub fn remaining_label(&self) -> String {
        format_remaining(self.remaining_seconds)
    }
}

/// Formats seconds as `mm:ss`. Minutes are not wrapped into hours.
pub fn format_remaining(total_seconds: u32) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

// ============================================================================
// TimerEngine
// ============================================================================

/// Timer engine that owns the state of one instance.
///
/// All methods are synchronous; the caller serializes access.
pub struct TimerEngine {
    options: EngineOptions,
    clock: Arc<dyn Clock>,
    session: SessionClock,
    cycle: CycleTracker,
    sync: StateSynchronizer,
    transport: Option<Box<dyn SnapshotTransport>>,
    ticker: Option<Box<dyn TickScheduler>>,
    event_tx: mpsc::UnboundedSender<TimerEvent>,
    sessions_completed: u64,
    last_completed_session: Option<SessionKind>,
}

impl TimerEngine {
    /// Creates an engine on the system clock, without ticker or transport.
    pub fn new(options: EngineOptions, event_tx: mpsc::UnboundedSender<TimerEvent>) -> Self {
        Self {
            session: SessionClock::new(options.durations),
            cycle: CycleTracker::new(),
            sync: StateSynchronizer::new(options.throttle_interval),
            clock: Arc::new(SystemClock),
            transport: None,
            ticker: None,
            event_tx,
            sessions_completed: 0,
            last_completed_session: None,
            options,
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Attaches the scheduler that delivers tick prompts.
    pub fn with_ticker(mut self, ticker: impl TickScheduler + 'static) -> Self {
        self.ticker = Some(Box::new(ticker));
        self
    }

    /// Attaches the transport outbound snapshots are published to.
    pub fn with_transport(mut self, transport: impl SnapshotTransport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn role(&self) -> Role {
        self.options.role
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    pub fn session_clock(&self) -> &SessionClock {
        &self.session
    }

    pub fn cycle(&self) -> &CycleTracker {
        &self.cycle
    }

    pub fn synchronizer(&self) -> &StateSynchronizer {
        &self.sync
    }

    pub fn view(&self) -> TimerView {
        TimerView {
            role: self.options.role,
            current_session: self.session.current_session(),
            remaining_seconds: self.session.remaining_seconds(),
            is_running: self.session.is_running(),
            completed_focus_sessions: self.cycle.completed_focus_sessions(),
            cycle_complete: self.cycle.cycle_complete(),
            sessions_completed: self.sessions_completed,
            last_completed_session: self.last_completed_session,
            durations: self.session.durations(),
        }
    }

    /// Captures the current state in wire form.
    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot::capture(&self.session, &self.cycle, self.clock.now())
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Starts or resumes the current session. Returns false if already running.
    ///
    /// Starting after a completed cycle begins a new cycle. Starting a
    /// session with no time left completes it first.
    pub fn start(&mut self) -> bool {
        let started = self.start_inner();
        self.publish(false);
        started
    }

    /// Pauses the running session. Returns false if not running.
    pub fn pause(&mut self) -> bool {
        let now = self.clock.now();
        if !self.session.pause(now) {
            return false;
        }
        self.stop_ticking();
        self.emit(TimerEvent::Paused {
            session: self.session.current_session(),
            remaining_seconds: self.session.remaining_seconds(),
        });
        self.publish(false);
        true
    }

    /// Handles a tick prompt: resync, then complete the session if it ran out.
    pub fn tick(&mut self) {
        if !self.session.is_running() {
            // A prompt that raced with a pause.
            self.stop_ticking();
            return;
        }
        let now = self.clock.now();
        let remaining = self.session.resync(now);
        self.emit(TimerEvent::Tick {
            remaining_seconds: remaining,
        });
        if remaining == 0 {
            self.complete_session(now);
        }
        self.publish(false);
    }

    /// Recomputes the remaining time after a foreground/resume signal.
    pub fn resync(&mut self) -> u32 {
        if self.session.is_running() {
            let now = self.clock.now();
            if self.session.resync(now) == 0 {
                self.complete_session(now);
            }
            self.publish(false);
        }
        self.session.remaining_seconds()
    }

    /// Rewinds the current session to its full duration and stops it.
    pub fn reset_session(&mut self) {
        self.stop_ticking();
        self.cycle.clear_cycle_complete();
        self.session.reset_current_session();
        self.emit_session_changed();
        self.publish(false);
    }

    /// Clears cycle progress and returns to the first focus session.
    pub fn reset_cycle(&mut self) {
        self.stop_ticking();
        self.cycle.reset_cycle(&mut self.session);
        self.emit(TimerEvent::CycleReset);
        self.emit_session_changed();
        self.publish(false);
    }

    /// Moves to the next session without crediting progress.
    pub fn skip(&mut self) {
        self.skip_inner();
        self.publish(false);
    }

    /// Skips, then starts the new session.
    pub fn skip_and_start_next(&mut self) {
        self.skip_inner();
        self.start_inner();
        self.publish(false);
    }

    /// Switches to `kind` at its full duration, stopped.
    pub fn select_session(&mut self, kind: SessionKind) {
        self.stop_ticking();
        self.cycle.clear_cycle_complete();
        self.session.select_session(kind);
        self.emit_session_changed();
        self.publish(false);
    }

    /// Applies new durations, preserving the elapsed time of the current
    /// session. Returns false if nothing changed.
    pub fn configure(&mut self, durations: DurationConfig) -> bool {
        let now = self.clock.now();
        let reached_zero = match self.session.configure(durations, now) {
            ConfigureOutcome::Unchanged => return false,
            ConfigureOutcome::Applied { reached_zero } => reached_zero,
        };

        if self.cycle.cycle_complete() {
            self.session.expire();
        }

        self.emit(TimerEvent::DurationsChanged {
            durations: self.session.durations(),
        });

        if reached_zero {
            self.complete_session(now);
        }
        self.publish(false);
        true
    }

    /// Applies a raw peer payload.
    ///
    /// Fails only when the payload is not an object; partially valid
    /// payloads update the durations and report the rejected timer fields
    /// in the outcome.
    pub fn apply_snapshot(&mut self, payload: &Value) -> Result<ApplyOutcome, SnapshotError> {
        let incoming = IncomingSnapshot::from_value(payload).inspect_err(|e| {
            tracing::warn!("スナップショットを解析できませんでした: {}", e);
        })?;
        Ok(self.apply_incoming(&incoming))
    }

    /// Applies a typed peer snapshot.
    pub fn apply_incoming(&mut self, incoming: &IncomingSnapshot) -> ApplyOutcome {
        let now = self.clock.now();
        let outcome = self
            .sync
            .apply_incoming(incoming, &mut self.session, &mut self.cycle, now);

        if !outcome.timer_applied() && self.cycle.cycle_complete() {
            self.session.expire();
        }
        if outcome.reached_zero {
            self.complete_session(now);
        }

        if self.session.is_running() {
            self.start_ticking();
        } else {
            self.stop_ticking();
        }

        if outcome.timer_applied() {
            self.emit(TimerEvent::SnapshotApplied {
                session: self.session.current_session(),
                remaining_seconds: self.session.remaining_seconds(),
                is_running: self.session.is_running(),
            });
        } else {
            self.emit(TimerEvent::DurationsChanged {
                durations: self.session.durations(),
            });
        }
        outcome
    }

    /// Publishes the current state regardless of throttling.
    pub fn sync_now(&mut self) -> Option<PublishOutcome> {
        self.publish(true)
    }

    /// Retries a snapshot kept after a failed hand-off.
    pub fn retry_pending_snapshot(&mut self) -> Option<PublishOutcome> {
        let transport = self.transport.as_mut()?;
        Some(self.sync.retry_pending(transport.as_mut()))
    }

    // ── Internals ────────────────────────────────────────────────────

    fn start_inner(&mut self) -> bool {
        if self.session.is_running() {
            return false;
        }

        if self.cycle.cycle_complete() {
            self.cycle.reset_cycle(&mut self.session);
            self.emit(TimerEvent::CycleReset);
            self.emit_session_changed();
        }

        let now = self.clock.now();
        if self.session.remaining_seconds() == 0 {
            self.complete_session(now);
            if self.session.is_running() {
                return true;
            }
            if self.cycle.cycle_complete() {
                return false;
            }
        }

        self.begin(now);
        true
    }

    fn skip_inner(&mut self) {
        self.stop_ticking();
        self.cycle.skip(&mut self.session);
        self.emit_session_changed();
    }

    fn begin(&mut self, now: f64) {
        self.session.start(now);
        self.start_ticking();
        self.emit(TimerEvent::Started {
            session: self.session.current_session(),
            remaining_seconds: self.session.remaining_seconds(),
        });
    }

    /// Credits the finished session and moves to the next one.
    fn complete_session(&mut self, now: f64) {
        self.stop_ticking();

        let finished = self.session.current_session();
        self.sessions_completed += 1;
        self.last_completed_session = Some(finished);
        self.emit(TimerEvent::SessionCompleted {
            session: finished,
            sessions_completed: self.sessions_completed,
        });
        tracing::info!(session = %finished, "セッションが完了しました");

        if self.cycle.advance(&mut self.session, true) {
            self.emit(TimerEvent::CycleCompleted {
                completed_focus_sessions: self.cycle.completed_focus_sessions(),
            });
            return;
        }

        self.emit_session_changed();
        if self.options.auto_advance {
            self.begin(now);
        }
    }

    fn publish(&mut self, force: bool) -> Option<PublishOutcome> {
        let transport = self.transport.as_mut()?;
        let candidate = SyncSnapshot::capture(&self.session, &self.cycle, self.clock.now());
        Some(self.sync.publish(candidate, force, transport.as_mut()))
    }

    fn start_ticking(&mut self) {
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.schedule();
        }
    }

    fn stop_ticking(&mut self) {
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.cancel();
        }
    }

    fn emit_session_changed(&self) {
        self.emit(TimerEvent::SessionChanged {
            session: self.session.current_session(),
            remaining_seconds: self.session.remaining_seconds(),
        });
    }

    fn emit(&self, event: TimerEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::trace!("no event receiver");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
