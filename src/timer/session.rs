//! Session clock: the countdown of the current session.
//!
//! Remaining time is never decremented per tick. While running, the clock
//! stores the wall-clock instant at which the session reaches zero and
//! derives the remaining seconds from it on every [`SessionClock::resync`].

use crate::types::{DurationConfig, SessionKind};

/// Result of a [`SessionClock::configure`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    /// The sanitized durations equal the current ones
    Unchanged,
    /// The durations were applied
    Applied {
        /// The running session has no time left after rebasing
        reached_zero: bool,
    },
}

/// Countdown state of the current session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionClock {
    durations: DurationConfig,
    current_session: SessionKind,
    remaining_seconds: u32,
    /// Instant at which the running session reaches zero. Present only while running.
    end_anchor: Option<f64>,
}

impl SessionClock {
    /// Creates a paused clock at the start of a focus session.
    pub fn new(durations: DurationConfig) -> Self {
        let durations = durations.sanitize();
        Self {
            durations,
            current_session: SessionKind::Focus,
            remaining_seconds: durations.duration_seconds(SessionKind::Focus),
            end_anchor: None,
        }
    }

    pub fn durations(&self) -> DurationConfig {
        self.durations
    }

    pub fn current_session(&self) -> SessionKind {
        self.current_session
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn is_running(&self) -> bool {
        self.end_anchor.is_some()
    }

    pub fn end_anchor(&self) -> Option<f64> {
        self.end_anchor
    }

    /// Full duration of the current session in seconds.
    pub fn current_duration(&self) -> u32 {
        self.durations.duration_seconds(self.current_session)
    }

    /// Applies new durations while preserving the time already elapsed in
    /// the current session.
    pub fn configure(&mut self, durations: DurationConfig, now: f64) -> ConfigureOutcome {
        let durations = durations.sanitize();
        if durations == self.durations {
            return ConfigureOutcome::Unchanged;
        }

        if self.is_running() {
            self.resync(now);
        }

        let elapsed = self.current_duration().saturating_sub(self.remaining_seconds);
        self.durations = durations;
        self.remaining_seconds = self.current_duration().saturating_sub(elapsed);

        let running = self.is_running();
        if running {
            self.end_anchor = Some(now + f64::from(self.remaining_seconds));
        }

        tracing::debug!(
            session = %self.current_session,
            elapsed,
            remaining = self.remaining_seconds,
            "durations changed"
        );

        ConfigureOutcome::Applied {
            reached_zero: running && self.remaining_seconds == 0,
        }
    }

    /// Anchors the countdown at `now`. Returns false if already running.
    pub fn start(&mut self, now: f64) -> bool {
        if self.is_running() {
            return false;
        }
        self.end_anchor = Some(now + f64::from(self.remaining_seconds));
        true
    }

    /// Freezes the countdown. Returns false if not running.
    pub fn pause(&mut self, now: f64) -> bool {
        if !self.is_running() {
            return false;
        }
        self.resync(now);
        self.end_anchor = None;
        true
    }

    /// Recomputes the remaining time from the anchor and returns it.
    ///
    /// Safe to call after any gap, including one longer than the session.
    pub fn resync(&mut self, now: f64) -> u32 {
        if let Some(anchor) = self.end_anchor {
            self.remaining_seconds = whole_seconds(anchor - now, self.current_duration());
        }
        self.remaining_seconds
    }

    /// Stops the clock and loads the full duration of `kind`.
    pub fn select_session(&mut self, kind: SessionKind) {
        self.end_anchor = None;
        self.current_session = kind;
        self.remaining_seconds = self.current_duration();
    }

    /// Stops the clock and rewinds the current session to its full duration.
    pub fn reset_current_session(&mut self) {
        self.select_session(self.current_session);
    }

    /// Stops the clock at zero without changing the session.
    pub fn expire(&mut self) {
        self.end_anchor = None;
        self.remaining_seconds = 0;
    }

    /// Adopts a state received from the peer instance.
    ///
    /// `remaining` is the latency-compensated remaining time. When `running`
    /// the countdown is re-anchored against `now`.
    pub fn adopt(
        &mut self,
        kind: SessionKind,
        remaining: f64,
        running: bool,
        now: f64,
    ) {
        self.current_session = kind;
        let full = self.current_duration();
        self.remaining_seconds = whole_seconds(remaining, full);
        self.end_anchor = if running && self.remaining_seconds > 0 {
            Some(now + remaining.min(f64::from(full)))
        } else {
            None
        };
    }

    /// Replaces the durations without rebasing the remaining time.
    pub(crate) fn set_durations(&mut self, durations: DurationConfig) {
        self.durations = durations.sanitize();
        self.remaining_seconds = self.remaining_seconds.min(self.current_duration());
    }
}

/// Rounds a fractional second count up and clamps it into `[0, max]`.
fn whole_seconds(seconds: f64, max: u32) -> u32 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    let rounded = seconds.ceil();
    if rounded >= f64::from(max) {
        max
    } else {
        rounded as u32
    }
}
