//! Cycle tracker: decides which session follows a finished one.
//!
//! A cycle is four focus sessions separated by three short breaks and
//! closed by one long break. Crediting a focus session and advancing to the
//! next session are separate concerns so that skipping and natural
//! completion share the same transition.

use crate::types::SessionKind;

use super::session::SessionClock;

/// Number of credited focus sessions that earn a long break.
pub const SESSIONS_PER_CYCLE: u32 = 4;

/// Progress through the current cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleTracker {
    completed_focus_sessions: u32,
    cycle_complete: bool,
}

impl CycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed_focus_sessions(&self) -> u32 {
        self.completed_focus_sessions
    }

    pub fn cycle_complete(&self) -> bool {
        self.cycle_complete
    }

    /// True when the credited count closes a cycle.
    fn earned_long_break(&self) -> bool {
        self.completed_focus_sessions > 0 && self.completed_focus_sessions % SESSIONS_PER_CYCLE == 0
    }

    /// Moves `clock` to the session following the current one.
    ///
    /// Returns true if this closed the cycle, in which case the clock is
    /// left at zero on the long break instead of moving to a new focus
    /// session.
    pub fn advance(&mut self, clock: &mut SessionClock, credit_focus: bool) -> bool {
        let finished = clock.current_session();

        if finished == SessionKind::Focus {
            if credit_focus {
                self.completed_focus_sessions = self.completed_focus_sessions.saturating_add(1);
            }
            let next = if self.earned_long_break() {
                SessionKind::LongBreak
            } else {
                SessionKind::ShortBreak
            };
            clock.select_session(next);
            tracing::debug!(
                from = %finished,
                to = %next,
                credited = credit_focus,
                completed = self.completed_focus_sessions,
                "advanced"
            );
            return false;
        }

        if credit_focus && finished == SessionKind::LongBreak && self.earned_long_break() {
            clock.expire();
            self.cycle_complete = true;
            tracing::debug!(completed = self.completed_focus_sessions, "cycle complete");
            return true;
        }

        clock.select_session(SessionKind::Focus);
        tracing::debug!(from = %finished, to = "focus", credited = credit_focus, "advanced");
        false
    }

    /// Advances without crediting progress.
    pub fn skip(&mut self, clock: &mut SessionClock) {
        self.cycle_complete = false;
        self.advance(clock, false);
    }

    /// Starts over from the first focus session of a new cycle.
    pub fn reset_cycle(&mut self, clock: &mut SessionClock) {
        self.completed_focus_sessions = 0;
        self.cycle_complete = false;
        clock.select_session(SessionKind::Focus);
    }

    pub fn clear_cycle_complete(&mut self) {
        self.cycle_complete = false;
    }

    /// Overwrites the progress with values received from the peer instance.
    pub(crate) fn adopt(&mut self, completed_focus_sessions: u32, cycle_complete: bool) {
        self.completed_focus_sessions = completed_focus_sessions;
        self.cycle_complete = cycle_complete;
    }
}
