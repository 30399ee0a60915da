//! Core data types for the cycle timer.
//!
//! This module defines the data structures used for:
//! - Session kinds and their wire tags
//! - Duration configuration with sanitization
//! - IPC request/response serialization

use serde::{Deserialize, Serialize};

use crate::timer::TimerView;

// ============================================================================
// SessionKind
// ============================================================================

/// The kind of interval the timer is counting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionKind {
    /// Focused work
    Focus,
    /// Short break between focus sessions
    ShortBreak,
    /// Long break closing a cycle of four focus sessions
    LongBreak,
}

impl SessionKind {
    /// Returns the wire tag of the session kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Focus => "focus",
            SessionKind::ShortBreak => "shortBreak",
            SessionKind::LongBreak => "longBreak",
        }
    }

    /// Parses a wire tag. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "focus" => Some(SessionKind::Focus),
            "shortBreak" => Some(SessionKind::ShortBreak),
            "longBreak" => Some(SessionKind::LongBreak),
            _ => None,
        }
    }

    /// Returns true for both break kinds.
    pub fn is_break(&self) -> bool {
        !matches!(self, SessionKind::Focus)
    }
}

impl Default for SessionKind {
    fn default() -> Self {
        SessionKind::Focus
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// DurationConfig
// ============================================================================

/// Session durations in whole minutes.
///
/// Every field is at least 1 once constructed through [`DurationConfig::sanitized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationConfig {
    /// Focus duration in minutes
    pub focus_minutes: u32,
    /// Short break duration in minutes
    pub short_break_minutes: u32,
    /// Long break duration in minutes
    pub long_break_minutes: u32,
}

impl Default for DurationConfig {
    fn default() -> Self {
        Self {
            focus_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
        }
    }
}

impl DurationConfig {
    /// Builds a configuration from raw input, clamping each field to `1..=u32::MAX`.
    pub fn sanitized(focus: i64, short_break: i64, long_break: i64) -> Self {
        Self {
            focus_minutes: clamp_minutes(focus),
            short_break_minutes: clamp_minutes(short_break),
            long_break_minutes: clamp_minutes(long_break),
        }
    }

    /// Returns a copy with every field clamped to at least 1.
    pub fn sanitize(self) -> Self {
        Self {
            focus_minutes: self.focus_minutes.max(1),
            short_break_minutes: self.short_break_minutes.max(1),
            long_break_minutes: self.long_break_minutes.max(1),
        }
    }

    /// Clamps every field into the given advisory limits.
    pub fn within(self, limits: &DurationLimits) -> Self {
        let s = self.sanitize();
        Self {
            focus_minutes: s.focus_minutes.min(limits.max_focus_minutes.max(1)),
            short_break_minutes: s
                .short_break_minutes
                .min(limits.max_short_break_minutes.max(1)),
            long_break_minutes: s
                .long_break_minutes
                .min(limits.max_long_break_minutes.max(1)),
        }
    }

    /// Returns the configured minutes for a session kind.
    pub fn minutes(&self, kind: SessionKind) -> u32 {
        match kind {
            SessionKind::Focus => self.focus_minutes,
            SessionKind::ShortBreak => self.short_break_minutes,
            SessionKind::LongBreak => self.long_break_minutes,
        }
    }

    /// Returns the configured duration of a session kind in seconds.
    pub fn duration_seconds(&self, kind: SessionKind) -> u32 {
        self.minutes(kind).saturating_mul(60)
    }
}

fn clamp_minutes(value: i64) -> u32 {
    value.clamp(1, i64::from(u32::MAX)) as u32
}

/// Upper bounds offered by the user interface.
///
/// The timer core never enforces these; the CLI applies them to user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationLimits {
    pub max_focus_minutes: u32,
    pub max_short_break_minutes: u32,
    pub max_long_break_minutes: u32,
}

impl Default for DurationLimits {
    fn default() -> Self {
        Self {
            max_focus_minutes: 120,
            max_short_break_minutes: 60,
            max_long_break_minutes: 60,
        }
    }
}

// ============================================================================
// IPC Types
// ============================================================================

/// Parameters for the configure command.
///
/// Missing fields keep the current value. Values are raw so that the
/// daemon, not the transport, decides how to sanitize them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigureParams {
    #[serde(rename = "focusMinutes", skip_serializing_if = "Option::is_none")]
    pub focus_minutes: Option<i64>,
    #[serde(rename = "shortBreakMinutes", skip_serializing_if = "Option::is_none")]
    pub short_break_minutes: Option<i64>,
    #[serde(rename = "longBreakMinutes", skip_serializing_if = "Option::is_none")]
    pub long_break_minutes: Option<i64>,
}

impl ConfigureParams {
    /// Merges the parameters over the current durations.
    pub fn merge_into(&self, current: DurationConfig) -> DurationConfig {
        DurationConfig::sanitized(
            self.focus_minutes
                .unwrap_or_else(|| i64::from(current.focus_minutes)),
            self.short_break_minutes
                .unwrap_or_else(|| i64::from(current.short_break_minutes)),
            self.long_break_minutes
                .unwrap_or_else(|| i64::from(current.long_break_minutes)),
        )
    }

    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.focus_minutes.is_none()
            && self.short_break_minutes.is_none()
            && self.long_break_minutes.is_none()
    }
}

/// IPC request from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum IpcRequest {
    /// Start or resume the current session
    Start,
    /// Pause the running session
    Pause,
    /// Reset the current session to its full duration
    ResetSession,
    /// Reset the whole cycle back to the first focus session
    ResetCycle,
    /// Skip to the next session without crediting progress
    Skip,
    /// Skip and immediately start the next session
    SkipAndStart,
    /// Switch to a specific session kind
    Select {
        /// Session to switch to
        session: SessionKind,
    },
    /// Change session durations
    Configure {
        /// New durations
        #[serde(flatten)]
        params: ConfigureParams,
    },
    /// Recompute remaining time after a suspension
    Resync,
    /// Publish the current state to the mirror regardless of throttling
    Sync,
    /// Query the current status
    Status,
    /// Incoming snapshot from the peer instance
    Snapshot {
        /// Raw snapshot payload, parsed leniently by the receiver
        payload: serde_json::Value,
    },
}

impl IpcRequest {
    /// Returns the command tag, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            IpcRequest::Start => "start",
            IpcRequest::Pause => "pause",
            IpcRequest::ResetSession => "resetSession",
            IpcRequest::ResetCycle => "resetCycle",
            IpcRequest::Skip => "skip",
            IpcRequest::SkipAndStart => "skipAndStart",
            IpcRequest::Select { .. } => "select",
            IpcRequest::Configure { .. } => "configure",
            IpcRequest::Resync => "resync",
            IpcRequest::Sync => "sync",
            IpcRequest::Status => "status",
            IpcRequest::Snapshot { .. } => "snapshot",
        }
    }
}

/// Response data for IPC responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    /// Instance role ("primary" or "mirror")
    pub role: String,
    /// Current session tag
    pub current_session: SessionKind,
    /// Remaining seconds in the current session
    pub remaining_seconds: u32,
    /// Remaining time formatted as mm:ss
    pub remaining_label: String,
    /// Whether the countdown is running
    pub is_running: bool,
    /// Credited focus sessions in the current cycle
    pub completed_focus_sessions: u32,
    /// Whether the four-session cycle has finished
    pub cycle_complete: bool,
    /// Monotonic count of naturally completed sessions
    pub sessions_completed: u64,
    /// Kind of the most recently completed session
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_completed_session: Option<SessionKind>,
    /// Configured durations
    pub durations: DurationConfig,
}

impl ResponseData {
    /// Creates response data from the engine view.
    pub fn from_view(view: &TimerView) -> Self {
        Self {
            role: view.role.as_str().to_string(),
            current_session: view.current_session,
            remaining_seconds: view.remaining_seconds,
            remaining_label: view.remaining_label(),
            is_running: view.is_running,
            completed_focus_sessions: view.completed_focus_sessions,
            cycle_complete: view.cycle_complete,
            sessions_completed: view.sessions_completed,
            last_completed_session: view.last_completed_session,
            durations: view.durations,
        }
    }
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }

    /// Returns true for a success response.
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

// ============================================================================
// Tests
// ============================================================================
