//! pomosync Library
//!
//! Core of a focus/break cycle timer that runs as a primary instance and a
//! mirrored companion. It includes:
//! - Drift-free session countdown anchored to wall-clock time
//! - Four-session cycle tracking with short and long breaks
//! - Throttled state snapshots and lenient snapshot application
//! - IPC server/client for daemon-CLI and daemon-daemon communication
//! - CLI command parsing and display utilities

pub mod cli;
pub mod daemon;
pub mod sync;
pub mod timer;
pub mod types;

// Re-export commonly used types for convenience
pub use sync::{
    ApplyOutcome, IncomingSnapshot, MockTransport, PublishOutcome, SnapshotError,
    SnapshotTransport, StateSynchronizer, SyncSnapshot, TransportError,
};
pub use timer::clock::{Clock, ManualClock, SystemClock};
pub use timer::cycle::{CycleTracker, SESSIONS_PER_CYCLE};
pub use timer::session::SessionClock;
pub use timer::ticker::{MockTicker, TickScheduler, TokioTicker};
pub use timer::{EngineOptions, Role, TimerEngine, TimerEvent, TimerView};
pub use types::{
    ConfigureParams, DurationConfig, DurationLimits, IpcRequest, IpcResponse, ResponseData,
    SessionKind,
};
