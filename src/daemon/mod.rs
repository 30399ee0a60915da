//! Daemon module for pomosync.
//!
//! This module runs one timer instance:
//! - `ipc`: Unix socket server and request dispatch
//! - the event loop that serializes local commands, peer snapshots and
//!   tick prompts onto the engine

pub mod ipc;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;

use crate::cli::client::IpcClient;
use crate::cli::commands::DaemonArgs;
use crate::sync::forward::SNAPSHOT_CHANNEL_CAPACITY;
use crate::sync::{channel_transport, forward_snapshots};
use crate::timer::{EngineOptions, Role, TimerEngine, TimerEvent, TokioTicker};
use crate::types::{IpcRequest, IpcResponse};

pub use ipc::{IpcError, IpcServer, RequestHandler, PEER_READ_TIMEOUT};

// ============================================================================
// Constants
// ============================================================================

/// Directory under `$HOME` holding the sockets
const SOCKET_DIR: &str = ".pomosync";

/// How often a snapshot kept after a failed hand-off is retried
const PENDING_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Returns the default command socket of `role`.
pub fn default_socket_path(role: Role) -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME環境変数が設定されていません")?;
    Ok(PathBuf::from(home)
        .join(SOCKET_DIR)
        .join(format!("{}.sock", role.as_str())))
}

// ============================================================================
// DaemonConfig
// ============================================================================

/// Runtime configuration of one daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Socket for local commands
    pub socket_path: PathBuf,
    /// Socket the mirror receives snapshots on
    pub peer_socket_path: Option<PathBuf>,
    /// Mirror socket the primary publishes to
    pub mirror_socket_path: Option<PathBuf>,
    pub options: EngineOptions,
}

impl DaemonConfig {
    /// Builds the configuration from command-line arguments.
    ///
    /// `socket` overrides the default command socket of the role.
    pub fn from_args(args: &DaemonArgs, socket: Option<PathBuf>) -> Result<Self> {
        let role = Role::from(args.role);
        match role {
            Role::Primary if args.peer_socket.is_some() => {
                anyhow::bail!("--peer-socket はミラーでのみ指定できます")
            }
            Role::Mirror if args.mirror_socket.is_some() => {
                anyhow::bail!("--mirror-socket はプライマリでのみ指定できます")
            }
            _ => {}
        }

        let socket_path = match socket {
            Some(path) => path,
            None => default_socket_path(role)?,
        };

        Ok(Self {
            socket_path,
            peer_socket_path: args.peer_socket.clone(),
            mirror_socket_path: args.mirror_socket.clone(),
            options: EngineOptions::default()
                .with_role(role)
                .with_durations(args.durations())
                .with_auto_advance(args.auto_advance)
                .with_throttle_interval(Duration::from_secs(args.throttle_secs)),
        })
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Runs the daemon until interrupted.
///
/// Local commands are served before peer snapshots, and both before tick
/// prompts. Each request is handled to completion before the next one.
pub async fn run(config: DaemonConfig) -> Result<()> {
    let role = config.options.role;
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();

    let mut engine =
        TimerEngine::new(config.options.clone(), event_tx).with_ticker(TokioTicker::new(tick_tx));

    let forwarder = match &config.mirror_socket_path {
        Some(mirror_socket) => {
            let (transport, snapshot_rx) = channel_transport(SNAPSHOT_CHANNEL_CAPACITY);
            engine = engine.with_transport(transport);
            let client = IpcClient::with_socket_path(mirror_socket.clone());
            Some(tokio::spawn(forward_snapshots(snapshot_rx, client)))
        }
        None => None,
    };

    let engine = Arc::new(Mutex::new(engine));
    let handler = RequestHandler::new(engine.clone());

    let server = IpcServer::new(&config.socket_path)?;
    let peer_server = config
        .peer_socket_path
        .as_deref()
        .map(IpcServer::new)
        .transpose()?;

    let events = tokio::spawn(log_events(event_rx));

    // Bring a mirror that is already running in step.
    engine.lock().await.sync_now();

    let mut retry = tokio::time::interval(PENDING_RETRY_INTERVAL);
    retry.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    tracing::info!(
        role = role.as_str(),
        socket = %config.socket_path.display(),
        "Daemonを起動しました"
    );

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            accepted = server.accept() => match accepted {
                Ok(stream) => serve_command(stream, &handler).await,
                Err(e) => tracing::warn!("接続の受け付けに失敗しました: {:#}", e),
            },

            accepted = accept_optional(peer_server.as_ref()) => match accepted {
                Ok(stream) => serve_peer(stream, &handler).await,
                Err(e) => tracing::warn!("ピア接続の受け付けに失敗しました: {:#}", e),
            },

            Some(()) = tick_rx.recv() => engine.lock().await.tick(),

            _ = retry.tick() => {
                let mut engine = engine.lock().await;
                if engine.synchronizer().pending().is_some() {
                    engine.retry_pending_snapshot();
                }
            }
        }
    }

    tracing::info!(role = role.as_str(), "Daemonを停止します");
    if let Some(forwarder) = forwarder {
        forwarder.abort();
    }
    events.abort();
    Ok(())
}

async fn accept_optional(server: Option<&IpcServer>) -> Result<UnixStream> {
    match server {
        Some(server) => server.accept().await,
        None => std::future::pending().await,
    }
}

async fn serve_command(mut stream: UnixStream, handler: &RequestHandler) {
    let response = match IpcServer::receive_request(&mut stream).await {
        Ok(request) => handler.handle(request).await,
        Err(e) => {
            tracing::debug!("不正なリクエスト: {:#}", e);
            IpcResponse::error(format!("不正なリクエストです: {}", e))
        }
    };
    respond(&mut stream, &response).await;
}

/// The peer socket only accepts snapshots.
async fn serve_peer(mut stream: UnixStream, handler: &RequestHandler) {
    let response = match IpcServer::receive_request_within(&mut stream, PEER_READ_TIMEOUT).await {
        Ok(request @ IpcRequest::Snapshot { .. }) => handler.handle(request).await,
        Ok(other) => IpcResponse::error(format!(
            "ピアソケットではスナップショットのみ受け付けます ({})",
            other.name()
        )),
        Err(e) => {
            tracing::warn!("ピアからのリクエストを読み取れませんでした: {:#}", e);
            IpcResponse::error(format!("不正なリクエストです: {}", e))
        }
    };
    respond(&mut stream, &response).await;
}

async fn respond(stream: &mut UnixStream, response: &IpcResponse) {
    if let Err(e) = IpcServer::send_response(stream, response).await {
        tracing::debug!("レスポンスを送信できませんでした: {:#}", e);
    }
}

async fn log_events(mut rx: mpsc::UnboundedReceiver<TimerEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            TimerEvent::Tick { .. } => tracing::trace!(?event, "timer event"),
            TimerEvent::SessionCompleted { .. } | TimerEvent::CycleCompleted { .. } => {
                tracing::info!(?event, "timer event")
            }
            _ => tracing::debug!(?event, "timer event"),
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("SIGTERMを監視できません: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::RoleArg;

    mod config_tests {
        use super::*;

        #[test]
        fn test_from_args_primary() {
            let args = DaemonArgs {
                mirror_socket: Some(PathBuf::from("/tmp/peer.sock")),
                auto_advance: true,
                throttle_secs: 3,
                ..DaemonArgs::default()
            };
            let config = DaemonConfig::from_args(&args, Some(PathBuf::from("/tmp/p.sock"))).unwrap();

            assert_eq!(config.socket_path, PathBuf::from("/tmp/p.sock"));
            assert_eq!(config.mirror_socket_path, Some(PathBuf::from("/tmp/peer.sock")));
            assert!(config.peer_socket_path.is_none());
            assert_eq!(config.options.role, Role::Primary);
            assert!(config.options.auto_advance);
            assert_eq!(config.options.throttle_interval, Duration::from_secs(3));
        }

        #[test]
        fn test_from_args_rejects_peer_socket_on_primary() {
            let args = DaemonArgs {
                peer_socket: Some(PathBuf::from("/tmp/peer.sock")),
                ..DaemonArgs::default()
            };
            assert!(DaemonConfig::from_args(&args, Some(PathBuf::from("/tmp/p.sock"))).is_err());
        }

        #[test]
        fn test_from_args_rejects_mirror_socket_on_mirror() {
            let args = DaemonArgs {
                role: RoleArg::Mirror,
                mirror_socket: Some(PathBuf::from("/tmp/peer.sock")),
                ..DaemonArgs::default()
            };
            assert!(DaemonConfig::from_args(&args, Some(PathBuf::from("/tmp/m.sock"))).is_err());
        }

        #[test]
        fn test_default_socket_path_per_role() {
            let primary = default_socket_path(Role::Primary).unwrap();
            let mirror = default_socket_path(Role::Mirror).unwrap();
            assert!(primary.ends_with(".pomosync/primary.sock"));
            assert!(mirror.ends_with(".pomosync/mirror.sock"));
        }
    }
}
