//! IPC Server for the cycle timer.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Request/response handling for timer commands and peer snapshots
//! - Integration with TimerEngine for command execution

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};

use crate::sync::PublishOutcome;
use crate::timer::TimerEngine;
use crate::types::{ConfigureParams, IpcRequest, IpcResponse, ResponseData, SessionKind};

// ============================================================================
// Constants
// ============================================================================

/// Maximum request size in bytes (4KB)
const MAX_REQUEST_SIZE: usize = 4096;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

/// Read timeout for peer daemons, which write their snapshot right after connecting
pub const PEER_READ_TIMEOUT: Duration = Duration::from_millis(500);

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// If the socket file already exists, it will be removed before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Applies a read timeout to prevent blocking indefinitely.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest> {
        Self::receive_request_within(stream, Duration::from_secs(READ_TIMEOUT_SECS)).await
    }

    /// Like [`Self::receive_request`], with a caller-chosen read timeout.
    pub async fn receive_request_within(
        stream: &mut UnixStream,
        read_timeout: Duration,
    ) -> Result<IpcRequest> {
        let mut buffer = vec![0u8; MAX_REQUEST_SIZE + 1];

        let read_result = timeout(read_timeout, stream.read(&mut buffer)).await;

        let n = match read_result {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(IpcError::ReadError(e.to_string()).into()),
            Err(_) => return Err(IpcError::Timeout.into()),
        };

        if n == 0 {
            anyhow::bail!("Connection closed by client");
        }
        if n > MAX_REQUEST_SIZE {
            return Err(IpcError::RequestTooLarge.into());
        }

        let request: IpcRequest = serde_json::from_slice(&buffer[..n])
            .with_context(|| "Failed to deserialize IPC request")?;

        Ok(request)
    }

    /// Serializes and sends an IPC response to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response(stream: &mut UnixStream, response: &IpcResponse) -> Result<()> {
        let json = serde_json::to_vec(response).context("Failed to serialize IPC response")?;

        stream
            .write_all(&json)
            .await
            .context("Failed to write response")?;
        stream.flush().await.context("Failed to flush response")?;

        Ok(())
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to TimerEngine.
#[derive(Clone)]
pub struct RequestHandler {
    /// Shared reference to the timer engine
    engine: Arc<Mutex<TimerEngine>>,
}

impl RequestHandler {
    /// Creates a new request handler with the given timer engine.
    pub fn new(engine: Arc<Mutex<TimerEngine>>) -> Self {
        Self { engine }
    }

    /// Handles an IPC request and returns the appropriate response.
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        tracing::debug!(command = request.name(), "handling request");
        match request {
            IpcRequest::Start => self.handle_start().await,
            IpcRequest::Pause => self.handle_pause().await,
            IpcRequest::ResetSession => self.handle_reset_session().await,
            IpcRequest::ResetCycle => self.handle_reset_cycle().await,
            IpcRequest::Skip => self.handle_skip(false).await,
            IpcRequest::SkipAndStart => self.handle_skip(true).await,
            IpcRequest::Select { session } => self.handle_select(session).await,
            IpcRequest::Configure { params } => self.handle_configure(params).await,
            IpcRequest::Resync => self.handle_resync().await,
            IpcRequest::Sync => self.handle_sync().await,
            IpcRequest::Status => self.handle_status().await,
            IpcRequest::Snapshot { payload } => self.handle_snapshot(payload).await,
        }
    }

    async fn handle_start(&self) -> IpcResponse {
        let mut engine = self.engine.lock().await;
        if engine.is_running() {
            return IpcResponse::error("タイマーは既に実行中です");
        }
        if engine.start() {
            return success("タイマーを開始しました", &engine);
        }
        if engine.view().cycle_complete {
            // The session was already at zero and its completion closed the cycle.
            return success("サイクルが完了しました", &engine);
        }
        IpcResponse::error("タイマーを開始できませんでした")
    }

    async fn handle_pause(&self) -> IpcResponse {
        let mut engine = self.engine.lock().await;
        if !engine.pause() {
            return IpcResponse::error("タイマーは実行されていません");
        }
        success("タイマーを一時停止しました", &engine)
    }

    async fn handle_reset_session(&self) -> IpcResponse {
        let mut engine = self.engine.lock().await;
        engine.reset_session();
        success("セッションをリセットしました", &engine)
    }

    async fn handle_reset_cycle(&self) -> IpcResponse {
        let mut engine = self.engine.lock().await;
        engine.reset_cycle();
        success("サイクルをリセットしました", &engine)
    }

    async fn handle_skip(&self, start_next: bool) -> IpcResponse {
        let mut engine = self.engine.lock().await;
        if start_next {
            engine.skip_and_start_next();
            success("次のセッションを開始しました", &engine)
        } else {
            engine.skip();
            success("次のセッションへスキップしました", &engine)
        }
    }

    async fn handle_select(&self, session: SessionKind) -> IpcResponse {
        let mut engine = self.engine.lock().await;
        engine.select_session(session);
        success(format!("{} に切り替えました", session_label(session)), &engine)
    }

    async fn handle_configure(&self, params: ConfigureParams) -> IpcResponse {
        if params.is_empty() {
            return IpcResponse::error("変更する時間が指定されていません");
        }

        let mut engine = self.engine.lock().await;
        let durations = params.merge_into(engine.view().durations);
        if engine.configure(durations) {
            success("時間設定を更新しました", &engine)
        } else {
            success("時間設定に変更はありません", &engine)
        }
    }

    async fn handle_resync(&self) -> IpcResponse {
        let mut engine = self.engine.lock().await;
        engine.resync();
        success("残り時間を再計算しました", &engine)
    }

    async fn handle_sync(&self) -> IpcResponse {
        let mut engine = self.engine.lock().await;
        match engine.sync_now() {
            Some(PublishOutcome::Sent) => success("状態を同期しました", &engine),
            Some(_) => IpcResponse::error("状態の同期に失敗しました。再送を待機しています"),
            None => IpcResponse::error("同期先が設定されていません"),
        }
    }

    async fn handle_status(&self) -> IpcResponse {
        let mut engine = self.engine.lock().await;
        engine.resync();
        success("", &engine)
    }

    async fn handle_snapshot(&self, payload: serde_json::Value) -> IpcResponse {
        let mut engine = self.engine.lock().await;
        match engine.apply_snapshot(&payload) {
            Ok(outcome) => match outcome.rejected {
                None => success("スナップショットを適用しました", &engine),
                Some(e) => success(
                    format!("時間設定のみ適用しました ({})", e),
                    &engine,
                ),
            },
            Err(e) => IpcResponse::error(format!("スナップショットが不正です: {}", e)),
        }
    }
}

fn success(message: impl Into<String>, engine: &TimerEngine) -> IpcResponse {
    IpcResponse::success(message, Some(ResponseData::from_view(&engine.view())))
}

fn session_label(session: SessionKind) -> &'static str {
    match session {
        SessionKind::Focus => "集中",
        SessionKind::ShortBreak => "短い休憩",
        SessionKind::LongBreak => "長い休憩",
    }
}

// ============================================================================
// Tests
// ============================================================================
