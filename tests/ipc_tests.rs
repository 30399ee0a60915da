//! Integration tests for Daemon-CLI IPC communication.
//!
//! These tests verify communication between the CLI client and the daemon
//! IPC server over a real Unix socket:
//! - TC-I-001: Start via IPC
//! - TC-I-002: Pause via IPC
//! - TC-I-003: Configure and select via IPC
//! - TC-I-004: Connection error handling
//! - TC-I-005: Error responses are surfaced to the client

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Duration};

use pomosync::cli::client::IpcClient;
use pomosync::daemon::ipc::{IpcServer, RequestHandler};
use pomosync::timer::{EngineOptions, TimerEngine, TimerEvent};
use pomosync::types::{ConfigureParams, SessionKind};

// ============================================================================
// Test Helpers
// ============================================================================

/// Creates a temporary socket path for testing.
fn create_temp_socket_path() -> PathBuf {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("integration_test.sock");
    // Keep the directory so it's not deleted
    std::mem::forget(dir);
    path
}

/// Creates a TimerEngine with event channel.
fn create_engine() -> (Arc<Mutex<TimerEngine>>, mpsc::UnboundedReceiver<TimerEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let engine = TimerEngine::new(EngineOptions::default(), tx);
    (Arc::new(Mutex::new(engine)), rx)
}

/// Runs multiple request-response cycles on the server.
async fn handle_requests(server: &IpcServer, handler: &RequestHandler, count: usize) {
    for _ in 0..count {
        if let Ok(mut stream) = server.accept().await {
            if let Ok(request) = IpcServer::receive_request(&mut stream).await {
                let response = handler.handle(request).await;
                let _ = IpcServer::send_response(&mut stream, &response).await;
            }
        }
    }
}

/// Spawns a server answering `count` requests.
fn spawn_server(
    socket_path: &PathBuf,
    engine: Arc<Mutex<TimerEngine>>,
    count: usize,
) -> tokio::task::JoinHandle<()> {
    let server = IpcServer::new(socket_path).unwrap();
    let handler = RequestHandler::new(engine);
    tokio::spawn(async move {
        handle_requests(&server, &handler, count).await;
    })
}

// ============================================================================
// TC-I-001: Start via IPC
// ============================================================================

/// TC-I-001: タイマー開始（IPC経由）
#[tokio::test]
async fn tc_i_001_start_via_ipc() {
    let socket_path = create_temp_socket_path();
    let (engine, mut rx) = create_engine();
    let server_handle = spawn_server(&socket_path, engine.clone(), 1);

    let client = IpcClient::with_socket_path(socket_path);
    let response = timeout(Duration::from_secs(5), client.start())
        .await
        .expect("timeout")
        .expect("start failed");

    assert!(response.is_success());
    assert_eq!(response.message, "タイマーを開始しました");
    let data = response.data.unwrap();
    assert!(data.is_running);
    assert_eq!(data.current_session, SessionKind::Focus);

    assert!(engine.lock().await.is_running());
    assert!(matches!(rx.try_recv(), Ok(TimerEvent::Started { .. })));

    server_handle.await.unwrap();
}

// ============================================================================
// TC-I-002: Pause via IPC
// ============================================================================

/// TC-I-002: 一時停止（IPC経由）
#[tokio::test]
async fn tc_i_002_pause_via_ipc() {
    let socket_path = create_temp_socket_path();
    let (engine, _rx) = create_engine();
    let server_handle = spawn_server(&socket_path, engine.clone(), 3);

    let client = IpcClient::with_socket_path(socket_path);
    client.start().await.unwrap();
    let response = client.pause().await.unwrap();

    assert_eq!(response.message, "タイマーを一時停止しました");
    let data = response.data.unwrap();
    assert!(!data.is_running);

    let status = client.status().await.unwrap();
    let status_data = status.data.unwrap();
    assert!(!status_data.is_running);
    assert_eq!(status_data.remaining_seconds, data.remaining_seconds);

    server_handle.await.unwrap();
}

// ============================================================================
// TC-I-003: Configure and Select via IPC
// ============================================================================

/// TC-I-003: 時間設定とセッション切り替え（IPC経由）
#[tokio::test]
async fn tc_i_003_configure_and_select_via_ipc() {
    let socket_path = create_temp_socket_path();
    let (engine, _rx) = create_engine();
    let server_handle = spawn_server(&socket_path, engine.clone(), 3);

    let client = IpcClient::with_socket_path(socket_path);

    let response = client
        .configure(ConfigureParams {
            short_break_minutes: Some(10),
            ..Default::default()
        })
        .await
        .unwrap();
    let data = response.data.unwrap();
    assert_eq!(data.durations.focus_minutes, 25);
    assert_eq!(data.durations.short_break_minutes, 10);

    let response = client.select(SessionKind::ShortBreak).await.unwrap();
    let data = response.data.unwrap();
    assert_eq!(data.current_session, SessionKind::ShortBreak);
    assert_eq!(data.remaining_label, "10:00");

    let response = client.skip(true).await.unwrap();
    let data = response.data.unwrap();
    assert_eq!(data.current_session, SessionKind::Focus);
    assert!(data.is_running);

    server_handle.await.unwrap();
}

// ============================================================================
// TC-I-004: Connection Error Handling
// ============================================================================

/// TC-I-004: Daemon未起動時の接続エラー
#[tokio::test]
async fn tc_i_004_connection_error() {
    let socket_path = create_temp_socket_path();
    let client = IpcClient::with_socket_path(socket_path);

    let result = timeout(Duration::from_secs(10), client.status())
        .await
        .expect("retries should finish in time");

    let error = result.unwrap_err();
    assert!(
        format!("{:#}", error).contains("Daemonに接続できません"),
        "unexpected error: {:#}",
        error
    );
}

// ============================================================================
// TC-I-005: Error Responses
// ============================================================================

/// TC-I-005: エラーレスポンスはクライアントのエラーになる
#[tokio::test]
async fn tc_i_005_error_response_is_error() {
    let socket_path = create_temp_socket_path();
    let (engine, _rx) = create_engine();
    // One request for pause, retried up to three times.
    let server_handle = spawn_server(&socket_path, engine, 3);

    let client = IpcClient::with_socket_path(socket_path);
    let result = client.pause().await;

    let error = result.unwrap_err();
    assert!(error.to_string().contains("実行されていません"));

    server_handle.await.unwrap();
}
