//! WebSocket transport tests against a server bound to an ephemeral port.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use notice_broadcast_service::config::Settings;
use notice_broadcast_service::server::{create_app, AppState};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serve the app on 127.0.0.1:0 and return its state and address
async fn start_server(settings: Settings) -> (AppState, SocketAddr) {
    let state = AppState::new(settings);
    let app = create_app(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (state, addr)
}

fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{addr}/ws-simple")
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(ws_url(addr))
        .await
        .expect("Failed to connect to WebSocket");
    client
}

async fn connect_with_origin(addr: SocketAddr, origin: &str) -> Result<Client, WsError> {
    let mut request = ws_url(addr).into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_str(origin).unwrap());
    connect_async(request).await.map(|(client, _)| client)
}

fn rejected_status(result: Result<Client, WsError>) -> u16 {
    match result {
        Err(WsError::Http(response)) => response.status().as_u16(),
        Err(other) => panic!("unexpected handshake error: {other}"),
        Ok(_) => panic!("upgrade was accepted"),
    }
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn send_json(client: &mut Client, value: Value) {
    client.send(Message::text(value.to_string())).await.unwrap();
}

async fn handshake(client: &mut Client, user_id: &str, role: &str) {
    send_json(
        client,
        json!({"type": "USER_CONNECT", "payload": {"userId": user_id, "role": role}}),
    )
    .await;
}

/// Next text frame parsed as JSON; control frames are skipped
async fn next_envelope(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// True when no text frame arrives within `window`
async fn stays_quiet(client: &mut Client, window: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        match tokio::time::timeout_at(deadline, client.next()).await {
            Err(_) => return true,
            Ok(Some(Ok(Message::Text(_)))) => return false,
            Ok(Some(Ok(_))) => continue,
            Ok(_) => return true,
        }
    }
}

#[tokio::test]
async fn test_connect_without_origin_and_close_cleans_up() {
    let (state, addr) = start_server(Settings::default()).await;

    let mut client = connect(addr).await;
    wait_until(|| state.registry.len() == 1).await;

    handshake(&mut client, "u1", "user").await;
    wait_until(|| state.directory.len() == 1).await;

    client.close(None).await.unwrap();
    wait_until(|| state.registry.is_empty()).await;
    wait_until(|| state.directory.is_empty()).await;
}

#[tokio::test]
async fn test_origin_checked_against_allowed_list() {
    let (state, addr) = start_server(Settings::default()).await;

    let status = rejected_status(connect_with_origin(addr, "http://evil.example").await);
    assert_eq!(status, 403);
    assert!(state.registry.is_empty());

    let _client = connect_with_origin(addr, "http://localhost:5173")
        .await
        .expect("allowed origin should upgrade");
    wait_until(|| state.registry.len() == 1).await;
}

#[tokio::test]
async fn test_upgrade_refused_while_shutting_down() {
    let (state, addr) = start_server(Settings::default()).await;
    assert!(state.shutdown.trigger());

    let status = rejected_status(connect_async(ws_url(addr)).await.map(|(c, _)| c));
    assert_eq!(status, 503);
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn test_shutdown_sends_close_frame() {
    let (state, addr) = start_server(Settings::default()).await;
    let mut client = connect(addr).await;
    wait_until(|| state.registry.len() == 1).await;

    state.shutdown.trigger();

    let message = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for close")
        .expect("stream ended")
        .expect("websocket error");
    assert!(matches!(message, Message::Close(Some(_))));
    wait_until(|| state.registry.is_empty()).await;
}

#[tokio::test]
async fn test_binary_frame_ignored_and_connection_stays_open() {
    let (state, addr) = start_server(Settings::default()).await;
    let mut client = connect(addr).await;

    client
        .send(Message::binary(vec![0u8, 1, 2, 3]))
        .await
        .unwrap();
    handshake(&mut client, "u1", "user").await;
    wait_until(|| state.directory.len() == 1).await;
    assert_eq!(state.registry.len(), 1);

    let result = state
        .dispatcher
        .broadcast_to_users("NOTICE_UPDATE", &json!({"id": 42}));
    assert_eq!(result.delivered, 1);

    let envelope = next_envelope(&mut client).await;
    assert_eq!(envelope["type"], "NOTICE_UPDATE");
    assert_eq!(envelope["payload"], json!({"id": 42}));
}

#[tokio::test]
async fn test_admin_update_relayed_to_user_socket_only() {
    let (state, addr) = start_server(Settings::default()).await;
    let mut admin = connect(addr).await;
    let mut user = connect(addr).await;

    handshake(&mut admin, "a1", "admin").await;
    handshake(&mut user, "u1", "user").await;
    wait_until(|| state.directory.len() == 2).await;

    send_json(&mut admin, json!({"type": "SOMETHING_ELSE", "payload": 1})).await;
    admin
        .send(Message::text("{broken"))
        .await
        .unwrap();
    send_json(
        &mut admin,
        json!({"type": "ADMIN_NOTICE_UPDATE", "payload": {"id": 42}}),
    )
    .await;

    let envelope = next_envelope(&mut user).await;
    assert_eq!(envelope["type"], "NOTICE_UPDATE");
    assert_eq!(envelope["payload"], json!({"id": 42}));
    assert!(envelope["timestamp"].is_i64());
    assert!(stays_quiet(&mut admin, Duration::from_millis(200)).await);

    admin.close(None).await.unwrap();
    wait_until(|| state.registry.len() == 1 && state.directory.len() == 1).await;
}

#[tokio::test]
async fn test_zero_outbound_buffer_still_delivers() {
    let mut settings = Settings::default();
    settings.websocket.outbound_buffer = 0;
    let (state, addr) = start_server(settings).await;

    let mut client = connect(addr).await;
    wait_until(|| state.registry.len() == 1).await;

    let result = state.dispatcher.broadcast_all("MAINTENANCE", &json!(null));
    assert_eq!(result.delivered, 1);

    let envelope = next_envelope(&mut client).await;
    assert_eq!(envelope["type"], "MAINTENANCE");
    assert!(envelope["payload"].is_null());
}
