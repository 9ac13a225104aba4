//! WebSocket transport: upgrade checks and the per-connection read/write tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};

use crate::connection_manager::{ConnectionHandle, ConnectionId, Frame};
use crate::metrics::{
    WsMessageMetrics, WS_CONNECTIONS_CLOSED, WS_CONNECTIONS_OPENED, WS_CONNECTION_DURATION,
};
use crate::server::AppState;
use crate::telemetry::sanitize_for_log;

/// WebSocket upgrade handler
#[tracing::instrument(name = "ws.upgrade", skip(ws, state, headers))]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down").into_response();
    }

    if let Some(origin) = headers.get(header::ORIGIN) {
        let origin = origin.to_str().unwrap_or_default();
        if !state.settings.server.origin_allowed(origin) {
            tracing::warn!(origin = %sanitize_for_log(origin), "Rejected WebSocket origin");
            return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
        }
    }

    let max_message_size = state.settings.websocket.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    // Subscribe before the flag check so a concurrent trigger is never missed
    let shutdown_rx = state.shutdown.subscribe();
    if state.shutdown.is_shutting_down() {
        return;
    }

    let connection_id = ConnectionId::generate();
    let connection_start = Instant::now();

    let (tx, rx) = mpsc::channel::<Frame>(state.settings.websocket.outbound_buffer.max(1));
    state
        .registry
        .register(ConnectionHandle::new(connection_id.clone(), tx));
    let Some(handle) = state.registry.get(&connection_id) else {
        return;
    };

    WS_CONNECTIONS_OPENED.inc();
    tracing::info!(connection_id = %connection_id, "WebSocket connection established");

    run_connection(socket, &state, handle, rx, shutdown_rx).await;

    state.registry.unregister(&connection_id);
    state.directory.unbind(&connection_id);

    WS_CONNECTIONS_CLOSED.inc();
    let duration = connection_start.elapsed().as_secs_f64();
    WS_CONNECTION_DURATION.observe(duration);

    tracing::info!(
        connection_id = %connection_id,
        duration_secs = duration,
        "WebSocket connection closed"
    );
}

#[tracing::instrument(
    name = "ws.connection",
    skip_all,
    fields(connection_id = %handle.id, otel.kind = "server")
)]
async fn run_connection(
    socket: WebSocket,
    state: &AppState,
    handle: Arc<ConnectionHandle>,
    rx: mpsc::Receiver<Frame>,
    shutdown_rx: broadcast::Receiver<()>,
) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let ping_interval = Duration::from_secs(state.settings.websocket.ping_interval.max(1));

    let mut send_task = tokio::spawn(write_loop(ws_sender, rx, shutdown_rx, ping_interval));

    let router = state.router.clone();
    let recv_handle = handle.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if !process_message(msg, &router, &recv_handle) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    let connection_id = &handle.id;
    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
            send_task.abort();
        }
    }
}

/// Forward queued frames to the socket, ping on an interval, and send a
/// close frame when the service stops
async fn write_loop(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Frame>,
    mut shutdown_rx: broadcast::Receiver<()>,
    ping_interval: Duration,
) {
    let mut ping_timer = tokio::time::interval(ping_interval);
    // Skip immediate first tick
    ping_timer.tick().await;

    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                if ws_sender.send(Message::Text(frame.as_ref().into())).await.is_err() {
                    break;
                }
            }
            _ = ping_timer.tick() => {
                if ws_sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            _ = shutdown_rx.recv() => {
                let close = CloseFrame {
                    code: close_code::AWAY,
                    reason: "Server shutting down".into(),
                };
                let _ = ws_sender.send(Message::Close(Some(close))).await;
                break;
            }
        }
    }
}

/// Process a received WebSocket message.
/// Returns false if the connection should be closed
fn process_message(
    msg: Message,
    router: &super::InboundRouter,
    handle: &ConnectionHandle,
) -> bool {
    match msg {
        Message::Text(text) => {
            handle.update_activity();
            router.route(&handle.id, text.as_str());
            true
        }
        Message::Binary(data) => {
            WsMessageMetrics::record_binary();
            tracing::debug!(bytes = data.len(), "Ignoring binary frame");
            true
        }
        Message::Ping(_) | Message::Pong(_) => {
            handle.update_activity();
            true
        }
        Message::Close(_) => {
            tracing::debug!(connection_id = %handle.id, "Client closed connection");
            false
        }
    }
}
