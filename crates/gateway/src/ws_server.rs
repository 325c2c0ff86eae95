//! WebSocket and stateless HTTP transport binding using Axum.
//!
//! Each accepted socket becomes one session task: inbound messages and
//! the periodic publisher tick interleave on that task, and a writer task
//! drains the session's channel, giving strict FIFO write order per
//! session. The `/cmd` route is the stateless transport: one message per
//! request with the session token in-band.

use crate::engines::Engines;
use crate::registry::{SessionHandle, SessionRegistry};
use crate::session::Session;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Shared application state.
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub engines: Arc<Engines>,
}

/// Create the transport router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/cmd", post(cmd_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    format!(
        r#"{{"status":"ok","sessions":{},"authenticated":{}}}"#,
        state.registry.len(),
        state.registry.authenticated_len()
    )
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

/// Drive one stateful session until the transport closes.
async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let shared = SessionHandle::new(state.registry.next_id(), addr.to_string(), tx);
    state.registry.register(shared.clone());
    let session_id = shared.id;

    counter!("gateway_connections_total").increment(1);
    gauge!("gateway_active_sessions").set(state.registry.len() as f64);
    info!("{}: session {} connected", addr, session_id);

    // Writer task: the single consumer of this session's channel.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new(shared.clone(), state.engines.clone(), false);

    // Publisher cadence; skipped ticks are not made up.
    let mut publish = interval(Duration::from_millis(1000));
    publish.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        session.handle_message(&text, None).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        match std::str::from_utf8(&data) {
                            Ok(text) => session.handle_message(text, None).await,
                            Err(_) => debug!("{}: non-utf8 binary message dropped", addr),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        shared.send_message(Message::Pong(data));
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) => break,
                    Some(Err(e)) => {
                        warn!("{}: websocket error: {:?}", addr, e);
                        break;
                    }
                    None => break,
                }
            }

            _ = publish.tick() => {
                if !session.tick() {
                    break;
                }
            }
        }
    }

    shared.close();
    state.registry.unregister(session_id);
    send_task.abort();

    counter!("gateway_disconnections_total").increment(1);
    gauge!("gateway_active_sessions").set(state.registry.len() as f64);
    info!("{}: session {} disconnected", addr, session_id);
}

#[derive(Deserialize)]
struct CmdQuery {
    token: Option<String>,
}

/// Stateless transport: one message per request, session token carried as
/// a query parameter, produced frames returned line-delimited.
async fn cmd_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(q): Query<CmdQuery>,
    body: String,
) -> impl IntoResponse {
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let shared = SessionHandle::new(state.registry.next_id(), addr.to_string(), tx);
    let mut session = Session::new(shared.clone(), state.engines.clone(), true);
    session.handle_message(body.trim(), q.token.as_deref()).await;
    drop(session);
    shared.close();

    let mut out = String::new();
    while let Ok(msg) = rx.try_recv() {
        if let Message::Text(text) = msg {
            out.push_str(&text);
            out.push('\n');
        }
    }
    out
}
