//! WebSocket endpoint: adapts an accepted socket to the gateway's
//! `Transport` capability. The socket is push-only; inbound traffic is
//! ignored except to observe closure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message as WsMessage, Utf8Bytes, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::AppState;
use crate::gateway::Transport;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// GET /ws?userId=...
///
/// The external layer has already authenticated the user; the query
/// parameter carries the resolved id.
pub async fn ws_route(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, query.user_id, state))
}

async fn handle_socket(mut socket: WebSocket, user_id: Option<String>, state: AppState) {
    let Some(user_id) = user_id.filter(|u| !u.is_empty()) else {
        let frame = CloseFrame {
            code: close_code::POLICY,
            reason: Utf8Bytes::from_static("missing userId"),
        };
        let _ = socket.send(WsMessage::Close(Some(frame))).await;
        return;
    };

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let transport = Arc::new(WsTransport {
        tx,
        open: AtomicBool::new(true),
        close_hooks: Mutex::new(Vec::new()),
    });
    state.gateway.register_user_socket(&user_id, transport.clone());

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(WsMessage::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    transport.mark_closed();
    writer.abort();
    debug!("websocket closed for {}", user_id);
}

/// A live WebSocket seen through the gateway's transport capability.
/// Outbound frames go through an unbounded channel so `send` never blocks
/// the broadcasting caller.
struct WsTransport {
    tx: mpsc::UnboundedSender<WsMessage>,
    open: AtomicBool,
    close_hooks: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl WsTransport {
    fn mark_closed(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            for hook in self.close_hooks.lock().drain(..) {
                hook();
            }
        }
    }
}

impl Transport for WsTransport {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send(&self, frame: &str) {
        if self.tx.send(WsMessage::Text(frame.to_string().into())).is_err() {
            debug!("dropped frame for closed socket");
        }
    }

    fn on_close(&self, hook: Box<dyn FnOnce() + Send>) {
        if self.is_open() {
            self.close_hooks.lock().push(hook);
        } else {
            hook();
        }
    }
}
