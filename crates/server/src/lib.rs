//! Realtime chat server.
//!
//! Deduplicated direct messages, rooms with growable membership, an
//! append-only message log, WebSocket fanout to connected members, and
//! optional JSON-document persistence (async replica or disk primary).

pub mod config;
pub mod convo_id;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;
pub mod service;
pub mod store;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{AppState, ServerConfig};
use gateway::RealtimeGateway;
use service::ChatService;
use store::{make_store, UsersRepo};

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/me", get(routes::me))
        .route("/users", get(routes::list_users))
        .route("/dm", post(routes::create_dm))
        .route("/rooms", get(routes::list_rooms).post(routes::create_room))
        .route("/rooms/{room_id}/join", post(routes::join_room))
        .route("/conversations", get(routes::list_conversations))
        .route(
            "/conversations/{convo_id}/messages",
            get(routes::list_messages).post(routes::send_message),
        )
        .route("/ws", get(ws::ws_route))
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Already set, ignore
    }

    let config = ServerConfig::from_env();
    info!("persistence: {:?}, data dir: {:?}", config.persistence, config.data_dir);

    let convos = make_store(&config).await?;
    let users = Arc::new(UsersRepo::new());
    let gateway = RealtimeGateway::new();
    let service = Arc::new(ChatService::new(users, convos, gateway.clone(), &config));

    let state = AppState { service, gateway };
    let app = app_router(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("chat server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
