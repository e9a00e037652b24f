//! Server configuration, read from the environment with sane defaults.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::gateway::RealtimeGateway;
use crate::service::ChatService;

/// Which store owns conversation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceMode {
    /// In-memory only; state is discarded at process end.
    Memory,
    /// In-memory primary with fire-and-forget JSON snapshots after each
    /// mutation. A crash can lose a not-yet-written mutation.
    Replica,
    /// JSON documents on disk are the sole authority; every operation
    /// reads and writes them synchronously.
    Primary,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind on.
    pub port: u16,
    /// Directory holding conversation JSON documents (replica and primary modes).
    pub data_dir: PathBuf,
    pub persistence: PersistenceMode,
    /// Maximum room name length after trimming.
    pub max_room_name_len: usize,
    /// Maximum message text length.
    pub max_message_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 18000,
            data_dir: PathBuf::from("chat_data"),
            persistence: PersistenceMode::Memory,
            max_room_name_len: 80,
            max_message_len: 10_000,
        }
    }
}

impl ServerConfig {
    /// Build a config from `CHAT_PORT`, `CHAT_DATA_DIR`, and `CHAT_PERSISTENCE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("CHAT_PORT") {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(_) => warn!("ignoring invalid CHAT_PORT {:?}", port),
            }
        }

        if let Ok(dir) = std::env::var("CHAT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(mode) = std::env::var("CHAT_PERSISTENCE") {
            match mode.to_lowercase().as_str() {
                "memory" => config.persistence = PersistenceMode::Memory,
                "replica" => config.persistence = PersistenceMode::Replica,
                "primary" => config.persistence = PersistenceMode::Primary,
                other => warn!("ignoring unknown CHAT_PERSISTENCE {:?}", other),
            }
        }

        config
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}

/// App state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
    pub gateway: Arc<RealtimeGateway>,
}
