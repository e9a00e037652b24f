//! Conversation storage.
//!
//! One trait, three wirings selected by configuration: in-memory only,
//! in-memory with async JSON snapshots (replica), or JSON documents on
//! disk as the sole authority (primary).

pub mod json_store;
pub mod memory;
pub mod replicated;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{PersistenceMode, ServerConfig};
use crate::error::Result;
use crate::models::{Conversation, Message};

pub use json_store::JsonStore;
pub use memory::MemoryStore;
pub use replicated::ReplicatedStore;
pub use users::UsersRepo;

/// Single authority for conversation and message-log state.
///
/// `append_message` does not check membership; the service layer owns that
/// check so the store stays leaf-level and testable in isolation.
#[async_trait]
pub trait ConversationsRepo: Send + Sync {
    async fn get(&self, convo_id: &str) -> Result<Option<Conversation>>;

    /// All conversations the user is a member of, in no particular order.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>>;

    /// Atomic per unordered pair: concurrent callers for the same two users
    /// all observe the same conversation, never a duplicate.
    async fn get_or_create_dm(&self, a: &str, b: &str) -> Result<Conversation>;

    async fn create_room(&self, name: &str, created_by: &str) -> Result<Conversation>;

    /// Idempotent; adding an existing member is a no-op that still returns
    /// the current state. `NotFound` unless the id resolves to a room.
    async fn add_member(&self, room_id: &str, user_id: &str) -> Result<Conversation>;

    /// `NotFound` if the conversation does not exist.
    async fn append_message(&self, convo_id: &str, msg: Message) -> Result<()>;
}

/// Wire up the conversation store for the configured persistence mode.
pub async fn make_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn ConversationsRepo>> {
    let store: Arc<dyn ConversationsRepo> = match config.persistence {
        PersistenceMode::Memory => Arc::new(MemoryStore::new()),
        PersistenceMode::Replica => Arc::new(
            ReplicatedStore::new(MemoryStore::new(), config.data_dir.clone()).await?,
        ),
        PersistenceMode::Primary => Arc::new(JsonStore::new(config.data_dir.clone()).await?),
    };
    Ok(store)
}
