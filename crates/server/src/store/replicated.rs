//! Replica-mode durability bridge: memory store stays primary, and after
//! each mutation the full resulting conversation is written to disk from a
//! detached task. Write failures are logged and discarded; they never
//! block or fail the request path.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::warn;

use crate::error::Result;
use crate::models::{Conversation, Message};

use super::json_store::write_conversation_doc;
use super::{ConversationsRepo, MemoryStore};

pub struct ReplicatedStore {
    primary: MemoryStore,
    snapshot_dir: PathBuf,
}

impl ReplicatedStore {
    pub async fn new(primary: MemoryStore, snapshot_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let snapshot_dir = snapshot_dir.into();
        fs::create_dir_all(&snapshot_dir).await?;
        Ok(Self {
            primary,
            snapshot_dir,
        })
    }

    /// Fire-and-forget: the snapshot is immutable and shares no state with
    /// the request path that scheduled it.
    fn schedule_sync(&self, convo: Conversation) {
        let dir = self.snapshot_dir.clone();
        tokio::spawn(async move {
            if let Err(err) = write_conversation_doc(&dir, &convo).await {
                warn!("snapshot write failed for {}: {}", convo.convo_id, err);
            }
        });
    }
}

#[async_trait]
impl ConversationsRepo for ReplicatedStore {
    async fn get(&self, convo_id: &str) -> Result<Option<Conversation>> {
        self.primary.get(convo_id).await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>> {
        self.primary.list_for_user(user_id).await
    }

    async fn get_or_create_dm(&self, a: &str, b: &str) -> Result<Conversation> {
        let convo = self.primary.get_or_create_dm(a, b).await?;
        self.schedule_sync(convo.clone());
        Ok(convo)
    }

    async fn create_room(&self, name: &str, created_by: &str) -> Result<Conversation> {
        let convo = self.primary.create_room(name, created_by).await?;
        self.schedule_sync(convo.clone());
        Ok(convo)
    }

    async fn add_member(&self, room_id: &str, user_id: &str) -> Result<Conversation> {
        let convo = self.primary.add_member(room_id, user_id).await?;
        self.schedule_sync(convo.clone());
        Ok(convo)
    }

    async fn append_message(&self, convo_id: &str, msg: Message) -> Result<()> {
        self.primary.append_message(convo_id, msg).await?;
        if let Some(convo) = self.primary.get(convo_id).await? {
            self.schedule_sync(convo);
        }
        Ok(())
    }
}
