//! In-memory conversation store: the primary authority unless disk-backed
//! persistence is configured.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::convo_id::{dm_convo_id, dm_key, random_convo_id};
use crate::error::{ChatError, Result};
use crate::models::{Conversation, ConversationKind, Message};

use super::ConversationsRepo;

/// Conversations keyed by id, each behind its own lock so operations on
/// different conversations proceed in parallel. DM ids are deterministic,
/// so the map-level write lock in `get_or_create_dm` is the only thing
/// needed to keep concurrent DM creation idempotent.
pub struct MemoryStore {
    conversations: RwLock<HashMap<String, Arc<RwLock<Conversation>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
        }
    }

    async fn entry(&self, convo_id: &str) -> Option<Arc<RwLock<Conversation>>> {
        self.conversations.read().await.get(convo_id).cloned()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationsRepo for MemoryStore {
    async fn get(&self, convo_id: &str) -> Result<Option<Conversation>> {
        match self.entry(convo_id).await {
            Some(convo) => Ok(Some(convo.read().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let entries: Vec<_> = self.conversations.read().await.values().cloned().collect();
        let mut out = Vec::new();
        for entry in entries {
            let convo = entry.read().await;
            if convo.is_member(user_id) {
                out.push(convo.clone());
            }
        }
        Ok(out)
    }

    async fn get_or_create_dm(&self, a: &str, b: &str) -> Result<Conversation> {
        let convo_id = dm_convo_id(a, b);

        // Map write lock serializes concurrent creation for the same pair.
        let mut conversations = self.conversations.write().await;
        if let Some(existing) = conversations.get(&convo_id) {
            return Ok(existing.read().await.clone());
        }

        let convo = Conversation::new_dm(&convo_id, dm_key(a, b), a, b);
        conversations.insert(convo_id.clone(), Arc::new(RwLock::new(convo.clone())));
        info!("created dm {}", convo_id);
        Ok(convo)
    }

    async fn create_room(&self, name: &str, created_by: &str) -> Result<Conversation> {
        let convo_id = random_convo_id();
        let room = Conversation::new_room(&convo_id, name, created_by);
        self.conversations
            .write()
            .await
            .insert(convo_id.clone(), Arc::new(RwLock::new(room.clone())));
        info!("created room {} ({:?})", convo_id, name);
        Ok(room)
    }

    async fn add_member(&self, room_id: &str, user_id: &str) -> Result<Conversation> {
        let entry = self
            .entry(room_id)
            .await
            .ok_or_else(|| ChatError::NotFound("room not found".into()))?;

        let mut convo = entry.write().await;
        if convo.kind != ConversationKind::Room {
            return Err(ChatError::NotFound("room not found".into()));
        }
        if !convo.is_member(user_id) {
            convo.members.push(user_id.to_string());
        }
        Ok(convo.clone())
    }

    async fn append_message(&self, convo_id: &str, msg: Message) -> Result<()> {
        let entry = self
            .entry(convo_id)
            .await
            .ok_or_else(|| ChatError::NotFound("conversation not found".into()))?;

        entry.write().await.messages.push(msg);
        Ok(())
    }
}
