//! Orchestration layer: the only entry point transport-facing code calls.
//!
//! Sequences user registration, input validation, store writes and gateway
//! pushes. The membership checks live here, not in the store.

use std::sync::Arc;

use chrono::Utc;

use crate::config::ServerConfig;
use crate::convo_id::random_message_id;
use crate::error::{ChatError, Result};
use crate::gateway::RealtimeGateway;
use crate::models::{
    Conversation, ConversationKind, ConversationSummary, Message, RoomCreated, RoomJoined,
    RoomSummary, User,
};
use crate::store::{ConversationsRepo, UsersRepo};

/// Message timestamps come from here; tests inject a fixed clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

pub struct ChatService {
    users: Arc<UsersRepo>,
    convos: Arc<dyn ConversationsRepo>,
    gateway: Arc<RealtimeGateway>,
    clock: Arc<dyn Clock>,
    max_room_name_len: usize,
    max_message_len: usize,
}

impl ChatService {
    pub fn new(
        users: Arc<UsersRepo>,
        convos: Arc<dyn ConversationsRepo>,
        gateway: Arc<RealtimeGateway>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            users,
            convos,
            gateway,
            clock: Arc::new(SystemClock),
            max_room_name_len: config.max_room_name_len,
            max_message_len: config.max_message_len,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Lazy registration: the auth layer already vouched for the id.
    async fn ensure_user(&self, user_id: &str, name: Option<&str>) -> User {
        self.users.ensure_exists(user_id, name).await
    }

    pub async fn get_me(&self, user_id: Option<&str>, name: Option<&str>) -> Result<User> {
        let user_id = user_id
            .ok_or_else(|| ChatError::Unauthorized("missing resolved identity".into()))?;
        Ok(self.ensure_user(user_id, name).await)
    }

    pub async fn list_users(&self) -> Vec<User> {
        self.users.list().await
    }

    /// Same shape as each `list_conversations` item so clients decode both
    /// identically; never echoes message history.
    pub async fn create_dm(&self, user_id: &str, other_user_id: &str) -> Result<ConversationSummary> {
        if other_user_id.trim().is_empty() {
            return Err(ChatError::Validation("otherUserId required".into()));
        }
        // A self pair would put the caller in the member list twice and
        // double every fanout to them.
        if other_user_id == user_id {
            return Err(ChatError::Validation(
                "otherUserId must differ from the caller".into(),
            ));
        }
        self.ensure_user(user_id, None).await;
        self.ensure_user(other_user_id, None).await;

        let convo = self.convos.get_or_create_dm(user_id, other_user_id).await?;
        Ok(ConversationSummary::from(&convo))
    }

    pub async fn create_room(&self, user_id: &str, name: &str) -> Result<RoomCreated> {
        self.ensure_user(user_id, None).await;

        let name = name.trim();
        if name.is_empty() || name.chars().count() > self.max_room_name_len {
            return Err(ChatError::Validation(format!(
                "name must be 1-{} characters",
                self.max_room_name_len
            )));
        }

        let room = self.convos.create_room(name, user_id).await?;
        Ok(RoomCreated {
            room_id: room.convo_id,
            name: room.name.unwrap_or_default(),
        })
    }

    pub async fn join_room(&self, user_id: &str, room_id: &str) -> Result<RoomJoined> {
        self.ensure_user(user_id, None).await;

        let room = self.convos.add_member(room_id, user_id).await?;
        Ok(RoomJoined {
            room_id: room.convo_id,
            name: room.name.unwrap_or_default(),
            members: room.members,
        })
    }

    pub async fn list_rooms(&self, user_id: &str) -> Result<Vec<RoomSummary>> {
        self.ensure_user(user_id, None).await;

        let rooms = self
            .convos
            .list_for_user(user_id)
            .await?
            .into_iter()
            .filter(|c| c.kind == ConversationKind::Room)
            .map(|r| RoomSummary {
                room_id: r.convo_id,
                name: r.name.unwrap_or_default(),
                member_count: r.members.len(),
            })
            .collect();
        Ok(rooms)
    }

    pub async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>> {
        self.ensure_user(user_id, None).await;

        let list = self
            .convos
            .list_for_user(user_id)
            .await?
            .iter()
            .map(ConversationSummary::from)
            .collect();
        Ok(list)
    }

    /// The membership check the store itself does not perform.
    pub async fn list_messages(&self, user_id: &str, convo_id: &str) -> Result<Vec<Message>> {
        self.ensure_user(user_id, None).await;

        let convo = self.member_conversation(user_id, convo_id).await?;
        Ok(convo.messages)
    }

    /// Persist strictly before broadcasting, so a client re-fetching history
    /// on receipt of the push already sees the message.
    pub async fn send_message(&self, user_id: &str, convo_id: &str, text: &str) -> Result<Message> {
        self.ensure_user(user_id, None).await;

        let convo = self.member_conversation(user_id, convo_id).await?;

        if text.is_empty() || text.chars().count() > self.max_message_len {
            return Err(ChatError::Validation(format!(
                "text must be 1-{} characters",
                self.max_message_len
            )));
        }

        let msg = Message {
            message_id: random_message_id(),
            convo_id: convo.convo_id.clone(),
            from: user_id.to_string(),
            text: text.to_string(),
            ts: self.clock.now_ms(),
        };

        self.convos.append_message(&convo.convo_id, msg.clone()).await?;
        self.gateway
            .broadcast_message(&convo.convo_id, &msg, &convo.members);

        Ok(msg)
    }

    async fn member_conversation(&self, user_id: &str, convo_id: &str) -> Result<Conversation> {
        match self.convos.get(convo_id).await? {
            Some(convo) if convo.is_member(user_id) => Ok(convo),
            _ => Err(ChatError::NotFound("not found".into())),
        }
    }
}
