//! Domain model: users, conversations, messages, and the frames pushed
//! over the realtime channel.
//!
//! Field names serialize in camelCase because that is the wire contract
//! clients already speak (`convoId`, `messageId`, ...).

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A registered user. Created lazily on first reference; identity itself
/// is resolved by the external auth layer before it reaches this server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Dm,
    Room,
}

/// A conversation: either a two-party DM (deduplicated by canonical pair
/// key) or a room with growable membership. The message log is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub convo_id: String,
    pub kind: ConversationKind,
    /// Members in insertion order. Exactly two for a DM; grow-only for a room.
    pub members: Vec<String>,
    /// Canonical sorted pair key, DMs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Milliseconds since epoch, set once at room creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new_dm(convo_id: impl Into<String>, key: impl Into<String>, a: &str, b: &str) -> Self {
        Self {
            convo_id: convo_id.into(),
            kind: ConversationKind::Dm,
            members: vec![a.to_string(), b.to_string()],
            key: Some(key.into()),
            name: None,
            created_by: None,
            created_at: None,
            messages: Vec::new(),
        }
    }

    pub fn new_room(
        convo_id: impl Into<String>,
        name: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        let created_by = created_by.into();
        Self {
            convo_id: convo_id.into(),
            kind: ConversationKind::Room,
            members: vec![created_by.clone()],
            key: None,
            name: Some(name.into()),
            created_by: Some(created_by),
            created_at: Some(Utc::now().timestamp_millis()),
            messages: Vec::new(),
        }
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }
}

/// A single chat message. `ts` is assigned by the orchestration layer at
/// send time; log order is insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    pub convo_id: String,
    pub from: String,
    pub text: String,
    pub ts: i64,
}

/// Conversation as listed to a caller: no message history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub convo_id: String,
    pub kind: ConversationKind,
    pub members: Vec<String>,
}

impl From<&Conversation> for ConversationSummary {
    fn from(c: &Conversation) -> Self {
        Self {
            convo_id: c.convo_id.clone(),
            kind: c.kind,
            members: c.members.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreated {
    pub room_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoined {
    pub room_id: String,
    pub name: String,
    pub members: Vec<String>,
}

/// Room listing exposes a member count rather than the full member list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: String,
    pub name: String,
    pub member_count: usize,
}

/// Frames pushed to clients over the realtime channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    Message { convo_id: String, data: Message },
    Hello { data: HelloPayload },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloPayload {
    pub user_id: String,
}

impl ServerFrame {
    pub fn message(convo_id: &str, msg: &Message) -> Self {
        ServerFrame::Message {
            convo_id: convo_id.to_string(),
            data: msg.clone(),
        }
    }

    pub fn hello(user_id: &str) -> Self {
        ServerFrame::Hello {
            data: HelloPayload {
                user_id: user_id.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_frame_wire_shape() {
        let msg = Message {
            message_id: "m1".into(),
            convo_id: "c1".into(),
            from: "a".into(),
            text: "hi".into(),
            ts: 42,
        };
        let json = serde_json::to_value(ServerFrame::message("c1", &msg)).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["convoId"], "c1");
        assert_eq!(json["data"]["messageId"], "m1");
        assert_eq!(json["data"]["from"], "a");
        assert_eq!(json["data"]["ts"], 42);
    }

    #[test]
    fn hello_frame_wire_shape() {
        let json = serde_json::to_value(ServerFrame::hello("u1")).unwrap();
        assert_eq!(json["type"], "hello");
        assert_eq!(json["data"]["userId"], "u1");
    }

    #[test]
    fn dm_serializes_without_room_fields() {
        let dm = Conversation::new_dm("dm_x", "a:b", "a", "b");
        let json = serde_json::to_value(&dm).unwrap();
        assert_eq!(json["kind"], "dm");
        assert_eq!(json["key"], "a:b");
        assert!(json.get("name").is_none());
        assert!(json.get("createdBy").is_none());
    }

    #[test]
    fn conversation_round_trips_through_its_document_form() {
        let mut room = Conversation::new_room("r1", "general", "a");
        room.members.push("b".into());
        room.messages.push(Message {
            message_id: "m1".into(),
            convo_id: "r1".into(),
            from: "b".into(),
            text: "hi".into(),
            ts: 7,
        });

        let json = serde_json::to_string(&room).unwrap();
        let back: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, ConversationKind::Room);
        assert_eq!(back.members, vec!["a", "b"]);
        assert_eq!(back.created_by.as_deref(), Some("a"));
        assert_eq!(back.messages.len(), 1);
    }
}
