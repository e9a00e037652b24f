//! Disk-backed conversation store: one JSON document per conversation,
//! written atomically via a temp file and rename.
//!
//! In primary mode this store is the sole authority and every operation
//! reads the documents synchronously. The same document writer backs the
//! replica-mode snapshots.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

use crate::convo_id::{dm_convo_id, dm_key, random_convo_id};
use crate::error::{ChatError, Result};
use crate::models::{Conversation, ConversationKind, Message};

use super::ConversationsRepo;

/// Write a conversation document atomically into `dir`.
///
/// The temp name is unique per write: replica snapshots are detached tasks,
/// and two concurrent writers for the same conversation must not rename
/// each other's half-written temp file into place.
pub async fn write_conversation_doc(dir: &Path, convo: &Conversation) -> Result<()> {
    let path = dir.join(format!("{}.json", convo.convo_id));
    let temp_path = dir.join(format!(
        "{}.{}.tmp",
        convo.convo_id,
        uuid::Uuid::new_v4().simple()
    ));

    let json = serde_json::to_string_pretty(convo)?;
    fs::write(&temp_path, json).await?;
    fs::rename(&temp_path, &path).await?;

    Ok(())
}

pub struct JsonStore {
    dir: PathBuf,
    /// Serializes read-modify-write cycles; the document layer itself has
    /// no conditional update.
    write_lock: Mutex<()>,
}

impl JsonStore {
    pub async fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        info!("JSON conversation store at {:?}", dir);
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn doc_path(&self, convo_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", convo_id))
    }

    async fn load(&self, convo_id: &str) -> Result<Option<Conversation>> {
        match fs::read_to_string(self.doc_path(convo_id)).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, convo: &Conversation) -> Result<()> {
        write_conversation_doc(&self.dir, convo).await
    }
}

#[async_trait]
impl ConversationsRepo for JsonStore {
    async fn get(&self, convo_id: &str) -> Result<Option<Conversation>> {
        self.load(convo_id).await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let mut out = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            let convo: Conversation = serde_json::from_str(&content)?;
            if convo.is_member(user_id) {
                out.push(convo);
            }
        }
        Ok(out)
    }

    async fn get_or_create_dm(&self, a: &str, b: &str) -> Result<Conversation> {
        let convo_id = dm_convo_id(a, b);

        let _guard = self.write_lock.lock().await;
        if let Some(existing) = self.load(&convo_id).await? {
            return Ok(existing);
        }

        let convo = Conversation::new_dm(&convo_id, dm_key(a, b), a, b);
        self.save(&convo).await?;
        info!("created dm document {}", convo_id);
        Ok(convo)
    }

    async fn create_room(&self, name: &str, created_by: &str) -> Result<Conversation> {
        let room = Conversation::new_room(random_convo_id(), name, created_by);

        let _guard = self.write_lock.lock().await;
        self.save(&room).await?;
        info!("created room document {}", room.convo_id);
        Ok(room)
    }

    async fn add_member(&self, room_id: &str, user_id: &str) -> Result<Conversation> {
        let _guard = self.write_lock.lock().await;

        let mut convo = self
            .load(room_id)
            .await?
            .ok_or_else(|| ChatError::NotFound("room not found".into()))?;
        if convo.kind != ConversationKind::Room {
            return Err(ChatError::NotFound("room not found".into()));
        }

        if !convo.is_member(user_id) {
            convo.members.push(user_id.to_string());
            self.save(&convo).await?;
        }
        Ok(convo)
    }

    async fn append_message(&self, convo_id: &str, msg: Message) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut convo = self
            .load(convo_id)
            .await?
            .ok_or_else(|| ChatError::NotFound("conversation not found".into()))?;
        convo.messages.push(msg);
        self.save(&convo).await
    }
}
