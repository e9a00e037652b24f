//! In-memory user registry with lazy registration. The auth layer is the
//! source of truth for identity; this only records who has been seen.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::models::User;

pub struct UsersRepo {
    users: RwLock<HashMap<String, User>>,
}

impl UsersRepo {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, user_id: &str) -> Option<User> {
        self.users.read().await.get(user_id).cloned()
    }

    /// Create the user if absent; a display name, when supplied, refreshes
    /// the stored one. Defaults the name to the id.
    pub async fn ensure_exists(&self, user_id: &str, name: Option<&str>) -> User {
        let mut users = self.users.write().await;
        let user = users
            .entry(user_id.to_string())
            .or_insert_with(|| User {
                user_id: user_id.to_string(),
                name: name.unwrap_or(user_id).to_string(),
            });
        if let Some(name) = name {
            user.name = name.to_string();
        }
        user.clone()
    }

    pub async fn list(&self) -> Vec<User> {
        self.users.read().await.values().cloned().collect()
    }
}

impl Default for UsersRepo {
    fn default() -> Self {
        Self::new()
    }
}
