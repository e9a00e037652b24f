//! Conversation id derivation.
//!
//! The same unordered pair of users always resolves to the same DM id, so
//! DM creation is idempotent without scanning the store. Rooms and messages
//! get random opaque ids.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Canonical dedup key for a DM: both ids sorted, joined with `:`.
pub fn dm_key(a: &str, b: &str) -> String {
    let mut pair = [a, b];
    pair.sort_unstable();
    pair.join(":")
}

/// Deterministic DM conversation id, derived from the canonical pair key.
pub fn dm_convo_id(a: &str, b: &str) -> String {
    let digest = Sha256::digest(dm_key(a, b).as_bytes());
    let hex = format!("{:x}", digest);
    format!("dm_{}", &hex[..16])
}

pub fn random_convo_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn random_message_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dm_key_is_order_insensitive() {
        assert_eq!(dm_key("alice", "bob"), dm_key("bob", "alice"));
        assert_eq!(dm_key("alice", "bob"), "alice:bob");
    }

    #[test]
    fn dm_id_is_order_insensitive() {
        assert_eq!(dm_convo_id("alice", "bob"), dm_convo_id("bob", "alice"));
    }

    #[test]
    fn dm_id_differs_per_pair() {
        assert_ne!(dm_convo_id("alice", "bob"), dm_convo_id("alice", "carol"));
    }

    #[test]
    fn dm_id_has_stable_shape() {
        let id = dm_convo_id("a", "b");
        assert!(id.starts_with("dm_"));
        assert_eq!(id.len(), "dm_".len() + 16);
    }

    #[test]
    fn random_ids_do_not_collide_trivially() {
        assert_ne!(random_convo_id(), random_convo_id());
        assert_ne!(random_message_id(), random_message_id());
    }
}
