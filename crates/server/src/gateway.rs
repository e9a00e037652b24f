//! Realtime fanout: maps a user to their currently connected transports
//! and pushes message frames to them.
//!
//! Delivery is best-effort, at-most-once per open transport. No queue, no
//! acks, no replay; a member with no open transport catches up through the
//! message-history pull path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::models::{Message, ServerFrame};

/// Capability set this server needs from a live connection; the concrete
/// socket library is adapted to this shape at the boundary.
pub trait Transport: Send + Sync {
    fn is_open(&self) -> bool;
    /// Fire attempt; implementations must not block.
    fn send(&self, frame: &str);
    /// Invoke `hook` when the connection closes. If the transport is
    /// already closed, the hook runs immediately.
    fn on_close(&self, hook: Box<dyn FnOnce() + Send>);
}

pub struct RealtimeGateway {
    next_socket_id: AtomicU64,
    /// user -> live endpoints. Rebuilt from zero on every process restart.
    sockets: RwLock<HashMap<String, Vec<(u64, Arc<dyn Transport>)>>>,
}

impl RealtimeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_socket_id: AtomicU64::new(0),
            sockets: RwLock::new(HashMap::new()),
        })
    }

    /// Add a live endpoint for the user, arrange its removal on close, and
    /// acknowledge the identity binding with a `hello` frame.
    pub fn register_user_socket(self: &Arc<Self>, user_id: &str, transport: Arc<dyn Transport>) {
        let socket_id = self.next_socket_id.fetch_add(1, Ordering::Relaxed);
        self.sockets
            .write()
            .entry(user_id.to_string())
            .or_default()
            .push((socket_id, transport.clone()));

        let gateway = Arc::downgrade(self);
        let owner = user_id.to_string();
        transport.on_close(Box::new(move || {
            if let Some(gateway) = gateway.upgrade() {
                gateway.remove_socket(&owner, socket_id);
            }
        }));

        debug!("registered socket {} for {}", socket_id, user_id);
        match serde_json::to_string(&ServerFrame::hello(user_id)) {
            Ok(hello) => transport.send(&hello),
            Err(err) => warn!("skipping unencodable hello frame: {}", err),
        }
    }

    fn remove_socket(&self, user_id: &str, socket_id: u64) {
        let mut sockets = self.sockets.write();
        if let Some(endpoints) = sockets.get_mut(user_id) {
            endpoints.retain(|(id, _)| *id != socket_id);
            if endpoints.is_empty() {
                sockets.remove(user_id);
            }
        }
        debug!("removed socket {} for {}", socket_id, user_id);
    }

    /// Push the message frame once to every open transport of every member.
    /// Non-open transports are silently skipped.
    pub fn broadcast_message(&self, convo_id: &str, msg: &Message, members: &[String]) {
        let frame = match serde_json::to_string(&ServerFrame::message(convo_id, msg)) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("skipping unencodable message frame for {}: {}", convo_id, err);
                return;
            }
        };

        // Snapshot under the read lock, send outside it, so a concurrent
        // connect or disconnect never blocks or corrupts the iteration.
        let targets: Vec<Arc<dyn Transport>> = {
            let sockets = self.sockets.read();
            members
                .iter()
                .filter_map(|member| sockets.get(member))
                .flatten()
                .map(|(_, transport)| transport.clone())
                .collect()
        };

        for transport in targets {
            if transport.is_open() {
                transport.send(&frame);
            }
        }
    }

    /// Currently registered endpoints for a user.
    pub fn socket_count(&self, user_id: &str) -> usize {
        self.sockets
            .read()
            .get(user_id)
            .map(|endpoints| endpoints.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicBool;

    #[derive(Default)]
    struct TestTransport {
        closed: AtomicBool,
        frames: Mutex<Vec<String>>,
        hooks: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    }

    impl TestTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
            for hook in self.hooks.lock().drain(..) {
                hook();
            }
        }

        fn frames(&self) -> Vec<String> {
            self.frames.lock().clone()
        }

        fn message_frames(&self) -> Vec<String> {
            self.frames()
                .into_iter()
                .filter(|f| f.contains("\"type\":\"message\""))
                .collect()
        }
    }

    impl Transport for TestTransport {
        fn is_open(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }

        fn send(&self, frame: &str) {
            self.frames.lock().push(frame.to_string());
        }

        fn on_close(&self, hook: Box<dyn FnOnce() + Send>) {
            if self.is_open() {
                self.hooks.lock().push(hook);
            } else {
                hook();
            }
        }
    }

    fn msg(convo_id: &str, from: &str, text: &str) -> Message {
        Message {
            message_id: "m1".into(),
            convo_id: convo_id.into(),
            from: from.into(),
            text: text.into(),
            ts: 1,
        }
    }

    fn members(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn registration_acknowledges_with_hello() {
        let gateway = RealtimeGateway::new();
        let transport = TestTransport::new();
        gateway.register_user_socket("a", transport.clone());

        let frames = transport.frames();
        assert_eq!(frames.len(), 1);
        let json: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(json["type"], "hello");
        assert_eq!(json["data"]["userId"], "a");
    }

    #[test]
    fn every_delivered_frame_is_well_formed_json() {
        let gateway = RealtimeGateway::new();
        let transport = TestTransport::new();
        gateway.register_user_socket("a", transport.clone());
        gateway.broadcast_message("c1", &msg("c1", "b", "hi"), &members(&["a"]));

        let frames = transport.frames();
        assert_eq!(frames.len(), 2);
        for frame in frames {
            assert!(!frame.is_empty());
            serde_json::from_str::<serde_json::Value>(&frame).unwrap();
        }
    }

    #[test]
    fn broadcast_is_at_most_once_per_open_transport() {
        let gateway = RealtimeGateway::new();
        let a = TestTransport::new();
        let b = TestTransport::new();
        gateway.register_user_socket("a", a.clone());
        gateway.register_user_socket("b", b.clone());

        gateway.broadcast_message("c1", &msg("c1", "a", "hi"), &members(&["a", "b"]));

        assert_eq!(a.message_frames().len(), 1);
        assert_eq!(b.message_frames().len(), 1);
        let json: serde_json::Value = serde_json::from_str(&b.message_frames()[0]).unwrap();
        assert_eq!(json["convoId"], "c1");
        assert_eq!(json["data"]["text"], "hi");
    }

    #[test]
    fn broadcast_never_reaches_non_members() {
        let gateway = RealtimeGateway::new();
        let outsider = TestTransport::new();
        gateway.register_user_socket("c", outsider.clone());

        gateway.broadcast_message("c1", &msg("c1", "a", "hi"), &members(&["a", "b"]));

        assert!(outsider.message_frames().is_empty());
    }

    #[test]
    fn non_open_transports_are_silently_skipped() {
        let gateway = RealtimeGateway::new();
        let live = TestTransport::new();
        let dead = TestTransport::new();
        gateway.register_user_socket("a", live.clone());
        gateway.register_user_socket("a", dead.clone());
        // Closed but not yet removed from the registry.
        dead.closed.store(true, Ordering::SeqCst);

        gateway.broadcast_message("c1", &msg("c1", "b", "hi"), &members(&["a"]));

        assert_eq!(live.message_frames().len(), 1);
        assert!(dead.message_frames().is_empty());
    }

    #[test]
    fn close_removes_only_that_endpoint() {
        let gateway = RealtimeGateway::new();
        let phone = TestTransport::new();
        let laptop = TestTransport::new();
        gateway.register_user_socket("a", phone.clone());
        gateway.register_user_socket("a", laptop.clone());
        assert_eq!(gateway.socket_count("a"), 2);

        phone.close();
        assert_eq!(gateway.socket_count("a"), 1);

        gateway.broadcast_message("c1", &msg("c1", "b", "hi"), &members(&["a"]));
        assert!(phone.message_frames().is_empty());
        assert_eq!(laptop.message_frames().len(), 1);

        laptop.close();
        assert_eq!(gateway.socket_count("a"), 0);
    }

    #[test]
    fn multi_device_all_receive() {
        let gateway = RealtimeGateway::new();
        let phone = TestTransport::new();
        let laptop = TestTransport::new();
        gateway.register_user_socket("a", phone.clone());
        gateway.register_user_socket("a", laptop.clone());

        gateway.broadcast_message("c1", &msg("c1", "b", "hi"), &members(&["a"]));

        assert_eq!(phone.message_frames().len(), 1);
        assert_eq!(laptop.message_frames().len(), 1);
    }
}
