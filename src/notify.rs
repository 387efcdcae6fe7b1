//! Cross-session change propagation.
//!
//! Models the browser's storage event: when one session writes a watched
//! key, every *other* session with a subscription receives a
//! [`ChangeEvent`]. The writer never hears its own write; same-session
//! consistency comes from the return value of the write itself. Delivery
//! is at-most-once and best-effort, with no ordering guarantee across
//! sessions.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::mpsc::{Receiver, Sender, channel};

use tracing::warn;

use crate::store::CollectionKind;

// ------------- ChangeEvent -------------
/// The message delivered to sibling sessions when a collection changes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ChangeEvent {
    pub key: &'static str,
    pub kind: CollectionKind,
}

// ------------- SubscriberId -------------
/// Identifies one session (one "tab") to the notifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SubscriberId(u64);

// ------------- ChangeNotifier -------------
pub struct ChangeNotifier {
    next_id: Mutex<u64>,
    subscribers: Mutex<HashMap<SubscriberId, Sender<ChangeEvent>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(0),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a subscriber and hands back its event receiver. Each
    /// session subscribes exactly once, when it is opened.
    pub fn subscribe(&self) -> (SubscriberId, Receiver<ChangeEvent>) {
        let id = {
            let mut guard = self.next_id.lock().unwrap_or_else(|e| e.into_inner());
            *guard += 1;
            SubscriberId(*guard)
        };
        let (tx, rx) = channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    /// Fans a change out to every subscriber except the writer. Receivers
    /// whose session has gone away are pruned as they are discovered.
    pub fn publish(&self, kind: CollectionKind, origin: SubscriberId) {
        let mut dead = Vec::new();
        {
            let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            for (id, sender) in subscribers.iter() {
                if *id == origin {
                    continue;
                }
                let event = ChangeEvent { key: kind.storage_key(), kind };
                if sender.send(event).is_err() {
                    dead.push(*id);
                }
            }
        }
        if !dead.is_empty() {
            warn!(count = dead.len(), "pruning disconnected change subscribers");
            let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            for id in dead {
                subscribers.remove(&id);
            }
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
