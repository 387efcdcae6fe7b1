//! The Collection Store: the only component that reads or writes the
//! underlying key-value storage for the three user-editable collections.
//!
//! A [`CollectionStore`] owns the persistor, the change notifier and the
//! id generator. Each open page ("tab") holds a [`StoreSession`]: writes
//! made through one session are observed immediately through the write's
//! return value, and reach every sibling session through a change event.
//! Storage failure is never surfaced to callers as an error; reads
//! degrade to empty (or built-in defaults for blog posts) and writes
//! become in-memory no-ops.

use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::notify::{ChangeEvent, ChangeNotifier, SubscriberId};
use crate::persist::{PersistenceMode, Persistor};
use crate::record::{
    BlogPost, IdGenerator, RouteKey, RouteKeyHasher, RouteTagOverride, WithdrawnRouteEntry,
};
use crate::sanitise::{
    default_blog_posts, sanitise_blog_collection, sanitise_override_collection,
    sanitise_withdrawn_collection,
};

// ------------- CollectionKind -------------
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CollectionKind {
    WithdrawnRoutes,
    RouteTagOverrides,
    BlogPosts,
}

impl CollectionKind {
    /// The exact storage key the collection is persisted under. Listeners
    /// match change notifications against these constants, never by prefix.
    pub fn storage_key(&self) -> &'static str {
        match self {
            CollectionKind::WithdrawnRoutes => "routeflow.withdrawnRoutes",
            CollectionKind::RouteTagOverrides => "routeflow.routeTagOverrides",
            CollectionKind::BlogPosts => "routeflow.blogPosts",
        }
    }
}

/// Serialises canonical records back into candidate values, for callers
/// that edit a collection and resubmit it wholesale.
pub fn to_candidates<T: Serialize>(records: &[T]) -> Vec<Value> {
    records
        .iter()
        .filter_map(|record| match serde_json::to_value(record) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(%error, "failed to reserialise a record, dropping it");
                None
            }
        })
        .collect()
}

// ------------- CollectionStore -------------
pub struct CollectionStore {
    persistor: Mutex<Persistor>,
    notifier: ChangeNotifier,
    ids: IdGenerator,
    available: bool,
}

impl CollectionStore {
    /// Opens the store and probes storage once. A persistor that cannot
    /// even be created (bad path, locked file) degrades the same way a
    /// failed probe does: the store works, nothing persists.
    pub fn new(mode: PersistenceMode) -> Arc<Self> {
        let mut persistor = match Persistor::new(mode) {
            Ok(persistor) => persistor,
            Err(error) => {
                warn!(%error, "storage is not available for admin data");
                Persistor::new(PersistenceMode::Disabled)
                    .expect("disabled persistence cannot fail")
            }
        };
        let available = persistor.probe();
        if !available {
            warn!("storage probe failed; collections will not persist this session");
        }
        Arc::new(Self {
            persistor: Mutex::new(persistor),
            notifier: ChangeNotifier::new(),
            ids: IdGenerator::new(),
            available,
        })
    }

    pub fn storage_available(&self) -> bool {
        self.available
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    /// Opens a session, the unit that stands in for one browser tab.
    pub fn open_session(self: &Arc<Self>) -> StoreSession {
        let (origin, events) = self.notifier.subscribe();
        StoreSession {
            store: Arc::clone(self),
            origin,
            events,
        }
    }

    fn persistor(&self) -> MutexGuard<'_, Persistor> {
        self.persistor.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Loads and parses the raw stored array. Corruption and storage
    /// failure are both logged and treated as "collection absent".
    fn read_candidates(&self, kind: CollectionKind) -> Vec<Value> {
        if !self.available {
            return Vec::new();
        }
        let raw = match self.persistor().get_item(kind.storage_key()) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(key = kind.storage_key(), %error, "failed to read stored data");
                return Vec::new();
            }
        };
        let Some(raw) = raw else {
            return Vec::new();
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => items,
            Ok(_) => {
                warn!(key = kind.storage_key(), "stored data is not an array, ignoring it");
                Vec::new()
            }
            Err(error) => {
                warn!(key = kind.storage_key(), %error, "failed to parse stored data");
                Vec::new()
            }
        }
    }

    /// Persists the sanitised collection and tells the other sessions.
    /// The event is only published when the bytes actually reached
    /// storage; a failed or unavailable write changes nothing anywhere
    /// but in the caller's returned copy.
    fn write_records<T: Serialize>(
        &self,
        kind: CollectionKind,
        cleaned: &[T],
        origin: SubscriberId,
    ) {
        if !self.available {
            return;
        }
        let serialised = match serde_json::to_string(cleaned) {
            Ok(serialised) => serialised,
            Err(error) => {
                warn!(key = kind.storage_key(), %error, "failed to serialise collection");
                return;
            }
        };
        if let Err(error) = self.persistor().set_item(kind.storage_key(), &serialised) {
            warn!(key = kind.storage_key(), %error, "failed to write admin data to storage");
            return;
        }
        self.notifier.publish(kind, origin);
    }

    fn unsubscribe(&self, origin: SubscriberId) {
        self.notifier.unsubscribe(origin);
    }
}

// ------------- StoreSession -------------
/// One tab's handle on the shared store. Owns the tab's change-event
/// receiver; subscription happens exactly once, here.
pub struct StoreSession {
    store: Arc<CollectionStore>,
    origin: SubscriberId,
    events: Receiver<ChangeEvent>,
}

impl StoreSession {
    pub fn storage_available(&self) -> bool {
        self.store.storage_available()
    }

    pub fn store(&self) -> &Arc<CollectionStore> {
        &self.store
    }

    // --- withdrawn routes ---

    pub fn withdrawn_routes(&self) -> Vec<WithdrawnRouteEntry> {
        let candidates = self.store.read_candidates(CollectionKind::WithdrawnRoutes);
        sanitise_withdrawn_collection(&candidates, &self.store.ids)
    }

    pub fn set_withdrawn_routes(&self, candidates: &[Value]) -> Vec<WithdrawnRouteEntry> {
        let cleaned = sanitise_withdrawn_collection(candidates, &self.store.ids);
        self.store
            .write_records(CollectionKind::WithdrawnRoutes, &cleaned, self.origin);
        cleaned
    }

    // --- route tag overrides ---

    pub fn route_tag_overrides(&self) -> Vec<RouteTagOverride> {
        let candidates = self.store.read_candidates(CollectionKind::RouteTagOverrides);
        sanitise_override_collection(&candidates, &self.store.ids)
    }

    pub fn set_route_tag_overrides(&self, candidates: &[Value]) -> Vec<RouteTagOverride> {
        let cleaned = sanitise_override_collection(candidates, &self.store.ids);
        self.store
            .write_records(CollectionKind::RouteTagOverrides, &cleaned, self.origin);
        cleaned
    }

    /// Lookup from normalised route key to the override's tags, the form
    /// the merge adapter consumes.
    pub fn route_tag_override_map(&self) -> HashMap<RouteKey, Vec<String>, RouteKeyHasher> {
        let mut map = HashMap::default();
        for entry in self.route_tag_overrides() {
            if let Some(key) = entry.route_key() {
                map.insert(key, entry.tags);
            }
        }
        map
    }

    // --- blog posts ---

    /// Falls back to the built-in posts when nothing usable is stored.
    pub fn blog_posts(&self) -> Vec<BlogPost> {
        let cleaned = self.stored_blog_posts();
        if cleaned.is_empty() {
            default_blog_posts(&self.store.ids)
        } else {
            cleaned
        }
    }

    /// Only what is actually stored, with no default substitution. Write
    /// paths build on this: the built-in posts are a read fallback and
    /// must never be persisted as if an admin had authored them.
    pub fn stored_blog_posts(&self) -> Vec<BlogPost> {
        let candidates = self.store.read_candidates(CollectionKind::BlogPosts);
        sanitise_blog_collection(&candidates, &self.store.ids)
    }

    pub fn set_blog_posts(&self, candidates: &[Value]) -> Vec<BlogPost> {
        let cleaned = sanitise_blog_collection(candidates, &self.store.ids);
        self.store
            .write_records(CollectionKind::BlogPosts, &cleaned, self.origin);
        cleaned
    }

    // --- change events ---

    /// Non-blocking drain of change notifications from sibling sessions.
    pub fn drain_changes(&self) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for StoreSession {
    fn drop(&mut self) {
        self.store.unsubscribe(self.origin);
    }
}
