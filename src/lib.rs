//! RouteFlow store, the reconciled data-store layer behind the RouteFlow
//! London transit site.
//!
//! The site keeps three user-editable collections alongside data fetched
//! live from TfL's open API:
//! * Withdrawn routes: the community archive of services no longer run.
//! * Route tag overrides: admin-curated replacements for a live route's
//!   service-type tags, matched by normalised route key.
//! * Blog posts: the info-hub feed, with a built-in default set.
//!
//! Collections are persisted as JSON arrays under fixed keys in a
//! synchronous key-value storage, shared by every open session. Each
//! session that writes a collection notifies its siblings through the
//! change notifier, which is how several "tabs" stay consistent without
//! a server. There is deliberately no locking: every write carries the
//! full sanitised collection, and concurrent writers resolve by
//! last-writer-wins (see the notes in `store`).
//!
//! ## Modules
//! * [`record`]: Canonical record types, route keys, the natural route
//!   comparator and the id generator.
//! * [`sanitise`]: Pure validation/normalisation from arbitrary JSON to
//!   canonical records, plus the built-in blog posts.
//! * [`persist`]: The SQLite-backed key-value storage and its
//!   availability probe.
//! * [`store`]: The Collection Store and per-tab sessions.
//! * [`notify`]: Best-effort change propagation between sessions.
//! * [`merge`]: The Remote Merge Adapter blending the live route
//!   listing with persisted tag overrides.
//! * [`arrivals`]: Cancellable live arrivals previews keyed to the
//!   current selection.
//! * [`session`]: Admin-console glue, edit sessions, notices and the
//!   token-authorised profile sync.
//! * [`view`]: Pure read-side contracts for the public pages (stats,
//!   filters, the blog feed).
//! * [`settings`]: Configuration for the binary.
//!
//! ## Quick Start
//! ```
//! use routeflow_store::persist::PersistenceMode;
//! use routeflow_store::store::CollectionStore;
//! use serde_json::json;
//!
//! let store = CollectionStore::new(PersistenceMode::InMemory);
//! let session = store.open_session();
//! let saved = session.set_withdrawn_routes(&[json!({ "route": "159" })]);
//! assert_eq!(saved[0].route, "159");
//! assert_eq!(session.withdrawn_routes(), saved);
//! ```

pub mod arrivals;
pub mod error;
pub mod merge;
pub mod notify;
pub mod persist;
pub mod record;
pub mod sanitise;
pub mod session;
pub mod settings;
pub mod store;
pub mod view;
