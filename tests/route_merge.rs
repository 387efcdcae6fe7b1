use std::sync::atomic::{AtomicUsize, Ordering};

use routeflow_store::error::{Result, StoreError};
use routeflow_store::merge::{RawRoute, RouteDirectory, RouteSource, group_routes};
use routeflow_store::persist::PersistenceMode;
use routeflow_store::store::{CollectionStore, StoreSession};
use serde_json::json;

struct StubSource {
    payload: serde_json::Value,
    fetches: AtomicUsize,
}

impl StubSource {
    fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            fetches: AtomicUsize::new(0),
        }
    }
}

impl RouteSource for StubSource {
    async fn fetch_routes(&self) -> Result<Vec<RawRoute>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        serde_json::from_value(self.payload.clone())
            .map_err(|e| StoreError::Remote(e.to_string()))
    }
}

struct FailingSource;

impl RouteSource for FailingSource {
    async fn fetch_routes(&self) -> Result<Vec<RawRoute>> {
        Err(StoreError::Remote("503 from upstream".to_string()))
    }
}

fn listing() -> serde_json::Value {
    json!([
        {
            "id": "n25",
            "name": "N25",
            "serviceTypes": [{ "name": "Night" }],
            "routeSections": [
                { "originationName": "Oxford Circus", "destinationName": "Ilford" }
            ]
        },
        {
            "id": "68",
            "name": "68",
            "serviceTypes": [{ "name": "Regular" }],
            "routeSections": [
                { "originationName": "West Norwood", "destinationName": "Euston" }
            ]
        },
        {
            // second section of the same route, grouped away
            "id": "68",
            "name": "68",
            "serviceTypes": [{ "name": "Regular" }],
            "routeSections": [
                { "originationName": "Euston", "destinationName": "West Norwood" }
            ]
        }
    ])
}

fn session() -> StoreSession {
    CollectionStore::new(PersistenceMode::InMemory).open_session()
}

#[tokio::test]
async fn overrides_replace_tags_by_case_insensitive_route_key() {
    let session = session();
    session.set_route_tag_overrides(&[json!({ "route": "n25", "tags": ["Special"] })]);

    let source = StubSource::new(listing());
    let directory = RouteDirectory::load(&source, &session).await;
    let merged = directory.merged();

    let n25 = merged.iter().find(|route| route.name == "N25").unwrap();
    assert_eq!(n25.service_types, vec!["Special".to_string()]);
    let r68 = merged.iter().find(|route| route.name == "68").unwrap();
    assert_eq!(r68.service_types, vec!["Regular".to_string()]);
    // grouping unioned both directions of the 68
    assert_eq!(r68.origins, vec!["West Norwood".to_string(), "Euston".to_string()]);
}

#[tokio::test]
async fn stats_count_the_post_merge_collection() {
    let session = session();
    let source = StubSource::new(listing());
    let mut directory = RouteDirectory::load(&source, &session).await;

    let before = directory.stats();
    assert_eq!((before.total, before.night, before.school), (2, 1, 0));

    // retag the night route as a school special and re-merge
    session.set_route_tag_overrides(&[json!({ "route": "N25", "tags": ["School"] })]);
    directory.refresh_overrides(&session);

    let after = directory.stats();
    assert_eq!((after.total, after.night, after.school), (2, 0, 1));
    // the live listing was fetched exactly once
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fetch_failure_substitutes_the_sample_set() {
    let session = session();
    let directory = RouteDirectory::load(&FailingSource, &session).await;
    let merged = directory.merged();
    assert!(!merged.is_empty());
    assert!(merged.iter().any(|route| route.name == "N25"));
}

#[test]
fn grouping_unions_service_types_preserving_first_seen_order() {
    let raw: Vec<RawRoute> = serde_json::from_value(json!([
        { "id": "68x", "name": "68X", "serviceTypes": [{ "name": "School" }] },
        { "id": "68x", "name": "68x", "serviceTypes": [{ "name": "Special" }, { "name": "School" }] },
        { "id": "", "name": "   " }
    ]))
    .unwrap();
    let grouped = group_routes(raw);
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped[0].name, "68X");
    assert_eq!(
        grouped[0].service_types,
        vec!["School".to_string(), "Special".to_string()]
    );
}
