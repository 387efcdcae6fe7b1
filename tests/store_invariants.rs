use routeflow_store::persist::PersistenceMode;
use routeflow_store::store::{CollectionStore, StoreSession, to_candidates};
use serde_json::json;

fn session() -> StoreSession {
    CollectionStore::new(PersistenceMode::InMemory).open_session()
}

#[test]
fn write_is_idempotent_for_all_three_collections() {
    let session = session();

    let first = session.set_withdrawn_routes(&[
        json!({ "route": " 10 ", "operator": "Metroline" }),
        json!({ "route": "2" }),
        json!({ "route": "" }),
    ]);
    let second = session.set_withdrawn_routes(&to_candidates(&first));
    assert_eq!(first, second);

    let first = session.set_route_tag_overrides(&[
        json!({ "route": "n25", "tags": ["Special", "special", ""] }),
    ]);
    let second = session.set_route_tag_overrides(&to_candidates(&first));
    assert_eq!(first, second);

    let first = session.set_blog_posts(&[
        json!({ "title": "A", "publishedAt": "2024-01-01T00:00:00Z" }),
        json!({ "title": "B", "publishedAt": "2024-02-01T00:00:00Z" }),
    ]);
    let second = session.set_blog_posts(&to_candidates(&first));
    assert_eq!(first, second);
}

#[test]
fn empty_route_never_reaches_storage() {
    let session = session();
    let saved = session.set_withdrawn_routes(&[
        json!({ "route": "   ", "operator": "Arriva" }),
        json!({ "route": "68" }),
    ]);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].route, "68");
    let read_back = session.withdrawn_routes();
    assert_eq!(read_back.len(), 1);
    assert!(read_back.iter().all(|entry| !entry.route.is_empty()));
}

#[test]
fn collections_come_back_naturally_sorted() {
    let session = session();
    session.set_withdrawn_routes(&[
        json!({ "route": "A1" }),
        json!({ "route": "10" }),
        json!({ "route": "2" }),
    ]);
    let routes: Vec<String> = session
        .withdrawn_routes()
        .into_iter()
        .map(|entry| entry.route)
        .collect();
    assert_eq!(routes, vec!["2", "10", "A1"]);

    session.set_blog_posts(&[
        json!({ "title": "older", "publishedAt": "2023-01-01T00:00:00Z" }),
        json!({ "title": "newer", "publishedAt": "2024-01-01T00:00:00Z" }),
    ]);
    let titles: Vec<String> = session
        .blog_posts()
        .into_iter()
        .map(|post| post.title)
        .collect();
    assert_eq!(titles, vec!["newer", "older"]);
}

#[test]
fn read_observes_the_write_in_the_same_session() {
    let session = session();
    let written = session.set_route_tag_overrides(&[
        json!({ "route": "68X", "tags": ["School"] }),
    ]);
    assert_eq!(session.route_tag_overrides(), written);
}

#[test]
fn blog_posts_fall_back_to_the_builtin_set() {
    let session = session();

    // nothing stored yet
    let posts = session.blog_posts();
    assert!(!posts.is_empty());
    assert!(posts.iter().all(|post| !post.title.is_empty()));
    for pair in posts.windows(2) {
        assert!(pair[0].published_at >= pair[1].published_at);
    }

    // stored but sanitising to empty behaves the same
    session.set_blog_posts(&[json!({ "title": "   " })]);
    assert_eq!(session.blog_posts(), posts);

    // a real post displaces the fallback
    session.set_blog_posts(&[json!({ "title": "Real" })]);
    let stored = session.blog_posts();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Real");
}

#[test]
fn editing_a_record_keeps_its_id_and_the_collection_length() {
    let session = session();
    let saved = session.set_withdrawn_routes(&[
        json!({ "route": "12" }),
        json!({ "route": "36" }),
    ]);
    let edited_id = saved[0].id.clone();

    let mut next = saved.clone();
    next[0].route = "12A".to_string();
    let rewritten = session.set_withdrawn_routes(&to_candidates(&next));

    assert_eq!(rewritten.len(), saved.len());
    let edited = rewritten.iter().find(|entry| entry.id == edited_id).unwrap();
    assert_eq!(edited.route, "12A");
    let mut ids: Vec<&str> = rewritten.iter().map(|entry| entry.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), rewritten.len());
}

#[test]
fn generated_ids_are_stable_once_assigned() {
    let session = session();
    let first = session.set_withdrawn_routes(&[json!({ "route": "88" })]);
    let second = session.set_withdrawn_routes(&to_candidates(&first));
    assert_eq!(first[0].id, second[0].id);
}
