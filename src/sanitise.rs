//! Pure validation and normalisation for the three collection kinds.
//!
//! Every sanitiser takes an arbitrary [`serde_json::Value`] and either
//! produces the canonical record or `None`, meaning "drop this record".
//! Nothing past this boundary ever sees unvalidated input. Generated ids
//! come from an injected [`IdGenerator`]; everything else is deterministic.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use url::Url;

use crate::record::{
    BlogPost, IdGenerator, RouteTagOverride, WithdrawnRouteEntry, compare_routes,
};

/// Fallback author attached to blog posts submitted without one.
pub const DEFAULT_AUTHOR: &str = "RouteFlow London";

/// Reading speed used when estimating `readTime` from the body text.
const WORDS_PER_MINUTE: f64 = 180.0;

// ------------- Field-level helpers -------------

/// String fields are trimmed; anything that is not a string becomes empty.
fn normalise_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    }
}

/// JavaScript-style truthiness for the `featured` flag.
fn normalise_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    }
}

/// Tag lists keep the first occurrence of each non-empty tag, in order.
/// Dedupe is case-sensitive on purpose: tags are display labels, unlike
/// route keys which are identifiers.
fn normalise_tags(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    let mut tags: Vec<String> = Vec::new();
    for item in items {
        let tag = normalise_text(Some(item));
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Best-effort absolute-URL normalisation. A value that fails to parse as
/// an absolute URL is kept as trimmed plain text rather than discarded.
fn normalise_image(value: Option<&Value>) -> String {
    let text = normalise_text(value);
    if text.is_empty() {
        return text;
    }
    match Url::parse(&text) {
        Ok(url) => url.to_string(),
        Err(_) => text,
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

fn estimate_read_time(content: &str, summary: &str) -> u32 {
    let body = if content.trim().is_empty() { summary } else { content };
    let words = body.split_whitespace().count();
    let minutes = (words as f64 / WORDS_PER_MINUTE).round();
    (minutes as u32).max(1)
}

/// Explicit read times are accepted as numbers or numeric strings, rounded
/// to the nearest minute and clamped to at least one. Anything that is not
/// a positive number falls back to estimation.
fn normalise_read_time(value: Option<&Value>, content: &str, summary: &str) -> u32 {
    let explicit = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match explicit {
        Some(minutes) if minutes.is_finite() && minutes > 0.0 => (minutes.round() as u32).max(1),
        _ => estimate_read_time(content, summary),
    }
}

fn field<'v>(value: &'v Value, name: &str) -> Option<&'v Value> {
    value.as_object().and_then(|map| map.get(name))
}

fn id_or_generated(value: &Value, ids: &IdGenerator) -> String {
    let id = normalise_text(field(value, "id"));
    if id.is_empty() { ids.generate() } else { id }
}

// ------------- Per-record sanitisers -------------

/// A withdrawn-route candidate with no usable `route` is dropped entirely.
pub fn sanitise_withdrawn_entry(
    value: &Value,
    ids: &IdGenerator,
) -> Option<WithdrawnRouteEntry> {
    if !value.is_object() {
        return None;
    }
    let route = normalise_text(field(value, "route"));
    if route.is_empty() {
        return None;
    }
    Some(WithdrawnRouteEntry {
        id: id_or_generated(value, ids),
        route,
        start: normalise_text(field(value, "start")),
        end: normalise_text(field(value, "end")),
        launched: normalise_text(field(value, "launched")),
        withdrawn: normalise_text(field(value, "withdrawn")),
        operator: normalise_text(field(value, "operator")),
        replaced_by: normalise_text(field(value, "replacedBy")),
    })
}

/// An override needs both a route and at least one tag; an override with
/// no tags is meaningless and must not be persisted.
pub fn sanitise_route_tag_override(
    value: &Value,
    ids: &IdGenerator,
) -> Option<RouteTagOverride> {
    if !value.is_object() {
        return None;
    }
    let route = normalise_text(field(value, "route"));
    if route.is_empty() {
        return None;
    }
    let tags = normalise_tags(field(value, "tags"));
    if tags.is_empty() {
        return None;
    }
    Some(RouteTagOverride {
        id: id_or_generated(value, ids),
        route,
        tags,
    })
}

/// A blog post without a title is dropped; every other field defaults.
pub fn sanitise_blog_post(value: &Value, ids: &IdGenerator) -> Option<BlogPost> {
    if !value.is_object() {
        return None;
    }
    let title = normalise_text(field(value, "title"));
    if title.is_empty() {
        return None;
    }
    let summary = normalise_text(field(value, "summary"));
    let content = normalise_text(field(value, "content"));
    let author = {
        let author = normalise_text(field(value, "author"));
        if author.is_empty() { DEFAULT_AUTHOR.to_string() } else { author }
    };
    let published_at = normalise_text(field(value, "publishedAt"));
    let published_at = parse_timestamp(&published_at).unwrap_or_else(Utc::now);
    let read_time = normalise_read_time(field(value, "readTime"), &content, &summary);
    Some(BlogPost {
        id: id_or_generated(value, ids),
        title,
        summary,
        hero_image: normalise_image(field(value, "heroImage")),
        published_at,
        tags: normalise_tags(field(value, "tags")),
        featured: normalise_flag(field(value, "featured")),
        read_time,
        content,
        author,
    })
}

// ------------- Collection sanitisers -------------

/// Applies a per-record sanitiser across a candidate sequence, drops the
/// rejects and sorts by the collection's natural order.
fn sanitise_collection<R>(
    candidates: &[Value],
    sanitiser: impl Fn(&Value) -> Option<R>,
    sort: impl Fn(&mut Vec<R>),
) -> Vec<R> {
    let mut cleaned: Vec<R> = candidates.iter().filter_map(sanitiser).collect();
    sort(&mut cleaned);
    cleaned
}

pub fn sanitise_withdrawn_collection(
    candidates: &[Value],
    ids: &IdGenerator,
) -> Vec<WithdrawnRouteEntry> {
    sanitise_collection(
        candidates,
        |value| sanitise_withdrawn_entry(value, ids),
        |cleaned| cleaned.sort_by(|a, b| compare_routes(&a.route, &b.route)),
    )
}

pub fn sanitise_override_collection(
    candidates: &[Value],
    ids: &IdGenerator,
) -> Vec<RouteTagOverride> {
    sanitise_collection(
        candidates,
        |value| sanitise_route_tag_override(value, ids),
        |cleaned| cleaned.sort_by(|a, b| compare_routes(&a.route, &b.route)),
    )
}

/// Blog posts come back newest first.
pub fn sanitise_blog_collection(candidates: &[Value], ids: &IdGenerator) -> Vec<BlogPost> {
    sanitise_collection(
        candidates,
        |value| sanitise_blog_post(value, ids),
        |cleaned| cleaned.sort_by(|a, b| b.published_at.cmp(&a.published_at)),
    )
}

// ------------- Built-in blog posts -------------

/// The posts shown when nothing has been stored yet (or the stored
/// collection sanitises to nothing). Run through the same sanitiser as
/// user data so every collection invariant also holds for the fallback.
pub fn default_blog_posts(ids: &IdGenerator) -> Vec<BlogPost> {
    let seed = serde_json::json!([
        {
            "id": "welcome-to-routeflow",
            "title": "Welcome to RouteFlow London",
            "summary": "What the site covers today and where it is heading next.",
            "content": "RouteFlow London brings live bus and rail arrivals, a browsable \
route network, a fleet viewer and a growing archive of withdrawn services \
into one place. This post walks through the main sections of the site and \
how the data behind each of them is sourced from TfL's open data feeds.",
            "author": "RouteFlow London",
            "publishedAt": "2024-03-04T09:00:00Z",
            "tags": ["Announcements", "Site"],
            "featured": true
        },
        {
            "id": "night-network-overhaul",
            "title": "Mapping the night network overhaul",
            "summary": "Tracking this spring's night-route changes as they roll out.",
            "content": "Several night corridors are being reshaped this spring. We are \
tagging the affected routes in the network browser as the changes land, so \
filtering by Night always reflects the current picture rather than the \
published plan.",
            "publishedAt": "2024-02-12T18:30:00Z",
            "tags": ["Network", "Night"]
        },
        {
            "id": "withdrawn-archive-launch",
            "title": "The withdrawn routes archive is live",
            "summary": "A community-maintained record of London services that are no more.",
            "content": "The archive lists withdrawn routes with their operating dates, \
operators and replacements where known. Corrections are welcome through the \
admin console.",
            "publishedAt": "2024-01-20T08:15:00Z",
            "tags": ["Archive"]
        }
    ]);
    let candidates = seed.as_array().cloned().unwrap_or_default();
    sanitise_blog_collection(&candidates, ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids() -> IdGenerator {
        IdGenerator::new()
    }

    #[test]
    fn non_object_candidates_are_dropped() {
        for value in [json!(null), json!("route 25"), json!(42), json!([1, 2])] {
            assert!(sanitise_withdrawn_entry(&value, &ids()).is_none());
            assert!(sanitise_route_tag_override(&value, &ids()).is_none());
            assert!(sanitise_blog_post(&value, &ids()).is_none());
        }
    }

    #[test]
    fn whitespace_route_is_dropped() {
        let value = json!({ "route": "   ", "operator": "Go-Ahead" });
        assert!(sanitise_withdrawn_entry(&value, &ids()).is_none());
    }

    #[test]
    fn text_fields_default_to_empty() {
        let value = json!({ "route": " 159 ", "operator": 7, "withdrawn": null });
        let entry = sanitise_withdrawn_entry(&value, &ids()).unwrap();
        assert_eq!(entry.route, "159");
        assert_eq!(entry.operator, "");
        assert_eq!(entry.withdrawn, "");
        assert!(entry.id.starts_with("id-"));
    }

    #[test]
    fn tags_keep_first_seen_order_case_sensitively() {
        let value = json!({ "route": "N25", "tags": ["Night", "night", "Night", ""] });
        let cleaned = sanitise_route_tag_override(&value, &ids()).unwrap();
        assert_eq!(cleaned.tags, vec!["Night".to_string(), "night".to_string()]);
    }

    #[test]
    fn override_with_no_usable_tags_is_dropped() {
        let value = json!({ "route": "N25", "tags": ["", "  "] });
        assert!(sanitise_route_tag_override(&value, &ids()).is_none());
        let value = json!({ "route": "N25" });
        assert!(sanitise_route_tag_override(&value, &ids()).is_none());
    }

    #[test]
    fn explicit_read_time_is_rounded_and_clamped() {
        let value = json!({ "title": "T", "readTime": 2.4 });
        assert_eq!(sanitise_blog_post(&value, &ids()).unwrap().read_time, 2);
        let value = json!({ "title": "T", "readTime": 0.2 });
        // 0.2 is positive, rounds to 0, clamps to 1
        assert_eq!(sanitise_blog_post(&value, &ids()).unwrap().read_time, 1);
        let value = json!({ "title": "T", "readTime": "-3" });
        assert_eq!(sanitise_blog_post(&value, &ids()).unwrap().read_time, 1);
    }

    #[test]
    fn read_time_estimated_from_content_words() {
        let words = vec!["word"; 360].join(" ");
        let value = json!({ "title": "T", "content": words });
        assert_eq!(sanitise_blog_post(&value, &ids()).unwrap().read_time, 2);
    }

    #[test]
    fn hero_image_keeps_unparsable_text() {
        let value = json!({ "title": "T", "heroImage": "  images/hero.png " });
        assert_eq!(
            sanitise_blog_post(&value, &ids()).unwrap().hero_image,
            "images/hero.png"
        );
        let value = json!({ "title": "T", "heroImage": "https://example.com/a.png" });
        assert_eq!(
            sanitise_blog_post(&value, &ids()).unwrap().hero_image,
            "https://example.com/a.png"
        );
    }

    #[test]
    fn unparsable_published_at_defaults_to_now() {
        let before = Utc::now();
        let value = json!({ "title": "T", "publishedAt": "shortly after lunch" });
        let post = sanitise_blog_post(&value, &ids()).unwrap();
        assert!(post.published_at >= before);
    }

    #[test]
    fn collections_sort_naturally() {
        let candidates = vec![
            json!({ "route": "A1" }),
            json!({ "route": "10" }),
            json!({ "route": "2" }),
        ];
        let cleaned = sanitise_withdrawn_collection(&candidates, &ids());
        let routes: Vec<&str> = cleaned.iter().map(|e| e.route.as_str()).collect();
        assert_eq!(routes, vec!["2", "10", "A1"]);
    }

    #[test]
    fn default_posts_satisfy_the_invariants() {
        let posts = default_blog_posts(&ids());
        assert!(!posts.is_empty());
        let mut ids_seen = std::collections::HashSet::new();
        for pair in posts.windows(2) {
            assert!(pair[0].published_at >= pair[1].published_at);
        }
        for post in &posts {
            assert!(!post.title.is_empty());
            assert!(post.read_time >= 1);
            assert!(ids_seen.insert(post.id.clone()));
        }
    }
}
