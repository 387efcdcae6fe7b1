//! The read-side contracts the public pages build their rendering on:
//! withdrawn-route statistics and search, the route filter model, and
//! the blog feed query. All pure functions over canonical records; the
//! DOM layer is out of scope.

use std::collections::HashSet;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::merge::LiveRoute;
use crate::record::{BlogPost, WithdrawnRouteEntry, compare_routes};

lazy_static! {
    // a bare year means the 1st of January of that year
    static ref BARE_YEAR: Regex = Regex::new(r"^(\d{4})$").unwrap();
}

// ------------- Withdrawn routes -------------

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WithdrawnStats {
    pub total: usize,
    pub operators: usize,
    pub earliest_withdrawal: Option<NaiveDate>,
}

/// Loose date parsing for the free-text withdrawal fields: common date
/// shapes plus a bare `YYYY` year.
pub fn parse_withdrawal_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in ["%Y-%m-%d", "%d %B %Y", "%d %b %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    if let Some(capture) = BARE_YEAR.captures(trimmed) {
        let year: i32 = capture[1].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }
    None
}

pub fn withdrawn_stats(entries: &[WithdrawnRouteEntry]) -> WithdrawnStats {
    let operators: HashSet<&str> = entries
        .iter()
        .map(|entry| entry.operator.as_str())
        .filter(|operator| !operator.is_empty())
        .collect();
    let earliest_withdrawal = entries
        .iter()
        .filter_map(|entry| parse_withdrawal_date(&entry.withdrawn))
        .min();
    WithdrawnStats {
        total: entries.len(),
        operators: operators.len(),
        earliest_withdrawal,
    }
}

/// Case-insensitive substring search across every text field of an entry.
pub fn matches_withdrawn_search(entry: &WithdrawnRouteEntry, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    [
        &entry.route,
        &entry.start,
        &entry.end,
        &entry.launched,
        &entry.withdrawn,
        &entry.operator,
        &entry.replaced_by,
    ]
    .into_iter()
    .any(|field| field.to_lowercase().contains(&term))
}

// ------------- Route filtering -------------

/// The service-type toggle set plus free-text search of the network
/// browser. The filter set never goes empty: toggling the last active
/// filter off re-seeds it with that same key.
#[derive(Clone, Debug)]
pub struct RouteFilter {
    service_filters: HashSet<String>,
    pub search: String,
}

impl RouteFilter {
    pub fn new() -> Self {
        let mut service_filters = HashSet::new();
        service_filters.insert("Regular".to_string());
        Self {
            service_filters,
            search: String::new(),
        }
    }

    pub fn toggle(&mut self, key: &str) {
        if !self.service_filters.remove(key) {
            self.service_filters.insert(key.to_string());
        }
        if self.service_filters.is_empty() {
            self.service_filters.insert(key.to_string());
        }
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.service_filters.contains(key)
    }

    fn matches_filter(&self, route: &LiveRoute) -> bool {
        if self.service_filters.is_empty() {
            return true;
        }
        if route.service_types.is_empty() {
            return self.service_filters.contains("Regular");
        }
        route.service_types.iter().any(|service_type| {
            self.service_filters.contains(service_type)
                || self
                    .service_filters
                    .contains(strip_service_suffix(service_type))
        })
    }

    fn matches_search(&self, route: &LiveRoute) -> bool {
        let term = self.search.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        std::iter::once(&route.name)
            .chain(route.origins.iter())
            .chain(route.destinations.iter())
            .any(|field| field.to_lowercase().contains(&term))
    }

    /// Applies both predicates and sorts the survivors naturally.
    pub fn apply(&self, routes: &[LiveRoute]) -> Vec<LiveRoute> {
        let mut filtered: Vec<LiveRoute> = routes
            .iter()
            .filter(|route| self.matches_filter(route) && self.matches_search(route))
            .cloned()
            .collect();
        filtered.sort_by(|a, b| compare_routes(&a.name, &b.name));
        filtered
    }
}

impl Default for RouteFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_service_suffix(service_type: &str) -> &str {
    const SUFFIX: &str = " service";
    let len = service_type.len();
    if len >= SUFFIX.len()
        && service_type.is_char_boundary(len - SUFFIX.len())
        && service_type[len - SUFFIX.len()..].eq_ignore_ascii_case(SUFFIX)
    {
        service_type[..len - SUFFIX.len()].trim_end()
    } else {
        service_type
    }
}

// ------------- Blog feed -------------

#[derive(Clone, Debug, Default)]
pub struct FeedQuery {
    pub limit: Option<usize>,
    pub tag: Option<String>,
    pub search: String,
}

/// The home feed and info hub both consume this: featured posts first,
/// newest first within each group, optionally filtered by tag and
/// free-text search over title/summary/content.
pub fn blog_feed(posts: &[BlogPost], query: &FeedQuery) -> Vec<BlogPost> {
    let tag = query.tag.as_deref().map(str::to_lowercase);
    let term = query.search.trim().to_lowercase();
    let mut feed: Vec<BlogPost> = posts
        .iter()
        .filter(|post| match &tag {
            Some(tag) => post.tags.iter().any(|candidate| candidate.to_lowercase() == *tag),
            None => true,
        })
        .filter(|post| {
            if term.is_empty() {
                return true;
            }
            [&post.title, &post.summary, &post.content]
                .into_iter()
                .any(|field| field.to_lowercase().contains(&term))
        })
        .cloned()
        .collect();
    feed.sort_by(|a, b| {
        b.featured
            .cmp(&a.featured)
            .then(b.published_at.cmp(&a.published_at))
    });
    if let Some(limit) = query.limit {
        feed.truncate(limit);
    }
    feed
}
