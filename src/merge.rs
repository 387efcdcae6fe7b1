//! The Remote Merge Adapter: blends the live route listing with the
//! locally persisted tag overrides.
//!
//! The live listing is read-only input, fetched once per page lifetime
//! and cached. Overrides are re-read whenever the change notifier says
//! their key was written; the listing itself is never re-fetched on an
//! override change. When the fetch fails outright, a small built-in
//! sample keeps the page usable.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

use crate::error::Result;
use crate::notify::ChangeEvent;
use crate::record::{RouteKey, RouteKeyHasher, compare_routes};
use crate::store::{CollectionKind, StoreSession};

// ------------- Live listing shapes -------------

/// One entry of the remote listing, one per route section/direction.
/// Only the fields the grouping step consumes are decoded.
#[derive(Clone, Debug, Deserialize)]
pub struct RawRoute {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "serviceTypes")]
    pub service_types: Vec<RawServiceType>,
    #[serde(default, rename = "routeSections")]
    pub route_sections: Vec<RawRouteSection>,
}

/// Service types arrive as objects in the live feed but as bare strings
/// in the fallback sample; accept both.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RawServiceType {
    Name(String),
    Tagged {
        #[serde(default)]
        name: String,
        #[serde(default, rename = "serviceType")]
        service_type: String,
    },
}

impl RawServiceType {
    fn label(&self) -> &str {
        match self {
            RawServiceType::Name(name) => name,
            RawServiceType::Tagged { name, service_type } => {
                if name.is_empty() { service_type } else { name }
            }
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RawRouteSection {
    #[serde(default, rename = "originationName")]
    pub origination_name: String,
    #[serde(default, rename = "destinationName")]
    pub destination_name: String,
}

/// A route as the pages see it, after grouping and (possibly) merging.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LiveRoute {
    pub id: String,
    pub name: String,
    pub service_types: Vec<String>,
    pub origins: Vec<String>,
    pub destinations: Vec<String>,
}

// ------------- RouteSource -------------

/// The external collaborator behind the live listing. Swapped for a stub
/// in tests; backed by the TfL endpoint in the binary.
pub trait RouteSource {
    fn fetch_routes(&self) -> impl Future<Output = Result<Vec<RawRoute>>> + Send;
}

pub struct TflRouteSource {
    client: reqwest::Client,
    endpoint: String,
    app_key: String,
}

impl TflRouteSource {
    pub fn new(endpoint: String, app_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            app_key,
        }
    }
}

impl RouteSource for TflRouteSource {
    async fn fetch_routes(&self) -> Result<Vec<RawRoute>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("app_key", self.app_key.as_str())])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

/// Sample set used when the live listing cannot be fetched.
pub fn fallback_routes() -> Vec<LiveRoute> {
    let sample = [
        ("25", "25", vec!["Regular"], "Ilford", "City Thameslink"),
        ("N25", "N25", vec!["Night"], "Oxford Circus", "Ilford"),
        ("68", "68", vec!["Regular"], "West Norwood", "Euston"),
        ("68X", "68X", vec!["School", "Special"], "West Norwood", "Waterloo"),
    ];
    sample
        .into_iter()
        .map(|(id, name, service_types, origin, destination)| LiveRoute {
            id: id.to_string(),
            name: name.to_string(),
            service_types: service_types.into_iter().map(String::from).collect(),
            origins: vec![origin.to_string()],
            destinations: vec![destination.to_string()],
        })
        .collect()
}

// ------------- Grouping -------------

/// Collapses the per-section listing into one record per route, keyed by
/// the normalised route name. Service types, origins and destinations
/// are unioned preserving first-seen order.
pub fn group_routes(raw: Vec<RawRoute>) -> Vec<LiveRoute> {
    let mut order: Vec<RouteKey> = Vec::new();
    let mut grouped: HashMap<RouteKey, LiveRoute, RouteKeyHasher> = HashMap::default();
    for entry in raw {
        let name = if entry.name.is_empty() { entry.id.clone() } else { entry.name.clone() };
        let Some(key) = RouteKey::new(&name) else {
            continue;
        };
        let record = grouped.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            LiveRoute {
                id: entry.id.clone(),
                name,
                service_types: Vec::new(),
                origins: Vec::new(),
                destinations: Vec::new(),
            }
        });
        for service_type in &entry.service_types {
            push_unique(&mut record.service_types, service_type.label());
        }
        for section in &entry.route_sections {
            push_unique(&mut record.origins, &section.origination_name);
            push_unique(&mut record.destinations, &section.destination_name);
        }
    }
    order
        .into_iter()
        .filter_map(|key| grouped.remove(&key))
        .collect()
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !values.iter().any(|existing| existing == value) {
        values.push(value.to_string());
    }
}

// ------------- Aggregate statistics -------------

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RouteStats {
    pub total: usize,
    pub night: usize,
    pub school: usize,
}

// ------------- RouteDirectory -------------

pub struct RouteDirectory {
    live: Vec<LiveRoute>,
    overrides: HashMap<RouteKey, Vec<String>, RouteKeyHasher>,
}

impl RouteDirectory {
    /// Fetches the listing once and captures the current override map.
    /// A failed fetch substitutes the sample set instead of failing the
    /// page.
    pub async fn load<S: RouteSource>(source: &S, session: &StoreSession) -> Self {
        let live = match source.fetch_routes().await {
            Ok(raw) => group_routes(raw),
            Err(error) => {
                warn!(%error, "falling back to sample route data");
                fallback_routes()
            }
        };
        Self {
            live,
            overrides: session.route_tag_override_map(),
        }
    }

    /// Builds a directory from an already grouped listing. Used by the
    /// tests and by anything that caches the listing elsewhere.
    pub fn from_routes(live: Vec<LiveRoute>, session: &StoreSession) -> Self {
        Self {
            live,
            overrides: session.route_tag_override_map(),
        }
    }

    /// The merged view: an override's tags fully replace the live service
    /// types of the matching route; unmatched routes keep their own tags,
    /// defensively copied. Sorted by the natural route order.
    pub fn merged(&self) -> Vec<LiveRoute> {
        let mut merged: Vec<LiveRoute> = self
            .live
            .iter()
            .map(|route| {
                let mut route = route.clone();
                if let Some(tags) = RouteKey::new(&route.name)
                    .as_ref()
                    .and_then(|key| self.overrides.get(key))
                {
                    route.service_types = tags.clone();
                }
                route
            })
            .collect();
        merged.sort_by(|a, b| compare_routes(&a.name, &b.name));
        merged
    }

    /// Counts are always computed from the post-merge collection.
    pub fn stats(&self) -> RouteStats {
        let merged = self.merged();
        let has_tag = |route: &LiveRoute, needle: &str| {
            route
                .service_types
                .iter()
                .any(|tag| tag.to_lowercase().contains(needle))
        };
        RouteStats {
            total: merged.len(),
            night: merged.iter().filter(|route| has_tag(route, "night")).count(),
            school: merged.iter().filter(|route| has_tag(route, "school")).count(),
        }
    }

    /// Re-reads the override map without touching the cached listing.
    pub fn refresh_overrides(&mut self, session: &StoreSession) {
        self.overrides = session.route_tag_override_map();
    }

    /// Reacts to a change notification. Only the override key matters to
    /// this adapter; any other key is ignored. Returns whether the merged
    /// view may have changed.
    pub fn handle_change(&mut self, event: &ChangeEvent, session: &StoreSession) -> bool {
        if event.kind != CollectionKind::RouteTagOverrides {
            return false;
        }
        self.refresh_overrides(session);
        true
    }
}
