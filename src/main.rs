//! Inspection binary: opens the store, fetches the live route listing,
//! merges the persisted tag overrides over it and prints a summary of
//! the network, the withdrawn archive and the blog feed.

use std::sync::Arc;
use std::sync::mpsc::channel;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use routeflow_store::arrivals::{ArrivalsWatcher, TflArrivalsSource};
use routeflow_store::error::Result;
use routeflow_store::merge::{RouteDirectory, TflRouteSource};
use routeflow_store::settings::Settings;
use routeflow_store::store::CollectionStore;
use routeflow_store::view::{FeedQuery, blog_feed, withdrawn_stats};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::load()?;
    let store = CollectionStore::new(settings.persistence_mode());
    if !store.storage_available() {
        warn!("storage is unavailable; nothing edited in this session will persist");
    }
    let session = store.open_session();

    let source = TflRouteSource::new(
        settings.tfl.route_endpoint.clone(),
        settings.tfl.app_key.clone(),
    );
    let directory = RouteDirectory::load(&source, &session).await;
    let stats = directory.stats();
    info!(
        total = stats.total,
        night = stats.night,
        school = stats.school,
        "route network loaded"
    );
    for route in directory.merged().iter().take(10) {
        info!(
            name = %route.name,
            tags = %route.service_types.join(", "),
            "route"
        );
    }

    if let Some(route) = directory.merged().first() {
        let watcher = ArrivalsWatcher::new();
        let arrivals_source = Arc::new(TflArrivalsSource::new(
            settings.tfl.arrivals_endpoint.clone(),
            settings.tfl.app_key.clone(),
        ));
        let (tx, rx) = channel();
        let name = route.name.clone();
        watcher.watch(arrivals_source, name.clone(), move |arrivals| {
            let _ = tx.send(arrivals);
        });
        match rx.recv_timeout(Duration::from_secs(10)) {
            Ok(arrivals) => info!(route = %name, count = arrivals.len(), "arrivals preview"),
            Err(_) => warn!(route = %name, "arrivals preview timed out"),
        }
    }

    let withdrawn = session.withdrawn_routes();
    let archive = withdrawn_stats(&withdrawn);
    info!(
        total = archive.total,
        operators = archive.operators,
        earliest = %archive
            .earliest_withdrawal
            .map(|date| date.to_string())
            .unwrap_or_else(|| "—".to_string()),
        "withdrawn archive"
    );

    let posts = session.blog_posts();
    for post in blog_feed(&posts, &FeedQuery { limit: Some(5), ..FeedQuery::default() }) {
        info!(
            title = %post.title,
            published = %post.published_at.date_naive(),
            read_time = post.read_time,
            "post"
        );
    }

    Ok(())
}
