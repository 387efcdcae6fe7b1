//! Live arrivals preview for the currently selected route.
//!
//! Responses for a superseded selection must never overwrite fresher UI
//! state, so every fetch is tied to a selection token: selecting a new
//! route bumps a generation counter and aborts the in-flight task, and a
//! response whose token no longer matches the current selection is
//! discarded even if the abort raced the completion.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::Result;

// ------------- Predictions -------------

#[derive(Clone, Debug, Deserialize)]
pub struct Arrival {
    #[serde(default, rename = "lineName")]
    pub line_name: String,
    #[serde(default, rename = "stationName")]
    pub station_name: String,
    #[serde(default, rename = "destinationName")]
    pub destination_name: String,
    #[serde(default, rename = "timeToStation")]
    pub time_to_station: u32,
    #[serde(default, rename = "vehicleId")]
    pub vehicle_id: String,
}

/// The external collaborator behind the per-route arrivals feed.
pub trait ArrivalsSource {
    fn fetch_arrivals(&self, route: &str) -> impl Future<Output = Result<Vec<Arrival>>> + Send;
}

pub struct TflArrivalsSource {
    client: reqwest::Client,
    endpoint: String,
    app_key: String,
}

impl TflArrivalsSource {
    pub fn new(endpoint: String, app_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            app_key,
        }
    }
}

impl ArrivalsSource for TflArrivalsSource {
    async fn fetch_arrivals(&self, route: &str) -> Result<Vec<Arrival>> {
        let url = format!("{}/{}/Arrivals", self.endpoint.trim_end_matches('/'), route);
        let response = self
            .client
            .get(url)
            .query(&[("app_key", self.app_key.as_str())])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

// ------------- SelectionToken -------------

/// Captures the generation of one selection. Stale tokens stop matching
/// as soon as a newer selection is made.
#[derive(Debug, Clone)]
pub struct SelectionToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl SelectionToken {
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Relaxed) == self.generation
    }
}

// ------------- ArrivalsWatcher -------------

pub struct ArrivalsWatcher {
    current: Arc<AtomicU64>,
    inflight: Mutex<Option<JoinHandle<()>>>,
}

impl ArrivalsWatcher {
    pub fn new() -> Self {
        Self {
            current: Arc::new(AtomicU64::new(0)),
            inflight: Mutex::new(None),
        }
    }

    /// Marks a new selection: the previous in-flight task is aborted and
    /// every token handed out before this call goes stale.
    pub fn select(&self) -> SelectionToken {
        let generation = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = self
            .inflight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = previous {
            task.abort();
        }
        SelectionToken {
            generation,
            current: Arc::clone(&self.current),
        }
    }

    /// Spawns the preview fetch for the current selection and delivers the
    /// result through `on_loaded`, unless the selection moved on first.
    /// Fetch failures are logged and reported as an empty preview so the
    /// view can show a retry message instead of spinning forever.
    pub fn watch<S, F>(&self, source: Arc<S>, route: String, on_loaded: F) -> SelectionToken
    where
        S: ArrivalsSource + Send + Sync + 'static,
        F: FnOnce(Vec<Arrival>) + Send + 'static,
    {
        let token = self.select();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let arrivals = match source.fetch_arrivals(&route).await {
                Ok(arrivals) => arrivals,
                Err(error) => {
                    warn!(%route, %error, "arrivals preview fetch failed");
                    Vec::new()
                }
            };
            // the abort may have raced the response; the token decides
            if task_token.is_current() {
                on_loaded(arrivals);
            }
        });
        *self.inflight.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        token
    }
}

impl Default for ArrivalsWatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[test]
    fn tokens_go_stale_when_selection_moves_on() {
        let watcher = ArrivalsWatcher::new();
        let first = watcher.select();
        assert!(first.is_current());
        let second = watcher.select();
        assert!(!first.is_current());
        assert!(second.is_current());
    }

    struct DelayedSource(Duration);

    impl ArrivalsSource for DelayedSource {
        async fn fetch_arrivals(&self, _route: &str) -> Result<Vec<Arrival>> {
            tokio::time::sleep(self.0).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn a_superseded_selection_never_delivers_its_response() {
        let watcher = ArrivalsWatcher::new();
        let slow = Arc::new(DelayedSource(Duration::from_millis(100)));
        let fast = Arc::new(DelayedSource(Duration::from_millis(5)));

        let first_delivered = Arc::new(AtomicBool::new(false));
        let second_delivered = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&first_delivered);
        watcher.watch(slow, "25".to_string(), move |_| {
            flag.store(true, Ordering::SeqCst);
        });
        // the user moves on before the first fetch resolves
        let flag = Arc::clone(&second_delivered);
        watcher.watch(fast, "68".to_string(), move |_| {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!first_delivered.load(Ordering::SeqCst));
        assert!(second_delivered.load(Ordering::SeqCst));
    }
}
