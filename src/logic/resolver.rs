//! Snapshot Source Resolver
//!
//! Decides where the dashboard's data comes from: local cache first for an
//! instant render, then the remote dataset to freshen it, then the bundled
//! fallback, then an empty snapshot. Resolution never raises; every failed
//! stage is logged and the next one tried.

use std::sync::Arc;
use std::time::Duration;

use crate::constants;
use crate::logic::dataset::embedded_events;
use crate::logic::normalize::{normalize_events, ships_from_predictions};
use crate::logic::store::SnapshotStore;
use crate::logic::types::{Currency, FleetSnapshot, RawEvent};

pub struct SourceResolver {
    store: Arc<SnapshotStore>,
    http: reqwest::Client,
    dataset_url: Option<String>,
    currency: Currency,
}

impl SourceResolver {
    pub fn new(store: Arc<SnapshotStore>, dataset_url: Option<String>, currency: Currency) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(constants::REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            store,
            http,
            dataset_url,
            currency,
        }
    }

    /// Cached snapshot, if any. Falls back to rebuilding the view from the
    /// raw prediction history when only that survived.
    pub fn load_cached(&self) -> Option<FleetSnapshot> {
        if let Some(snapshot) = self.store.load_snapshot() {
            if !snapshot.predictions.is_empty() {
                log::debug!(
                    "Loaded cached snapshot: {} ships, {} predictions",
                    snapshot.ships.len(),
                    snapshot.predictions.len()
                );
                return Some(snapshot);
            }
            log::debug!("Cached snapshot is empty, treating as a miss");
        }

        let predictions = self.store.load_predictions();
        if predictions.is_empty() {
            return None;
        }
        log::info!(
            "No cached snapshot; rebuilding view from {} stored predictions",
            predictions.len()
        );
        Some(FleetSnapshot {
            ships: ships_from_predictions(&predictions),
            predictions,
        })
    }

    /// Fetch fresh data, falling through remote, bundled, and finally an
    /// empty snapshot. Whatever was adopted is persisted for next startup.
    pub async fn refresh(&self) -> FleetSnapshot {
        if let Some(events) = self.fetch_remote().await {
            return self.adopt(&events, "remote dataset");
        }

        let embedded = embedded_events();
        if !embedded.is_empty() {
            log::info!("Falling back to the bundled sample dataset");
            return self.adopt(embedded, "bundled dataset");
        }

        log::warn!("No data source available, starting empty");
        FleetSnapshot::default()
    }

    async fn fetch_remote(&self) -> Option<Vec<RawEvent>> {
        let url = self.dataset_url.as_deref()?;

        let response = self
            .http
            .get(url)
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                log::warn!("Remote dataset fetch returned HTTP {}", r.status());
                return None;
            }
            Err(e) => {
                log::warn!("Remote dataset fetch failed: {}", e);
                return None;
            }
        };

        match response.json::<Vec<RawEvent>>().await {
            Ok(events) => {
                log::info!("Fetched {} events from the remote dataset", events.len());
                Some(events)
            }
            Err(e) => {
                log::warn!("Remote dataset did not parse: {}", e);
                None
            }
        }
    }

    /// Normalize events into a snapshot and persist it. Persistence
    /// failures are logged; the in-memory snapshot is still returned.
    fn adopt(&self, events: &[RawEvent], source: &str) -> FleetSnapshot {
        let predictions = normalize_events(events, self.currency);
        let snapshot = FleetSnapshot {
            ships: ships_from_predictions(&predictions),
            predictions,
        };

        if let Err(e) = self.store.save_predictions(snapshot.predictions.clone()) {
            log::warn!("Failed to persist {} history: {}", source, e);
        }
        match self.store.save_snapshot(snapshot.clone()) {
            Ok(stored) => stored,
            Err(e) => {
                log::warn!("Failed to persist {} snapshot: {}", source, e);
                snapshot
            }
        }
    }
}
