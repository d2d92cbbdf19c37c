//! Dashboard Context
//!
//! The host-facing entry point. Owns the API client, the bounded store,
//! the source resolver, and the live in-memory snapshot, and coordinates
//! the stale-while-revalidate flow between them.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::constants;
use crate::logic::client::{ApiClient, ClientError, VoyageData};
use crate::logic::events::{FleetObserver, ObserverRegistry};
use crate::logic::metrics::{
    self, AggregatedMetrics, FleetInsights, MaintenanceEntry, PotentialSavings, PriorityShip,
    Recommendation,
};
use crate::logic::resolver::SourceResolver;
use crate::logic::store::{FileBackend, SnapshotStore, StorageBackend, StorageError};
use crate::logic::types::{Currency, FleetSnapshot, FuelType, Prediction, Ship};

/// Runtime configuration, resolved from the environment by default
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub api_base_url: String,
    /// Remote voyage dataset; when unset, resolution skips straight to the
    /// bundled fallback
    pub dataset_url: Option<String>,
    pub fuel_type: FuelType,
    pub currency: Currency,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub max_predictions: usize,
    /// Overrides the platform data directory (tests point this at a tempdir)
    pub storage_dir: Option<PathBuf>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: constants::get_api_url(),
            dataset_url: constants::get_dataset_url(),
            fuel_type: FuelType::default(),
            currency: Currency::default(),
            retry_attempts: constants::RETRY_ATTEMPTS,
            retry_delay_ms: constants::RETRY_DELAY_MS,
            max_predictions: constants::get_max_predictions(),
            storage_dir: None,
        }
    }
}

impl DashboardConfig {
    fn resolve_storage_dir(&self) -> PathBuf {
        self.storage_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("biofouling-dashboard")
        })
    }
}

/// Shared dashboard state and operations
pub struct DashboardContext {
    config: DashboardConfig,
    client: ApiClient,
    store: Arc<SnapshotStore>,
    resolver: SourceResolver,
    observers: ObserverRegistry,
    snapshot: RwLock<FleetSnapshot>,
    /// Bumped on every snapshot adoption; a background refresh only lands
    /// if nothing else adopted while it ran
    generation: AtomicU64,
}

impl DashboardContext {
    pub fn new(config: DashboardConfig) -> Arc<Self> {
        let backend = Arc::new(FileBackend::new(config.resolve_storage_dir()));
        Self::with_backend(config, backend)
    }

    /// Build a context over an explicit storage backend
    pub fn with_backend(config: DashboardConfig, backend: Arc<dyn StorageBackend>) -> Arc<Self> {
        let store = Arc::new(SnapshotStore::new(backend, config.max_predictions));
        let client = ApiClient::with_retry(
            config.api_base_url.clone(),
            config.retry_attempts,
            std::time::Duration::from_millis(config.retry_delay_ms),
        );
        let resolver = SourceResolver::new(store.clone(), config.dataset_url.clone(), config.currency);

        Arc::new(Self {
            config,
            client,
            store,
            resolver,
            observers: ObserverRegistry::new(),
            snapshot: RwLock::new(FleetSnapshot::default()),
            generation: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn subscribe(&self, observer: Arc<dyn FleetObserver>) {
        self.observers.subscribe(observer);
    }

    /// Resolve the fleet snapshot. A cache hit returns immediately and
    /// refreshes in the background; a miss blocks on the resolver's
    /// remote/bundled/empty fallback chain.
    pub async fn resolve_fleet_snapshot(self: &Arc<Self>) -> FleetSnapshot {
        if let Some(cached) = self.resolver.load_cached() {
            let started_at = self.adopt_snapshot(cached.clone());
            self.observers.notify_snapshot_refreshed(&cached);

            let context = self.clone();
            tokio::spawn(async move {
                let fresh = context.resolver.refresh().await;
                context.apply_refresh(fresh, started_at);
            });

            return cached;
        }

        let started_at = self.generation.load(Ordering::SeqCst);
        let fresh = self.resolver.refresh().await;
        self.apply_refresh(fresh.clone(), started_at);
        fresh
    }

    /// Replace the live snapshot unconditionally; returns the new generation
    fn adopt_snapshot(&self, snapshot: FleetSnapshot) -> u64 {
        *self.snapshot.write() = snapshot;
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Land a refresh result only if the snapshot has not moved on since
    /// the refresh started. Stale results are dropped.
    fn apply_refresh(&self, snapshot: FleetSnapshot, started_at: u64) {
        let landed = self
            .generation
            .compare_exchange(started_at, started_at + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if !landed {
            log::debug!("Discarding stale background refresh");
            return;
        }
        *self.snapshot.write() = snapshot;
        self.observers.notify_snapshot_refreshed(&self.snapshot.read());
    }

    /// Record a prediction: append it to the persistent history, fold it
    /// into the live snapshot, and notify observers. Storage failures are
    /// surfaced, but the in-memory state updates regardless so the session
    /// keeps working.
    pub fn record_prediction(&self, prediction: Prediction) -> Result<Ship, StorageError> {
        let history_result = self.store.append_prediction(prediction.clone());

        let ship = Ship::from_prediction(&prediction);
        let snapshot = {
            let mut snapshot = self.snapshot.write();
            snapshot.predictions.push(prediction.clone());
            if snapshot.predictions.len() > self.store.max_predictions() {
                let excess = snapshot.predictions.len() - self.store.max_predictions();
                snapshot.predictions.drain(..excess);
            }
            snapshot.ships.retain(|s| s.id != ship.id);
            snapshot.ships.push(ship.clone());
            snapshot.clone()
        };
        self.generation.fetch_add(1, Ordering::SeqCst);

        let snapshot_result = self.store.save_snapshot(snapshot);
        self.observers.notify_prediction_recorded(&prediction, &ship);

        history_result?;
        snapshot_result?;
        Ok(ship)
    }

    /// Submit a voyage to the prediction service and record the result.
    /// A storage failure does not fail the submission; the prediction is
    /// still returned and held in memory.
    pub async fn submit_voyage(&self, voyage: &VoyageData) -> Result<Prediction, ClientError> {
        let prediction = self
            .client
            .predict_with_impact(voyage, voyage.main_fuel_type, self.config.currency)
            .await?;

        if let Err(e) = self.record_prediction(prediction.clone()) {
            log::warn!("Prediction for '{}' not persisted: {}", prediction.ship_id, e);
        }
        Ok(prediction)
    }

    pub fn current_snapshot(&self) -> FleetSnapshot {
        self.snapshot.read().clone()
    }

    pub fn aggregated_metrics(&self) -> AggregatedMetrics {
        metrics::aggregated_metrics(&self.snapshot.read().predictions)
    }

    pub fn fleet_insights(&self) -> FleetInsights {
        let snapshot = self.snapshot.read();
        metrics::generate_insights(&snapshot.predictions, &snapshot.ships)
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        self.fleet_insights().recommendations
    }

    pub fn top_priority_ships(&self, limit: usize) -> Vec<PriorityShip> {
        metrics::top_priority_ships(&self.snapshot.read().predictions, limit)
    }

    pub fn potential_savings(&self) -> PotentialSavings {
        metrics::potential_savings(&self.snapshot.read().predictions)
    }

    pub fn maintenance_timeline(&self) -> Vec<MaintenanceEntry> {
        metrics::maintenance_timeline(&self.snapshot.read().predictions)
    }

    pub fn level_distribution(&self) -> [usize; 4] {
        metrics::level_distribution(&self.snapshot.read().predictions)
    }

    pub fn monthly_activity(&self, year: i32) -> [u32; 12] {
        metrics::monthly_activity(&self.snapshot.read().predictions, year)
    }

    /// Drop all persisted and in-memory state
    pub fn clear_cache(&self) -> Result<(), StorageError> {
        self.store.clear()?;
        *self.snapshot.write() = FleetSnapshot::default();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.observers.notify_snapshot_refreshed(&FleetSnapshot::default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::logic::store::MemoryBackend;
    use crate::logic::types::RiskCategory;

    fn test_config() -> DashboardConfig {
        DashboardConfig {
            api_base_url: "http://127.0.0.1:1".to_string(),
            dataset_url: None,
            retry_delay_ms: 10,
            max_predictions: 5,
            ..DashboardConfig::default()
        }
    }

    fn prediction(ship_id: &str, level: u8) -> Prediction {
        Prediction {
            ship_id: ship_id.to_string(),
            biofouling_level: level,
            risk_category: RiskCategory::High,
            confidence: 0.8,
            timestamp_iso: "2024-06-01T00:00:00+00:00".to_string(),
            impact: None,
            recommended_action: "Schedule cleaning".to_string(),
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        predictions: AtomicUsize,
        snapshots: AtomicUsize,
    }

    impl FleetObserver for CountingObserver {
        fn on_prediction_recorded(&self, _p: &Prediction, _s: &Ship) {
            self.predictions.fetch_add(1, Ordering::SeqCst);
        }
        fn on_snapshot_refreshed(&self, _s: &FleetSnapshot) {
            self.snapshots.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_cold_start_resolves_bundled_data() {
        let context = DashboardContext::with_backend(test_config(), Arc::new(MemoryBackend::new()));
        let snapshot = context.resolve_fleet_snapshot().await;
        assert!(!snapshot.is_empty());
        assert_eq!(context.current_snapshot().ships.len(), snapshot.ships.len());
    }

    #[tokio::test]
    async fn test_second_resolution_serves_cache() {
        let backend = Arc::new(MemoryBackend::new());
        let first = DashboardContext::with_backend(test_config(), backend.clone());
        let warmed = first.resolve_fleet_snapshot().await;

        // a new context over the same backend starts from the cache
        let second = DashboardContext::with_backend(test_config(), backend);
        let cached = second.resolve_fleet_snapshot().await;
        assert_eq!(cached.ships.len(), warmed.ships.len());
    }

    #[tokio::test]
    async fn test_record_updates_snapshot_and_notifies() {
        let context = DashboardContext::with_backend(test_config(), Arc::new(MemoryBackend::new()));
        let observer = Arc::new(CountingObserver::default());
        context.subscribe(observer.clone());

        let ship = context.record_prediction(prediction("Atlas", 2)).unwrap();
        assert_eq!(ship.id, "Atlas");
        assert_eq!(ship.current_level, 2);
        assert_eq!(observer.predictions.load(Ordering::SeqCst), 1);

        let snapshot = context.current_snapshot();
        assert_eq!(snapshot.ships.len(), 1);
        assert_eq!(snapshot.predictions.len(), 1);
    }

    #[tokio::test]
    async fn test_repeat_predictions_upsert_ship() {
        let context = DashboardContext::with_backend(test_config(), Arc::new(MemoryBackend::new()));
        context.record_prediction(prediction("Atlas", 1)).unwrap();
        context.record_prediction(prediction("Atlas", 3)).unwrap();

        let snapshot = context.current_snapshot();
        assert_eq!(snapshot.ships.len(), 1);
        assert_eq!(snapshot.ships[0].current_level, 3);
        assert_eq!(snapshot.predictions.len(), 2);
    }

    #[tokio::test]
    async fn test_history_bound_applies_in_memory() {
        let context = DashboardContext::with_backend(test_config(), Arc::new(MemoryBackend::new()));
        for i in 0..8 {
            context.record_prediction(prediction(&format!("ship-{}", i), 1)).unwrap();
        }
        let snapshot = context.current_snapshot();
        assert_eq!(snapshot.predictions.len(), 5);
        assert_eq!(snapshot.predictions[0].ship_id, "ship-3");
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_but_memory_updates() {
        struct BrokenBackend;
        impl StorageBackend for BrokenBackend {
            fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
                Ok(None)
            }
            fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
                Err(StorageError::Io("disk gone".to_string()))
            }
            fn remove(&self, _key: &str) -> Result<(), StorageError> {
                Ok(())
            }
        }

        let context = DashboardContext::with_backend(test_config(), Arc::new(BrokenBackend));
        let result = context.record_prediction(prediction("Atlas", 2));
        assert!(matches!(result, Err(StorageError::Io(_))));
        // the session still sees the prediction
        assert_eq!(context.current_snapshot().predictions.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_cache_resets_everything() {
        let backend = Arc::new(MemoryBackend::new());
        let context = DashboardContext::with_backend(test_config(), backend.clone());
        context.record_prediction(prediction("Atlas", 2)).unwrap();
        context.clear_cache().unwrap();

        assert!(context.current_snapshot().is_empty());
        assert!(backend.read(constants::PREDICTIONS_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_metrics_follow_the_live_snapshot() {
        let context = DashboardContext::with_backend(test_config(), Arc::new(MemoryBackend::new()));
        context.record_prediction(prediction("Atlas", 3)).unwrap();
        context.record_prediction(prediction("Beacon", 0)).unwrap();

        let metrics = context.aggregated_metrics();
        assert_eq!(metrics.total_predictions, 2);
        assert_eq!(metrics.average_level, 1.5);
        assert_eq!(context.level_distribution(), [1, 0, 0, 1]);

        let timeline = context.maintenance_timeline();
        assert_eq!(timeline[0].ship_id, "Atlas");
        assert_eq!(timeline[0].days_until_cleaning, 0);
    }
}
