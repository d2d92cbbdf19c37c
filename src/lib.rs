//! Biofouling Fleet Dashboard - Core Data Layer
//!
//! Aggregates hull-fouling predictions for a ship fleet: fetches and
//! normalizes voyage datasets, submits voyages to the remote prediction
//! service, keeps a bounded local history, and derives the fleet metrics
//! and insights the dashboard renders.
//!
//! Hosts construct a [`DashboardContext`], resolve the initial snapshot,
//! and subscribe a [`FleetObserver`] for push updates.

pub mod api;
pub mod constants;
pub mod logic;

pub use api::context::{DashboardConfig, DashboardContext};
pub use logic::client::{ApiClient, BatchPredictionResponse, ClientError, HealthResponse, VoyageData};
pub use logic::events::FleetObserver;
pub use logic::metrics::{
    AggregatedMetrics, FleetHealth, FleetInsights, FleetProportions, FleetSummary,
    MaintenanceEntry, MaintenanceStatus, PotentialSavings, PriorityShip, Recommendation,
    RecommendationKind,
};
pub use logic::store::{FileBackend, MemoryBackend, SnapshotStore, StorageBackend, StorageError};
pub use logic::types::{
    level_description, Currency, FleetSnapshot, FuelType, ImpactAnalysis, Prediction, RawEvent,
    RiskCategory, Ship,
};
