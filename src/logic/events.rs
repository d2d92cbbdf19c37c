//! Fleet Events
//!
//! Observer fan-out for snapshot changes. Hosts subscribe to push updates
//! into their UI layer; observers with no interest in an event keep the
//! default no-op.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::logic::types::{FleetSnapshot, Prediction, Ship};

/// Callbacks fired when the fleet state changes
pub trait FleetObserver: Send + Sync {
    /// A single new prediction was recorded, with the ship's updated view
    fn on_prediction_recorded(&self, _prediction: &Prediction, _ship: &Ship) {}

    /// The whole snapshot was replaced (cache load or remote refresh)
    fn on_snapshot_refreshed(&self, _snapshot: &FleetSnapshot) {}
}

/// Subscriber registry; notification order follows subscription order
#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<Vec<Arc<dyn FleetObserver>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn FleetObserver>) {
        self.observers.write().push(observer);
    }

    pub fn notify_prediction_recorded(&self, prediction: &Prediction, ship: &Ship) {
        for observer in self.observers.read().iter() {
            observer.on_prediction_recorded(prediction, ship);
        }
    }

    pub fn notify_snapshot_refreshed(&self, snapshot: &FleetSnapshot) {
        for observer in self.observers.read().iter() {
            observer.on_snapshot_refreshed(snapshot);
        }
    }
}
