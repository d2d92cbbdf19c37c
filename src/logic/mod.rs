//! Core data-layer logic: upstream client, normalization, metrics,
//! bounded persistence, and source resolution.

pub mod client;
pub mod dataset;
pub mod events;
pub mod metrics;
pub mod normalize;
pub mod resolver;
pub mod store;
pub mod types;
