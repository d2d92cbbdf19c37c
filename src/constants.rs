//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! To change the default API server or storage limits, only edit this file.

/// Default prediction service URL
///
/// This is the fallback URL when no environment variable is set.
/// Production deployments override it via BIOFOULING_API_URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Maximum predictions retained in persistent storage
pub const MAX_PREDICTIONS: usize = 100;

/// HTTP retry attempts for the prediction service
pub const RETRY_ATTEMPTS: u32 = 3;

/// Base retry delay (milliseconds); attempt N waits N x this value
pub const RETRY_DELAY_MS: u64 = 1000;

/// HTTP request timeout (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Assumed base shaft power (kW) used to back out an absolute power delta
/// from a percentage increase when the upstream record carries only the
/// percentage. This is an approximation, not measured data; predictions
/// whose delta was derived this way carry `power_estimated = true`.
pub const ASSUMED_BASE_POWER_KW: f64 = 8000.0;

/// Storage quota recovery: maximum reduction rounds before giving up
pub const QUOTA_RETRY_ROUNDS: u32 = 3;

/// Storage quota recovery: fraction of oldest entries dropped per round
pub const QUOTA_DROP_FRACTION: f64 = 0.25;

/// Persistent storage key for the raw prediction list
pub const PREDICTIONS_KEY: &str = "biofouling_predictions";

/// Persistent storage key for the full dashboard snapshot
pub const DASHBOARD_KEY: &str = "biofouling_dashboard_data";

// ============================================
// API endpoints
// ============================================

pub const ENDPOINT_HEALTH: &str = "/health";
pub const ENDPOINT_PREDICT: &str = "/api/v1/predict";
pub const ENDPOINT_PREDICT_WITH_IMPACT: &str = "/api/v1/predict/with-impact";
pub const ENDPOINT_PREDICT_BATCH: &str = "/api/v1/predict/batch";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get prediction service URL from environment or use default
pub fn get_api_url() -> String {
    std::env::var("BIOFOULING_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string())
}

/// Get the static dataset URL from environment, if configured
pub fn get_dataset_url() -> Option<String> {
    std::env::var("BIOFOULING_DATASET_URL").ok().filter(|s| !s.is_empty())
}

/// Get the prediction cap from environment or use default
pub fn get_max_predictions() -> usize {
    std::env::var("BIOFOULING_MAX_PREDICTIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(MAX_PREDICTIONS)
}
