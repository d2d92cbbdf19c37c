//! Prediction Service Client
//!
//! HTTP client for the upstream biofouling prediction service, with retry
//! and typed errors. Client errors (4xx) fail immediately; server and
//! network errors retry with linear backoff. No caching at this layer.

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::types::{Currency, FuelType, Prediction};

/// Voyage parameters submitted for a prediction. Field names match the
/// upstream wire contract, including the legacy Portuguese column names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoyageData {
    #[serde(rename = "shipName")]
    pub ship_name: String,
    pub speed: f64,
    pub duration: f64,
    pub distance: f64,
    #[serde(rename = "beaufortScale")]
    pub beaufort_scale: u8,
    #[serde(rename = "Area_Molhada")]
    pub wetted_area_m2: f64,
    #[serde(rename = "MASSA_TOTAL_TON")]
    pub total_mass_tons: f64,
    #[serde(rename = "TIPO_COMBUSTIVEL_PRINCIPAL")]
    pub main_fuel_type: FuelType,
    #[serde(rename = "decLatitude")]
    pub latitude: f64,
    #[serde(rename = "decLongitude")]
    pub longitude: f64,
    #[serde(rename = "DiasDesdeUltimaLimpeza")]
    pub days_since_cleaning: f64,
}

/// Health probe response
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Batch prediction response: one prediction per submitted voyage
#[derive(Debug, Clone, Deserialize)]
pub struct BatchPredictionResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

/// Error body shape returned by the service on non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
}

/// Prediction service client errors
#[derive(Debug, Clone)]
pub enum ClientError {
    /// Caller-side input problem; raised before any network I/O, never retried
    Validation(String),
    /// Non-2xx response from the service; 4xx is never retried
    Api { status: u16, detail: String },
    /// Connection/transport failure; retried
    Network(String),
    /// Response body did not parse as expected
    Parse(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
            Self::Api { status, detail } => write!(f, "API error ({}): {}", status, detail),
            Self::Network(e) => write!(f, "Network error: {}", e),
            Self::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for ClientError {}

impl ClientError {
    /// 4xx responses indicate a malformed request; retrying cannot fix them
    fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => !(400..500).contains(status),
            Self::Validation(_) => false,
            Self::Network(_) | Self::Parse(_) => true,
        }
    }
}

/// Prediction service API client
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self::with_retry(
            base_url,
            constants::RETRY_ATTEMPTS,
            Duration::from_millis(constants::RETRY_DELAY_MS),
        )
    }

    /// Create a client with explicit retry policy (tests use short delays)
    pub fn with_retry(base_url: String, retry_attempts: u32, retry_delay: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(constants::REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url,
            http,
            retry_attempts,
            retry_delay,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check service health
    pub async fn health_check(&self) -> Result<HealthResponse, ClientError> {
        self.request(Method::GET, constants::ENDPOINT_HEALTH, None).await
    }

    /// Single voyage prediction (no impact analysis)
    pub async fn predict(&self, voyage: &VoyageData) -> Result<Prediction, ClientError> {
        self.validate_voyage_data(voyage)?;
        let body = serde_json::to_value(voyage).map_err(|e| ClientError::Parse(e.to_string()))?;
        self.request(Method::POST, constants::ENDPOINT_PREDICT, Some(body)).await
    }

    /// Prediction with fuel/cost/emissions impact analysis
    pub async fn predict_with_impact(
        &self,
        voyage: &VoyageData,
        fuel_type: FuelType,
        currency: Currency,
    ) -> Result<Prediction, ClientError> {
        self.validate_voyage_data(voyage)?;
        let endpoint = format!(
            "{}?fuel_type={}&currency={}",
            constants::ENDPOINT_PREDICT_WITH_IMPACT,
            fuel_type.as_str(),
            currency.as_str()
        );
        let body = serde_json::to_value(voyage).map_err(|e| ClientError::Parse(e.to_string()))?;
        self.request(Method::POST, &endpoint, Some(body)).await
    }

    /// Batch prediction for multiple voyages
    pub async fn predict_batch(
        &self,
        voyages: &[VoyageData],
    ) -> Result<BatchPredictionResponse, ClientError> {
        for voyage in voyages {
            self.validate_voyage_data(voyage)?;
        }
        let body = serde_json::json!({ "voyages": voyages });
        self.request(Method::POST, constants::ENDPOINT_PREDICT_BATCH, Some(body)).await
    }

    /// Validate voyage input before any network I/O
    pub fn validate_voyage_data(&self, data: &VoyageData) -> Result<(), ClientError> {
        if data.ship_name.trim().is_empty() {
            return Err(ClientError::Validation("Ship name is required".to_string()));
        }
        if !data.speed.is_finite() || !(0.0..=50.0).contains(&data.speed) {
            return Err(ClientError::Validation(
                "Speed must be between 0 and 50 knots".to_string(),
            ));
        }
        if data.beaufort_scale > 12 {
            return Err(ClientError::Validation(
                "Beaufort scale must be between 0 and 12".to_string(),
            ));
        }
        if !data.latitude.is_finite() || !(-90.0..=90.0).contains(&data.latitude) {
            return Err(ClientError::Validation(
                "Latitude must be between -90 and 90".to_string(),
            ));
        }
        if !data.longitude.is_finite() || !(-180.0..=180.0).contains(&data.longitude) {
            return Err(ClientError::Validation(
                "Longitude must be between -180 and 180".to_string(),
            ));
        }
        for (label, value) in [
            ("Duration", data.duration),
            ("Distance", data.distance),
            ("Wetted area", data.wetted_area_m2),
            ("Total mass", data.total_mass_tons),
            ("Days since last cleaning", data.days_since_cleaning),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ClientError::Validation(format!(
                    "{} must be a number greater than or equal to 0",
                    label
                )));
            }
        }
        Ok(())
    }

    /// Issue a request with the retry policy: up to `retry_attempts`
    /// attempts, waiting `attempt x retry_delay` between them. 4xx fails
    /// immediately; the last observed error is returned once attempts are
    /// exhausted.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ClientError> {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            match self.try_request(method.clone(), endpoint, body.as_ref()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    log::warn!(
                        "Request {} {} failed (attempt {}/{}): {}",
                        method,
                        endpoint,
                        attempt,
                        self.retry_attempts,
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.retry_attempts {
                        tokio::time::sleep(self.retry_delay * attempt).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ClientError::Network("no attempts made".to_string())))
    }

    async fn try_request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.detail)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(ClientError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}
