//! Core Data Model
//!
//! Raw upstream records, the canonical prediction shape, and the derived
//! fleet views. Raw events are ephemeral (they exist only during
//! ingestion); predictions are immutable once created; ships are a mutable
//! derived view keyed by ship id.

use serde::{Deserialize, Serialize};

/// Session identifier attached to a raw event. Upstream data carries these
/// as either numbers or strings depending on the export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Raw analysis event as delivered by the upstream service or the static
/// dataset file. External, untrusted shape: every field may be absent and
/// numeric fields may be out of range. Read-only to the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "shipName", default)]
    pub ship_name: Option<String>,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,
    #[serde(rename = "startGMTDate", default)]
    pub start_gmt_date: Option<String>,
    #[serde(rename = "Biofouling_Level", default)]
    pub biofouling_level: Option<f64>,
    #[serde(rename = "Risk_Category", default)]
    pub risk_category: Option<String>,
    #[serde(rename = "Confidence", default)]
    pub confidence: Option<f64>,
    #[serde(rename = "Action", default)]
    pub action: Option<String>,
    #[serde(rename = "Extra_Fuel_Tons", default)]
    pub extra_fuel_tons: Option<f64>,
    #[serde(rename = "Extra_CO2_Tons", default)]
    pub extra_co2_tons: Option<f64>,
    #[serde(rename = "Power_Increase_Percent", default)]
    pub power_increase_percent: Option<f64>,
    #[serde(rename = "Total_Cost_BRL", default)]
    pub total_cost_brl: Option<f64>,
    #[serde(rename = "Total_Cost_USD", default)]
    pub total_cost_usd: Option<f64>,
}

/// Risk classification correlated with biofouling level and cost impact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RiskCategory {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskCategory {
    /// Parse an upstream category string; unknown values fall back to Low
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Low" => Self::Low,
            "Medium" => Self::Medium,
            "High" => Self::High,
            "Critical" => Self::Critical,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

/// ISO currency codes accepted by the prediction service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Brl,
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brl => "BRL",
            Self::Usd => "USD",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Brl => "R$",
            Self::Usd => "US$",
        }
    }
}

/// Industry fuel types accepted by the prediction service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FuelType {
    #[default]
    Lshfo,
    Ulsmgo,
    Lsmgo,
    Vlshfo,
    Vlsfo,
    Mgo,
    Hfo,
    Lng,
}

impl FuelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lshfo => "LSHFO",
            Self::Ulsmgo => "ULSMGO",
            Self::Lsmgo => "LSMGO",
            Self::Vlshfo => "VLSHFO",
            Self::Vlsfo => "VLSFO",
            Self::Mgo => "MGO",
            Self::Hfo => "HFO",
            Self::Lng => "LNG",
        }
    }
}

/// Cost/fuel/emissions delta attributable to fouling for a voyage.
/// All magnitudes are clamped to >= 0 during normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    #[serde(default)]
    pub extra_fuel_tons: f64,
    #[serde(default)]
    pub extra_co2_tons: f64,
    #[serde(default)]
    pub delta_power_kw: f64,
    #[serde(default)]
    pub total_cost_brl: f64,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub preferred_currency: Currency,
    /// True when delta_power_kw was backed out of a percentage using the
    /// assumed base power rather than reported by the service
    #[serde(default)]
    pub power_estimated: bool,
}

/// Canonical prediction record. Immutable after creation; appended to the
/// snapshot and evicted oldest-first once the bound is exceeded.
///
/// Deserialization accepts the upstream wire names (`confidence_score`,
/// `timestamp`, `impact_analysis`) so a live service response parses
/// directly into this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub ship_id: String,
    /// Always one of {0,1,2,3}; invalid input is coerced to 0
    pub biofouling_level: u8,
    pub risk_category: RiskCategory,
    #[serde(alias = "confidence_score")]
    pub confidence: f64,
    #[serde(alias = "timestamp")]
    pub timestamp_iso: String,
    #[serde(alias = "impact_analysis", default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<ImpactAnalysis>,
    #[serde(default)]
    pub recommended_action: String,
}

/// Derived per-vessel view. One entry per unique ship id; level and risk
/// are updated in place whenever a newer prediction arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    pub id: String,
    pub name: String,
    pub current_level: u8,
    pub risk_category: RiskCategory,
    #[serde(default = "Ship::default_location")]
    pub location: String,
}

impl Ship {
    pub fn default_location() -> String {
        "In transit".to_string()
    }

    /// Build the derived view for a prediction
    pub fn from_prediction(prediction: &Prediction) -> Self {
        Self {
            id: prediction.ship_id.clone(),
            name: prediction.ship_id.clone(),
            current_level: prediction.biofouling_level,
            risk_category: prediction.risk_category,
            location: Self::default_location(),
        }
    }
}

/// Complete bounded, persisted fleet state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    #[serde(default)]
    pub ships: Vec<Ship>,
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

impl FleetSnapshot {
    pub fn is_empty(&self) -> bool {
        self.ships.is_empty() && self.predictions.is_empty()
    }
}

/// Fixed severity descriptions for levels 0-3
pub fn level_description(level: u8) -> &'static str {
    match level {
        0 => "Hydraulically smooth",
        1 => "Light slime / biofilm",
        2 => "Medium calcareous fouling",
        3 => "Heavy calcareous fouling",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_event_parses_upstream_field_names() {
        let json = r#"{
            "shipName": "Atlas",
            "sessionId": 7,
            "startGMTDate": "2024-03-01 10:00:00",
            "Biofouling_Level": 2,
            "Risk_Category": "High",
            "Confidence": 0.87,
            "Action": "Schedule cleaning",
            "Extra_Fuel_Tons": 12.5,
            "Extra_CO2_Tons": 38.9,
            "Power_Increase_Percent": 11.0,
            "Total_Cost_BRL": 45000.0,
            "Total_Cost_USD": 9000.0
        }"#;
        let event: RawEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.ship_name.as_deref(), Some("Atlas"));
        assert_eq!(event.session_id, Some(SessionId::Number(7)));
        assert_eq!(event.biofouling_level, Some(2.0));
        assert_eq!(event.total_cost_brl, Some(45000.0));
    }

    #[test]
    fn test_raw_event_tolerates_missing_fields() {
        let event: RawEvent = serde_json::from_str(r#"{"shipName": "Atlas"}"#).unwrap();
        assert!(event.confidence.is_none());
        assert!(event.session_id.is_none());
    }

    #[test]
    fn test_prediction_parses_wire_aliases() {
        let json = r#"{
            "ship_id": "Atlas",
            "biofouling_level": 1,
            "risk_category": "Medium",
            "confidence_score": 0.91,
            "timestamp": "2024-05-01T00:00:00+00:00",
            "recommended_action": "Inspect within 3 months",
            "impact_analysis": {
                "extra_fuel_tons": 3.2,
                "extra_co2_tons": 10.0,
                "delta_power_kw": 400.0,
                "total_cost_brl": 12000.0,
                "total_cost_usd": 2400.0
            }
        }"#;
        let prediction: Prediction = serde_json::from_str(json).unwrap();
        assert_eq!(prediction.confidence, 0.91);
        assert_eq!(prediction.timestamp_iso, "2024-05-01T00:00:00+00:00");
        let impact = prediction.impact.unwrap();
        assert_eq!(impact.total_cost_brl, 12000.0);
        assert_eq!(impact.preferred_currency, Currency::Brl);
        assert!(!impact.power_estimated);
    }

    #[test]
    fn test_risk_category_parse_fallback() {
        assert_eq!(RiskCategory::parse("Critical"), RiskCategory::Critical);
        assert_eq!(RiskCategory::parse("nonsense"), RiskCategory::Low);
    }

    #[test]
    fn test_currency_serde_codes() {
        assert_eq!(serde_json::to_string(&Currency::Usd).unwrap(), "\"USD\"");
        let c: Currency = serde_json::from_str("\"BRL\"").unwrap();
        assert_eq!(c, Currency::Brl);
    }

    #[test]
    fn test_fuel_type_codes() {
        assert_eq!(FuelType::Vlsfo.as_str(), "VLSFO");
        let f: FuelType = serde_json::from_str("\"LNG\"").unwrap();
        assert_eq!(f, FuelType::Lng);
    }
}
