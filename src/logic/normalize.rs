//! Record Normalization
//!
//! Turns raw dataset events into well-formed predictions. Upstream data is
//! hand-curated and messy: missing fields, mixed timestamp formats, session
//! columns that sometimes hold numbers and sometimes strings. Everything is
//! coerced to a safe value rather than rejected; a partially bad record
//! still renders.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::constants::ASSUMED_BASE_POWER_KW;
use crate::logic::types::{
    Currency, ImpactAnalysis, Prediction, RawEvent, RiskCategory, Ship,
};

/// Disambiguate ship identity only when every event carries the same name
/// but more than one session id. Datasets where names already differ keep
/// the plain name as the id.
fn should_disambiguate(events: &[RawEvent]) -> bool {
    let mut names: Vec<&str> = Vec::new();
    let mut sessions: Vec<String> = Vec::new();

    for event in events {
        if let Some(name) = event.ship_name.as_deref() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        if let Some(session) = &event.session_id {
            let key = session.to_string();
            if !sessions.contains(&key) {
                sessions.push(key);
            }
        }
    }

    names.len() == 1 && sessions.len() > 1
}

/// Coerce a raw level value into 0..=3. Anything non-finite, negative, or
/// above 3 becomes 0 (clean) rather than an error.
pub fn coerce_level(raw: Option<f64>) -> u8 {
    match raw {
        Some(v) if v.is_finite() && (0.0..=3.0).contains(&v) => v.round() as u8,
        _ => 0,
    }
}

/// Clamp a confidence score into [0, 1]; missing or non-finite becomes 0
pub fn coerce_confidence(raw: Option<f64>) -> f64 {
    match raw {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Non-negative finite magnitude; anything else becomes 0
fn sanitize_magnitude(raw: Option<f64>) -> f64 {
    match raw {
        Some(v) if v.is_finite() => v.max(0.0),
        _ => 0.0,
    }
}

/// Parse the timestamp formats seen in the field data. Unparseable or
/// missing values fall back to the current time so the record still sorts.
pub fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return Utc::now();
    };
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Utc.from_utc_datetime(&naive);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    }

    log::warn!("Unparseable timestamp '{}', substituting current time", raw);
    Utc::now()
}

/// Timestamp for ordering already-normalized predictions. Bad values sort
/// first (epoch) instead of being dropped.
pub fn timestamp_order_key(iso: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(iso)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Build the impact analysis for an event, if it carries any impact field.
/// Extra power is backed out of the percentage increase against an assumed
/// base engine load when no absolute figure exists.
fn build_impact(event: &RawEvent, currency: Currency) -> Option<ImpactAnalysis> {
    let has_impact = event.extra_fuel_tons.is_some()
        || event.extra_co2_tons.is_some()
        || event.power_increase_percent.is_some()
        || event.total_cost_brl.is_some()
        || event.total_cost_usd.is_some();
    if !has_impact {
        return None;
    }

    let power_estimated = event.power_increase_percent.is_some();
    let delta_power_kw = event
        .power_increase_percent
        .filter(|p| p.is_finite())
        .map(|p| (p / 100.0 * ASSUMED_BASE_POWER_KW).round().max(0.0))
        .unwrap_or(0.0);

    Some(ImpactAnalysis {
        extra_fuel_tons: sanitize_magnitude(event.extra_fuel_tons),
        extra_co2_tons: sanitize_magnitude(event.extra_co2_tons),
        delta_power_kw,
        total_cost_brl: sanitize_magnitude(event.total_cost_brl),
        total_cost_usd: sanitize_magnitude(event.total_cost_usd),
        preferred_currency: currency,
        power_estimated,
    })
}

/// Normalize a batch of raw events into predictions
pub fn normalize_events(events: &[RawEvent], currency: Currency) -> Vec<Prediction> {
    let disambiguate = should_disambiguate(events);

    events
        .iter()
        .map(|event| {
            let name = event
                .ship_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or("Unknown Ship");

            let ship_id = match (&event.session_id, disambiguate) {
                (Some(session), true) => format!("{} ({})", name, session),
                _ => name.to_string(),
            };

            Prediction {
                ship_id,
                biofouling_level: coerce_level(event.biofouling_level),
                risk_category: event
                    .risk_category
                    .as_deref()
                    .map(RiskCategory::parse)
                    .unwrap_or_default(),
                confidence: coerce_confidence(event.confidence),
                timestamp_iso: parse_timestamp(event.start_gmt_date.as_deref()).to_rfc3339(),
                impact: build_impact(event, currency),
                recommended_action: event.action.clone().unwrap_or_default(),
            }
        })
        .collect()
}

/// Collapse a prediction history into one ship entry per id, keeping the
/// latest state per ship. On equal timestamps the later record wins.
pub fn ships_from_predictions(predictions: &[Prediction]) -> Vec<Ship> {
    let mut ships: Vec<(DateTime<Utc>, Ship)> = Vec::new();

    for prediction in predictions {
        let at = timestamp_order_key(&prediction.timestamp_iso);
        let ship = Ship::from_prediction(prediction);
        match ships.iter_mut().find(|(_, s)| s.id == ship.id) {
            Some(entry) if at >= entry.0 => *entry = (at, ship),
            Some(_) => {}
            None => ships.push((at, ship)),
        }
    }

    ships.into_iter().map(|(_, ship)| ship).collect()
}
