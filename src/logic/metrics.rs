//! Fleet Metrics Engine
//!
//! Pure aggregation over predictions and the derived ship view. Nothing
//! here does I/O; every function takes slices and returns owned results
//! so callers can run them against any snapshot.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::logic::normalize::timestamp_order_key;
use crate::logic::types::{Prediction, RiskCategory, Ship};

/// Fleet-wide totals across all recorded impact analyses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub total_extra_fuel_tons: f64,
    pub total_extra_co2_tons: f64,
    pub total_cost_brl: f64,
    pub total_cost_usd: f64,
    pub total_delta_power_kw: f64,
    /// Mean biofouling level over predictions with an in-range level
    pub average_level: f64,
    pub total_predictions: usize,
    pub predictions_with_impact: usize,
}

/// Clean/maintenance/dirty split of the fleet by risk category. The three
/// percentages sum to 100 (up to float error) on a non-empty fleet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetProportions {
    pub clean_count: usize,
    pub maintenance_count: usize,
    pub dirty_count: usize,
    pub clean_percent: f64,
    pub maintenance_percent: f64,
    pub dirty_percent: f64,
}

/// Overall fleet condition derived from the proportions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FleetHealth {
    Good,
    Attention,
    Critical,
}

impl FleetHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Attention => "Attention",
            Self::Critical => "Critical",
        }
    }
}

/// A costed prediction ranked by cleaning priority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityShip {
    pub ship_id: String,
    pub level: u8,
    pub risk_category: RiskCategory,
    pub total_cost_brl: f64,
    /// Cost weighted by severity; higher means clean sooner
    pub priority_score: f64,
    /// What the risk category calls for
    pub action: String,
}

/// Recommendation categories, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationKind {
    Urgent,
    Cost,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
}

/// Fleet-level headline figures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub ship_count: usize,
    pub prediction_count: usize,
    pub average_level: f64,
}

/// Full insight block the dashboard renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetInsights {
    pub summary: FleetSummary,
    pub health: FleetHealth,
    pub proportions: FleetProportions,
    pub totals: AggregatedMetrics,
    pub priority_ships: Vec<PriorityShip>,
    pub distribution: [usize; 4],
    pub recommendations: Vec<Recommendation>,
}

/// What cleaning the fleet would claw back
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PotentialSavings {
    pub fuel_tons: f64,
    pub co2_tons: f64,
    pub cost_brl: f64,
    pub cost_usd: f64,
    pub power_kw: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaintenanceStatus {
    Urgent,
    Soon,
    Scheduled,
}

/// Suggested cleaning schedule entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceEntry {
    pub ship_id: String,
    pub level: u8,
    /// 0 means overdue
    pub days_until_cleaning: u32,
    pub status: MaintenanceStatus,
}

/// Sum impact figures and average the levels across all predictions
pub fn aggregated_metrics(predictions: &[Prediction]) -> AggregatedMetrics {
    let mut metrics = AggregatedMetrics {
        total_predictions: predictions.len(),
        ..Default::default()
    };

    let mut level_sum = 0u32;
    let mut level_count = 0usize;
    for prediction in predictions {
        if prediction.biofouling_level <= 3 {
            level_sum += prediction.biofouling_level as u32;
            level_count += 1;
        }
        if let Some(impact) = &prediction.impact {
            metrics.predictions_with_impact += 1;
            metrics.total_extra_fuel_tons += impact.extra_fuel_tons;
            metrics.total_extra_co2_tons += impact.extra_co2_tons;
            metrics.total_cost_brl += impact.total_cost_brl;
            metrics.total_cost_usd += impact.total_cost_usd;
            metrics.total_delta_power_kw += impact.delta_power_kw;
        }
    }

    if level_count > 0 {
        metrics.average_level = level_sum as f64 / level_count as f64;
    }
    metrics
}

/// Split the fleet by risk: Low is clean, Medium needs maintenance,
/// High and Critical are dirty.
pub fn fleet_proportions(ships: &[Ship]) -> FleetProportions {
    let mut proportions = FleetProportions::default();
    for ship in ships {
        match ship.risk_category {
            RiskCategory::Low => proportions.clean_count += 1,
            RiskCategory::Medium => proportions.maintenance_count += 1,
            RiskCategory::High | RiskCategory::Critical => proportions.dirty_count += 1,
        }
    }

    if !ships.is_empty() {
        let total = ships.len() as f64;
        proportions.clean_percent = proportions.clean_count as f64 / total * 100.0;
        proportions.maintenance_percent = proportions.maintenance_count as f64 / total * 100.0;
        proportions.dirty_percent = proportions.dirty_count as f64 / total * 100.0;
    }
    proportions
}

/// Fleet health ternary over the proportions
pub fn fleet_health(proportions: &FleetProportions) -> FleetHealth {
    if proportions.clean_percent >= 50.0 {
        FleetHealth::Good
    } else if proportions.dirty_percent >= 30.0 {
        FleetHealth::Attention
    } else {
        FleetHealth::Critical
    }
}

/// Count of predictions per biofouling level, indexed 0..=3.
/// Out-of-range levels are dropped, not bucketed.
pub fn level_distribution(predictions: &[Prediction]) -> [usize; 4] {
    let mut distribution = [0usize; 4];
    for prediction in predictions {
        if let Some(slot) = distribution.get_mut(prediction.biofouling_level as usize) {
            *slot += 1;
        }
    }
    distribution
}

/// Rank costed predictions by cleaning priority: cost weighted by
/// severity, descending. Predictions without an impact analysis are not
/// ranked. Equal scores keep their input order.
pub fn top_priority_ships(predictions: &[Prediction], limit: usize) -> Vec<PriorityShip> {
    let mut ranked: Vec<PriorityShip> = predictions
        .iter()
        .filter_map(|prediction| {
            let impact = prediction.impact.as_ref()?;
            Some(PriorityShip {
                ship_id: prediction.ship_id.clone(),
                level: prediction.biofouling_level,
                risk_category: prediction.risk_category,
                total_cost_brl: impact.total_cost_brl,
                priority_score: impact.total_cost_brl
                    * (prediction.biofouling_level as f64 + 1.0),
                action: action_for_risk(prediction.risk_category).to_string(),
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.priority_score
            .partial_cmp(&a.priority_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(limit);
    ranked
}

/// Operator recommendations. The rules fire independently and the output
/// keeps evaluation order. Empty when the fleet needs nothing.
pub fn generate_recommendations(
    metrics: &AggregatedMetrics,
    proportions: &FleetProportions,
    priority: &[PriorityShip],
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if proportions.dirty_percent > 30.0 {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Urgent,
            message: format!(
                "{:.0}% of the fleet has significant biofouling. Consider scheduling hull cleaning for multiple ships.",
                proportions.dirty_percent
            ),
        });
    }
    if metrics.total_cost_brl > 100_000.0 {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Cost,
            message: format!(
                "Accumulated biofouling cost exceeds R$ {:.0}. Cleaning now likely pays for itself.",
                metrics.total_cost_brl
            ),
        });
    }
    if let Some(top) = priority.first() {
        if top.risk_category == RiskCategory::Critical {
            recommendations.push(Recommendation {
                kind: RecommendationKind::Critical,
                message: format!(
                    "{} is at critical risk and should be cleaned immediately.",
                    top.ship_id
                ),
            });
        }
    }

    recommendations
}

/// Action wording per risk category
pub fn action_for_risk(risk: RiskCategory) -> &'static str {
    match risk {
        RiskCategory::Critical => "Immediate cleaning",
        RiskCategory::High => "Cleaning within 1 month",
        RiskCategory::Medium => "Inspection within 3 months",
        RiskCategory::Low => "Monitoring",
    }
}

/// The full insight block: summary, health, totals, top three priority
/// ships with their actions, distribution, and recommendations.
pub fn generate_insights(predictions: &[Prediction], ships: &[Ship]) -> FleetInsights {
    let totals = aggregated_metrics(predictions);
    let proportions = fleet_proportions(ships);
    let priority_ships = top_priority_ships(predictions, 3);
    let recommendations = generate_recommendations(&totals, &proportions, &priority_ships);

    FleetInsights {
        summary: FleetSummary {
            ship_count: ships.len(),
            prediction_count: predictions.len(),
            average_level: totals.average_level,
        },
        health: fleet_health(&proportions),
        proportions,
        distribution: level_distribution(predictions),
        priority_ships,
        recommendations,
        totals,
    }
}

/// Everything cleaning the fleet would recover: the accumulated extra
/// fuel, emissions, cost, and engine load across costed predictions.
pub fn potential_savings(predictions: &[Prediction]) -> PotentialSavings {
    predictions
        .iter()
        .filter_map(|p| p.impact.as_ref())
        .fold(PotentialSavings::default(), |mut savings, impact| {
            savings.fuel_tons += impact.extra_fuel_tons;
            savings.co2_tons += impact.extra_co2_tons;
            savings.cost_brl += impact.total_cost_brl;
            savings.cost_usd += impact.total_cost_usd;
            savings.power_kw += impact.delta_power_kw;
            savings
        })
}

/// Days until the next recommended cleaning, per level: clean hulls get a
/// 180-day horizon, light fouling 90, moderate 30, heavy is overdue.
pub fn maintenance_interval_days(level: u8) -> u32 {
    match level {
        0 => 180,
        1 => 90,
        2 => 30,
        _ => 0,
    }
}

fn maintenance_status(days: u32) -> MaintenanceStatus {
    match days {
        0 => MaintenanceStatus::Urgent,
        1..=30 => MaintenanceStatus::Soon,
        _ => MaintenanceStatus::Scheduled,
    }
}

/// Cleaning schedule from each ship's latest prediction, most urgent first
pub fn maintenance_timeline(predictions: &[Prediction]) -> Vec<MaintenanceEntry> {
    let mut latest: Vec<&Prediction> = Vec::new();
    for prediction in predictions {
        let at = timestamp_order_key(&prediction.timestamp_iso);
        match latest.iter_mut().find(|p| p.ship_id == prediction.ship_id) {
            Some(entry) if at >= timestamp_order_key(&entry.timestamp_iso) => *entry = prediction,
            Some(_) => {}
            None => latest.push(prediction),
        }
    }

    let mut timeline: Vec<MaintenanceEntry> = latest
        .into_iter()
        .map(|prediction| {
            let days = maintenance_interval_days(prediction.biofouling_level);
            MaintenanceEntry {
                ship_id: prediction.ship_id.clone(),
                level: prediction.biofouling_level,
                days_until_cleaning: days,
                status: maintenance_status(days),
            }
        })
        .collect();
    timeline.sort_by_key(|entry| entry.days_until_cleaning);
    timeline
}

/// Prediction counts per calendar month of the given year (index 0 =
/// January), for the activity chart
pub fn monthly_activity(predictions: &[Prediction], year: i32) -> [u32; 12] {
    let mut activity = [0u32; 12];
    for prediction in predictions {
        let at = timestamp_order_key(&prediction.timestamp_iso);
        if at.year() == year {
            activity[at.month0() as usize] += 1;
        }
    }
    activity
}
