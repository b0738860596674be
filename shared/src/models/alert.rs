//! Proactive farm alerts derived from the latest weather and sensor data

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::sensor::SensorReading;
use crate::models::weather::WeatherSnapshot;

/// Forecast max temperature above which heat stress is flagged (°C)
pub const HEAT_STRESS_MAX_TEMP: f64 = 38.0;
/// Current wind speed above which a wind alert is raised (km/h)
pub const HIGH_WIND_SPEED: f64 = 25.0;
/// Today's precipitation probability above which heavy rain is expected (%)
pub const HEAVY_RAIN_PROBABILITY: f64 = 80.0;
/// Current soil moisture below this share of the recent mean counts as rapid dehydration
pub const SOIL_DROP_RATIO: f64 = 0.8;
/// History points needed before the dehydration rule applies
pub const SOIL_DROP_MIN_HISTORY: usize = 5;

/// Stable alert identifier, one per rule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HeatStress,
    HighWind,
    HeavyRain,
    SoilMoistureDrop,
}

impl AlertKind {
    pub fn id(&self) -> &'static str {
        match self {
            AlertKind::HeatStress => "heat_stress",
            AlertKind::HighWind => "high_wind",
            AlertKind::HeavyRain => "heavy_rain",
            AlertKind::SoilMoistureDrop => "soil_moisture_drop",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "heat_stress" => Some(AlertKind::HeatStress),
            "high_wind" => Some(AlertKind::HighWind),
            "heavy_rain" => Some(AlertKind::HeavyRain),
            "soil_moisture_drop" => Some(AlertKind::SoilMoistureDrop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Danger,
}

/// An advisory shown above the dashboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: AlertKind,
    #[serde(rename = "type")]
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
}

/// Evaluate every alert rule against the current inputs.
///
/// Nothing is produced until both weather and a latest reading exist.
/// `history` is ordered oldest first.
pub fn evaluate_alerts(
    latest: Option<&SensorReading>,
    weather: Option<&WeatherSnapshot>,
    history: &[SensorReading],
) -> Vec<Alert> {
    let (Some(latest), Some(weather)) = (latest, weather) else {
        return Vec::new();
    };

    let mut alerts = Vec::new();
    let today = weather.today();

    if let Some(today) = today.filter(|d| d.max_temperature_celsius > HEAT_STRESS_MAX_TEMP) {
        alerts.push(Alert {
            id: AlertKind::HeatStress,
            severity: AlertSeverity::Warning,
            title: "Heat Stress Warning".to_string(),
            message: format!(
                "High temperatures up to {:.1}°C are expected today. Ensure crops are adequately watered to prevent dehydration.",
                today.max_temperature_celsius
            ),
        });
    }

    let wind = weather.current.wind_speed_kmh;
    if wind > HIGH_WIND_SPEED {
        alerts.push(Alert {
            id: AlertKind::HighWind,
            severity: AlertSeverity::Warning,
            title: "High Wind Alert".to_string(),
            message: format!(
                "Strong winds of {:.1} km/h detected. Check on young plants and support structures.",
                wind
            ),
        });
    }

    if let Some(today) = today.filter(|d| d.precipitation_probability_percent > HEAVY_RAIN_PROBABILITY) {
        alerts.push(Alert {
            id: AlertKind::HeavyRain,
            severity: AlertSeverity::Info,
            title: "Heavy Rain Forecast".to_string(),
            message: format!(
                "There's a {:.0}% probability of heavy rain today. Ensure proper drainage.",
                today.precipitation_probability_percent
            ),
        });
    }

    if is_rapid_soil_drop(latest.soil_moisture, history) {
        alerts.push(Alert {
            id: AlertKind::SoilMoistureDrop,
            severity: AlertSeverity::Danger,
            title: "Rapid Soil Dehydration".to_string(),
            message: "Soil moisture has dropped significantly compared to recent levels. Immediate irrigation may be required.".to_string(),
        });
    }

    alerts
}

/// Compare the current soil moisture to the mean of the four readings before the newest one
pub fn is_rapid_soil_drop(current: f64, history: &[SensorReading]) -> bool {
    if history.len() < SOIL_DROP_MIN_HISTORY {
        return false;
    }
    let end = history.len() - 1;
    let previous = &history[end - 4..end];
    let mean = previous.iter().map(|r| r.soil_moisture).sum::<f64>() / previous.len() as f64;
    current < mean * SOIL_DROP_RATIO
}

/// Active alerts plus the ids the user has dismissed.
///
/// Dismissals only last until the next recompute: a fresh evaluation clears
/// them, so a still-firing rule shows its alert again.
#[derive(Debug, Clone, Default)]
pub struct AlertBoard {
    active: Vec<Alert>,
    dismissed: HashSet<AlertKind>,
    evaluations: u64,
}

impl AlertBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active set with a fresh evaluation
    pub fn recompute(&mut self, alerts: Vec<Alert>) {
        self.active = alerts;
        self.dismissed.clear();
        self.evaluations += 1;
    }

    /// Hide an active alert; returns `false` if no such alert is showing
    pub fn dismiss(&mut self, id: AlertKind) -> bool {
        if !self.active.iter().any(|a| a.id == id) {
            return false;
        }
        self.dismissed.insert(id)
    }

    pub fn visible(&self) -> Vec<Alert> {
        self.active
            .iter()
            .filter(|a| !self.dismissed.contains(&a.id))
            .cloned()
            .collect()
    }

    pub fn active(&self) -> &[Alert] {
        &self.active
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }
}
