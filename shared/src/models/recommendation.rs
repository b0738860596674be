//! AI crop recommendation models

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::sensor::SensorReading;
use crate::models::weather::WeatherSnapshot;
use crate::types::GpsCoordinates;

/// Number of crops the model must return per batch
pub const RECOMMENDATION_BATCH_SIZE: usize = 10;

/// One ranked crop suggestion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CropRecommendation {
    #[validate(length(min = 1, message = "crop name must not be empty"))]
    pub crop_name: String,

    #[validate(range(min = 0, max = 100, message = "suitability score must be 0-100"))]
    pub suitability_score: i32,

    pub rationale: String,

    pub growing_season: String,

    pub difficulty: Difficulty,

    #[validate]
    pub comparison_metrics: ComparisonMetrics,
}

/// Relative ratings from 1 (low) to 10 (high)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonMetrics {
    #[serde(alias = "Water Need")]
    #[validate(range(min = 1, max = 10, message = "water need must be 1-10"))]
    pub water_need: i32,

    #[serde(alias = "Market Value")]
    #[validate(range(min = 1, max = 10, message = "market value must be 1-10"))]
    pub market_value: i32,

    #[serde(alias = "Pest Resistance")]
    #[validate(range(min = 1, max = 10, message = "pest resistance must be 1-10"))]
    pub pest_resistance: i32,
}

/// How hard the crop is to grow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "Easy"),
            Difficulty::Moderate => write!(f, "Moderate"),
            Difficulty::Hard => write!(f, "Hard"),
        }
    }
}

/// Inputs sent to the recommendation model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub average_temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub light_intensity: f64,
}

impl RecommendationRequest {
    /// Combine the forecast average with the latest field reading
    pub fn from_conditions(
        location: &GpsCoordinates,
        weather: &WeatherSnapshot,
        reading: &SensorReading,
    ) -> Self {
        Self {
            latitude: location.latitude_f64(),
            longitude: location.longitude_f64(),
            average_temperature: weather.weekly_average_temperature(),
            humidity: reading.humidity,
            soil_moisture: reading.soil_moisture,
            light_intensity: reading.light_intensity,
        }
    }
}
