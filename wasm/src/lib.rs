//! WebAssembly module for the AgriSuggest dashboard
//!
//! Provides client-side computation for:
//! - Alert evaluation against weather and sensor data
//! - Weekly temperature averages and weather categories
//! - Background themes and soil moisture bands
//! - Recommendation batch validation

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

fn parse_json<T: serde::de::DeserializeOwned>(label: &str, json: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("Invalid {} JSON: {}", label, e)))
}

/// Evaluate the alert rules; `history_json` is ordered oldest first.
///
/// Returns the alerts as a JSON array.
#[wasm_bindgen]
pub fn evaluate_dashboard_alerts(
    latest_json: &str,
    weather_json: &str,
    history_json: &str,
) -> Result<String, JsValue> {
    let latest: Option<SensorReading> = parse_json("reading", latest_json)?;
    let weather: Option<WeatherSnapshot> = parse_json("weather", weather_json)?;
    let history: Vec<SensorReading> = parse_json("history", history_json)?;

    let alerts = evaluate_alerts(latest.as_ref(), weather.as_ref(), &history);
    serde_json::to_string(&alerts).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Average of the daily temperature midpoints
#[wasm_bindgen]
pub fn weekly_average_temperature(weather_json: &str) -> Result<f64, JsValue> {
    let weather: WeatherSnapshot = parse_json("weather", weather_json)?;
    Ok(weather.weekly_average_temperature())
}

/// Tailwind gradient for the current conditions
#[wasm_bindgen]
pub fn background_gradient(weather_code: i32, is_day: bool) -> String {
    BackgroundTheme::for_conditions(weather_code, is_day)
        .gradient()
        .to_string()
}

/// Weather category for a WMO code
#[wasm_bindgen]
pub fn weather_condition(weather_code: i32) -> String {
    format!("{}", WeatherCondition::from_code(weather_code))
}

/// Soil moisture band for the gauge color
#[wasm_bindgen]
pub fn soil_moisture_level(percent: f64) -> String {
    let level = SoilMoistureLevel::from_percent(percent);
    format!("{:?}", level)
}

#[wasm_bindgen]
pub fn coordinate_label(latitude: f64, longitude: f64) -> Result<String, JsValue> {
    let to_decimal = |value: f64| {
        Decimal::try_from(value).map_err(|_| JsValue::from_str("Coordinate is not a finite number"))
    };
    let coordinates = GpsCoordinates::new(to_decimal(latitude)?, to_decimal(longitude)?);
    validate_coordinates(&coordinates).map_err(JsValue::from_str)?;
    Ok(coordinates.label())
}

/// Check a model response before rendering it
#[wasm_bindgen]
pub fn is_valid_recommendation_batch(batch_json: &str) -> bool {
    serde_json::from_str::<Vec<CropRecommendation>>(batch_json)
        .map(|batch| validate_recommendation_batch(&batch).is_ok())
        .unwrap_or(false)
}
