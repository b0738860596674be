//! Weather data models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::GpsCoordinates;

/// Number of forecast days requested from the weather provider
pub const FORECAST_DAYS: usize = 7;

/// A complete weather fetch: current conditions plus the daily forecast.
///
/// Snapshots are never patched; a refresh replaces the whole value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub location: GpsCoordinates,
    pub timezone: String,
    pub fetched_at: DateTime<Utc>,
    pub current: CurrentConditions,
    pub daily: Vec<DailyForecast>,
}

/// Current conditions at the farm location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConditions {
    pub temperature_celsius: f64,
    pub humidity_percent: f64,
    pub is_day: bool,
    pub weather_code: i32,
    pub wind_speed_kmh: f64,
}

/// Daily weather forecast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub weather_code: i32,
    pub max_temperature_celsius: f64,
    pub min_temperature_celsius: f64,
    pub uv_index_max: f64,
    pub precipitation_probability_percent: f64,
}

impl DailyForecast {
    pub fn midpoint_temperature(&self) -> f64 {
        (self.max_temperature_celsius + self.min_temperature_celsius) / 2.0
    }
}

impl WeatherSnapshot {
    /// Today's entry of the daily forecast
    pub fn today(&self) -> Option<&DailyForecast> {
        self.daily.first()
    }

    /// Mean of the daily (max + min) / 2 midpoints, 0 when the forecast is empty
    pub fn weekly_average_temperature(&self) -> f64 {
        average_midpoint_temperature(&self.daily)
    }

    pub fn condition(&self) -> WeatherCondition {
        WeatherCondition::from_code(self.current.weather_code)
    }

    pub fn background_theme(&self) -> BackgroundTheme {
        BackgroundTheme::for_conditions(self.current.weather_code, self.current.is_day)
    }
}

/// Average of per-day temperature midpoints
pub fn average_midpoint_temperature(days: &[DailyForecast]) -> f64 {
    let total: f64 = days.iter().map(DailyForecast::midpoint_temperature).sum();
    total / days.len().max(1) as f64
}

/// Coarse weather category derived from a WMO weather code
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    Fog,
    Rain,
    Snow,
    Thunderstorm,
}

impl WeatherCondition {
    pub fn from_code(code: i32) -> Self {
        match code {
            c if c <= 1 => WeatherCondition::Clear,
            c if c <= 3 => WeatherCondition::Cloudy,
            c if c <= 48 => WeatherCondition::Fog,
            c if c <= 67 => WeatherCondition::Rain,
            c if c <= 77 => WeatherCondition::Snow,
            c if c >= 95 => WeatherCondition::Thunderstorm,
            // showers (80-86) have no dedicated icon
            _ => WeatherCondition::Clear,
        }
    }
}

impl std::fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeatherCondition::Clear => write!(f, "Clear"),
            WeatherCondition::Cloudy => write!(f, "Cloudy"),
            WeatherCondition::Fog => write!(f, "Fog"),
            WeatherCondition::Rain => write!(f, "Rain"),
            WeatherCondition::Snow => write!(f, "Snow"),
            WeatherCondition::Thunderstorm => write!(f, "Thunderstorm"),
        }
    }
}

/// Page background derived from the current conditions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundTheme {
    /// No weather loaded yet
    Neutral,
    Sunny,
    ClearNight,
    Cloudy,
    CloudyNight,
    Rainy,
    Stormy,
    Sky,
}

impl BackgroundTheme {
    pub fn for_conditions(code: i32, is_day: bool) -> Self {
        match code {
            0 | 1 if is_day => BackgroundTheme::Sunny,
            0 | 1 => BackgroundTheme::ClearNight,
            2 | 3 if is_day => BackgroundTheme::Cloudy,
            2 | 3 => BackgroundTheme::CloudyNight,
            51..=67 => BackgroundTheme::Rainy,
            c if c >= 95 => BackgroundTheme::Stormy,
            _ => BackgroundTheme::Sky,
        }
    }

    pub fn for_snapshot(snapshot: Option<&WeatherSnapshot>) -> Self {
        snapshot
            .map(WeatherSnapshot::background_theme)
            .unwrap_or(BackgroundTheme::Neutral)
    }

    /// Tailwind gradient classes used by the web UI
    pub fn gradient(&self) -> &'static str {
        match self {
            BackgroundTheme::Neutral => "from-slate-400 to-gray-500",
            BackgroundTheme::Sunny => "from-amber-300 to-orange-500",
            BackgroundTheme::ClearNight => "from-slate-800 to-indigo-900",
            BackgroundTheme::Cloudy => "from-slate-400 to-gray-500",
            BackgroundTheme::CloudyNight => "from-slate-700 to-gray-800",
            BackgroundTheme::Rainy => "from-blue-400 to-indigo-600",
            BackgroundTheme::Stormy => "from-slate-600 to-slate-800",
            BackgroundTheme::Sky => "from-sky-300 to-sky-500",
        }
    }
}
