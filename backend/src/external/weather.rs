//! Weather API client for fetching weather data
//!
//! Integrates with the Open-Meteo forecast API for current conditions and a
//! seven day daily forecast, and with its geocoding API for the place name.

use std::time::Duration;

use axum::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use shared::{CurrentConditions, DailyForecast, GpsCoordinates, WeatherSnapshot, FORECAST_DAYS};

use crate::error::{AppError, AppResult};
use crate::external::WeatherSource;

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,is_day,weather_code,wind_speed_10m";
const DAILY_FIELDS: &str =
    "weather_code,temperature_2m_max,temperature_2m_min,uv_index_max,precipitation_probability_max";

/// Open-Meteo API client
#[derive(Clone)]
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
    geocoding_url: String,
}

/// Open-Meteo forecast response
#[derive(Debug, Deserialize)]
struct OMForecastResponse {
    #[serde(default)]
    timezone: String,
    current: OMCurrent,
    daily: OMDaily,
}

#[derive(Debug, Deserialize)]
struct OMCurrent {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    is_day: u8,
    weather_code: i32,
    wind_speed_10m: f64,
}

/// Daily values arrive as parallel arrays, one entry per day
#[derive(Debug, Deserialize)]
struct OMDaily {
    time: Vec<String>,
    weather_code: Vec<Option<i32>>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    uv_index_max: Vec<Option<f64>>,
    precipitation_probability_max: Vec<Option<f64>>,
}

/// Open-Meteo geocoding response
#[derive(Debug, Deserialize)]
struct OMGeocodingResponse {
    #[serde(default)]
    results: Vec<OMPlace>,
}

#[derive(Debug, Deserialize)]
struct OMPlace {
    name: Option<String>,
    admin1: Option<String>,
}

impl OpenMeteoClient {
    /// Create a new OpenMeteoClient
    pub fn new(base_url: String, geocoding_url: String, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            geocoding_url,
        })
    }

    /// Look up the nearest place name for the coordinates
    pub async fn reverse_geocode(&self, location: &GpsCoordinates) -> AppResult<Option<String>> {
        let url = format!("{}/search", self.geocoding_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", location.latitude.to_string().as_str()),
                ("longitude", location.longitude.to_string().as_str()),
                ("count", "1"),
                ("language", "en"),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| AppError::WeatherService(format!("Geocoding request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::WeatherService(format!(
                "Geocoding API error: {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::WeatherService(format!("Failed to read geocoding response: {}", e)))?;
        parse_location_name(&body)
    }

    /// Fetch current conditions and the daily forecast by GPS coordinates
    pub async fn get_forecast(&self, location: &GpsCoordinates) -> AppResult<WeatherSnapshot> {
        let url = format!("{}/forecast", self.base_url.trim_end_matches('/'));
        let forecast_days = FORECAST_DAYS.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", location.latitude.to_string().as_str()),
                ("longitude", location.longitude.to_string().as_str()),
                ("current", CURRENT_FIELDS),
                ("daily", DAILY_FIELDS),
                ("forecast_days", forecast_days.as_str()),
                ("timezone", "auto"),
            ])
            .send()
            .await
            .map_err(|e| AppError::WeatherService(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::WeatherService(format!(
                "Weather API error: {} - {}",
                status, body
            )));
        }

        let data: OMForecastResponse = response.json().await.map_err(|e| {
            AppError::WeatherService(format!("Failed to parse forecast response: {}", e))
        })?;

        convert_forecast_response(*location, data)
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn fetch_weather(&self, location: &GpsCoordinates) -> AppResult<WeatherSnapshot> {
        self.get_forecast(location).await
    }

    async fn location_name(&self, location: &GpsCoordinates) -> AppResult<Option<String>> {
        self.reverse_geocode(location).await
    }
}

/// First result's name, else its region (`admin1`)
pub fn parse_location_name(body: &str) -> AppResult<Option<String>> {
    let data: OMGeocodingResponse = serde_json::from_str(body).map_err(|e| {
        AppError::WeatherService(format!("Failed to parse geocoding response: {}", e))
    })?;

    let name = data.results.into_iter().next().and_then(|place| {
        let pick = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        pick(place.name).or_else(|| pick(place.admin1))
    });
    Ok(name)
}

/// Parse a raw Open-Meteo JSON body into a snapshot
pub fn parse_forecast(location: GpsCoordinates, body: &str) -> AppResult<WeatherSnapshot> {
    let data: OMForecastResponse = serde_json::from_str(body).map_err(|e| {
        AppError::WeatherService(format!("Failed to parse forecast response: {}", e))
    })?;
    convert_forecast_response(location, data)
}

/// Convert the columnar daily arrays into one record per day
fn convert_forecast_response(
    location: GpsCoordinates,
    data: OMForecastResponse,
) -> AppResult<WeatherSnapshot> {
    let daily = &data.daily;
    let mut days = Vec::with_capacity(daily.time.len());

    for (i, date) in daily.time.iter().enumerate() {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
            AppError::WeatherService(format!("Invalid forecast date '{}': {}", date, e))
        })?;

        let max = value_at(&daily.temperature_2m_max, i);
        let min = value_at(&daily.temperature_2m_min, i);
        let (Some(max), Some(min)) = (max, min) else {
            return Err(AppError::WeatherService(format!(
                "Forecast for {} is missing temperatures",
                date
            )));
        };

        days.push(DailyForecast {
            date,
            weather_code: value_at(&daily.weather_code, i).unwrap_or_default(),
            max_temperature_celsius: max,
            min_temperature_celsius: min,
            uv_index_max: value_at(&daily.uv_index_max, i).unwrap_or_default(),
            precipitation_probability_percent: value_at(&daily.precipitation_probability_max, i)
                .unwrap_or_default(),
        });
    }

    Ok(WeatherSnapshot {
        location,
        timezone: data.timezone,
        fetched_at: Utc::now(),
        current: CurrentConditions {
            temperature_celsius: data.current.temperature_2m,
            humidity_percent: data.current.relative_humidity_2m,
            is_day: data.current.is_day == 1,
            weather_code: data.current.weather_code,
            wind_speed_kmh: data.current.wind_speed_10m,
        },
        daily: days,
    })
}

fn value_at<T: Copy>(values: &[Option<T>], index: usize) -> Option<T> {
    values.get(index).copied().flatten()
}
