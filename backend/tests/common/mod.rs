//! In-memory adapters and fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agrisuggest_backend::error::{AppError, AppResult};
use agrisuggest_backend::external::{
    ChatModel, RecommendationSource, SensorSource, TextChunkStream, WeatherSource,
};
use agrisuggest_backend::services::{RefreshController, RefreshSettings};
use axum::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use shared::{
    ChatMessage, ComparisonMetrics, CropRecommendation, CurrentConditions, DailyForecast,
    DeviceLocation, Difficulty, GpsCoordinates, RecommendationRequest, SensorReading,
    WeatherSnapshot,
};

// ============================================================================
// Fixtures
// ============================================================================

pub fn ropar() -> GpsCoordinates {
    GpsCoordinates::new(Decimal::new(308963, 4), Decimal::new(765413, 4))
}

pub fn location() -> DeviceLocation {
    DeviceLocation::new(ropar(), Some("IIT Ropar".to_string()))
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 6, 8, 0, 0).unwrap()
}

pub fn reading_at(minute: i64, soil: f64) -> SensorReading {
    SensorReading {
        timestamp: base_time() + ChronoDuration::minutes(minute),
        device_id: Some("esp32-field-1".to_string()),
        temperature: 26.0,
        humidity: 55.0,
        light_intensity: 820.0,
        soil_moisture: soil,
    }
}

/// Seven day forecast; today's values come from the arguments
pub fn weather(today_max: f64, wind_kmh: f64, rain_probability: f64) -> WeatherSnapshot {
    let start = NaiveDate::from_ymd_opt(2025, 11, 6).unwrap();
    let daily = (0..7)
        .map(|i| DailyForecast {
            date: start + ChronoDuration::days(i),
            weather_code: if i == 0 { 1 } else { 3 },
            max_temperature_celsius: if i == 0 { today_max } else { 30.0 },
            min_temperature_celsius: 20.0,
            uv_index_max: 5.0,
            precipitation_probability_percent: if i == 0 { rain_probability } else { 10.0 },
        })
        .collect();

    WeatherSnapshot {
        location: ropar(),
        timezone: "Asia/Kolkata".to_string(),
        fetched_at: base_time(),
        current: CurrentConditions {
            temperature_celsius: 27.0,
            humidity_percent: 50.0,
            is_day: true,
            weather_code: 1,
            wind_speed_kmh: wind_kmh,
        },
        daily,
    }
}

pub fn calm_weather() -> WeatherSnapshot {
    weather(30.0, 8.0, 10.0)
}

pub fn crop(rank: usize, name: &str) -> CropRecommendation {
    CropRecommendation {
        crop_name: name.to_string(),
        suitability_score: 95 - rank as i32 * 5,
        rationale: format!("{} suits the current conditions.", name),
        growing_season: "Rabi".to_string(),
        difficulty: Difficulty::Moderate,
        comparison_metrics: ComparisonMetrics {
            water_need: 6,
            market_value: 7,
            pest_resistance: 5,
        },
    }
}

pub fn batch(prefix: &str) -> Vec<CropRecommendation> {
    (0..10).map(|i| crop(i, &format!("{} {}", prefix, i + 1))).collect()
}

pub fn fast_settings() -> RefreshSettings {
    RefreshSettings {
        poll_interval: Duration::from_millis(20),
        poll_timeout: Duration::from_millis(200),
        recommendation_timeout: Duration::from_millis(200),
        history_capacity: 5,
        recommendation_threshold: 15,
        weather_refresh_interval: None,
    }
}

// ============================================================================
// Fake adapters
// ============================================================================

/// Returns the stored snapshot, or fails when none is set
#[derive(Default)]
pub struct FakeWeather {
    pub snapshot: Mutex<Option<WeatherSnapshot>>,
    pub calls: AtomicUsize,
    pub place: Mutex<Option<String>>,
    pub geocode_failing: AtomicBool,
    pub geocode_calls: AtomicUsize,
}

impl FakeWeather {
    pub fn with(snapshot: WeatherSnapshot) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(Some(snapshot)),
            ..Default::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, snapshot: Option<WeatherSnapshot>) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn set_place(&self, place: Option<&str>) {
        *self.place.lock().unwrap() = place.map(str::to_string);
    }
}

#[async_trait]
impl WeatherSource for FakeWeather {
    async fn fetch_weather(&self, _location: &GpsCoordinates) -> AppResult<WeatherSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.snapshot
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::WeatherService("forecast unavailable".into()))
    }

    async fn location_name(&self, _location: &GpsCoordinates) -> AppResult<Option<String>> {
        self.geocode_calls.fetch_add(1, Ordering::SeqCst);
        if self.geocode_failing.load(Ordering::SeqCst) {
            return Err(AppError::WeatherService("geocoding unavailable".into()));
        }
        Ok(self.place.lock().unwrap().clone())
    }
}

/// Rows stored oldest first, like an append-only table
#[derive(Default)]
pub struct FakeSensors {
    pub rows: Mutex<Vec<SensorReading>>,
    pub failing: AtomicBool,
    pub delay: Mutex<Option<Duration>>,
    pub history_calls: AtomicUsize,
}

impl FakeSensors {
    pub fn with(rows: Vec<SensorReading>) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(rows),
            ..Default::default()
        })
    }

    pub fn insert(&self, reading: SensorReading) {
        self.rows.lock().unwrap().push(reading);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    async fn before_query(&self) -> AppResult<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::SensorStore("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SensorSource for FakeSensors {
    async fn latest_reading(&self) -> AppResult<Option<SensorReading>> {
        self.before_query().await?;
        Ok(self.rows.lock().unwrap().last().cloned())
    }

    async fn recent_readings(&self, limit: usize) -> AppResult<Vec<SensorReading>> {
        self.before_query().await?;
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Numbers each batch so refreshes can be told apart
#[derive(Default)]
pub struct FakeRecommender {
    pub calls: AtomicUsize,
    pub failing: AtomicBool,
    pub delay: Mutex<Option<Duration>>,
    pub last_request: Mutex<Option<RecommendationRequest>>,
}

impl FakeRecommender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecommendationSource for FakeRecommender {
    async fn recommend(&self, request: &RecommendationRequest) -> AppResult<Vec<CropRecommendation>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_request.lock().unwrap() = Some(request.clone());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Recommendation("expected 10 recommendations, got 4".into()));
        }
        Ok(batch(&format!("Batch{}", call)))
    }
}

/// Replays scripted chunks; `Err` entries break the stream
pub struct FakeChat {
    pub script: Mutex<Vec<Result<String, String>>>,
    pub open_error: AtomicBool,
    pub received: Mutex<Vec<(Vec<ChatMessage>, String)>>,
}

impl FakeChat {
    pub fn replying(chunks: &[&str]) -> Arc<Self> {
        Self::scripted(chunks.iter().map(|c| Ok(c.to_string())).collect())
    }

    pub fn scripted(script: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            open_error: AtomicBool::new(false),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn set_script(&self, script: Vec<Result<String, String>>) {
        *self.script.lock().unwrap() = script;
    }
}

#[async_trait]
impl ChatModel for FakeChat {
    async fn stream_reply(
        &self,
        _system_prompt: &str,
        history: &[ChatMessage],
        message: &str,
    ) -> AppResult<TextChunkStream> {
        self.received
            .lock()
            .unwrap()
            .push((history.to_vec(), message.to_string()));
        if self.open_error.load(Ordering::SeqCst) {
            return Err(AppError::Chat("API returned 503".into()));
        }

        let items: Vec<AppResult<String>> = self
            .script
            .lock()
            .unwrap()
            .iter()
            .map(|item| item.clone().map_err(AppError::Chat))
            .collect();
        Ok(stream::iter(items).boxed())
    }
}

// ============================================================================
// Controller wiring
// ============================================================================

pub struct Harness {
    pub controller: RefreshController,
    pub weather: Arc<FakeWeather>,
    pub sensors: Arc<FakeSensors>,
    pub recommender: Arc<FakeRecommender>,
}

pub fn harness(weather: Arc<FakeWeather>, sensors: Arc<FakeSensors>) -> Harness {
    harness_with(weather, sensors, fast_settings())
}

pub fn harness_with(
    weather: Arc<FakeWeather>,
    sensors: Arc<FakeSensors>,
    settings: RefreshSettings,
) -> Harness {
    harness_at(weather, sensors, location(), settings)
}

pub fn harness_at(
    weather: Arc<FakeWeather>,
    sensors: Arc<FakeSensors>,
    location: DeviceLocation,
    settings: RefreshSettings,
) -> Harness {
    let recommender = FakeRecommender::new();
    let controller = RefreshController::new(
        weather.clone(),
        sensors.clone(),
        recommender.clone(),
        location,
        settings,
    );
    Harness {
        controller,
        weather,
        sensors,
        recommender,
    }
}
