//! Refresh controller for the farm dashboard
//!
//! Owns the dashboard state: the weather snapshot, the latest reading and the
//! history window, the recommendation batch with its refresh gate, and the
//! alert board. HTTP handlers only ever read clones of it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use shared::{
    evaluate_alerts, Alert, AlertBoard, AlertKind, BackgroundTheme, CropRecommendation,
    DeviceLocation, HistoryWindow, QuickStats, RecommendationRequest, RefreshGate, SensorReading,
    WeatherCondition, WeatherSnapshot,
};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::external::{RecommendationSource, SensorSource, WeatherSource};

pub const LOADING_WEATHER: &str = "Fetching local weather data...";
pub const LOADING_LATEST: &str = "Fetching latest farm data...";
pub const LOADING_HISTORY: &str = "Fetching historical farm data...";

const RECOMMENDATION_ERROR: &str = "Failed to generate AI recommendations. Please try again later.";

/// Cadence and sizing of the refresh loops
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    /// Upper bound for one recommendation request
    pub recommendation_timeout: Duration,
    pub history_capacity: usize,
    pub recommendation_threshold: u32,
    /// `None` disables the periodic weather refresh
    pub weather_refresh_interval: Option<Duration>,
}

impl RefreshSettings {
    pub fn from_config(config: &Config) -> Self {
        let weather_secs = config.weather.refresh_interval_secs;
        Self {
            poll_interval: config.refresh.poll_interval(),
            poll_timeout: config.refresh.poll_timeout(),
            recommendation_timeout: Duration::from_secs(config.gemini.timeout_secs),
            history_capacity: config.refresh.history_capacity,
            recommendation_threshold: config.refresh.recommendation_threshold,
            weather_refresh_interval: (weather_secs > 0).then(|| Duration::from_secs(weather_secs)),
        }
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(10),
            recommendation_timeout: Duration::from_secs(60),
            history_capacity: shared::DEFAULT_HISTORY_CAPACITY,
            recommendation_threshold: shared::DEFAULT_REFRESH_THRESHOLD,
            weather_refresh_interval: None,
        }
    }
}

/// Errors surfaced to the dashboard, one slot per category
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardErrors {
    /// Initial load failure; polling is halted while set
    pub fatal: Option<String>,
    pub recommendations: Option<String>,
    /// Last export failure, cleared by the next export attempt
    pub export: Option<String>,
}

/// Everything the dashboard shows
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// Configured location, named by reverse geocoding when unnamed
    pub location: DeviceLocation,
    pub weather: Option<WeatherSnapshot>,
    pub latest: Option<SensorReading>,
    pub history: HistoryWindow,
    pub recommendations: Vec<CropRecommendation>,
    pub recommendations_loading: bool,
    pub gate: RefreshGate,
    pub alerts: AlertBoard,
    pub loading: Option<String>,
    pub errors: DashboardErrors,
    pub initialized: bool,
}

impl DashboardState {
    fn new(location: DeviceLocation, history_capacity: usize) -> Self {
        Self {
            location,
            weather: None,
            latest: None,
            history: HistoryWindow::new(history_capacity),
            recommendations: Vec::new(),
            recommendations_loading: false,
            gate: RefreshGate::default(),
            alerts: AlertBoard::new(),
            loading: None,
            errors: DashboardErrors::default(),
            initialized: false,
        }
    }

    /// Re-run every alert rule; clears dismissals
    fn recompute_alerts(&mut self) {
        let history = self.history.to_vec();
        let alerts = evaluate_alerts(self.latest.as_ref(), self.weather.as_ref(), &history);
        self.alerts.recompute(alerts);
    }

    /// Initial load finished but the device has not reported yet
    pub fn waiting_for_data(&self) -> bool {
        self.initialized && self.latest.is_none()
    }
}

/// Read-only projection returned by `GET /dashboard`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub location: DeviceLocation,
    pub location_label: String,
    pub loading: Option<String>,
    pub waiting_for_data: bool,
    pub weather: Option<WeatherSnapshot>,
    pub weather_condition: Option<WeatherCondition>,
    pub weekly_average_temperature: Option<f64>,
    pub latest: Option<SensorReading>,
    pub device: String,
    pub quick_stats: Option<QuickStats>,
    pub history: Vec<SensorReading>,
    pub recommendations: Vec<CropRecommendation>,
    pub recommendations_loading: bool,
    pub alerts: Vec<Alert>,
    pub background_theme: BackgroundTheme,
    pub background_gradient: &'static str,
    pub errors: DashboardErrors,
    pub gate: RefreshGate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationsView {
    pub recommendations: Vec<CropRecommendation>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Result of one sensor poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A fatal error is active; nothing was fetched
    Halted,
    /// The sensor table is empty
    NoData,
    /// The latest reading was already held
    Unchanged,
    NewReading,
    /// Fetch failed or timed out; retried on the next tick
    Failed,
}

/// Result of a gated recommendation refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationOutcome {
    Skipped,
    Refreshed(usize),
    Failed,
}

struct ControllerInner {
    weather: Arc<dyn WeatherSource>,
    sensors: Arc<dyn SensorSource>,
    recommender: Arc<dyn RecommendationSource>,
    location: DeviceLocation,
    settings: RefreshSettings,
    state: RwLock<DashboardState>,
}

/// Polls the sensor store, refreshes weather and gates AI recommendations
#[derive(Clone)]
pub struct RefreshController {
    inner: Arc<ControllerInner>,
}

/// Background loops started by [`RefreshController::start`]; aborted on drop
pub struct RefreshHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn abort(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

impl RefreshController {
    pub fn new(
        weather: Arc<dyn WeatherSource>,
        sensors: Arc<dyn SensorSource>,
        recommender: Arc<dyn RecommendationSource>,
        location: DeviceLocation,
        settings: RefreshSettings,
    ) -> Self {
        let state = DashboardState::new(location.clone(), settings.history_capacity);
        Self {
            inner: Arc::new(ControllerInner {
                weather,
                sensors,
                recommender,
                location,
                settings,
                state: RwLock::new(state),
            }),
        }
    }

    /// Run the initial load, then spawn the background loops.
    ///
    /// Nothing is spawned when the initial load fails.
    pub async fn start(&self) -> AppResult<RefreshHandle> {
        self.initialize().await?;

        let mut tasks = Vec::new();

        let controller = self.clone();
        tasks.push(tokio::spawn(async move {
            controller.maybe_refresh_recommendations().await;
        }));

        tasks.push(tokio::spawn(self.clone().run_poll_loop()));

        if let Some(interval) = self.inner.settings.weather_refresh_interval {
            tasks.push(tokio::spawn(self.clone().run_weather_loop(interval)));
        }

        info!(
            "Refresh loops started (poll every {:?})",
            self.inner.settings.poll_interval
        );
        Ok(RefreshHandle { tasks })
    }

    /// Fetch weather, the latest reading and the history window in sequence.
    ///
    /// Any failure becomes the fatal dashboard error.
    pub async fn initialize(&self) -> AppResult<()> {
        match self.load_initial().await {
            Ok(()) => {
                info!("Initial dashboard data loaded");
                Ok(())
            }
            Err(e) => {
                error!("Initial load failed: {}", e);
                let mut state = self.inner.state.write().await;
                state.loading = None;
                state.errors.fatal = Some(format!("Failed to fetch initial data: {}", e));
                Err(e)
            }
        }
    }

    async fn load_initial(&self) -> AppResult<()> {
        let coordinates = self.inner.location.coordinates;

        self.set_loading(LOADING_WEATHER).await;
        let (weather, place_name) = tokio::join!(
            self.inner.weather.fetch_weather(&coordinates),
            self.resolve_place_name(),
        );
        let weather = weather?;

        self.set_loading(LOADING_LATEST).await;
        let latest = self
            .with_timeout(self.inner.sensors.latest_reading(), "latest reading")
            .await?;

        self.set_loading(LOADING_HISTORY).await;
        let rows = self
            .with_timeout(
                self.inner.sensors.recent_readings(self.inner.settings.history_capacity),
                "history",
            )
            .await?;

        let mut state = self.inner.state.write().await;
        if place_name.is_some() {
            state.location.name = place_name;
        }
        state.weather = Some(weather);
        state.latest = latest;
        state.history.replace_newest_first(rows);
        state.loading = None;
        state.errors.fatal = None;
        state.initialized = true;
        state.recompute_alerts();

        if state.latest.is_none() {
            info!("No sensor readings yet, waiting for data");
        }
        Ok(())
    }

    /// Reverse geocode an unnamed location; failures fall back to the coordinates
    async fn resolve_place_name(&self) -> Option<String> {
        if self.inner.location.place_name().is_some() {
            return None;
        }
        match self
            .inner
            .weather
            .location_name(&self.inner.location.coordinates)
            .await
        {
            Ok(Some(name)) => {
                info!("Device location resolved to {}", name);
                Some(name)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Reverse geocoding failed, showing coordinates: {}", e);
                None
            }
        }
    }

    /// Fetch the latest reading and fold it in if it is new
    pub async fn poll_once(&self) -> PollOutcome {
        if self.inner.state.read().await.errors.fatal.is_some() {
            return PollOutcome::Halted;
        }

        let reading = match self
            .with_timeout(self.inner.sensors.latest_reading(), "sensor poll")
            .await
        {
            Ok(Some(reading)) => reading,
            Ok(None) => return PollOutcome::NoData,
            Err(e) => {
                warn!("Sensor poll failed: {}", e);
                return PollOutcome::Failed;
            }
        };

        // Newness is decided under the write lock; overlapping polls may finish
        // out of order, so anything not newer than what is held is stale
        let refetch_history = {
            let mut state = self.inner.state.write().await;
            let stale = state
                .latest
                .as_ref()
                .is_some_and(|current| reading.timestamp <= current.timestamp)
                || !state.history.accepts(&reading.timestamp);
            if stale {
                return PollOutcome::Unchanged;
            }

            debug!("New sensor reading at {}", reading.timestamp);
            state.gate.record_new_reading();
            state.latest = Some(reading.clone());

            if state.history.is_empty() {
                true
            } else {
                state.history.push(reading);
                state.recompute_alerts();
                false
            }
        };

        if refetch_history {
            let rows = self
                .with_timeout(
                    self.inner.sensors.recent_readings(self.inner.settings.history_capacity),
                    "history",
                )
                .await;

            let mut state = self.inner.state.write().await;
            match rows {
                Ok(rows) => state.history.replace_newest_first(rows),
                Err(e) => warn!("History refetch failed: {}", e),
            }
            state.recompute_alerts();
        }

        PollOutcome::NewReading
    }

    /// Regenerate the recommendation batch if the gate allows it
    pub async fn maybe_refresh_recommendations(&self) -> RecommendationOutcome {
        let threshold = self.inner.settings.recommendation_threshold;

        let request = {
            let mut guard = self.inner.state.write().await;
            let state = &mut *guard;

            let request = match (&state.weather, &state.latest) {
                (Some(weather), Some(latest)) => RecommendationRequest::from_conditions(
                    &self.inner.location.coordinates,
                    weather,
                    latest,
                ),
                _ => return RecommendationOutcome::Skipped,
            };

            if state.recommendations_loading {
                debug!("Recommendation refresh already in flight");
                return RecommendationOutcome::Skipped;
            }
            if !state.gate.try_fire(threshold) {
                debug!(
                    "Recommendation refresh gated ({}/{} new readings)",
                    state.gate.counter(),
                    threshold
                );
                return RecommendationOutcome::Skipped;
            }

            state.recommendations_loading = true;
            state.errors.recommendations = None;
            request
        };

        info!(
            "Requesting crop recommendations (avg temp {:.1}°C)",
            request.average_temperature
        );
        let result = self
            .with_timeout_of(
                self.inner.settings.recommendation_timeout,
                self.inner.recommender.recommend(&request),
                "recommendation request",
            )
            .await;

        let mut state = self.inner.state.write().await;
        state.recommendations_loading = false;
        match result {
            Ok(batch) => {
                let count = batch.len();
                state.recommendations = batch;
                info!("Crop recommendations refreshed ({} crops)", count);
                RecommendationOutcome::Refreshed(count)
            }
            Err(e) => {
                error!("Error fetching crop recommendations: {}", e);
                state.errors.recommendations = Some(RECOMMENDATION_ERROR.to_string());
                RecommendationOutcome::Failed
            }
        }
    }

    /// Replace the weather snapshot; the previous one is kept on failure
    pub async fn refresh_weather(&self) -> AppResult<()> {
        let snapshot = match self
            .inner
            .weather
            .fetch_weather(&self.inner.location.coordinates)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Weather refresh failed: {}", e);
                return Err(e);
            }
        };

        {
            let mut state = self.inner.state.write().await;
            state.weather = Some(snapshot);
            state.recompute_alerts();
        }
        debug!("Weather snapshot refreshed");

        self.maybe_refresh_recommendations().await;
        Ok(())
    }

    async fn run_poll_loop(self) {
        let mut ticker = tokio::time::interval(self.inner.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; initialize() just fetched
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if self.inner.state.read().await.errors.fatal.is_some() {
                warn!("Polling halted by fatal error");
                break;
            }

            let controller = self.clone();
            tokio::spawn(async move {
                if controller.poll_once().await == PollOutcome::NewReading {
                    controller.maybe_refresh_recommendations().await;
                }
            });
        }
    }

    async fn run_weather_loop(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            // Failures are logged inside refresh_weather
            let _ = self.refresh_weather().await;
        }
    }

    async fn set_loading(&self, message: &str) {
        self.inner.state.write().await.loading = Some(message.to_string());
    }

    async fn with_timeout<T, F>(&self, future: F, what: &str) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        self.with_timeout_of(self.inner.settings.poll_timeout, future, what)
            .await
    }

    async fn with_timeout_of<T, F>(&self, limit: Duration, future: F, what: &str) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        tokio::time::timeout(limit, future)
            .await
            .map_err(|_| AppError::Timeout(format!("{} did not respond within {:?}", what, limit)))?
    }

    // ========================================================================
    // Read side
    // ========================================================================

    /// Clone of the current state
    pub async fn snapshot(&self) -> DashboardState {
        self.inner.state.read().await.clone()
    }

    pub async fn view(&self) -> DashboardView {
        let state = self.inner.state.read().await;
        let weather = state.weather.clone();

        DashboardView {
            location: state.location.clone(),
            location_label: state.location.display_name(),
            loading: state.loading.clone(),
            waiting_for_data: state.waiting_for_data(),
            weather_condition: weather.as_ref().map(|w| w.condition()),
            weekly_average_temperature: weather.as_ref().map(|w| w.weekly_average_temperature()),
            background_theme: BackgroundTheme::for_snapshot(weather.as_ref()),
            background_gradient: BackgroundTheme::for_snapshot(weather.as_ref()).gradient(),
            weather,
            device: state
                .latest
                .as_ref()
                .map(|r| r.device_label().to_string())
                .unwrap_or_else(|| "Waiting...".to_string()),
            quick_stats: state.latest.as_ref().map(QuickStats::from),
            latest: state.latest.clone(),
            history: state.history.to_vec(),
            recommendations: state.recommendations.clone(),
            recommendations_loading: state.recommendations_loading,
            alerts: state.alerts.visible(),
            errors: state.errors.clone(),
            gate: state.gate,
        }
    }

    pub async fn history(&self) -> Vec<SensorReading> {
        self.inner.state.read().await.history.to_vec()
    }

    pub async fn recommendations(&self) -> RecommendationsView {
        let state = self.inner.state.read().await;
        RecommendationsView {
            recommendations: state.recommendations.clone(),
            loading: state.recommendations_loading,
            error: state.errors.recommendations.clone(),
        }
    }

    pub async fn visible_alerts(&self) -> Vec<Alert> {
        self.inner.state.read().await.alerts.visible()
    }

    /// Hide an alert until the next evaluation
    pub async fn dismiss_alert(&self, id: AlertKind) -> AppResult<()> {
        let mut state = self.inner.state.write().await;
        if state.alerts.dismiss(id) {
            debug!("Alert {} dismissed", id.id());
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Alert {} is not showing", id.id())))
        }
    }

    pub(crate) async fn set_export_error(&self, message: Option<String>) {
        self.inner.state.write().await.errors.export = message;
    }
}
