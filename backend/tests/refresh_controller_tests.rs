//! Refresh controller integration tests
//!
//! Tests for the dashboard refresh cycle including:
//! - Initial load and the fatal error state
//! - Sensor polling and the history window
//! - Gated recommendation refresh
//! - Alert evaluation and dismissal

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use agrisuggest_backend::error::AppError;
use agrisuggest_backend::services::dashboard::{
    PollOutcome, RecommendationOutcome, LOADING_WEATHER,
};
use agrisuggest_backend::services::RefreshSettings;
use common::*;
use proptest::prelude::*;
use shared::{AlertKind, DeviceLocation, RefreshGate};

fn seeded_sensors() -> std::sync::Arc<FakeSensors> {
    FakeSensors::with((0..5).map(|m| reading_at(m, 50.0)).collect())
}

// ============================================================================
// Initial Load
// ============================================================================

#[cfg(test)]
mod initial_load_tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_populates_state() {
        let h = harness(FakeWeather::with(calm_weather()), seeded_sensors());

        h.controller.initialize().await.unwrap();
        let state = h.controller.snapshot().await;

        assert!(state.weather.is_some());
        assert_eq!(state.latest.as_ref().unwrap().timestamp, reading_at(4, 0.0).timestamp);
        assert_eq!(state.history.len(), 5);
        // History is held oldest first
        assert_eq!(state.history.oldest().unwrap().timestamp, reading_at(0, 0.0).timestamp);
        assert_eq!(state.history.newest().unwrap().timestamp, reading_at(4, 0.0).timestamp);
        assert!(state.loading.is_none());
        assert!(state.errors.fatal.is_none());
        assert!(!state.waiting_for_data());
    }

    #[tokio::test]
    async fn test_empty_table_is_not_a_failure() {
        let h = harness(FakeWeather::with(calm_weather()), FakeSensors::with(Vec::new()));

        h.controller.initialize().await.unwrap();
        let view = h.controller.view().await;

        assert!(view.waiting_for_data);
        assert!(view.latest.is_none());
        assert!(view.quick_stats.is_none());
        assert_eq!(view.device, "Waiting...");
        assert!(view.alerts.is_empty());
        assert!(view.errors.fatal.is_none());
    }

    #[tokio::test]
    async fn test_weather_failure_is_fatal() {
        let h = harness(FakeWeather::failing(), seeded_sensors());

        let result = h.controller.initialize().await;
        assert!(matches!(result, Err(AppError::WeatherService(_))));

        let state = h.controller.snapshot().await;
        let fatal = state.errors.fatal.expect("fatal error set");
        assert!(fatal.starts_with("Failed to fetch initial data:"));
        assert!(state.loading.is_none());
        assert!(state.weather.is_none());
    }

    #[tokio::test]
    async fn test_sensor_failure_is_fatal_and_halts_polling() {
        let sensors = seeded_sensors();
        sensors.set_failing(true);
        let h = harness(FakeWeather::with(calm_weather()), sensors.clone());

        assert!(h.controller.initialize().await.is_err());

        sensors.set_failing(false);
        sensors.insert(reading_at(10, 50.0));
        assert_eq!(h.controller.poll_once().await, PollOutcome::Halted);
    }

    #[tokio::test]
    async fn test_start_spawns_nothing_after_fatal_error() {
        let h = harness(FakeWeather::failing(), seeded_sensors());

        assert!(h.controller.start().await.is_err());
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(h.recommender.calls(), 0);
        assert!(h.controller.snapshot().await.latest.is_none());
    }

    #[test]
    fn test_loading_messages() {
        assert_eq!(LOADING_WEATHER, "Fetching local weather data...");
    }

    #[tokio::test]
    async fn test_unnamed_location_is_reverse_geocoded() {
        let weather = FakeWeather::with(calm_weather());
        weather.set_place(Some("Rupnagar"));
        let unnamed = DeviceLocation::new(ropar(), None);
        let h = harness_at(weather, seeded_sensors(), unnamed, fast_settings());

        h.controller.initialize().await.unwrap();

        let view = h.controller.view().await;
        assert_eq!(view.location_label, "Rupnagar");
        assert_eq!(view.location.name.as_deref(), Some("Rupnagar"));
    }

    #[tokio::test]
    async fn test_geocoding_failure_falls_back_to_coordinates() {
        let weather = FakeWeather::with(calm_weather());
        weather.geocode_failing.store(true, Ordering::SeqCst);
        let h = harness_at(
            weather,
            seeded_sensors(),
            DeviceLocation::new(ropar(), None),
            fast_settings(),
        );

        h.controller.initialize().await.unwrap();

        let state = h.controller.snapshot().await;
        assert!(state.errors.fatal.is_none());
        assert_eq!(h.controller.view().await.location_label, "30.90° N, 76.54° E");
    }

    #[tokio::test]
    async fn test_configured_name_skips_geocoding() {
        let h = harness(FakeWeather::with(calm_weather()), seeded_sensors());
        h.weather.set_place(Some("Rupnagar"));

        h.controller.initialize().await.unwrap();

        assert_eq!(h.weather.geocode_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.controller.view().await.location_label, "IIT Ropar");
    }

    #[tokio::test]
    async fn test_location_label_in_view() {
        let h = harness(FakeWeather::with(calm_weather()), seeded_sensors());
        h.controller.initialize().await.unwrap();

        let view = h.controller.view().await;
        assert_eq!(view.location_label, "IIT Ropar");
        assert_eq!(view.device, "esp32-field-1");
        assert!(view.weekly_average_temperature.is_some());
    }
}

// ============================================================================
// Polling
// ============================================================================

#[cfg(test)]
mod polling_tests {
    use super::*;

    #[tokio::test]
    async fn test_same_timestamp_is_unchanged() {
        let h = harness(FakeWeather::with(calm_weather()), seeded_sensors());
        h.controller.initialize().await.unwrap();

        assert_eq!(h.controller.poll_once().await, PollOutcome::Unchanged);
        assert_eq!(h.controller.snapshot().await.history.len(), 5);
    }

    #[tokio::test]
    async fn test_new_reading_appends_and_evicts_oldest() {
        let h = harness(FakeWeather::with(calm_weather()), seeded_sensors());
        h.controller.initialize().await.unwrap();

        h.sensors.insert(reading_at(5, 49.0));
        assert_eq!(h.controller.poll_once().await, PollOutcome::NewReading);

        let state = h.controller.snapshot().await;
        assert_eq!(state.history.len(), 5);
        assert_eq!(state.history.oldest().unwrap().timestamp, reading_at(1, 0.0).timestamp);
        assert_eq!(state.history.newest().unwrap().timestamp, reading_at(5, 0.0).timestamp);
        assert_eq!(state.latest.unwrap().soil_moisture, 49.0);
    }

    #[tokio::test]
    async fn test_repeated_poll_counts_reading_once() {
        let h = harness(FakeWeather::with(calm_weather()), seeded_sensors());
        h.controller.initialize().await.unwrap();
        h.controller.maybe_refresh_recommendations().await;

        h.sensors.insert(reading_at(5, 49.0));
        let (a, b) = tokio::join!(h.controller.poll_once(), h.controller.poll_once());

        let new_readings = [a, b]
            .iter()
            .filter(|o| **o == PollOutcome::NewReading)
            .count();
        assert_eq!(new_readings, 1);
        assert_eq!(h.controller.snapshot().await.gate, RefreshGate::Gated(1));
    }

    #[tokio::test]
    async fn test_out_of_order_reading_is_stale() {
        let h = harness(FakeWeather::with(calm_weather()), seeded_sensors());
        h.controller.initialize().await.unwrap();
        h.controller.maybe_refresh_recommendations().await;

        h.sensors.insert(reading_at(6, 45.0));
        assert_eq!(h.controller.poll_once().await, PollOutcome::NewReading);

        // An overlapping poll finishing late returns the earlier row
        h.sensors.insert(reading_at(5, 49.0));
        assert_eq!(h.controller.poll_once().await, PollOutcome::Unchanged);

        let state = h.controller.snapshot().await;
        assert_eq!(state.latest.as_ref().unwrap().timestamp, reading_at(6, 0.0).timestamp);
        assert_eq!(state.gate, RefreshGate::Gated(1));
        let timestamps: Vec<_> = state.history.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps.len(), 5);
        assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(timestamps[4], reading_at(6, 0.0).timestamp);
    }

    #[tokio::test]
    async fn test_empty_history_is_refetched() {
        let sensors = FakeSensors::with(Vec::new());
        let h = harness(FakeWeather::with(calm_weather()), sensors.clone());
        h.controller.initialize().await.unwrap();
        let calls_after_init = sensors.history_calls.load(std::sync::atomic::Ordering::SeqCst);

        sensors.insert(reading_at(0, 50.0));
        sensors.insert(reading_at(1, 48.0));
        assert_eq!(h.controller.poll_once().await, PollOutcome::NewReading);

        let state = h.controller.snapshot().await;
        assert_eq!(
            sensors.history_calls.load(std::sync::atomic::Ordering::SeqCst),
            calls_after_init + 1
        );
        assert_eq!(state.history.len(), 2);
        assert!(!state.waiting_for_data());
    }

    #[tokio::test]
    async fn test_poll_failure_is_not_fatal() {
        let h = harness(FakeWeather::with(calm_weather()), seeded_sensors());
        h.controller.initialize().await.unwrap();

        h.sensors.set_failing(true);
        assert_eq!(h.controller.poll_once().await, PollOutcome::Failed);
        assert!(h.controller.snapshot().await.errors.fatal.is_none());

        h.sensors.set_failing(false);
        h.sensors.insert(reading_at(5, 50.0));
        assert_eq!(h.controller.poll_once().await, PollOutcome::NewReading);
    }

    #[tokio::test]
    async fn test_slow_poll_times_out() {
        let h = harness(FakeWeather::with(calm_weather()), seeded_sensors());
        h.controller.initialize().await.unwrap();

        h.sensors.set_delay(Some(Duration::from_millis(500)));
        h.sensors.insert(reading_at(5, 50.0));
        assert_eq!(h.controller.poll_once().await, PollOutcome::Failed);
        assert_eq!(h.controller.snapshot().await.history.len(), 5);
    }

    #[tokio::test]
    async fn test_no_data_poll() {
        let h = harness(FakeWeather::with(calm_weather()), FakeSensors::with(Vec::new()));
        h.controller.initialize().await.unwrap();

        assert_eq!(h.controller.poll_once().await, PollOutcome::NoData);
    }

    #[tokio::test]
    async fn test_started_loop_picks_up_new_readings() {
        let h = harness(FakeWeather::with(calm_weather()), seeded_sensors());
        let handle = h.controller.start().await.unwrap();

        h.sensors.insert(reading_at(5, 47.0));
        tokio::time::sleep(Duration::from_millis(300)).await;

        let state = h.controller.snapshot().await;
        assert_eq!(state.latest.unwrap().timestamp, reading_at(5, 0.0).timestamp);
        assert_eq!(state.recommendations.len(), 10);
        handle.abort();
    }
}

// ============================================================================
// Recommendation Gate
// ============================================================================

#[cfg(test)]
mod recommendation_tests {
    use super::*;

    #[tokio::test]
    async fn test_first_occasion_fires_immediately() {
        let h = harness(FakeWeather::with(calm_weather()), seeded_sensors());
        h.controller.initialize().await.unwrap();

        let outcome = h.controller.maybe_refresh_recommendations().await;
        assert_eq!(outcome, RecommendationOutcome::Refreshed(10));

        let request = h.recommender.last_request.lock().unwrap().clone().unwrap();
        // Six days at (30+20)/2 and today at (30+20)/2
        assert_eq!(request.average_temperature, 25.0);
        assert_eq!(request.soil_moisture, 50.0);
        assert_eq!(request.light_intensity, 820.0);
        assert_eq!(h.controller.snapshot().await.gate, RefreshGate::Gated(0));
    }

    #[tokio::test]
    async fn test_skipped_without_sensor_data() {
        let h = harness(FakeWeather::with(calm_weather()), FakeSensors::with(Vec::new()));
        h.controller.initialize().await.unwrap();

        assert_eq!(
            h.controller.maybe_refresh_recommendations().await,
            RecommendationOutcome::Skipped
        );
        assert_eq!(h.recommender.calls(), 0);
        // The bootstrap exemption is still available
        assert_eq!(h.controller.snapshot().await.gate, RefreshGate::AwaitingFirstFetch);
    }

    #[tokio::test]
    async fn test_refresh_after_threshold_new_readings() {
        let h = harness(FakeWeather::with(calm_weather()), seeded_sensors());
        h.controller.initialize().await.unwrap();
        h.controller.maybe_refresh_recommendations().await;

        for minute in 5..19 {
            h.sensors.insert(reading_at(minute, 50.0));
            assert_eq!(h.controller.poll_once().await, PollOutcome::NewReading);
            assert_eq!(
                h.controller.maybe_refresh_recommendations().await,
                RecommendationOutcome::Skipped
            );
        }

        h.sensors.insert(reading_at(19, 50.0));
        h.controller.poll_once().await;
        assert_eq!(
            h.controller.maybe_refresh_recommendations().await,
            RecommendationOutcome::Refreshed(10)
        );
        assert_eq!(h.recommender.calls(), 2);
        assert_eq!(
            h.controller.snapshot().await.recommendations[0].crop_name,
            "Batch2 1"
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_batch() {
        let settings = RefreshSettings {
            recommendation_threshold: 1,
            ..fast_settings()
        };
        let h = harness_with(FakeWeather::with(calm_weather()), seeded_sensors(), settings);
        h.controller.initialize().await.unwrap();
        h.controller.maybe_refresh_recommendations().await;

        h.recommender.set_failing(true);
        h.sensors.insert(reading_at(5, 50.0));
        h.controller.poll_once().await;
        assert_eq!(
            h.controller.maybe_refresh_recommendations().await,
            RecommendationOutcome::Failed
        );

        let view = h.controller.recommendations().await;
        assert_eq!(view.recommendations.len(), 10);
        assert_eq!(view.recommendations[0].crop_name, "Batch1 1");
        assert!(!view.loading);
        assert!(view.error.is_some());
        // Recommendation failures never halt polling
        assert!(h.controller.snapshot().await.errors.fatal.is_none());
    }

    #[tokio::test]
    async fn test_stalled_request_times_out_and_unblocks() {
        let settings = RefreshSettings {
            recommendation_threshold: 1,
            ..fast_settings()
        };
        let h = harness_with(FakeWeather::with(calm_weather()), seeded_sensors(), settings);
        h.controller.initialize().await.unwrap();

        h.recommender.set_delay(Some(Duration::from_millis(800)));
        assert_eq!(
            h.controller.maybe_refresh_recommendations().await,
            RecommendationOutcome::Failed
        );
        let view = h.controller.recommendations().await;
        assert!(!view.loading);
        assert!(view.error.is_some());

        h.recommender.set_delay(None);
        h.sensors.insert(reading_at(5, 50.0));
        h.controller.poll_once().await;
        assert!(matches!(
            h.controller.maybe_refresh_recommendations().await,
            RecommendationOutcome::Refreshed(10)
        ));
    }

    #[tokio::test]
    async fn test_error_cleared_by_next_success() {
        let settings = RefreshSettings {
            recommendation_threshold: 1,
            ..fast_settings()
        };
        let h = harness_with(FakeWeather::with(calm_weather()), seeded_sensors(), settings);
        h.controller.initialize().await.unwrap();

        h.recommender.set_failing(true);
        h.controller.maybe_refresh_recommendations().await;
        assert!(h.controller.recommendations().await.error.is_some());

        h.recommender.set_failing(false);
        h.sensors.insert(reading_at(5, 50.0));
        h.controller.poll_once().await;
        h.controller.maybe_refresh_recommendations().await;
        assert!(h.controller.recommendations().await.error.is_none());
    }

    #[tokio::test]
    async fn test_weather_refresh_keeps_snapshot_on_failure() {
        let h = harness(FakeWeather::with(calm_weather()), seeded_sensors());
        h.controller.initialize().await.unwrap();

        h.weather.set(None);
        assert!(h.controller.refresh_weather().await.is_err());
        assert!(h.controller.snapshot().await.weather.is_some());

        h.weather.set(Some(weather(40.0, 8.0, 10.0)));
        h.controller.refresh_weather().await.unwrap();
        let state = h.controller.snapshot().await;
        assert_eq!(state.weather.unwrap().daily[0].max_temperature_celsius, 40.0);
        // The refresh also gets the first batch going
        assert_eq!(h.recommender.calls(), 1);
    }
}

// ============================================================================
// Alerts
// ============================================================================

#[cfg(test)]
mod alert_tests {
    use super::*;

    #[tokio::test]
    async fn test_soil_drop_detected_after_poll() {
        let sensors = FakeSensors::with(
            [50.0, 48.0, 47.0, 49.0]
                .iter()
                .enumerate()
                .map(|(m, soil)| reading_at(m as i64, *soil))
                .collect(),
        );
        let h = harness(FakeWeather::with(calm_weather()), sensors);
        h.controller.initialize().await.unwrap();
        assert!(h.controller.visible_alerts().await.is_empty());

        h.sensors.insert(reading_at(4, 30.0));
        h.controller.poll_once().await;

        let alerts = h.controller.visible_alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, AlertKind::SoilMoistureDrop);
    }

    #[tokio::test]
    async fn test_weather_alerts_on_initial_load() {
        let h = harness(FakeWeather::with(weather(39.0, 30.0, 85.0)), seeded_sensors());
        h.controller.initialize().await.unwrap();

        let ids: Vec<AlertKind> = h
            .controller
            .visible_alerts()
            .await
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(
            ids,
            vec![AlertKind::HeatStress, AlertKind::HighWind, AlertKind::HeavyRain]
        );
    }

    #[tokio::test]
    async fn test_dismissed_alert_returns_on_recompute() {
        let h = harness(FakeWeather::with(weather(39.0, 8.0, 10.0)), seeded_sensors());
        h.controller.initialize().await.unwrap();

        h.controller.dismiss_alert(AlertKind::HeatStress).await.unwrap();
        assert!(h.controller.visible_alerts().await.is_empty());

        // An unchanged poll does not re-evaluate
        h.controller.poll_once().await;
        assert!(h.controller.visible_alerts().await.is_empty());

        h.sensors.insert(reading_at(5, 50.0));
        h.controller.poll_once().await;
        assert_eq!(h.controller.visible_alerts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dismiss_inactive_alert_is_not_found() {
        let h = harness(FakeWeather::with(calm_weather()), seeded_sensors());
        h.controller.initialize().await.unwrap();

        let result = h.controller.dismiss_alert(AlertKind::HighWind).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// One bootstrap fetch, then one per `threshold` new readings
        #[test]
        fn prop_recommendation_refresh_count(new_readings in 0usize..40, threshold in 1u32..16) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();

            let calls = runtime.block_on(async {
                let settings = RefreshSettings {
                    recommendation_threshold: threshold,
                    ..fast_settings()
                };
                let h = harness_with(FakeWeather::with(calm_weather()), seeded_sensors(), settings);
                h.controller.initialize().await.unwrap();
                h.controller.maybe_refresh_recommendations().await;

                for i in 0..new_readings {
                    h.sensors.insert(reading_at(5 + i as i64, 50.0));
                    h.controller.poll_once().await;
                    h.controller.maybe_refresh_recommendations().await;
                }
                h.recommender.calls()
            });

            prop_assert_eq!(calls, 1 + new_readings / threshold as usize);
        }

        /// The window never exceeds its capacity and stays time ordered
        #[test]
        fn prop_history_window_bounded(new_readings in 0usize..20) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();

            let history = runtime.block_on(async {
                let h = harness(FakeWeather::with(calm_weather()), seeded_sensors());
                h.controller.initialize().await.unwrap();
                for i in 0..new_readings {
                    h.sensors.insert(reading_at(5 + i as i64, 50.0));
                    h.controller.poll_once().await;
                }
                h.controller.history().await
            });

            prop_assert_eq!(history.len(), 5);
            prop_assert!(history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
            prop_assert_eq!(
                history.last().unwrap().timestamp,
                reading_at(4 + new_readings as i64, 0.0).timestamp
            );
        }
    }
}
