//! External API integrations
//!
//! Each data source sits behind a trait so the refresh controller and the
//! chat service can run against in-memory fakes in tests.

pub mod gemini;
pub mod sensor_store;
pub mod weather;

use axum::async_trait;
use futures::stream::BoxStream;
use shared::{
    ChatMessage, CropRecommendation, GpsCoordinates, RecommendationRequest, SensorReading,
    WeatherSnapshot,
};

use crate::error::AppResult;

pub use gemini::GeminiClient;
pub use sensor_store::PgSensorStore;
pub use weather::OpenMeteoClient;

/// Incremental assistant text; finite and not restartable
pub type TextChunkStream = BoxStream<'static, AppResult<String>>;

/// Current conditions and daily forecast provider
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_weather(&self, location: &GpsCoordinates) -> AppResult<WeatherSnapshot>;

    /// Place name for the coordinates; `None` when the provider knows none
    async fn location_name(&self, _location: &GpsCoordinates) -> AppResult<Option<String>> {
        Ok(None)
    }
}

/// Read-only access to the field device readings
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Most recent reading, `None` when the device has not reported yet
    async fn latest_reading(&self) -> AppResult<Option<SensorReading>>;

    /// Up to `limit` readings, newest first
    async fn recent_readings(&self, limit: usize) -> AppResult<Vec<SensorReading>>;
}

/// Ranked crop suggestions for the current conditions
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    /// Returns a complete, validated batch or an error, never a partial batch
    async fn recommend(&self, request: &RecommendationRequest) -> AppResult<Vec<CropRecommendation>>;
}

/// Streaming conversational model
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send `message` after the committed `history` and stream back the reply
    async fn stream_reply(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        message: &str,
    ) -> AppResult<TextChunkStream>;
}
