//! Sensor store backed by the `environment_data` table
//!
//! The field device inserts rows; this side only ever reads them.

use axum::async_trait;
use chrono::{DateTime, Utc};
use shared::SensorReading;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::external::SensorSource;

/// Database row for environment_data
#[derive(Debug, sqlx::FromRow)]
struct EnvironmentRow {
    created_at: DateTime<Utc>,
    device_id: Option<String>,
    temperature: f64,
    humidity: f64,
    light: f64,
    soil: f64,
}

impl From<EnvironmentRow> for SensorReading {
    fn from(row: EnvironmentRow) -> Self {
        SensorReading {
            timestamp: row.created_at,
            device_id: row.device_id,
            temperature: row.temperature,
            humidity: row.humidity,
            light_intensity: row.light,
            soil_moisture: row.soil,
        }
    }
}

/// Read-only PostgreSQL sensor store
#[derive(Clone)]
pub struct PgSensorStore {
    db: PgPool,
}

impl PgSensorStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SensorSource for PgSensorStore {
    async fn latest_reading(&self) -> AppResult<Option<SensorReading>> {
        let row = sqlx::query_as::<_, EnvironmentRow>(
            r#"
            SELECT created_at, device_id, temperature, humidity, light, soil
            FROM environment_data
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::SensorStore(format!("Could not fetch latest data: {}", e)))?;

        Ok(row.map(Into::into))
    }

    async fn recent_readings(&self, limit: usize) -> AppResult<Vec<SensorReading>> {
        let limit = i64::try_from(limit)
            .map_err(|_| AppError::ValidationError(format!("History limit {} is too large", limit)))?;

        let rows = sqlx::query_as::<_, EnvironmentRow>(
            r#"
            SELECT created_at, device_id, temperature, humidity, light, soil
            FROM environment_data
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(|e| AppError::SensorStore(format!("Could not fetch historical data: {}", e)))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
