//! Sensor reading and history window models

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of readings kept for trend charts
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// One observation reported by the field device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub timestamp: DateTime<Utc>,
    pub device_id: Option<String>,
    pub temperature: f64,
    pub humidity: f64,
    pub light_intensity: f64,
    pub soil_moisture: f64,
}

impl SensorReading {
    /// Device name for the dashboard header
    pub fn device_label(&self) -> &str {
        self.device_id.as_deref().unwrap_or("Waiting...")
    }
}

/// Fixed-capacity, oldest-first buffer of recent readings.
///
/// Timestamps are strictly increasing; a reading not newer than the newest
/// entry is never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryWindow {
    capacity: usize,
    readings: VecDeque<SensorReading>,
}

impl HistoryWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            readings: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Build a window from rows ordered newest first, as the sensor store returns them
    pub fn from_newest_first(capacity: usize, rows: Vec<SensorReading>) -> Self {
        let mut window = Self::new(capacity);
        window.replace_newest_first(rows);
        window
    }

    /// Replace the whole window with rows ordered newest first
    pub fn replace_newest_first(&mut self, rows: Vec<SensorReading>) {
        self.readings.clear();
        for reading in rows.into_iter().take(self.capacity).rev() {
            self.push(reading);
        }
    }

    /// Append a reading, evicting the oldest entry when full.
    ///
    /// Returns `false` if the reading is not newer than the newest entry.
    pub fn push(&mut self, reading: SensorReading) -> bool {
        if !self.accepts(&reading.timestamp) {
            return false;
        }
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
        true
    }

    /// Whether a reading taken at `timestamp` would extend the window
    pub fn accepts(&self, timestamp: &DateTime<Utc>) -> bool {
        self.newest().map_or(true, |newest| timestamp > &newest.timestamp)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn oldest(&self) -> Option<&SensorReading> {
        self.readings.front()
    }

    pub fn newest(&self) -> Option<&SensorReading> {
        self.readings.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorReading> {
        self.readings.iter()
    }

    pub fn to_vec(&self) -> Vec<SensorReading> {
        self.readings.iter().cloned().collect()
    }
}

impl Serialize for HistoryWindow {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.readings.iter())
    }
}

/// Soil moisture band used to color the moisture gauge
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SoilMoistureLevel {
    Dry,
    Moderate,
    Optimal,
    Wet,
}

impl SoilMoistureLevel {
    pub fn from_percent(value: f64) -> Self {
        if value < 30.0 {
            SoilMoistureLevel::Dry
        } else if value < 50.0 {
            SoilMoistureLevel::Moderate
        } else if value < 75.0 {
            SoilMoistureLevel::Optimal
        } else {
            SoilMoistureLevel::Wet
        }
    }
}

/// Headline numbers for the quick stats grid
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuickStats {
    pub device: String,
    pub temperature: f64,
    pub humidity: f64,
    pub light_intensity: f64,
    pub soil_moisture: f64,
    pub soil_moisture_level: SoilMoistureLevel,
    pub recorded_at: DateTime<Utc>,
}

impl From<&SensorReading> for QuickStats {
    fn from(reading: &SensorReading) -> Self {
        Self {
            device: reading.device_label().to_string(),
            temperature: reading.temperature,
            humidity: reading.humidity,
            light_intensity: reading.light_intensity,
            soil_moisture: reading.soil_moisture,
            soil_moisture_level: SoilMoistureLevel::from_percent(reading.soil_moisture),
            recorded_at: reading.timestamp,
        }
    }
}
