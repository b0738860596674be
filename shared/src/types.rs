//! Common types used across the dashboard

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};

/// GPS coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GpsCoordinates {
    pub latitude: Decimal,
    pub longitude: Decimal,
}

impl GpsCoordinates {
    pub fn new(latitude: Decimal, longitude: Decimal) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn latitude_f64(&self) -> f64 {
        self.latitude.to_f64().unwrap_or_default()
    }

    pub fn longitude_f64(&self) -> f64 {
        self.longitude.to_f64().unwrap_or_default()
    }

    /// Human readable label, e.g. `30.90° N, 76.54° E`
    pub fn label(&self) -> String {
        let lat_dir = if self.latitude >= Decimal::ZERO { 'N' } else { 'S' };
        let lon_dir = if self.longitude >= Decimal::ZERO { 'E' } else { 'W' };
        format!(
            "{:.2}° {}, {:.2}° {}",
            self.latitude.abs().round_dp(2),
            lat_dir,
            self.longitude.abs().round_dp(2),
            lon_dir
        )
    }
}

/// The fixed location of the monitored farm device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLocation {
    pub coordinates: GpsCoordinates,
    pub name: Option<String>,
}

impl DeviceLocation {
    pub fn new(coordinates: GpsCoordinates, name: Option<String>) -> Self {
        Self { coordinates, name }
    }

    /// Trimmed name, `None` when missing or blank
    pub fn place_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|name| !name.is_empty())
    }

    /// Place name, or the coordinate label when no name is known
    pub fn display_name(&self) -> String {
        match self.place_name() {
            Some(name) => name.to_string(),
            None => self.coordinates.label(),
        }
    }
}
