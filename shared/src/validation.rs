//! Validation utilities for the farm dashboard

use rust_decimal::Decimal;
use thiserror::Error;
use validator::Validate;

use crate::models::{CropRecommendation, RECOMMENDATION_BATCH_SIZE};
use crate::types::GpsCoordinates;

// ============================================================================
// Recommendation Validations
// ============================================================================

/// Why a model response was rejected
#[derive(Debug, Error, PartialEq)]
pub enum RecommendationBatchError {
    #[error("expected {expected} recommendations, got {actual}")]
    WrongCount { expected: usize, actual: usize },

    #[error("recommendation #{rank} ({crop}) is invalid: {reason}")]
    InvalidItem {
        rank: usize,
        crop: String,
        reason: String,
    },
}

/// A batch must hold exactly [`RECOMMENDATION_BATCH_SIZE`] in-range items
pub fn validate_recommendation_batch(
    batch: &[CropRecommendation],
) -> Result<(), RecommendationBatchError> {
    if batch.len() != RECOMMENDATION_BATCH_SIZE {
        return Err(RecommendationBatchError::WrongCount {
            expected: RECOMMENDATION_BATCH_SIZE,
            actual: batch.len(),
        });
    }

    for (index, item) in batch.iter().enumerate() {
        if let Err(errors) = item.validate() {
            return Err(RecommendationBatchError::InvalidItem {
                rank: index + 1,
                crop: item.crop_name.clone(),
                reason: errors.to_string(),
            });
        }
    }
    Ok(())
}

// ============================================================================
// Location and Reading Validations
// ============================================================================

/// Validate latitude/longitude ranges
pub fn validate_coordinates(coordinates: &GpsCoordinates) -> Result<(), &'static str> {
    if coordinates.latitude < Decimal::from(-90) || coordinates.latitude > Decimal::from(90) {
        return Err("Latitude must be between -90 and 90");
    }
    if coordinates.longitude < Decimal::from(-180) || coordinates.longitude > Decimal::from(180) {
        return Err("Longitude must be between -180 and 180");
    }
    Ok(())
}

/// Validate a percentage reading (humidity, soil moisture)
pub fn validate_percentage(value: f64) -> Result<(), &'static str> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}
