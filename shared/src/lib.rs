//! Shared types and models for the AgriSuggest farm dashboard
//!
//! This crate contains the domain model and the pure dashboard logic shared
//! between the backend and the browser UI (via WASM).

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
