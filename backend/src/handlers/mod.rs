//! HTTP handlers for the dashboard API

pub mod alerts;
pub mod chat;
pub mod dashboard;
pub mod export;
pub mod health;

pub use alerts::*;
pub use chat::*;
pub use dashboard::*;
pub use export::*;
pub use health::*;
