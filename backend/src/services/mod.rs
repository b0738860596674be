//! Business logic services for the AgriSuggest dashboard

pub mod chat;
pub mod dashboard;
pub mod export;

pub use chat::ChatService;
pub use dashboard::{RefreshController, RefreshHandle, RefreshSettings};
pub use export::ExportService;
