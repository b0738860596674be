//! Domain models for the farm dashboard

mod alert;
mod chat;
mod gate;
mod recommendation;
mod sensor;
mod weather;

pub use alert::*;
pub use chat::*;
pub use gate::*;
pub use recommendation::*;
pub use sensor::*;
pub use weather::*;
