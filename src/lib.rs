//! GearWear - component lifecycle and wear accounting for bicycles.
//!
//! Tracks which physical parts are mounted on which bike, accrues ride hours
//! to them, and records installs, swaps, replacements and services as an
//! auditable history in SQLite.

pub mod bikes;
pub mod cache;
pub mod components;
pub mod storage;

// Re-export commonly used types
pub use bikes::{Bike, BikeSpec, NewBike};
pub use cache::{NoopPredictionCache, PredictionCache};
pub use components::{ComponentError, ComponentManager, ComponentResult};
pub use storage::{AppConfig, Database};
