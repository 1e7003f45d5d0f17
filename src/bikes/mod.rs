//! Bikes module.
//!
//! A bike owns the slots components are mounted in. Its [`BikeSpec`]
//! decides which component types the factory creates for it.

pub mod store;
pub mod types;

pub use store::BikeStore;
pub use types::{Bike, BikeSpec, BrakeKind, Drivetrain, NewBike, SeatpostKind, Suspension};
