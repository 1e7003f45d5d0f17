//! Component lifecycle and wear accounting.
//!
//! Handles:
//! - Slot keys naming mounting positions on a bike
//! - Initial components for a new bike
//! - Hours accrued from rides
//! - Install, swap, replace and the front/rear pairing backfill
//! - Service logs and baseline wear calibration

pub mod error;
pub mod factory;
pub mod hours;
pub mod lifecycle;
pub mod manager;
pub mod service;
pub mod slot;
pub mod store;
pub mod types;

pub use error::{ComponentError, ComponentResult};
pub use factory::{plan_components, BuildOptions, CatalogData, CatalogPart, PairSpec};
pub use hours::{plan_reassignment, plan_ride_update, HoursAdjustment, RideUsage};
pub use lifecycle::{InstallResult, InstallSource, MigrationReport, PairingOptions, ReplaceResult, SwapResult};
pub use manager::ComponentManager;
pub use service::ServiceRequest;
pub use slot::{parse_slot_key, slot_key, Slot, SlotKeyError};
pub use store::ComponentStore;
pub use types::{
    BaselineConfidence, BaselineMethod, BaselineUpdate, BikeComponentInstall, Component,
    ComponentStatus, ComponentType, ComponentUpdate, FieldUpdate, Location, PartSpec, ServiceLog,
};
