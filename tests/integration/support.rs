//! Shared fixtures for integration tests.

use chrono::Utc;
use gearwear::bikes::{Bike, BikeSpec, BikeStore};
use gearwear::components::{BikeComponentInstall, Component, ComponentManager, ComponentType, Location};
use gearwear::storage::Database;
use uuid::Uuid;

/// A bike row with no components on it.
pub fn bare_bike(db: &Database, user_id: Uuid, spec: BikeSpec) -> Bike {
    let now = Utc::now();
    let bike = Bike {
        id: Uuid::new_v4(),
        user_id,
        name: "Bare".to_string(),
        manufacturer: None,
        model: None,
        year: None,
        spec,
        created_at: now,
        updated_at: now,
    };
    BikeStore::new(db.connection()).insert(&bike).unwrap();
    bike
}

/// The component mounted in a slot, if any.
pub fn occupant(
    manager: &ComponentManager,
    user_id: Uuid,
    bike_id: Uuid,
    component_type: ComponentType,
    location: Location,
) -> Option<Component> {
    manager
        .list_bike_components(user_id, bike_id)
        .unwrap()
        .into_iter()
        .find(|c| c.component_type == component_type && c.location == location)
}

/// Open install rows for a bike slot.
pub fn open_rows(manager: &ComponentManager, user_id: Uuid, bike_id: Uuid, slot_key: &str) -> Vec<BikeComponentInstall> {
    manager
        .bike_install_history(user_id, bike_id)
        .unwrap()
        .into_iter()
        .filter(|row| row.slot_key == slot_key && row.is_open())
        .collect()
}
