//! Integration tests for ride-driven hours accounting.

use gearwear::bikes::BikeSpec;
use gearwear::components::{ComponentManager, PartSpec, RideUsage};
use gearwear::storage::Database;
use gearwear::NoopPredictionCache;
use uuid::Uuid;

use crate::support::bare_bike;

fn hours(manager: &ComponentManager, user_id: Uuid, bike_id: Uuid) -> Vec<f64> {
    manager
        .list_bike_components(user_id, bike_id)
        .unwrap()
        .iter()
        .map(|c| c.hours_used)
        .collect()
}

#[test]
fn test_ride_adds_and_removes_one_hour() {
    let mut db = Database::open_in_memory().unwrap();
    let user_id = Uuid::new_v4();
    let bike = bare_bike(&db, user_id, BikeSpec::default());

    let cache = NoopPredictionCache;
    let mut manager = ComponentManager::new(&mut db, &cache);
    for slot in ["STEM", "HANDLEBAR", "PEDALS"] {
        manager
            .add_component_to_slot(user_id, bike.id, slot, PartSpec::new("Generic", slot))
            .unwrap();
    }
    assert_eq!(hours(&manager, user_id, bike.id), vec![0.0; 3]);

    let ride = RideUsage::new(Some(bike.id), 3600);
    manager.record_ride_created(user_id, &ride).unwrap();
    assert_eq!(hours(&manager, user_id, bike.id), vec![1.0; 3]);

    manager.record_ride_deleted(user_id, &ride).unwrap();
    assert_eq!(hours(&manager, user_id, bike.id), vec![0.0; 3]);
}

#[test]
fn test_ride_delete_clamps_after_other_decrements() {
    let mut db = Database::open_in_memory().unwrap();
    let user_id = Uuid::new_v4();
    let bike = bare_bike(&db, user_id, BikeSpec::default());

    let cache = NoopPredictionCache;
    let mut manager = ComponentManager::new(&mut db, &cache);
    manager
        .add_component_to_slot(user_id, bike.id, "CHAIN", PartSpec::new("KMC", "X11"))
        .unwrap();

    let ride = RideUsage::new(Some(bike.id), 3600);
    manager.record_ride_created(user_id, &ride).unwrap();
    manager.decrement_hours(bike.id, user_id, 0.75).unwrap();
    manager.record_ride_deleted(user_id, &ride).unwrap();

    assert_eq!(hours(&manager, user_id, bike.id), vec![0.0]);
}

#[test]
fn test_hours_never_negative_over_sequence() {
    let mut db = Database::open_in_memory().unwrap();
    let user_id = Uuid::new_v4();
    let bike = bare_bike(&db, user_id, BikeSpec::default());

    let cache = NoopPredictionCache;
    let mut manager = ComponentManager::new(&mut db, &cache);
    manager
        .add_component_to_slot(user_id, bike.id, "CHAIN", PartSpec::new("KMC", "X11"))
        .unwrap();

    let deltas = [2.0, -3.5, 0.25, -0.1, 1.0, -10.0, 0.5];
    for delta in deltas {
        let after = if delta > 0.0 {
            manager.increment_hours(bike.id, user_id, delta).unwrap()
        } else {
            manager.decrement_hours(bike.id, user_id, -delta).unwrap()
        };
        assert!(after.iter().all(|c| c.hours_used >= 0.0));
    }
    assert_eq!(hours(&manager, user_id, bike.id), vec![0.5]);
}

#[test]
fn test_bulk_reassignment_moves_hours() {
    let mut db = Database::open_in_memory().unwrap();
    let user_id = Uuid::new_v4();
    let road = bare_bike(&db, user_id, BikeSpec::default());
    let gravel = bare_bike(&db, user_id, BikeSpec::default());

    let cache = NoopPredictionCache;
    let mut manager = ComponentManager::new(&mut db, &cache);
    for bike in [&road, &gravel] {
        manager
            .add_component_to_slot(user_id, bike.id, "CHAIN", PartSpec::new("Shimano", "CN-M8100"))
            .unwrap();
    }

    let rides = [
        RideUsage::new(Some(road.id), 3600),
        RideUsage::new(Some(road.id), 1800),
        RideUsage::new(None, 1800),
    ];
    for ride in &rides {
        manager.record_ride_created(user_id, ride).unwrap();
    }
    manager.reassign_rides(user_id, &rides, Some(gravel.id)).unwrap();

    assert_eq!(hours(&manager, user_id, road.id), vec![0.0]);
    assert_eq!(hours(&manager, user_id, gravel.id), vec![2.0]);
}

#[test]
fn test_hours_ignore_other_users() {
    let mut db = Database::open_in_memory().unwrap();
    let owner = Uuid::new_v4();
    let bike = bare_bike(&db, owner, BikeSpec::default());

    let cache = NoopPredictionCache;
    let mut manager = ComponentManager::new(&mut db, &cache);
    manager
        .add_component_to_slot(owner, bike.id, "CHAIN", PartSpec::new("KMC", "X11"))
        .unwrap();

    manager.increment_hours(bike.id, Uuid::new_v4(), 5.0).unwrap();
    assert_eq!(hours(&manager, owner, bike.id), vec![0.0]);
}
