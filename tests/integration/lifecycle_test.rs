//! Integration tests for install, swap, replace and the pairing backfill.

use chrono::Utc;
use gearwear::bikes::{BikeSpec, NewBike};
use gearwear::cache::RecordingPredictionCache;
use gearwear::components::{
    BaselineConfidence, BuildOptions, Component, ComponentError, ComponentManager, ComponentStatus,
    ComponentStore, ComponentType, InstallSource, Location, PairingOptions, PartSpec,
};
use gearwear::storage::Database;
use gearwear::NoopPredictionCache;
use uuid::Uuid;

use crate::support::{bare_bike, occupant, open_rows};

fn trail_bike(manager: &mut ComponentManager, user_id: Uuid, name: &str) -> gearwear::Bike {
    let (bike, _) = manager
        .create_bike(user_id, NewBike::new(name, BikeSpec::full_suspension(150, 140)), &BuildOptions::default())
        .unwrap();
    bike
}

#[test]
fn test_new_part_install_retires_displaced() {
    let mut db = Database::open_in_memory().unwrap();
    let cache = NoopPredictionCache;
    let mut manager = ComponentManager::new(&mut db, &cache);
    let user_id = Uuid::new_v4();
    let bike = trail_bike(&mut manager, user_id, "Trail");
    let old_chain = occupant(&manager, user_id, bike.id, ComponentType::Chain, Location::None).unwrap();

    let result = manager
        .install_component(
            user_id,
            bike.id,
            "CHAIN",
            InstallSource::New(PartSpec::new("SRAM", "XX1")),
            PairingOptions::single(),
        )
        .unwrap();

    let displaced = result.displaced.unwrap();
    assert_eq!(displaced.id, old_chain.id);
    assert_eq!(displaced.status, ComponentStatus::Retired);
    assert_eq!(displaced.replaced_by_id, Some(result.installed.id));
    assert_eq!(displaced.bike_id, None);

    let rows = open_rows(&manager, user_id, bike.id, "CHAIN");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].component_id, result.installed.id);
    assert!(manager
        .install_history(user_id, old_chain.id)
        .unwrap()
        .iter()
        .all(|row| !row.is_open()));
}

#[test]
fn test_repeated_installs_keep_one_open_row() {
    let mut db = Database::open_in_memory().unwrap();
    let cache = NoopPredictionCache;
    let mut manager = ComponentManager::new(&mut db, &cache);
    let user_id = Uuid::new_v4();
    let bike = trail_bike(&mut manager, user_id, "Trail");

    let spare = manager
        .add_spare_component(user_id, ComponentType::Tires, Location::None, PartSpec::new("Maxxis", "Aggressor"))
        .unwrap();
    manager
        .install_component(user_id, bike.id, "TIRES:REAR", InstallSource::Existing(spare.id), PairingOptions::single())
        .unwrap();
    manager
        .install_component(
            user_id,
            bike.id,
            "TIRES:REAR",
            InstallSource::New(PartSpec::new("Maxxis", "DHR II")),
            PairingOptions::single(),
        )
        .unwrap();
    // Move the tire that just went on from rear to front
    let rear = occupant(&manager, user_id, bike.id, ComponentType::Tires, Location::Rear).unwrap();
    manager
        .install_component(user_id, bike.id, "TIRES:FRONT", InstallSource::Existing(rear.id), PairingOptions::single())
        .unwrap();

    assert_eq!(open_rows(&manager, user_id, bike.id, "TIRES:FRONT").len(), 1);
    assert!(open_rows(&manager, user_id, bike.id, "TIRES:REAR").is_empty());
    assert!(occupant(&manager, user_id, bike.id, ComponentType::Tires, Location::Rear).is_none());

    let spare_now = manager.get_component(user_id, spare.id).unwrap();
    assert_eq!(spare_now.status, ComponentStatus::Retired);
}

#[test]
fn test_swap_twice_restores_placement() {
    let mut db = Database::open_in_memory().unwrap();
    let cache = NoopPredictionCache;
    let mut manager = ComponentManager::new(&mut db, &cache);
    let user_id = Uuid::new_v4();
    let a = trail_bike(&mut manager, user_id, "A");
    let b = trail_bike(&mut manager, user_id, "B");
    manager.increment_hours(a.id, user_id, 4.0).unwrap();
    manager.increment_hours(b.id, user_id, 9.0).unwrap();

    let fork_a = occupant(&manager, user_id, a.id, ComponentType::Fork, Location::None).unwrap();
    let fork_b = occupant(&manager, user_id, b.id, ComponentType::Fork, Location::None).unwrap();

    let swapped = manager.swap_components(user_id, a.id, "FORK", b.id, "FORK").unwrap();
    assert_eq!(swapped.first.bike_id, Some(b.id));
    assert_eq!(swapped.second.bike_id, Some(a.id));
    assert_eq!(swapped.first.hours_used, 4.0);
    assert_eq!(swapped.second.hours_used, 9.0);

    manager.swap_components(user_id, a.id, "FORK", b.id, "FORK").unwrap();
    let placed = |bike_id| occupant(&manager, user_id, bike_id, ComponentType::Fork, Location::None).unwrap();
    let (back_a, back_b) = (placed(a.id), placed(b.id));
    assert_eq!(back_a.id, fork_a.id);
    assert_eq!(back_b.id, fork_b.id);
    assert_eq!(back_a.hours_used, 4.0);
    assert_eq!(back_b.hours_used, 9.0);
    assert_eq!(back_a.status, ComponentStatus::Installed);

    let total = manager.list_all_components(user_id).unwrap();
    assert!(total.iter().all(|c| c.status == ComponentStatus::Installed));
}

#[test]
fn test_replace_counts_match() {
    let mut db = Database::open_in_memory().unwrap();
    let cache = NoopPredictionCache;
    let mut manager = ComponentManager::new(&mut db, &cache);
    let user_id = Uuid::new_v4();
    let bike = trail_bike(&mut manager, user_id, "Trail");
    let before = manager.list_all_components(user_id).unwrap().len();

    let fork = occupant(&manager, user_id, bike.id, ComponentType::Fork, Location::None).unwrap();
    let single = manager
        .replace_component(user_id, fork.id, PartSpec::new("Fox", "38"), PairingOptions::both(None))
        .unwrap();
    assert_eq!(single.successors.len(), 1);
    assert_eq!(single.retired.len(), 1);

    let pad = occupant(&manager, user_id, bike.id, ComponentType::BrakePad, Location::Front).unwrap();
    let paired = manager
        .replace_component(
            user_id,
            pad.id,
            PartSpec::new("Galfer", "Pro"),
            PairingOptions::both(Some(PartSpec::new("Galfer", "Standard"))),
        )
        .unwrap();
    assert_eq!(paired.successors.len(), 2);
    assert_eq!(paired.retired.len(), 2);
    assert!(paired
        .successors
        .iter()
        .all(|c| c.baseline_wear_percent == 0.0 && c.baseline_confidence == BaselineConfidence::High));
    assert_eq!(paired.successors[1].model, "Standard");

    let all = manager.list_all_components(user_id).unwrap();
    assert_eq!(all.len(), before + 3);
    let retired = all.iter().filter(|c| c.status == ComponentStatus::Retired).count();
    assert_eq!(retired, 3);
}

#[test]
fn test_migration_twice_matches_once() {
    let mut db = Database::open_in_memory().unwrap();
    let user_id = Uuid::new_v4();
    let bike = bare_bike(&db, user_id, BikeSpec::default());
    {
        let store = ComponentStore::new(db.connection());
        for t in [ComponentType::Tires, ComponentType::BrakeRotor, ComponentType::Chain] {
            let mut legacy: Component = Component::new(user_id, t, Location::None, &PartSpec::stock())
                .mounted_on(bike.id, Utc::now());
            legacy.hours_used = 7.0;
            store.insert(&legacy).unwrap();
        }
    }

    let cache = NoopPredictionCache;
    let mut manager = ComponentManager::new(&mut db, &cache);
    let first = manager.migrate_paired_components(user_id).unwrap();
    let after_once = manager.list_all_components(user_id).unwrap().len();
    assert_eq!(first.converted, 2);
    assert_eq!(after_once, 5);

    let second = manager.migrate_paired_components(user_id).unwrap();
    assert!(second.already_migrated);
    assert_eq!(manager.list_all_components(user_id).unwrap().len(), after_once);

    let rear_rotor = occupant(&manager, user_id, bike.id, ComponentType::BrakeRotor, Location::Rear).unwrap();
    assert_eq!(rear_rotor.hours_used, 7.0);
    assert!(rear_rotor.pair_group_id.is_some());
}

#[test]
fn test_cache_invalidated_before_and_after() {
    let mut db = Database::open_in_memory().unwrap();
    let cache = RecordingPredictionCache::new();
    let mut manager = ComponentManager::new(&mut db, &cache);
    let user_id = Uuid::new_v4();
    let bike = trail_bike(&mut manager, user_id, "Trail");
    cache.clear();

    manager
        .install_component(
            user_id,
            bike.id,
            "STEM",
            InstallSource::New(PartSpec::new("Chromag", "HiFi")),
            PairingOptions::single(),
        )
        .unwrap();

    assert_eq!(cache.calls(), vec![(user_id, Some(bike.id)), (user_id, Some(bike.id))]);
}

#[test]
fn test_failed_operation_leaves_no_partial_state() {
    let mut db = Database::open_in_memory().unwrap();
    let cache = NoopPredictionCache;
    let mut manager = ComponentManager::new(&mut db, &cache);
    let user_id = Uuid::new_v4();
    let bike = trail_bike(&mut manager, user_id, "Trail");
    let before = manager.list_all_components(user_id).unwrap();

    // The paired slot's spare does not exist, so the whole install rolls back
    let result = manager.install_component(
        user_id,
        bike.id,
        "TIRES:FRONT",
        InstallSource::New(PartSpec::new("Maxxis", "Assegai")),
        PairingOptions::both(Some(InstallSource::Existing(Uuid::new_v4()))),
    );

    assert!(matches!(result, Err(ComponentError::NotFound(_))));
    assert_eq!(manager.list_all_components(user_id).unwrap(), before);
}
