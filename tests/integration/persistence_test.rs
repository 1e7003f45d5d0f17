//! Integration tests for on-disk storage and configuration.

use chrono::Utc;
use gearwear::bikes::{BikeSpec, NewBike};
use gearwear::components::{
    BuildOptions, Component, ComponentManager, ComponentStore, ComponentType, Location, PartSpec,
};
use gearwear::storage::{load_config_from, save_config, AppConfig, ConstraintKind, Database, DatabaseError};
use gearwear::NoopPredictionCache;
use tempfile::TempDir;
use uuid::Uuid;

#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wear.db");
    let user_id = Uuid::new_v4();
    let cache = NoopPredictionCache;

    let (bike_id, created) = {
        let mut db = Database::open(&path).unwrap();
        let mut manager = ComponentManager::new(&mut db, &cache);
        let (bike, components) = manager
            .create_bike(user_id, NewBike::new("Commuter", BikeSpec::default()), &BuildOptions::default())
            .unwrap();
        manager.increment_hours(bike.id, user_id, 1.5).unwrap();
        (bike.id, components.len())
    };

    let mut db = Database::open(&path).unwrap();
    let manager = ComponentManager::new(&mut db, &cache);
    let components = manager.list_bike_components(user_id, bike_id).unwrap();
    assert_eq!(components.len(), created);
    assert!(components.iter().all(|c| c.hours_used == 1.5));
    assert_eq!(manager.get_bike(user_id, bike_id).unwrap().name, "Commuter");
}

#[test]
fn test_slot_collision_is_typed_unique_violation() {
    let db = Database::open_in_memory().unwrap();
    let user_id = Uuid::new_v4();
    let bike = crate::support::bare_bike(&db, user_id, BikeSpec::default());
    let store = ComponentStore::new(db.connection());

    let mounted = || {
        Component::new(user_id, ComponentType::Tires, Location::Front, &PartSpec::stock())
            .mounted_on(bike.id, Utc::now())
    };
    store.insert(&mounted()).unwrap();

    match store.insert(&mounted()) {
        Err(DatabaseError::ConstraintViolation { kind, .. }) => assert_eq!(kind, ConstraintKind::Unique),
        other => panic!("expected unique violation, got {:?}", other),
    }
}

#[test]
fn test_config_drives_database_location() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");

    let mut config = AppConfig::default();
    config.database_file = "garage.db".to_string();
    config.engine.batch_limit = 10;
    save_config(&config, &config_path).unwrap();

    let loaded = load_config_from(&config_path).unwrap();
    assert_eq!(loaded.engine.batch_limit, 10);
    assert_eq!(loaded.database_path(), dir.path().join("garage.db"));

    let mut db = Database::open(&loaded.database_path()).unwrap();
    let cache = NoopPredictionCache;
    let manager = ComponentManager::new(&mut db, &cache).with_settings(loaded.engine.clone());
    assert_eq!(manager.settings().batch_limit, 10);
    assert!(loaded.database_path().exists());
}
