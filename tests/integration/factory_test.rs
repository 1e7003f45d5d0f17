//! Integration tests for building a new bike's components.

use std::collections::HashMap;

use gearwear::bikes::{BikeSpec, BrakeKind, Drivetrain, NewBike, SeatpostKind, Suspension};
use gearwear::components::{
    BaselineConfidence, BaselineMethod, BuildOptions, CatalogData, CatalogPart, ComponentManager,
    ComponentType, Location, PartSpec,
};
use gearwear::storage::Database;
use gearwear::NoopPredictionCache;
use uuid::Uuid;

use crate::support::open_rows;

#[test]
fn test_full_suspension_disc_bike() {
    let mut db = Database::open_in_memory().unwrap();
    let cache = NoopPredictionCache;
    let mut manager = ComponentManager::new(&mut db, &cache);
    let user_id = Uuid::new_v4();
    let spec = BikeSpec {
        suspension: Suspension::Full {
            fork_travel_mm: 160,
            shock_travel_mm: 150,
        },
        seatpost: SeatpostKind::Dropper,
        brakes: BrakeKind::Disc,
        drivetrain: Drivetrain::Derailleur,
    };

    let (bike, components) = manager
        .create_bike(user_id, NewBike::new("Enduro", spec), &BuildOptions::default())
        .unwrap();

    let of_type = |t: ComponentType| components.iter().filter(|c| c.component_type == t).collect::<Vec<_>>();

    let forks = of_type(ComponentType::Fork);
    let shocks = of_type(ComponentType::Shock);
    assert_eq!(forks.len(), 1);
    assert_eq!(shocks.len(), 1);
    assert_eq!(forks[0].pair_group_id, None);
    assert_eq!(shocks[0].pair_group_id, None);

    let tires = of_type(ComponentType::Tires);
    assert_eq!(tires.len(), 2);
    let locations: Vec<Location> = tires.iter().map(|c| c.location).collect();
    assert!(locations.contains(&Location::Front));
    assert!(locations.contains(&Location::Rear));
    assert!(tires[0].pair_group_id.is_some());
    assert_eq!(tires[0].pair_group_id, tires[1].pair_group_id);

    assert!(components.iter().all(|c| c.baseline_wear_percent == 0.0
        && c.baseline_method == BaselineMethod::Default
        && c.baseline_confidence == BaselineConfidence::Low));

    assert_eq!(open_rows(&manager, user_id, bike.id, "TIRES:REAR").len(), 1);
    assert_eq!(open_rows(&manager, user_id, bike.id, "SHOCK").len(), 1);
}

#[test]
fn test_catalog_and_overrides() {
    let mut db = Database::open_in_memory().unwrap();
    let cache = NoopPredictionCache;
    let mut manager = ComponentManager::new(&mut db, &cache);
    let user_id = Uuid::new_v4();

    let catalog = CatalogData {
        parts: HashMap::from([(ComponentType::Fork, CatalogPart::new("RockShox", "Lyrik"))]),
        groupset: Some(CatalogPart::new("SRAM", "GX Eagle")),
        ..Default::default()
    };
    let options = BuildOptions {
        catalog: Some(catalog),
        overrides: HashMap::from([(ComponentType::Stem, PartSpec::new("Renthal", "Apex"))]),
        ..Default::default()
    };

    let (_, components) = manager
        .create_bike(user_id, NewBike::new("Trail", BikeSpec::hardtail(140)), &options)
        .unwrap();
    let find = |t: ComponentType| components.iter().find(|c| c.component_type == t).unwrap();

    assert_eq!((find(ComponentType::Fork).brand.as_str(), find(ComponentType::Fork).model.as_str()), ("RockShox", "Lyrik"));
    assert_eq!(find(ComponentType::Cassette).model, "GX Eagle");
    assert_eq!(find(ComponentType::Stem).brand, "Renthal");
    assert!(!find(ComponentType::Stem).is_stock);
    assert_eq!(find(ComponentType::Headset).brand, "Stock");
}

#[test]
fn test_create_bike_requires_name() {
    let mut db = Database::open_in_memory().unwrap();
    let cache = NoopPredictionCache;
    let mut manager = ComponentManager::new(&mut db, &cache);
    let user_id = Uuid::new_v4();

    let result = manager.create_bike(user_id, NewBike::new("  ", BikeSpec::default()), &BuildOptions::default());
    assert!(result.is_err());
    assert!(manager.list_bikes(user_id).unwrap().is_empty());
}
