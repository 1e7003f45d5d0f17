//! Component factory: the initial parts of a new bike.
//!
//! Which types a bike gets comes from its [`BikeSpec`]. Brand and model for
//! each part resolve in priority order: the user's override, catalog data
//! (walking a fallback chain when the catalog only knows the groupset,
//! wheelset or brakeset), then a generic "Stock" placeholder.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ComponentError, ComponentResult};
use super::lifecycle::relink_pair;
use super::manager::{owned_bike, ComponentManager};
use super::slot::slot_key;
use super::store::ComponentStore;
use super::types::{BikeComponentInstall, Component, ComponentType, Location, PartSpec};
use crate::bikes::{Bike, BikeSpec, BikeStore, NewBike};

/// Placeholder used when nothing better is known.
const STOCK: &str = "Stock";

/// Partial brand/model data from the bike catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPart {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub notes: Option<String>,
}

impl CatalogPart {
    pub fn new(brand: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            brand: Some(brand.into()),
            model: Some(model.into()),
            notes: None,
        }
    }

    pub fn brand_only(brand: impl Into<String>) -> Self {
        Self {
            brand: Some(brand.into()),
            ..Default::default()
        }
    }
}

/// What the catalog knows about a bike's build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogData {
    /// Parts listed individually
    pub parts: HashMap<ComponentType, CatalogPart>,
    /// Groupset, for drivetrain parts
    pub groupset: Option<CatalogPart>,
    /// Wheelset, for hubs and rims
    pub wheelset: Option<CatalogPart>,
    /// Brakeset, for calipers, pads and rotors
    pub brakeset: Option<CatalogPart>,
}

/// One place the catalog may describe a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    Part(ComponentType),
    Groupset,
    Wheelset,
    Brakeset,
}

/// Where to look, in order, for catalog data about a type.
pub fn catalog_chain(component_type: ComponentType) -> Vec<CatalogSource> {
    use CatalogSource::*;
    use ComponentType as T;

    match component_type {
        T::Dropper => vec![Part(T::Dropper), Part(T::Seatpost)],
        T::BrakePad | T::BrakeRotor => vec![Part(component_type), Part(T::Brakes), Brakeset],
        T::Brakes => vec![Part(T::Brakes), Brakeset],
        T::WheelHubs | T::Rims => vec![Part(component_type), Wheelset],
        T::Chain | T::Cassette | T::Chainring | T::RearDerailleur | T::BottomBracket => {
            vec![Part(component_type), Groupset]
        }
        other => vec![Part(other)],
    }
}

impl CatalogData {
    fn source(&self, source: CatalogSource) -> Option<&CatalogPart> {
        match source {
            CatalogSource::Part(t) => self.parts.get(&t),
            CatalogSource::Groupset => self.groupset.as_ref(),
            CatalogSource::Wheelset => self.wheelset.as_ref(),
            CatalogSource::Brakeset => self.brakeset.as_ref(),
        }
    }

    /// Resolve a type field by field along its fallback chain.
    ///
    /// Returns `None` when no source in the chain knows anything.
    pub fn resolve(&self, component_type: ComponentType) -> Option<PartSpec> {
        let found: Vec<&CatalogPart> = catalog_chain(component_type)
            .into_iter()
            .filter_map(|source| self.source(source))
            .collect();

        let first = |pick: fn(&CatalogPart) -> Option<&String>| {
            found.iter().find_map(|part| pick(*part).filter(|v| !v.trim().is_empty()).cloned())
        };
        let brand = first(|p| p.brand.as_ref());
        let model = first(|p| p.model.as_ref());
        let notes = first(|p| p.notes.as_ref());

        if brand.is_none() && model.is_none() {
            return None;
        }

        Some(PartSpec {
            brand: brand.unwrap_or_else(|| STOCK.to_string()),
            model: model.unwrap_or_else(|| STOCK.to_string()),
            notes,
        })
    }
}

/// How the two ends of a paired type are specified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairSpec {
    /// Same part front and rear
    Same(PartSpec),
    /// Different parts front and rear
    Split { front: PartSpec, rear: PartSpec },
}

/// Optional inputs to the factory.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub catalog: Option<CatalogData>,
    /// User-entered parts, highest priority
    pub overrides: HashMap<ComponentType, PartSpec>,
    /// Per-end specs for pairing types
    pub pairing: HashMap<ComponentType, PairSpec>,
}

impl BuildOptions {
    /// Resolve one type to a part and whether it came with the bike.
    fn resolve(&self, component_type: ComponentType) -> (PartSpec, bool) {
        if let Some(spec) = self.overrides.get(&component_type) {
            return (spec.clone(), false);
        }
        if let Some(spec) = self
            .catalog
            .as_ref()
            .and_then(|catalog| catalog.resolve(component_type))
        {
            return (spec, true);
        }
        (PartSpec::stock(), true)
    }

    /// Resolve both ends of a pairing type.
    fn resolve_pair(&self, component_type: ComponentType) -> [(Location, PartSpec, bool); 2] {
        match self.pairing.get(&component_type) {
            Some(PairSpec::Same(spec)) => [
                (Location::Front, spec.clone(), false),
                (Location::Rear, spec.clone(), false),
            ],
            Some(PairSpec::Split { front, rear }) => [
                (Location::Front, front.clone(), false),
                (Location::Rear, rear.clone(), false),
            ],
            None => {
                let (spec, is_stock) = self.resolve(component_type);
                [
                    (Location::Front, spec.clone(), is_stock),
                    (Location::Rear, spec, is_stock),
                ]
            }
        }
    }
}

/// Plan the initial components for a bike without touching storage.
///
/// Every row starts installed at `at` with a zero, low-confidence baseline.
/// Both ends of a pairing type share one fresh pair group.
pub fn plan_components(
    user_id: Uuid,
    bike_id: Uuid,
    spec: &BikeSpec,
    options: &BuildOptions,
    at: DateTime<Utc>,
) -> Vec<Component> {
    let mut planned = Vec::new();

    for component_type in spec.applicable_types() {
        if component_type.requires_pairing() {
            let group = Uuid::new_v4();
            for (location, part, is_stock) in options.resolve_pair(component_type) {
                let mut c = Component::new(user_id, component_type, location, &part)
                    .mounted_on(bike_id, at);
                c.is_stock = is_stock;
                c.pair_group_id = Some(group);
                planned.push(c);
            }
        } else {
            let (part, is_stock) = options.resolve(component_type);
            let mut c = Component::new(user_id, component_type, Location::None, &part)
                .mounted_on(bike_id, at);
            c.is_stock = is_stock;
            planned.push(c);
        }
    }

    planned
}

/// Create the planned components for a bike, skipping slots already filled.
///
/// Safe to re-run: existing rows and unique-constraint races are skipped.
/// Each created component gets an open install row at its install time.
pub(crate) fn build_components(
    conn: &Connection,
    user_id: Uuid,
    bike: &Bike,
    options: &BuildOptions,
    at: DateTime<Utc>,
) -> ComponentResult<Vec<Component>> {
    let store = ComponentStore::new(conn);
    let mut created = Vec::new();

    for component in plan_components(user_id, bike.id, &bike.spec, options, at) {
        if store
            .find_in_slot(bike.id, component.component_type, component.location)?
            .is_some()
        {
            tracing::debug!(
                bike = %bike.id,
                slot = %slot_key(component.component_type, component.location),
                "Slot already filled, skipping"
            );
            continue;
        }

        match store.insert(&component) {
            Ok(()) => {}
            Err(e) if e.is_unique_violation() => {
                tracing::warn!(
                    bike = %bike.id,
                    component_type = %component.component_type,
                    "Concurrent insert claimed slot, skipping"
                );
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        store.open_install(&BikeComponentInstall {
            id: Uuid::new_v4(),
            user_id,
            bike_id: bike.id,
            component_id: component.id,
            slot_key: slot_key(component.component_type, component.location),
            installed_at: component.installed_at.unwrap_or(at),
            removed_at: None,
        })?;

        created.push(component);
    }

    // A re-run may have filled one end of a pair whose other end already existed
    let mut paired_types: Vec<ComponentType> = created
        .iter()
        .map(|c| c.component_type)
        .filter(|t| t.requires_pairing())
        .collect();
    paired_types.dedup();
    for component_type in paired_types {
        relink_pair(conn, bike.id, component_type, None)?;
    }

    // Reload so the returned rows carry their final pair groups
    let mut reloaded = Vec::with_capacity(created.len());
    for c in created {
        if let Some(fresh) = store.get_owned(user_id, c.id)? {
            reloaded.push(fresh);
        }
    }
    Ok(reloaded)
}

impl ComponentManager<'_> {
    /// Create a bike and its initial components in one transaction.
    pub fn create_bike(
        &mut self,
        user_id: Uuid,
        new_bike: NewBike,
        options: &BuildOptions,
    ) -> ComponentResult<(Bike, Vec<Component>)> {
        if new_bike.name.trim().is_empty() {
            return Err(ComponentError::InvalidInput("Bike name is required".to_string()));
        }

        let now = Utc::now();
        let bike = Bike {
            id: Uuid::new_v4(),
            user_id,
            name: new_bike.name,
            manufacturer: new_bike.manufacturer,
            model: new_bike.model,
            year: new_bike.year,
            spec: new_bike.spec,
            created_at: now,
            updated_at: now,
        };

        let components = self.write(user_id, Some(bike.id), |tx, touched| {
            BikeStore::new(tx).insert(&bike)?;
            touched.bike(bike.id);
            build_components(tx, user_id, &bike, options, now)
        })?;

        tracing::info!(
            bike = %bike.id,
            components = components.len(),
            "Created bike with initial components"
        );
        Ok((bike, components))
    }

    /// Re-run the factory for an existing bike, filling only empty slots.
    pub fn rebuild_components(
        &mut self,
        user_id: Uuid,
        bike_id: Uuid,
        options: &BuildOptions,
    ) -> ComponentResult<Vec<Component>> {
        self.write(user_id, Some(bike_id), |tx, touched| {
            let bike = owned_bike(tx, user_id, bike_id)?;
            touched.bike(bike.id);
            build_components(tx, user_id, &bike, options, Utc::now())
        })
    }
}
