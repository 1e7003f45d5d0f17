//! Lifecycle operations: install, swap, replace and the pairing backfill.
//!
//! Components move INVENTORY -> INSTALLED -> RETIRED. Each operation runs in
//! one transaction, so a failure at any step leaves no partial state behind.
//! Ownership and input checks run inside that transaction before the first
//! write.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::error::{ComponentError, ComponentResult};
use super::manager::{conflict_on_unique, owned_bike, owned_component, ComponentManager, Touched};
use super::slot::{slot_key, Slot};
use super::store::ComponentStore;
use super::types::{
    BikeComponentInstall, Component, ComponentStatus, ComponentType, ComponentUpdate, FieldUpdate,
    Location, PartSpec,
};

/// Where the part being installed comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum InstallSource {
    /// A component the user already owns
    Existing(Uuid),
    /// A freshly acquired part
    New(PartSpec),
}

impl InstallSource {
    /// Build a source from two optional request fields. Exactly one must be set.
    pub fn from_parts(existing: Option<Uuid>, new: Option<PartSpec>) -> ComponentResult<Self> {
        match (existing, new) {
            (Some(id), None) => Ok(InstallSource::Existing(id)),
            (None, Some(spec)) => Ok(InstallSource::New(spec)),
            (Some(_), Some(_)) => Err(ComponentError::InvalidInput(
                "Provide either an existing component or a new part, not both".to_string(),
            )),
            (None, None) => Err(ComponentError::InvalidInput(
                "An existing component or a new part is required".to_string(),
            )),
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, InstallSource::New(_))
    }
}

/// Whether an operation should also act on the opposite end of a pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairingOptions<S> {
    pub also_replace_pair: bool,
    /// What goes into the paired slot; defaults depend on the operation
    pub pair: Option<S>,
}

impl<S> Default for PairingOptions<S> {
    fn default() -> Self {
        Self {
            also_replace_pair: false,
            pair: None,
        }
    }
}

impl<S> PairingOptions<S> {
    /// Act on the given slot only.
    pub fn single() -> Self {
        Self::default()
    }

    /// Act on both ends of the pair.
    pub fn both(pair: Option<S>) -> Self {
        Self {
            also_replace_pair: true,
            pair,
        }
    }
}

/// Outcome of [`ComponentManager::install_component`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallResult {
    pub installed: Component,
    /// Previous occupant of the slot, retired or returned to inventory
    pub displaced: Option<Component>,
    pub pair_installed: Option<Component>,
    pub pair_displaced: Option<Component>,
}

/// Outcome of [`ComponentManager::swap_components`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapResult {
    /// The component that was in slot A, now in slot B
    pub first: Component,
    /// The component that was in slot B, now in slot A
    pub second: Component,
}

/// Outcome of [`ComponentManager::replace_component`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaceResult {
    pub retired: Vec<Component>,
    pub successors: Vec<Component>,
}

/// Outcome of [`ComponentManager::migrate_paired_components`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Legacy components converted in place to FRONT
    pub converted: usize,
    /// REAR clones created
    pub created: usize,
    /// Legacy components left alone because a FRONT or REAR slot was taken
    pub skipped: usize,
    /// The user already had paired components, nothing was done
    pub already_migrated: bool,
}

/// What happens to a component taken off a bike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Inventory,
    Retire,
}

// ========== Shared Steps ==========

/// Trimmed copy of a part description; brand and model are required.
pub(crate) fn part_spec(spec: &PartSpec) -> ComponentResult<PartSpec> {
    let brand = spec.brand.trim();
    let model = spec.model.trim();
    if brand.is_empty() || model.is_empty() {
        return Err(ComponentError::InvalidInput(
            "Brand and model are required".to_string(),
        ));
    }
    Ok(PartSpec {
        brand: brand.to_string(),
        model: model.to_string(),
        notes: spec
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
    })
}

/// Parse a slot key that a component can be mounted in.
///
/// The legacy location-less slot of a pairing type is not mountable.
fn mountable_slot(key: &str) -> ComponentResult<Slot> {
    let slot: Slot = key.parse()?;
    if slot.component_type.requires_pairing() && slot.location == Location::None {
        return Err(ComponentError::InvalidInput(format!(
            "Slot {} needs a FRONT or REAR location",
            key
        )));
    }
    Ok(slot)
}

fn close_open_installs(store: &ComponentStore, component_id: Uuid, at: DateTime<Utc>) -> ComponentResult<()> {
    for install in store.open_installs_for_component(component_id)? {
        store.close_install(install.id, at)?;
    }
    Ok(())
}

/// Take a component off its bike. Returns the bike it left, if any.
fn unmount(
    store: &ComponentStore,
    c: &mut Component,
    disposition: Disposition,
    at: DateTime<Utc>,
) -> ComponentResult<Option<Uuid>> {
    close_open_installs(store, c.id, at)?;
    release_inventory_partner(store, c, at)?;

    let left = c.bike_id.take();
    c.pair_group_id = None;
    match disposition {
        Disposition::Inventory => {
            c.status = ComponentStatus::Inventory;
            c.installed_at = None;
        }
        Disposition::Retire => {
            c.status = ComponentStatus::Retired;
            c.retired_at = Some(at);
        }
    }
    c.updated_at = at;
    store.save(c)?;
    Ok(left)
}

/// Clear the group of a spare partner that `c` is about to leave.
///
/// Mounted partners are regrouped by `relink_pair` instead.
fn release_inventory_partner(store: &ComponentStore, c: &Component, at: DateTime<Utc>) -> ComponentResult<()> {
    if let Some(mut partner) = store.find_pair_partner(c)? {
        if partner.bike_id.is_none() {
            partner.pair_group_id = None;
            partner.updated_at = at;
            store.save(&partner)?;
            tracing::debug!(component = %partner.id, "Cleared pair group of spare partner");
        }
    }
    Ok(())
}

/// Put a component into a slot and open its install row.
///
/// `insert` writes a new row instead of updating an existing one. The pair
/// group is left as the caller set it.
fn mount(
    store: &ComponentStore,
    c: &mut Component,
    bike_id: Uuid,
    slot: Slot,
    at: DateTime<Utc>,
    insert: bool,
) -> ComponentResult<()> {
    c.bike_id = Some(bike_id);
    c.location = slot.location;
    c.status = ComponentStatus::Installed;
    c.installed_at = Some(at);
    c.updated_at = at;

    let what = format!("Slot {} on bike {}", slot, bike_id);
    let written = if insert { store.insert(c) } else { store.save(c) };
    written.map_err(|e| conflict_on_unique(e, &what))?;

    store
        .open_install(&BikeComponentInstall {
            id: Uuid::new_v4(),
            user_id: c.user_id,
            bike_id,
            component_id: c.id,
            slot_key: slot.key(),
            installed_at: at,
            removed_at: None,
        })
        .map_err(|e| conflict_on_unique(e, &what))?;
    Ok(())
}

/// Point the FRONT and REAR occupants of a pairing type at one shared group.
///
/// Uses `prefer` if given, else whichever group one of them already has,
/// else a fresh one. A lone occupant has its group cleared so that no group
/// ever names a single component. Returns the group in use, if any.
pub(crate) fn relink_pair(
    conn: &Connection,
    bike_id: Uuid,
    component_type: ComponentType,
    prefer: Option<Uuid>,
) -> ComponentResult<Option<Uuid>> {
    let store = ComponentStore::new(conn);
    let front = store.find_in_slot(bike_id, component_type, Location::Front)?;
    let rear = store.find_in_slot(bike_id, component_type, Location::Rear)?;
    let now = Utc::now();

    match (front, rear) {
        (Some(mut front), Some(mut rear)) => {
            let group = prefer
                .or(front.pair_group_id)
                .or(rear.pair_group_id)
                .unwrap_or_else(Uuid::new_v4);
            for c in [&mut front, &mut rear] {
                if c.pair_group_id != Some(group) {
                    c.pair_group_id = Some(group);
                    c.updated_at = now;
                    store.save(c)?;
                }
            }
            Ok(Some(group))
        }
        (Some(mut lone), None) | (None, Some(mut lone)) => {
            if lone.pair_group_id.take().is_some() {
                lone.updated_at = now;
                store.save(&lone)?;
                tracing::debug!(
                    bike = %bike_id,
                    component = %lone.id,
                    "Cleared pair group of unpaired component"
                );
            }
            Ok(None)
        }
        (None, None) => Ok(None),
    }
}

fn relink_all(conn: &Connection, pending: &BTreeSet<(Uuid, ComponentType)>) -> ComponentResult<()> {
    for &(bike_id, component_type) in pending {
        relink_pair(conn, bike_id, component_type, None)?;
    }
    Ok(())
}

// ========== Install ==========

/// Reject a source that cannot go into `slot`, before anything is written.
fn check_source(conn: &Connection, user_id: Uuid, slot: Slot, source: &InstallSource) -> ComponentResult<()> {
    match source {
        InstallSource::New(spec) => part_spec(spec).map(|_| ()),
        InstallSource::Existing(id) => {
            let c = owned_component(conn, user_id, *id)?;
            if c.is_retired() {
                return Err(ComponentError::InvalidInput(format!(
                    "Component {} is retired",
                    c.id
                )));
            }
            if c.component_type != slot.component_type {
                return Err(ComponentError::InvalidInput(format!(
                    "Cannot install {} into slot {}",
                    c.component_type, slot
                )));
            }
            Ok(())
        }
    }
}

/// Ids written by installing into one slot.
struct SlotOutcome {
    installed: Uuid,
    displaced: Option<Uuid>,
}

#[allow(clippy::too_many_arguments)]
fn install_into_slot(
    conn: &Connection,
    user_id: Uuid,
    bike_id: Uuid,
    slot: Slot,
    source: &InstallSource,
    at: DateTime<Utc>,
    touched: &mut Touched,
    relinks: &mut BTreeSet<(Uuid, ComponentType)>,
) -> ComponentResult<SlotOutcome> {
    let store = ComponentStore::new(conn);
    let pairing = slot.component_type.requires_pairing();

    let mut incoming = match source {
        InstallSource::Existing(id) => {
            let mut c = owned_component(conn, user_id, *id)?;
            // The other end of this install may have just retired it
            if c.is_retired() {
                return Err(ComponentError::InvalidInput(format!(
                    "Component {} is retired",
                    c.id
                )));
            }
            if c.bike_id == Some(bike_id) && c.location == slot.location {
                return Ok(SlotOutcome {
                    installed: c.id,
                    displaced: None,
                });
            }
            // Detach from wherever it is mounted now
            if let Some(from_bike) = unmount(&store, &mut c, Disposition::Inventory, at)? {
                touched.bike(from_bike);
                if pairing {
                    relinks.insert((from_bike, slot.component_type));
                }
            }
            c
        }
        InstallSource::New(spec) => {
            Component::new(user_id, slot.component_type, slot.location, &part_spec(spec)?)
                .confirmed_fresh(at)
        }
    };

    if let Some(open) = store.open_install_for_slot(bike_id, &slot.key())? {
        store.close_install(open.id, at)?;
    }

    // A new part replaces the occupant; a spare only relocates it
    let disposition = if source.is_new() {
        Disposition::Retire
    } else {
        Disposition::Inventory
    };
    let mut displaced = match store.find_in_slot(bike_id, slot.component_type, slot.location)? {
        Some(mut occupant) => {
            unmount(&store, &mut occupant, disposition, at)?;
            Some(occupant)
        }
        None => None,
    };

    incoming.pair_group_id = None;
    mount(&store, &mut incoming, bike_id, slot, at, source.is_new())?;

    if let Some(old) = displaced.as_mut().filter(|c| c.is_retired()) {
        old.replaced_by_id = Some(incoming.id);
        store.save(old)?;
    }

    touched.bike(bike_id);
    if pairing {
        relinks.insert((bike_id, slot.component_type));
    }

    Ok(SlotOutcome {
        installed: incoming.id,
        displaced: displaced.map(|c| c.id),
    })
}

impl ComponentManager<'_> {
    /// Install a spare or a brand-new part into a bike slot.
    ///
    /// The slot's previous occupant is retired when a new part goes in and
    /// returned to inventory when a spare goes in. With
    /// `pairing.also_replace_pair` on a pairing type the opposite slot is
    /// handled the same way, each slot's displacement decided by its own
    /// source. A missing pair source defaults to the primary's new part; a
    /// spare primary needs an explicit pair source.
    pub fn install_component(
        &mut self,
        user_id: Uuid,
        bike_id: Uuid,
        slot_key: &str,
        source: InstallSource,
        pairing: PairingOptions<InstallSource>,
    ) -> ComponentResult<InstallResult> {
        let slot = mountable_slot(slot_key)?;

        let pair = match (pairing.also_replace_pair, slot.opposite()) {
            (true, Some(opposite)) => {
                let pair_source = match (pairing.pair, &source) {
                    (Some(pair_source), _) => pair_source,
                    (None, InstallSource::New(spec)) => InstallSource::New(spec.clone()),
                    (None, InstallSource::Existing(_)) => {
                        return Err(ComponentError::InvalidInput(
                            "A source for the paired slot is required when installing a spare"
                                .to_string(),
                        ))
                    }
                };
                if let (InstallSource::Existing(a), InstallSource::Existing(b)) = (&source, &pair_source) {
                    if a == b {
                        return Err(ComponentError::InvalidInput(
                            "The same component cannot fill both ends of a pair".to_string(),
                        ));
                    }
                }
                Some((opposite, pair_source))
            }
            _ => None,
        };

        let result = self.write(user_id, Some(bike_id), |tx, touched| {
            owned_bike(tx, user_id, bike_id)?;
            check_source(tx, user_id, slot, &source)?;
            if let Some((pair_slot, pair_source)) = &pair {
                check_source(tx, user_id, *pair_slot, pair_source)?;
                if let (InstallSource::New(_), InstallSource::Existing(id)) = (&source, pair_source) {
                    let store = ComponentStore::new(tx);
                    if let Some(occupant) = store.find_in_slot(bike_id, slot.component_type, slot.location)? {
                        if occupant.id == *id {
                            return Err(ComponentError::InvalidInput(format!(
                                "Component {} is retired by the new part in {} and cannot move to {}",
                                id, slot, pair_slot
                            )));
                        }
                    }
                }
            }

            let now = Utc::now();
            let mut relinks = BTreeSet::new();
            let primary = install_into_slot(tx, user_id, bike_id, slot, &source, now, touched, &mut relinks)?;
            let secondary = match &pair {
                Some((pair_slot, pair_source)) => Some(install_into_slot(
                    tx,
                    user_id,
                    bike_id,
                    *pair_slot,
                    pair_source,
                    now,
                    touched,
                    &mut relinks,
                )?),
                None => None,
            };
            relink_all(tx, &relinks)?;

            let load = |id: Uuid| owned_component(tx, user_id, id);
            let load_opt = |id: Option<Uuid>| id.map(load).transpose();
            Ok(InstallResult {
                installed: load(primary.installed)?,
                displaced: load_opt(primary.displaced)?,
                pair_installed: load_opt(secondary.as_ref().map(|s| s.installed))?,
                pair_displaced: load_opt(secondary.and_then(|s| s.displaced))?,
            })
        })?;

        tracing::info!(
            bike = %bike_id,
            slot = %slot,
            component = %result.installed.id,
            displaced = ?result.displaced.as_ref().map(|c| c.id),
            paired = result.pair_installed.is_some(),
            "Installed component"
        );
        Ok(result)
    }

    // ========== Swap ==========

    /// Exchange the occupants of two slots holding the same component type.
    ///
    /// Pure relocation: nothing is created or retired and hours are untouched.
    pub fn swap_components(
        &mut self,
        user_id: Uuid,
        bike_a: Uuid,
        slot_a: &str,
        bike_b: Uuid,
        slot_b: &str,
    ) -> ComponentResult<SwapResult> {
        let slot_a = mountable_slot(slot_a)?;
        let slot_b = mountable_slot(slot_b)?;
        if slot_a.component_type != slot_b.component_type {
            return Err(ComponentError::InvalidInput(format!(
                "Cannot swap {} with {}",
                slot_a, slot_b
            )));
        }
        if bike_a == bike_b && slot_a == slot_b {
            return Err(ComponentError::InvalidInput(
                "Cannot swap a slot with itself".to_string(),
            ));
        }

        let hint = (bike_a == bike_b).then_some(bike_a);
        let result = self.write(user_id, hint, |tx, touched| {
            owned_bike(tx, user_id, bike_a)?;
            owned_bike(tx, user_id, bike_b)?;

            let store = ComponentStore::new(tx);
            let occupant = |bike_id: Uuid, slot: Slot| -> ComponentResult<Component> {
                store
                    .find_in_slot(bike_id, slot.component_type, slot.location)?
                    .ok_or_else(|| {
                        ComponentError::NotFound(format!("Component in slot {} on bike {}", slot, bike_id))
                    })
            };
            let mut a = occupant(bike_a, slot_a)?;
            let mut b = occupant(bike_b, slot_b)?;

            let now = Utc::now();
            close_open_installs(&store, a.id, now)?;
            close_open_installs(&store, b.id, now)?;

            // Free slot A so B can move into it
            a.bike_id = None;
            a.pair_group_id = None;
            store.save(&a)?;

            b.pair_group_id = None;
            mount(&store, &mut b, bike_a, slot_a, now, false)?;
            mount(&store, &mut a, bike_b, slot_b, now, false)?;

            if slot_a.component_type.requires_pairing() {
                relink_pair(tx, bike_a, slot_a.component_type, None)?;
                if bike_b != bike_a {
                    relink_pair(tx, bike_b, slot_b.component_type, None)?;
                }
            }
            touched.bike(bike_a);
            touched.bike(bike_b);

            Ok(SwapResult {
                first: owned_component(tx, user_id, a.id)?,
                second: owned_component(tx, user_id, b.id)?,
            })
        })?;

        tracing::info!(
            first = %result.first.id,
            second = %result.second.id,
            "Swapped components between {} and {}",
            slot_a,
            slot_b
        );
        Ok(result)
    }

    // ========== Replace ==========

    /// Retire a component and put a brand-new successor in its place.
    ///
    /// The successor starts at zero wear with high confidence. With
    /// `pairing.also_replace_pair` the pair partner is replaced too, using
    /// `pairing.pair` or else the same part. Both successors share a freshly
    /// generated pair group.
    pub fn replace_component(
        &mut self,
        user_id: Uuid,
        component_id: Uuid,
        new_spec: PartSpec,
        pairing: PairingOptions<PartSpec>,
    ) -> ComponentResult<ReplaceResult> {
        let primary_spec = part_spec(&new_spec)?;
        let pair_spec = pairing.pair.as_ref().map(part_spec).transpose()?;

        let result = self.write(user_id, None, |tx, touched| {
            let store = ComponentStore::new(tx);
            let original = owned_component(tx, user_id, component_id)?;
            if original.is_retired() {
                return Err(ComponentError::InvalidInput(format!(
                    "Component {} is already retired",
                    original.id
                )));
            }
            let component_type = original.component_type;

            let mut targets = vec![(original.clone(), primary_spec.clone())];
            if pairing.also_replace_pair && component_type.requires_pairing() {
                match pair_partner(&store, &original)? {
                    Some(partner) => {
                        let spec = pair_spec.clone().unwrap_or_else(|| primary_spec.clone());
                        targets.push((partner, spec));
                    }
                    None => tracing::warn!(component = %original.id, "No pair partner to replace"),
                }
            }
            let both_ends = targets.len() == 2;

            let now = Utc::now();
            let group = Uuid::new_v4();
            let mut retired_ids = Vec::new();
            let mut successor_ids = Vec::new();
            let mut bikes = BTreeSet::new();

            for (mut old, spec) in targets {
                let location = old.location;
                let bike_id = unmount(&store, &mut old, Disposition::Retire, now)?;

                let mut successor =
                    Component::new(user_id, component_type, location, &spec).confirmed_fresh(now);
                let pairable = component_type.requires_pairing() && location != Location::None;
                match bike_id {
                    Some(bike_id) => {
                        successor.pair_group_id = pairable.then_some(group);
                        mount(&store, &mut successor, bike_id, Slot::new(component_type, location), now, true)?;
                        touched.bike(bike_id);
                        bikes.insert(bike_id);
                    }
                    None => {
                        successor.pair_group_id = (pairable && both_ends).then_some(group);
                        store.insert(&successor)?;
                    }
                }

                old.replaced_by_id = Some(successor.id);
                store.save(&old)?;
                retired_ids.push(old.id);
                successor_ids.push(successor.id);
            }

            if component_type.requires_pairing() {
                for bike_id in bikes {
                    relink_pair(tx, bike_id, component_type, Some(group))?;
                }
            }

            let load_all = |ids: Vec<Uuid>| -> ComponentResult<Vec<Component>> {
                ids.into_iter().map(|id| owned_component(tx, user_id, id)).collect()
            };
            Ok(ReplaceResult {
                retired: load_all(retired_ids)?,
                successors: load_all(successor_ids)?,
            })
        })?;

        tracing::info!(
            component = %component_id,
            replaced = result.retired.len(),
            "Replaced component"
        );
        Ok(result)
    }

    // ========== Pairing Backfill ==========

    /// Convert legacy single-unit components of pairing types into FRONT/REAR pairs.
    ///
    /// Each legacy component becomes the FRONT member in place and gains a
    /// REAR clone carrying the same wear, baseline and service state. Does
    /// nothing once the user has any paired component. Runs as one
    /// transaction with the extended migration busy timeout.
    pub fn migrate_paired_components(&mut self, user_id: Uuid) -> ComponentResult<MigrationReport> {
        let timeout = self.settings().migration_busy_timeout();

        let report = self.write_with_timeout(user_id, None, timeout, |tx, touched| {
            let store = ComponentStore::new(tx);
            // Evaluated under the write lock so concurrent runs see each other's result
            if store.has_paired_components(user_id)? {
                return Ok(MigrationReport {
                    already_migrated: true,
                    ..Default::default()
                });
            }

            let now = Utc::now();
            let mut report = MigrationReport::default();

            for legacy in store.list_unpaired_legacy(user_id)? {
                let component_type = legacy.component_type;
                if let Some(bike_id) = legacy.bike_id {
                    let front_taken = store.find_in_slot(bike_id, component_type, Location::Front)?.is_some();
                    let rear_taken = store.find_in_slot(bike_id, component_type, Location::Rear)?.is_some();
                    if front_taken || rear_taken {
                        tracing::warn!(
                            bike = %bike_id,
                            component = %legacy.id,
                            "Paired slot already occupied, leaving legacy component"
                        );
                        report.skipped += 1;
                        continue;
                    }
                }

                let group = Uuid::new_v4();

                let mut front = legacy.clone();
                front.location = Location::Front;
                front.pair_group_id = Some(group);
                front.updated_at = now;
                store.save(&front)?;

                let mut rear = legacy.clone();
                rear.id = Uuid::new_v4();
                rear.location = Location::Rear;
                rear.pair_group_id = Some(group);
                rear.replaced_by_id = None;
                rear.created_at = now;
                rear.updated_at = now;
                store.insert(&rear)?;

                if let Some(bike_id) = legacy.bike_id {
                    close_open_installs(&store, legacy.id, now)?;
                    for c in [&front, &rear] {
                        store.open_install(&BikeComponentInstall {
                            id: Uuid::new_v4(),
                            user_id,
                            bike_id,
                            component_id: c.id,
                            slot_key: slot_key(component_type, c.location),
                            installed_at: now,
                            removed_at: None,
                        })?;
                    }
                    touched.bike(bike_id);
                }

                report.converted += 1;
                report.created += 1;
            }

            Ok(report)
        })?;

        if report.already_migrated {
            tracing::debug!(user = %user_id, "Paired components already present, skipping backfill");
        } else {
            tracing::info!(
                user = %user_id,
                converted = report.converted,
                skipped = report.skipped,
                "Migrated legacy components to front/rear pairs"
            );
        }
        Ok(report)
    }

    // ========== Inventory and Slots ==========

    /// Add a spare part to the user's inventory.
    pub fn add_spare_component(
        &mut self,
        user_id: Uuid,
        component_type: ComponentType,
        location: Location,
        spec: PartSpec,
    ) -> ComponentResult<Component> {
        let spec = part_spec(&spec)?;
        let location = Slot::new(component_type, location).location;

        let component = Component::new(user_id, component_type, location, &spec);
        self.write(user_id, None, |tx, _touched| {
            ComponentStore::new(tx).insert(&component)?;
            Ok(())
        })?;

        tracing::info!(component = %component.id, component_type = %component_type, "Added spare component");
        Ok(component)
    }

    /// Add a part to an empty slot on a bike.
    ///
    /// Fails with `Conflict` when the slot is occupied, including when a
    /// concurrent write fills it first.
    pub fn add_component_to_slot(
        &mut self,
        user_id: Uuid,
        bike_id: Uuid,
        slot_key: &str,
        spec: PartSpec,
    ) -> ComponentResult<Component> {
        let slot = mountable_slot(slot_key)?;
        let spec = part_spec(&spec)?;

        let component = self.write(user_id, Some(bike_id), |tx, touched| {
            owned_bike(tx, user_id, bike_id)?;
            let store = ComponentStore::new(tx);
            if store
                .find_in_slot(bike_id, slot.component_type, slot.location)?
                .is_some()
            {
                return Err(ComponentError::Conflict(format!(
                    "Slot {} on bike {} is already occupied",
                    slot, bike_id
                )));
            }

            let mut component = Component::new(user_id, slot.component_type, slot.location, &spec);
            mount(&store, &mut component, bike_id, slot, Utc::now(), true)?;
            if slot.component_type.requires_pairing() {
                relink_pair(tx, bike_id, slot.component_type, None)?;
            }
            touched.bike(bike_id);
            owned_component(tx, user_id, component.id)
        })?;

        tracing::info!(bike = %bike_id, slot = %slot, component = %component.id, "Added component to slot");
        Ok(component)
    }

    /// Edit a component's descriptive fields and service interval.
    pub fn update_component(
        &mut self,
        user_id: Uuid,
        component_id: Uuid,
        update: ComponentUpdate,
    ) -> ComponentResult<Component> {
        if update.is_empty() {
            return self.get_component(user_id, component_id);
        }
        for (field, value) in [("Brand", &update.brand), ("Model", &update.model)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ComponentError::InvalidInput(format!("{} cannot be empty", field)));
            }
        }
        if let FieldUpdate::Set(hours) = update.service_due_at_hours {
            if !hours.is_finite() || hours <= 0.0 {
                return Err(ComponentError::InvalidInput(format!(
                    "Service interval must be a positive number of hours, got {}",
                    hours
                )));
            }
        }

        self.write(user_id, None, |tx, touched| {
            let mut c = owned_component(tx, user_id, component_id)?;
            if let Some(brand) = update.brand {
                c.brand = brand.trim().to_string();
            }
            if let Some(model) = update.model {
                c.model = model.trim().to_string();
            }
            update.notes.apply_to(&mut c.notes);
            update.service_due_at_hours.apply_to(&mut c.service_due_at_hours);
            c.updated_at = Utc::now();

            ComponentStore::new(tx).save(&c)?;
            touched.maybe_bike(c.bike_id);
            Ok(c)
        })
    }

    /// Permanently delete a spare part along with its history.
    ///
    /// Only inventory parts can be deleted; installed parts must be removed
    /// first and retired parts stay as audit history.
    pub fn delete_spare_component(&mut self, user_id: Uuid, component_id: Uuid) -> ComponentResult<()> {
        self.write(user_id, None, |tx, _touched| {
            let c = owned_component(tx, user_id, component_id)?;
            if c.status != ComponentStatus::Inventory {
                return Err(ComponentError::InvalidInput(format!(
                    "Only inventory components can be deleted, {} is {}",
                    c.id,
                    c.status.as_str()
                )));
            }

            let store = ComponentStore::new(tx);
            release_inventory_partner(&store, &c, Utc::now())?;
            store.clear_replaced_by(c.id)?;
            store.delete(c.id)?;
            Ok(())
        })?;

        tracing::info!(component = %component_id, "Deleted spare component");
        Ok(())
    }
}

/// The other end of a component's pair: by group, else by opposite slot.
fn pair_partner(store: &ComponentStore, c: &Component) -> ComponentResult<Option<Component>> {
    if let Some(partner) = store.find_pair_partner(c)? {
        return Ok(Some(partner));
    }
    match (c.bike_id, c.location.opposite()) {
        (Some(bike_id), Some(opposite)) => Ok(store.find_in_slot(bike_id, c.component_type, opposite)?),
        _ => Ok(None),
    }
}
