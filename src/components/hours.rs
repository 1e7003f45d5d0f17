//! Hours accounting: wear accrues to whatever is mounted on a bike.
//!
//! Ride events are turned into signed per-bike adjustments and applied to
//! every component currently installed on that bike. Slot identity plays no
//! part here.

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ComponentResult;
use super::manager::ComponentManager;
use super::store::ComponentStore;
use super::types::Component;

/// Below this magnitude an adjustment is treated as zero.
const HOURS_EPSILON: f64 = 1e-9;

/// The wear-relevant part of a ride.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RideUsage {
    /// Bike the ride was logged against, if any
    pub bike_id: Option<Uuid>,
    pub duration_seconds: u32,
}

impl RideUsage {
    pub fn new(bike_id: Option<Uuid>, duration_seconds: u32) -> Self {
        Self {
            bike_id,
            duration_seconds,
        }
    }

    pub fn hours(&self) -> f64 {
        self.duration_seconds as f64 / 3600.0
    }
}

/// A signed change to the hours of every component on one bike.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoursAdjustment {
    pub bike_id: Uuid,
    pub delta_hours: f64,
}

/// Adjustments for a ride whose bike and/or duration changed.
///
/// A bike change moves the old duration off the old bike and the new
/// duration onto the new one. A duration change on the same bike applies
/// only the difference.
pub fn plan_ride_update(old: &RideUsage, new: &RideUsage) -> Vec<HoursAdjustment> {
    let mut plan = Vec::new();

    if old.bike_id == new.bike_id {
        if let Some(bike_id) = new.bike_id {
            plan.push(HoursAdjustment {
                bike_id,
                delta_hours: new.hours() - old.hours(),
            });
        }
    } else {
        if let Some(bike_id) = old.bike_id {
            plan.push(HoursAdjustment {
                bike_id,
                delta_hours: -old.hours(),
            });
        }
        if let Some(bike_id) = new.bike_id {
            plan.push(HoursAdjustment {
                bike_id,
                delta_hours: new.hours(),
            });
        }
    }

    plan.retain(|adj| adj.delta_hours.abs() > HOURS_EPSILON);
    plan
}

/// Net adjustments for moving many rides onto `new_bike` (or off any bike).
pub fn plan_reassignment(rides: &[RideUsage], new_bike: Option<Uuid>) -> Vec<HoursAdjustment> {
    let mut totals: BTreeMap<Uuid, f64> = BTreeMap::new();

    for ride in rides {
        let moved = RideUsage::new(new_bike, ride.duration_seconds);
        for adj in plan_ride_update(ride, &moved) {
            *totals.entry(adj.bike_id).or_insert(0.0) += adj.delta_hours;
        }
    }

    totals
        .into_iter()
        .filter(|(_, delta)| delta.abs() > HOURS_EPSILON)
        .map(|(bike_id, delta_hours)| HoursAdjustment {
            bike_id,
            delta_hours,
        })
        .collect()
}

/// Apply one adjustment inside an open transaction. Returns rows touched.
fn apply_adjustment(conn: &Connection, user_id: Uuid, adj: &HoursAdjustment) -> ComponentResult<usize> {
    let store = ComponentStore::new(conn);

    if adj.delta_hours > 0.0 {
        let rows = store.add_hours(adj.bike_id, user_id, adj.delta_hours)?;
        tracing::debug!(bike = %adj.bike_id, hours = adj.delta_hours, rows, "Added component hours");
        Ok(rows)
    } else if adj.delta_hours < 0.0 {
        let rows = store.subtract_hours(adj.bike_id, user_id, -adj.delta_hours)?;
        let clamped = store.clamp_negative_hours(adj.bike_id, user_id)?;
        tracing::debug!(
            bike = %adj.bike_id,
            hours = adj.delta_hours,
            rows,
            clamped,
            "Removed component hours"
        );
        Ok(rows)
    } else {
        Ok(0)
    }
}

impl ComponentManager<'_> {
    /// Add `delta` hours to every component installed on the bike.
    ///
    /// No-op for `delta <= 0`. Returns the bike's components after the change.
    pub fn increment_hours(
        &mut self,
        bike_id: Uuid,
        user_id: Uuid,
        delta: f64,
    ) -> ComponentResult<Vec<Component>> {
        self.adjust_hours(bike_id, user_id, delta, 1.0)
    }

    /// Remove `delta` hours from every component installed on the bike, flooring at zero.
    ///
    /// No-op for `delta <= 0`. Returns the bike's components after the change.
    pub fn decrement_hours(
        &mut self,
        bike_id: Uuid,
        user_id: Uuid,
        delta: f64,
    ) -> ComponentResult<Vec<Component>> {
        self.adjust_hours(bike_id, user_id, delta, -1.0)
    }

    fn adjust_hours(
        &mut self,
        bike_id: Uuid,
        user_id: Uuid,
        delta: f64,
        sign: f64,
    ) -> ComponentResult<Vec<Component>> {
        // NaN fails the comparison and is ignored along with non-positive deltas
        if !(delta > 0.0) || !delta.is_finite() {
            return Ok(ComponentStore::new(self.conn()).list_for_bike(user_id, bike_id)?);
        }

        let adj = HoursAdjustment {
            bike_id,
            delta_hours: sign * delta,
        };
        self.write(user_id, Some(bike_id), |tx, touched| {
            apply_adjustment(tx, user_id, &adj)?;
            touched.bike(bike_id);
            Ok(ComponentStore::new(tx).list_for_bike(user_id, bike_id)?)
        })
    }

    /// Apply a set of signed adjustments in one transaction.
    pub fn apply_hours_adjustments(
        &mut self,
        user_id: Uuid,
        adjustments: &[HoursAdjustment],
    ) -> ComponentResult<usize> {
        let adjustments: Vec<HoursAdjustment> = adjustments
            .iter()
            .copied()
            .filter(|adj| adj.delta_hours.is_finite() && adj.delta_hours.abs() > HOURS_EPSILON)
            .collect();
        if adjustments.is_empty() {
            return Ok(0);
        }

        let hint = match adjustments.as_slice() {
            [only] => Some(only.bike_id),
            _ => None,
        };
        self.write(user_id, hint, |tx, touched| {
            let mut rows = 0;
            for adj in &adjustments {
                rows += apply_adjustment(tx, user_id, adj)?;
                touched.bike(adj.bike_id);
            }
            Ok(rows)
        })
    }

    /// A ride was logged.
    pub fn record_ride_created(&mut self, user_id: Uuid, ride: &RideUsage) -> ComponentResult<usize> {
        let plan = plan_ride_update(&RideUsage::new(None, 0), ride);
        self.apply_hours_adjustments(user_id, &plan)
    }

    /// A ride was deleted (including a duplicate removed by merge).
    pub fn record_ride_deleted(&mut self, user_id: Uuid, ride: &RideUsage) -> ComponentResult<usize> {
        let plan = plan_ride_update(ride, &RideUsage::new(None, 0));
        self.apply_hours_adjustments(user_id, &plan)
    }

    /// A ride's bike or duration changed.
    pub fn record_ride_updated(
        &mut self,
        user_id: Uuid,
        old: &RideUsage,
        new: &RideUsage,
    ) -> ComponentResult<usize> {
        self.apply_hours_adjustments(user_id, &plan_ride_update(old, new))
    }

    /// Many rides were assigned to `new_bike` at once.
    pub fn reassign_rides(
        &mut self,
        user_id: Uuid,
        rides: &[RideUsage],
        new_bike: Option<Uuid>,
    ) -> ComponentResult<usize> {
        self.apply_hours_adjustments(user_id, &plan_reassignment(rides, new_bike))
    }

    /// Move historical ride time between bikes, as when a gear mapping is
    /// created (`from = None`) or removed (`to = None`).
    pub fn transfer_ride_hours(
        &mut self,
        user_id: Uuid,
        from: Option<Uuid>,
        to: Option<Uuid>,
        total_seconds: u64,
    ) -> ComponentResult<usize> {
        let hours = total_seconds as f64 / 3600.0;
        let mut plan = Vec::new();
        if from != to {
            if let Some(bike_id) = from {
                plan.push(HoursAdjustment {
                    bike_id,
                    delta_hours: -hours,
                });
            }
            if let Some(bike_id) = to {
                plan.push(HoursAdjustment {
                    bike_id,
                    delta_hours: hours,
                });
            }
        }
        self.apply_hours_adjustments(user_id, &plan)
    }
}
