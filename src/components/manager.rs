//! Transactional façade over the component store.
//!
//! Every state-changing operation runs in exactly one IMMEDIATE transaction
//! (the write lock is held before the first read that guides a write), and
//! the prediction cache is invalidated before the transaction starts and
//! again after it commits. The operations themselves live in sibling modules
//! as `impl ComponentManager` blocks.

use std::collections::BTreeSet;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

use super::error::{ComponentError, ComponentResult};
use super::store::ComponentStore;
use super::types::{BikeComponentInstall, Component};
use crate::bikes::{Bike, BikeStore};
use crate::cache::PredictionCache;
use crate::storage::{Database, DatabaseError, EngineSettings};

/// Bikes whose component state changed inside a transaction.
#[derive(Debug, Default)]
pub struct Touched {
    bikes: BTreeSet<Uuid>,
}

impl Touched {
    pub fn bike(&mut self, bike_id: Uuid) {
        self.bikes.insert(bike_id);
    }

    pub fn maybe_bike(&mut self, bike_id: Option<Uuid>) {
        if let Some(id) = bike_id {
            self.bikes.insert(id);
        }
    }
}

/// Entry point for component lifecycle, wear and service operations.
pub struct ComponentManager<'a> {
    conn: &'a mut Connection,
    cache: &'a dyn PredictionCache,
    settings: EngineSettings,
}

impl<'a> ComponentManager<'a> {
    /// Create a manager over an open database.
    pub fn new(db: &'a mut Database, cache: &'a dyn PredictionCache) -> Self {
        Self {
            conn: db.connection_mut(),
            cache,
            settings: EngineSettings::default(),
        }
    }

    /// Use non-default engine limits and timeouts.
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Read-only access for queries.
    pub(crate) fn conn(&self) -> &Connection {
        &*self.conn
    }

    /// Run a write inside one transaction with the ordinary busy timeout.
    pub(crate) fn write<T>(
        &mut self,
        user_id: Uuid,
        bike_hint: Option<Uuid>,
        op: impl FnOnce(&Transaction, &mut Touched) -> ComponentResult<T>,
    ) -> ComponentResult<T> {
        let timeout = self.settings.busy_timeout();
        self.write_with_timeout(user_id, bike_hint, timeout, op)
    }

    /// Run a write inside one transaction, waiting at most `timeout` for the write lock.
    pub(crate) fn write_with_timeout<T>(
        &mut self,
        user_id: Uuid,
        bike_hint: Option<Uuid>,
        timeout: Duration,
        op: impl FnOnce(&Transaction, &mut Touched) -> ComponentResult<T>,
    ) -> ComponentResult<T> {
        self.cache.invalidate(user_id, bike_hint);

        self.conn.busy_timeout(timeout)?;
        let result = self.run_transaction(op);
        if timeout != self.settings.busy_timeout() {
            self.conn.busy_timeout(self.settings.busy_timeout())?;
        }
        let (value, touched) = result?;

        if touched.bikes.is_empty() {
            self.cache.invalidate(user_id, bike_hint);
        } else {
            for bike_id in touched.bikes {
                self.cache.invalidate(user_id, Some(bike_id));
            }
        }

        Ok(value)
    }

    fn run_transaction<T>(
        &mut self,
        op: impl FnOnce(&Transaction, &mut Touched) -> ComponentResult<T>,
    ) -> ComponentResult<(T, Touched)> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        let mut touched = Touched::default();
        // Dropping the transaction on error rolls it back
        let value = op(&tx, &mut touched)?;

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok((value, touched))
    }

    // ========== Queries ==========

    /// Get a bike owned by the user.
    pub fn get_bike(&self, user_id: Uuid, bike_id: Uuid) -> ComponentResult<Bike> {
        owned_bike(self.conn(), user_id, bike_id)
    }

    /// List the user's bikes.
    pub fn list_bikes(&self, user_id: Uuid) -> ComponentResult<Vec<Bike>> {
        Ok(BikeStore::new(self.conn()).list_for_user(user_id)?)
    }

    /// Get a component owned by the user.
    pub fn get_component(&self, user_id: Uuid, component_id: Uuid) -> ComponentResult<Component> {
        owned_component(self.conn(), user_id, component_id)
    }

    /// Components mounted on a bike.
    pub fn list_bike_components(&self, user_id: Uuid, bike_id: Uuid) -> ComponentResult<Vec<Component>> {
        owned_bike(self.conn(), user_id, bike_id)?;
        Ok(ComponentStore::new(self.conn()).list_for_bike(user_id, bike_id)?)
    }

    /// Spare parts not mounted on any bike.
    pub fn list_inventory(&self, user_id: Uuid) -> ComponentResult<Vec<Component>> {
        Ok(ComponentStore::new(self.conn()).list_inventory(user_id)?)
    }

    /// Every component the user owns, retired ones included.
    pub fn list_all_components(&self, user_id: Uuid) -> ComponentResult<Vec<Component>> {
        Ok(ComponentStore::new(self.conn()).list_for_user(user_id)?)
    }

    /// Where a component has been mounted over time.
    pub fn install_history(
        &self,
        user_id: Uuid,
        component_id: Uuid,
    ) -> ComponentResult<Vec<BikeComponentInstall>> {
        owned_component(self.conn(), user_id, component_id)?;
        Ok(ComponentStore::new(self.conn()).install_history(component_id)?)
    }

    /// Every mounting event on a bike.
    pub fn bike_install_history(
        &self,
        user_id: Uuid,
        bike_id: Uuid,
    ) -> ComponentResult<Vec<BikeComponentInstall>> {
        owned_bike(self.conn(), user_id, bike_id)?;
        Ok(ComponentStore::new(self.conn()).bike_install_history(bike_id)?)
    }
}

/// Load a bike, treating another user's bike as missing.
pub(crate) fn owned_bike(conn: &Connection, user_id: Uuid, bike_id: Uuid) -> ComponentResult<Bike> {
    BikeStore::new(conn)
        .get_owned(user_id, bike_id)?
        .ok_or_else(|| ComponentError::NotFound(format!("Bike {}", bike_id)))
}

/// Load a component, treating another user's component as missing.
pub(crate) fn owned_component(
    conn: &Connection,
    user_id: Uuid,
    component_id: Uuid,
) -> ComponentResult<Component> {
    ComponentStore::new(conn)
        .get_owned(user_id, component_id)?
        .ok_or_else(|| ComponentError::NotFound(format!("Component {}", component_id)))
}

/// Surface a unique-constraint race as a user-facing conflict.
pub(crate) fn conflict_on_unique(err: DatabaseError, what: &str) -> ComponentError {
    if err.is_unique_violation() {
        ComponentError::Conflict(format!("{} is already taken", what))
    } else {
        ComponentError::Database(err)
    }
}
