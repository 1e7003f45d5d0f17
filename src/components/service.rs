//! Service logging and baseline wear calibration.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use super::error::{ComponentError, ComponentResult};
use super::manager::{owned_component, ComponentManager};
use super::store::ComponentStore;
use super::types::{BaselineUpdate, Component, ServiceLog};

/// One maintenance event to record.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    pub component_id: Uuid,
    /// Defaults to now
    pub performed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl ServiceRequest {
    pub fn new(component_id: Uuid) -> Self {
        Self {
            component_id,
            performed_at: None,
            notes: None,
        }
    }
}

fn check_batch<T>(items: &[T], limit: usize, what: &str) -> ComponentResult<()> {
    if items.len() > limit {
        return Err(ComponentError::InvalidInput(format!(
            "At most {} {} per request, got {}",
            limit,
            what,
            items.len()
        )));
    }
    Ok(())
}

fn check_baseline(update: &BaselineUpdate) -> ComponentResult<()> {
    let wear = update.wear_percent;
    if !wear.is_finite() || !(0.0..=100.0).contains(&wear) {
        return Err(ComponentError::InvalidInput(format!(
            "Baseline wear must be between 0 and 100, got {}",
            wear
        )));
    }
    Ok(())
}

/// Snapshot hours into a log and reset the component's hours to zero.
fn record_service(conn: &Connection, user_id: Uuid, request: &ServiceRequest) -> ComponentResult<(ServiceLog, Option<Uuid>)> {
    let c = owned_component(conn, user_id, request.component_id)?;
    if c.is_retired() {
        return Err(ComponentError::InvalidInput(format!(
            "Component {} is retired",
            c.id
        )));
    }

    let now = Utc::now();
    let log = ServiceLog {
        id: Uuid::new_v4(),
        component_id: c.id,
        performed_at: request.performed_at.unwrap_or(now),
        notes: request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        hours_at_service: c.hours_used,
        created_at: now,
    };

    let store = ComponentStore::new(conn);
    store.insert_service_log(&log)?;
    store.reset_hours(c.id, log.performed_at)?;
    Ok((log, c.bike_id))
}

fn apply_baseline(conn: &Connection, user_id: Uuid, update: &BaselineUpdate) -> ComponentResult<Component> {
    let mut c = owned_component(conn, user_id, update.component_id)?;
    let now = Utc::now();
    c.baseline_wear_percent = update.wear_percent;
    c.baseline_method = update.method;
    c.baseline_confidence = update.confidence;
    c.baseline_set_at = Some(now);
    c.updated_at = now;
    ComponentStore::new(conn).save(&c)?;
    Ok(c)
}

impl ComponentManager<'_> {
    // ========== Service ==========

    /// Record a service, resetting the component's hours in the same transaction.
    pub fn log_service(&mut self, user_id: Uuid, request: ServiceRequest) -> ComponentResult<ServiceLog> {
        let log = self.write(user_id, None, |tx, touched| {
            let (log, bike_id) = record_service(tx, user_id, &request)?;
            touched.maybe_bike(bike_id);
            Ok(log)
        })?;

        tracing::info!(
            component = %log.component_id,
            hours = log.hours_at_service,
            "Logged service"
        );
        Ok(log)
    }

    /// Record several services at once, all or nothing.
    pub fn log_service_bulk(
        &mut self,
        user_id: Uuid,
        requests: &[ServiceRequest],
    ) -> ComponentResult<Vec<ServiceLog>> {
        check_batch(requests, self.settings().batch_limit, "service logs")?;
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let logs = self.write(user_id, None, |tx, touched| {
            let mut logs = Vec::with_capacity(requests.len());
            for request in requests {
                let (log, bike_id) = record_service(tx, user_id, request)?;
                touched.maybe_bike(bike_id);
                logs.push(log);
            }
            Ok(logs)
        })?;

        tracing::info!(count = logs.len(), "Logged services");
        Ok(logs)
    }

    /// Service logs for a component, newest first.
    pub fn service_history(&self, user_id: Uuid, component_id: Uuid) -> ComponentResult<Vec<ServiceLog>> {
        owned_component(self.conn(), user_id, component_id)?;
        Ok(ComponentStore::new(self.conn()).service_logs(component_id)?)
    }

    // ========== Baseline ==========

    /// Calibrate how worn a component was when tracking began.
    pub fn update_baseline(&mut self, user_id: Uuid, update: BaselineUpdate) -> ComponentResult<Component> {
        check_baseline(&update)?;
        self.write(user_id, None, |tx, touched| {
            let c = apply_baseline(tx, user_id, &update)?;
            touched.maybe_bike(c.bike_id);
            Ok(c)
        })
    }

    /// Calibrate several components at once, all or nothing.
    pub fn update_baselines_bulk(
        &mut self,
        user_id: Uuid,
        updates: &[BaselineUpdate],
    ) -> ComponentResult<Vec<Component>> {
        check_batch(updates, self.settings().batch_limit, "baseline updates")?;
        for update in updates {
            check_baseline(update)?;
        }
        if updates.is_empty() {
            return Ok(Vec::new());
        }

        let updated = self.write(user_id, None, |tx, touched| {
            updates
                .iter()
                .map(|update| {
                    let c = apply_baseline(tx, user_id, update)?;
                    touched.maybe_bike(c.bike_id);
                    Ok(c)
                })
                .collect::<ComponentResult<Vec<_>>>()
        })?;

        tracing::debug!(count = updated.len(), "Updated baselines");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bikes::{BikeSpec, NewBike};
    use crate::cache::NoopPredictionCache;
    use crate::components::factory::BuildOptions;
    use crate::components::types::{BaselineConfidence, BaselineMethod, ComponentType, Location, PartSpec};
    use crate::storage::{Database, EngineSettings};

    fn baseline(component_id: Uuid, wear_percent: f64) -> BaselineUpdate {
        BaselineUpdate {
            component_id,
            wear_percent,
            method: BaselineMethod::Slider,
            confidence: BaselineConfidence::Medium,
        }
    }

    #[test]
    fn test_log_service_snapshots_and_resets_hours() {
        let mut db = Database::open_in_memory().unwrap();
        let cache = NoopPredictionCache;
        let mut manager = ComponentManager::new(&mut db, &cache);
        let user_id = Uuid::new_v4();
        let (bike, components) = manager
            .create_bike(user_id, NewBike::new("Trail", BikeSpec::hardtail(120)), &BuildOptions::default())
            .unwrap();
        manager.increment_hours(bike.id, user_id, 42.5).unwrap();
        let fork = components
            .iter()
            .find(|c| c.component_type == ComponentType::Fork)
            .unwrap();

        let performed_at = Utc::now() - chrono::Duration::days(2);
        let log = manager
            .log_service(
                user_id,
                ServiceRequest {
                    component_id: fork.id,
                    performed_at: Some(performed_at),
                    notes: Some("Lowers service".to_string()),
                },
            )
            .unwrap();

        assert_eq!(log.hours_at_service, 42.5);
        let fork = manager.get_component(user_id, fork.id).unwrap();
        assert_eq!(fork.hours_used, 0.0);
        assert_eq!(
            fork.last_serviced_at.map(|t| t.timestamp()),
            Some(performed_at.timestamp())
        );
        assert_eq!(manager.service_history(user_id, fork.id).unwrap().len(), 1);
    }

    #[test]
    fn test_bulk_service_is_capped() {
        let mut db = Database::open_in_memory().unwrap();
        let cache = NoopPredictionCache;
        let settings = EngineSettings {
            batch_limit: 2,
            ..Default::default()
        };
        let mut manager = ComponentManager::new(&mut db, &cache).with_settings(settings);
        let requests: Vec<ServiceRequest> = (0..3).map(|_| ServiceRequest::new(Uuid::new_v4())).collect();

        let result = manager.log_service_bulk(Uuid::new_v4(), &requests);
        assert!(matches!(result, Err(ComponentError::InvalidInput(_))));
    }

    #[test]
    fn test_bulk_service_rolls_back_on_missing_component() {
        let mut db = Database::open_in_memory().unwrap();
        let cache = NoopPredictionCache;
        let mut manager = ComponentManager::new(&mut db, &cache);
        let user_id = Uuid::new_v4();
        let spare = manager
            .add_spare_component(user_id, ComponentType::Chain, Location::None, PartSpec::new("KMC", "X12"))
            .unwrap();

        let result = manager.log_service_bulk(
            user_id,
            &[ServiceRequest::new(spare.id), ServiceRequest::new(Uuid::new_v4())],
        );

        assert!(matches!(result, Err(ComponentError::NotFound(_))));
        assert!(manager.service_history(user_id, spare.id).unwrap().is_empty());
    }

    #[test]
    fn test_baseline_range_checked() {
        let mut db = Database::open_in_memory().unwrap();
        let cache = NoopPredictionCache;
        let mut manager = ComponentManager::new(&mut db, &cache);
        let user_id = Uuid::new_v4();
        let spare = manager
            .add_spare_component(user_id, ComponentType::Chain, Location::None, PartSpec::new("KMC", "X12"))
            .unwrap();

        for bad in [-0.1, 100.5, f64::NAN] {
            assert!(matches!(
                manager.update_baseline(user_id, baseline(spare.id, bad)),
                Err(ComponentError::InvalidInput(_))
            ));
        }

        let updated = manager.update_baseline(user_id, baseline(spare.id, 35.0)).unwrap();
        assert_eq!(updated.baseline_wear_percent, 35.0);
        assert_eq!(updated.baseline_method, BaselineMethod::Slider);
        assert_eq!(updated.baseline_confidence, BaselineConfidence::Medium);
        assert!(updated.baseline_set_at.is_some());
    }

    #[test]
    fn test_bulk_baselines() {
        let mut db = Database::open_in_memory().unwrap();
        let cache = NoopPredictionCache;
        let mut manager = ComponentManager::new(&mut db, &cache);
        let user_id = Uuid::new_v4();
        let (_, components) = manager
            .create_bike(user_id, NewBike::new("Road", BikeSpec::default()), &BuildOptions::default())
            .unwrap();

        let updates: Vec<BaselineUpdate> = components.iter().take(3).map(|c| baseline(c.id, 60.0)).collect();
        let updated = manager.update_baselines_bulk(user_id, &updates).unwrap();

        assert_eq!(updated.len(), 3);
        assert!(updated.iter().all(|c| c.baseline_wear_percent == 60.0));
    }
}
