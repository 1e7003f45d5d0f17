//! Component, install history and service log persistence.
//!
//! Provides persistence for:
//! - Components and their lifecycle markers
//! - Install history rows (one open row per bike slot)
//! - Service logs
//! - Bulk hour adjustments for the parts mounted on a bike

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::types::{BikeComponentInstall, Component, ComponentType, Location, ServiceLog};
use crate::storage::database::{parse_timestamp, parse_token, parse_uuid, DatabaseError};

const COMPONENT_COLUMNS: &str = "id, user_id, bike_id, component_type, location, brand, model,
     notes, is_stock, hours_used, service_due_at_hours, last_serviced_at, baseline_wear_percent,
     baseline_method, baseline_confidence, baseline_set_at, status, installed_at, retired_at,
     replaced_by_id, pair_group_id, created_at, updated_at";

const INSTALL_COLUMNS: &str =
    "id, user_id, bike_id, component_id, slot_key, installed_at, removed_at";

/// Component store over a connection or open transaction.
pub struct ComponentStore<'a> {
    conn: &'a Connection,
}

impl<'a> ComponentStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    // ========== Component Rows ==========

    /// Insert a component row.
    pub fn insert(&self, c: &Component) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO components (id, user_id, bike_id, component_type, location, brand, model,
             notes, is_stock, hours_used, service_due_at_hours, last_serviced_at,
             baseline_wear_percent, baseline_method, baseline_confidence, baseline_set_at, status,
             installed_at, retired_at, replaced_by_id, pair_group_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
             ?18, ?19, ?20, ?21, ?22, ?23)",
            params![
                c.id.to_string(),
                c.user_id.to_string(),
                c.bike_id.map(|id| id.to_string()),
                c.component_type.as_str(),
                c.location.as_str(),
                c.brand,
                c.model,
                c.notes,
                c.is_stock,
                c.hours_used,
                c.service_due_at_hours,
                c.last_serviced_at.map(|dt| dt.to_rfc3339()),
                c.baseline_wear_percent,
                c.baseline_method.as_str(),
                c.baseline_confidence.as_str(),
                c.baseline_set_at.map(|dt| dt.to_rfc3339()),
                c.status.as_str(),
                c.installed_at.map(|dt| dt.to_rfc3339()),
                c.retired_at.map(|dt| dt.to_rfc3339()),
                c.replaced_by_id.map(|id| id.to_string()),
                c.pair_group_id.map(|id| id.to_string()),
                c.created_at.to_rfc3339(),
                c.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Write back every mutable column of a component.
    ///
    /// `hours_used` is not written here: it only moves through the hour
    /// adjustment statements and service resets below.
    pub fn save(&self, c: &Component) -> Result<(), DatabaseError> {
        let rows = self.conn.execute(
            "UPDATE components SET bike_id = ?2, location = ?3, brand = ?4, model = ?5,
             notes = ?6, is_stock = ?7, service_due_at_hours = ?8, last_serviced_at = ?9,
             baseline_wear_percent = ?10, baseline_method = ?11, baseline_confidence = ?12,
             baseline_set_at = ?13, status = ?14, installed_at = ?15, retired_at = ?16,
             replaced_by_id = ?17, pair_group_id = ?18, updated_at = ?19
             WHERE id = ?1",
            params![
                c.id.to_string(),
                c.bike_id.map(|id| id.to_string()),
                c.location.as_str(),
                c.brand,
                c.model,
                c.notes,
                c.is_stock,
                c.service_due_at_hours,
                c.last_serviced_at.map(|dt| dt.to_rfc3339()),
                c.baseline_wear_percent,
                c.baseline_method.as_str(),
                c.baseline_confidence.as_str(),
                c.baseline_set_at.map(|dt| dt.to_rfc3339()),
                c.status.as_str(),
                c.installed_at.map(|dt| dt.to_rfc3339()),
                c.retired_at.map(|dt| dt.to_rfc3339()),
                c.replaced_by_id.map(|id| id.to_string()),
                c.pair_group_id.map(|id| id.to_string()),
                c.updated_at.to_rfc3339(),
            ],
        )?;

        if rows == 0 {
            return Err(DatabaseError::QueryFailed(format!(
                "Component {} vanished during update",
                c.id
            )));
        }
        Ok(())
    }

    /// Get a component only if it belongs to `user_id`.
    pub fn get_owned(&self, user_id: Uuid, id: Uuid) -> Result<Option<Component>, DatabaseError> {
        self.query_one(
            "WHERE id = ?1 AND user_id = ?2",
            &[&id.to_string(), &user_id.to_string()],
        )
    }

    /// The active component of a type at a location on a bike.
    pub fn find_in_slot(
        &self,
        bike_id: Uuid,
        component_type: ComponentType,
        location: Location,
    ) -> Result<Option<Component>, DatabaseError> {
        self.query_one(
            "WHERE bike_id = ?1 AND component_type = ?2 AND location = ?3",
            &[&bike_id.to_string(), &component_type.as_str(), &location.as_str()],
        )
    }

    /// The other non-retired member of a component's pair group.
    pub fn find_pair_partner(&self, c: &Component) -> Result<Option<Component>, DatabaseError> {
        let Some(group) = c.pair_group_id else {
            return Ok(None);
        };
        self.query_one(
            "WHERE pair_group_id = ?1 AND id != ?2 AND status != 'RETIRED'",
            &[&group.to_string(), &c.id.to_string()],
        )
    }

    /// Components currently mounted on a bike.
    pub fn list_for_bike(&self, user_id: Uuid, bike_id: Uuid) -> Result<Vec<Component>, DatabaseError> {
        self.query_many(
            "WHERE bike_id = ?1 AND user_id = ?2 ORDER BY component_type, location",
            &[&bike_id.to_string(), &user_id.to_string()],
        )
    }

    /// Spare parts not mounted anywhere.
    pub fn list_inventory(&self, user_id: Uuid) -> Result<Vec<Component>, DatabaseError> {
        self.query_many(
            "WHERE user_id = ?1 AND status = 'INVENTORY' ORDER BY component_type, created_at",
            &[&user_id.to_string()],
        )
    }

    /// Every component a user has ever owned, retired ones included.
    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Component>, DatabaseError> {
        self.query_many(
            "WHERE user_id = ?1 ORDER BY created_at, id",
            &[&user_id.to_string()],
        )
    }

    /// Non-retired pairing-type components still tracked as a single unit.
    pub fn list_unpaired_legacy(&self, user_id: Uuid) -> Result<Vec<Component>, DatabaseError> {
        let pairing: Vec<String> = ComponentType::ALL
            .iter()
            .filter(|t| t.requires_pairing())
            .map(|t| format!("'{}'", t.as_str()))
            .collect();
        let filter = format!(
            "WHERE user_id = ?1 AND status != 'RETIRED' AND location = 'NONE'
             AND component_type IN ({}) ORDER BY created_at, id",
            pairing.join(", ")
        );
        self.query_many(&filter, &[&user_id.to_string()])
    }

    /// Whether the user already has any component in a pair group.
    pub fn has_paired_components(&self, user_id: Uuid) -> Result<bool, DatabaseError> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM components WHERE user_id = ?1 AND pair_group_id IS NOT NULL)",
            params![user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Hard delete a component together with its history.
    pub fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let deleted = self
            .conn
            .execute("DELETE FROM components WHERE id = ?1", params![id.to_string()])?;
        Ok(deleted > 0)
    }

    /// Drop successor pointers that reference a component about to be deleted.
    pub fn clear_replaced_by(&self, successor_id: Uuid) -> Result<usize, DatabaseError> {
        let rows = self.conn.execute(
            "UPDATE components SET replaced_by_id = NULL WHERE replaced_by_id = ?1",
            params![successor_id.to_string()],
        )?;
        Ok(rows)
    }

    fn query_one(
        &self,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Option<Component>, DatabaseError> {
        let sql = format!("SELECT {} FROM components {}", COMPONENT_COLUMNS, filter);
        let row = self
            .conn
            .query_row(&sql, args, ComponentRow::from_row)
            .optional()?;
        row.map(ComponentRow::into_component).transpose()
    }

    fn query_many(
        &self,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Component>, DatabaseError> {
        let sql = format!("SELECT {} FROM components {}", COMPONENT_COLUMNS, filter);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(args, ComponentRow::from_row)?;

        let mut components = Vec::new();
        for row in rows {
            components.push(row?.into_component()?);
        }
        Ok(components)
    }

    // ========== Hours ==========

    /// Add hours to every component mounted on a bike. Returns rows touched.
    pub fn add_hours(&self, bike_id: Uuid, user_id: Uuid, hours: f64) -> Result<usize, DatabaseError> {
        let rows = self.conn.execute(
            "UPDATE components SET hours_used = hours_used + ?1, updated_at = ?2
             WHERE bike_id = ?3 AND user_id = ?4",
            params![
                hours,
                Utc::now().to_rfc3339(),
                bike_id.to_string(),
                user_id.to_string()
            ],
        )?;
        Ok(rows)
    }

    /// Subtract hours from every component mounted on a bike. Returns rows touched.
    ///
    /// May leave negative values behind; follow with [`Self::clamp_negative_hours`].
    pub fn subtract_hours(
        &self,
        bike_id: Uuid,
        user_id: Uuid,
        hours: f64,
    ) -> Result<usize, DatabaseError> {
        let rows = self.conn.execute(
            "UPDATE components SET hours_used = hours_used - ?1, updated_at = ?2
             WHERE bike_id = ?3 AND user_id = ?4",
            params![
                hours,
                Utc::now().to_rfc3339(),
                bike_id.to_string(),
                user_id.to_string()
            ],
        )?;
        Ok(rows)
    }

    /// Floor negative hours on a bike's components at zero. Returns rows clamped.
    pub fn clamp_negative_hours(&self, bike_id: Uuid, user_id: Uuid) -> Result<usize, DatabaseError> {
        let rows = self.conn.execute(
            "UPDATE components SET hours_used = 0
             WHERE bike_id = ?1 AND user_id = ?2 AND hours_used < 0",
            params![bike_id.to_string(), user_id.to_string()],
        )?;
        Ok(rows)
    }

    /// Zero a component's hours after service.
    pub fn reset_hours(&self, id: Uuid, serviced_at: DateTime<Utc>) -> Result<(), DatabaseError> {
        self.conn.execute(
            "UPDATE components SET hours_used = 0, last_serviced_at = ?1, updated_at = ?2
             WHERE id = ?3",
            params![
                serviced_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
                id.to_string()
            ],
        )?;
        Ok(())
    }

    // ========== Install History ==========

    /// Open an install row.
    pub fn open_install(&self, install: &BikeComponentInstall) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO bike_component_installs
             (id, user_id, bike_id, component_id, slot_key, installed_at, removed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                install.id.to_string(),
                install.user_id.to_string(),
                install.bike_id.to_string(),
                install.component_id.to_string(),
                install.slot_key,
                install.installed_at.to_rfc3339(),
                install.removed_at.map(|dt| dt.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Close an install row.
    pub fn close_install(&self, id: Uuid, removed_at: DateTime<Utc>) -> Result<(), DatabaseError> {
        self.conn.execute(
            "UPDATE bike_component_installs SET removed_at = ?1 WHERE id = ?2 AND removed_at IS NULL",
            params![removed_at.to_rfc3339(), id.to_string()],
        )?;
        Ok(())
    }

    /// The open install row for a bike slot.
    pub fn open_install_for_slot(
        &self,
        bike_id: Uuid,
        slot_key: &str,
    ) -> Result<Option<BikeComponentInstall>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM bike_component_installs
             WHERE bike_id = ?1 AND slot_key = ?2 AND removed_at IS NULL",
            INSTALL_COLUMNS
        );
        let row = self
            .conn
            .query_row(&sql, params![bike_id.to_string(), slot_key], InstallRow::from_row)
            .optional()?;
        row.map(InstallRow::into_install).transpose()
    }

    /// Open install rows for a component (at most one when invariants hold).
    pub fn open_installs_for_component(
        &self,
        component_id: Uuid,
    ) -> Result<Vec<BikeComponentInstall>, DatabaseError> {
        self.query_installs(
            "WHERE component_id = ?1 AND removed_at IS NULL",
            &component_id.to_string(),
        )
    }

    /// Full install history of a component, oldest first.
    pub fn install_history(&self, component_id: Uuid) -> Result<Vec<BikeComponentInstall>, DatabaseError> {
        self.query_installs(
            "WHERE component_id = ?1 ORDER BY installed_at, removed_at IS NULL, removed_at",
            &component_id.to_string(),
        )
    }

    /// Full install history of a bike, oldest first.
    pub fn bike_install_history(&self, bike_id: Uuid) -> Result<Vec<BikeComponentInstall>, DatabaseError> {
        self.query_installs(
            "WHERE bike_id = ?1 ORDER BY installed_at, slot_key",
            &bike_id.to_string(),
        )
    }

    fn query_installs(
        &self,
        filter: &str,
        arg: &str,
    ) -> Result<Vec<BikeComponentInstall>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM bike_component_installs {}",
            INSTALL_COLUMNS, filter
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![arg], InstallRow::from_row)?;

        let mut installs = Vec::new();
        for row in rows {
            installs.push(row?.into_install()?);
        }
        Ok(installs)
    }

    // ========== Service Logs ==========

    /// Insert a service log.
    pub fn insert_service_log(&self, log: &ServiceLog) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO service_logs (id, component_id, performed_at, notes, hours_at_service, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                log.id.to_string(),
                log.component_id.to_string(),
                log.performed_at.to_rfc3339(),
                log.notes,
                log.hours_at_service,
                log.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Service logs for a component, newest first.
    pub fn service_logs(&self, component_id: Uuid) -> Result<Vec<ServiceLog>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, component_id, performed_at, notes, hours_at_service, created_at
             FROM service_logs WHERE component_id = ?1 ORDER BY performed_at DESC",
        )?;
        let rows = stmt.query_map(params![component_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut logs = Vec::new();
        for row in rows {
            let (id, component_id, performed_at, notes, hours_at_service, created_at) = row?;
            logs.push(ServiceLog {
                id: parse_uuid("service log", &id)?,
                component_id: parse_uuid("component", &component_id)?,
                performed_at: parse_timestamp("performed_at", &performed_at)?,
                notes,
                hours_at_service,
                created_at: parse_timestamp("created_at", &created_at)?,
            });
        }
        Ok(logs)
    }
}

/// Intermediate struct for reading component rows from database.
struct ComponentRow {
    id: String,
    user_id: String,
    bike_id: Option<String>,
    component_type: String,
    location: String,
    brand: String,
    model: String,
    notes: Option<String>,
    is_stock: bool,
    hours_used: f64,
    service_due_at_hours: Option<f64>,
    last_serviced_at: Option<String>,
    baseline_wear_percent: f64,
    baseline_method: String,
    baseline_confidence: String,
    baseline_set_at: Option<String>,
    status: String,
    installed_at: Option<String>,
    retired_at: Option<String>,
    replaced_by_id: Option<String>,
    pair_group_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ComponentRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            bike_id: row.get(2)?,
            component_type: row.get(3)?,
            location: row.get(4)?,
            brand: row.get(5)?,
            model: row.get(6)?,
            notes: row.get(7)?,
            is_stock: row.get(8)?,
            hours_used: row.get(9)?,
            service_due_at_hours: row.get(10)?,
            last_serviced_at: row.get(11)?,
            baseline_wear_percent: row.get(12)?,
            baseline_method: row.get(13)?,
            baseline_confidence: row.get(14)?,
            baseline_set_at: row.get(15)?,
            status: row.get(16)?,
            installed_at: row.get(17)?,
            retired_at: row.get(18)?,
            replaced_by_id: row.get(19)?,
            pair_group_id: row.get(20)?,
            created_at: row.get(21)?,
            updated_at: row.get(22)?,
        })
    }

    fn into_component(self) -> Result<Component, DatabaseError> {
        let optional_uuid = |field: &str, value: Option<String>| {
            value.map(|v| parse_uuid(field, &v)).transpose()
        };
        let optional_time = |field: &str, value: Option<String>| {
            value.map(|v| parse_timestamp(field, &v)).transpose()
        };

        Ok(Component {
            id: parse_uuid("component", &self.id)?,
            user_id: parse_uuid("user", &self.user_id)?,
            bike_id: optional_uuid("bike", self.bike_id)?,
            component_type: parse_token(&self.component_type)?,
            location: parse_token(&self.location)?,
            brand: self.brand,
            model: self.model,
            notes: self.notes,
            is_stock: self.is_stock,
            hours_used: self.hours_used,
            service_due_at_hours: self.service_due_at_hours,
            last_serviced_at: optional_time("last_serviced_at", self.last_serviced_at)?,
            baseline_wear_percent: self.baseline_wear_percent,
            baseline_method: parse_token(&self.baseline_method)?,
            baseline_confidence: parse_token(&self.baseline_confidence)?,
            baseline_set_at: optional_time("baseline_set_at", self.baseline_set_at)?,
            status: parse_token(&self.status)?,
            installed_at: optional_time("installed_at", self.installed_at)?,
            retired_at: optional_time("retired_at", self.retired_at)?,
            replaced_by_id: optional_uuid("replaced_by", self.replaced_by_id)?,
            pair_group_id: optional_uuid("pair group", self.pair_group_id)?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
        })
    }
}

/// Intermediate struct for reading install rows from database.
struct InstallRow {
    id: String,
    user_id: String,
    bike_id: String,
    component_id: String,
    slot_key: String,
    installed_at: String,
    removed_at: Option<String>,
}

impl InstallRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            bike_id: row.get(2)?,
            component_id: row.get(3)?,
            slot_key: row.get(4)?,
            installed_at: row.get(5)?,
            removed_at: row.get(6)?,
        })
    }

    fn into_install(self) -> Result<BikeComponentInstall, DatabaseError> {
        Ok(BikeComponentInstall {
            id: parse_uuid("install", &self.id)?,
            user_id: parse_uuid("user", &self.user_id)?,
            bike_id: parse_uuid("bike", &self.bike_id)?,
            component_id: parse_uuid("component", &self.component_id)?,
            slot_key: self.slot_key,
            installed_at: parse_timestamp("installed_at", &self.installed_at)?,
            removed_at: self
                .removed_at
                .map(|v| parse_timestamp("removed_at", &v))
                .transpose()?,
        })
    }
}
