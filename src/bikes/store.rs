//! Bike persistence.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::types::{Bike, BikeSpec, Suspension};
use crate::storage::database::{parse_timestamp, parse_token, parse_uuid, DatabaseError};

const BIKE_COLUMNS: &str = "id, user_id, name, manufacturer, model, year, fork_travel_mm,
     shock_travel_mm, seatpost, brakes, drivetrain, created_at, updated_at";

/// Bike store over a connection or open transaction.
pub struct BikeStore<'a> {
    conn: &'a Connection,
}

impl<'a> BikeStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a new bike.
    pub fn insert(&self, bike: &Bike) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO bikes (id, user_id, name, manufacturer, model, year, fork_travel_mm,
             shock_travel_mm, seatpost, brakes, drivetrain, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                bike.id.to_string(),
                bike.user_id.to_string(),
                bike.name,
                bike.manufacturer,
                bike.model,
                bike.year,
                bike.spec.suspension.fork_travel_mm(),
                bike.spec.suspension.shock_travel_mm(),
                bike.spec.seatpost.as_str(),
                bike.spec.brakes.as_str(),
                bike.spec.drivetrain.as_str(),
                bike.created_at.to_rfc3339(),
                bike.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a bike only if it belongs to `user_id`.
    pub fn get_owned(&self, user_id: Uuid, bike_id: Uuid) -> Result<Option<Bike>, DatabaseError> {
        let sql = format!("SELECT {} FROM bikes WHERE id = ?1 AND user_id = ?2", BIKE_COLUMNS);
        let row = self
            .conn
            .query_row(
                &sql,
                params![bike_id.to_string(), user_id.to_string()],
                BikeRow::from_row,
            )
            .optional()?;

        row.map(BikeRow::into_bike).transpose()
    }

    /// List a user's bikes, oldest first.
    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Bike>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM bikes WHERE user_id = ?1 ORDER BY created_at, id",
            BIKE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id.to_string()], BikeRow::from_row)?;

        let mut bikes = Vec::new();
        for row in rows {
            bikes.push(row?.into_bike()?);
        }
        Ok(bikes)
    }
}

/// Intermediate struct for reading bike rows from database.
struct BikeRow {
    id: String,
    user_id: String,
    name: String,
    manufacturer: Option<String>,
    model: Option<String>,
    year: Option<u16>,
    fork_travel_mm: Option<u32>,
    shock_travel_mm: Option<u32>,
    seatpost: String,
    brakes: String,
    drivetrain: String,
    created_at: String,
    updated_at: String,
}

impl BikeRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            manufacturer: row.get(3)?,
            model: row.get(4)?,
            year: row.get(5)?,
            fork_travel_mm: row.get(6)?,
            shock_travel_mm: row.get(7)?,
            seatpost: row.get(8)?,
            brakes: row.get(9)?,
            drivetrain: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_bike(self) -> Result<Bike, DatabaseError> {
        Ok(Bike {
            id: parse_uuid("bike", &self.id)?,
            user_id: parse_uuid("user", &self.user_id)?,
            name: self.name,
            manufacturer: self.manufacturer,
            model: self.model,
            year: self.year,
            spec: BikeSpec {
                suspension: Suspension::from_travel(self.fork_travel_mm, self.shock_travel_mm),
                seatpost: parse_token(&self.seatpost)?,
                brakes: parse_token(&self.brakes)?,
                drivetrain: parse_token(&self.drivetrain)?,
            },
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
        })
    }
}
