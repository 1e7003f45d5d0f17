//! Database schema definitions for component wear tracking.

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- Bikes table
CREATE TABLE IF NOT EXISTS bikes (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    manufacturer TEXT,
    model TEXT,
    year INTEGER,
    fork_travel_mm INTEGER,
    shock_travel_mm INTEGER,
    seatpost TEXT NOT NULL DEFAULT 'RIGID',
    brakes TEXT NOT NULL DEFAULT 'DISC',
    drivetrain TEXT NOT NULL DEFAULT 'DERAILLEUR',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bikes_user_id ON bikes(user_id);

-- Components table
CREATE TABLE IF NOT EXISTS components (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    bike_id TEXT REFERENCES bikes(id),
    component_type TEXT NOT NULL,
    location TEXT NOT NULL DEFAULT 'NONE',
    brand TEXT NOT NULL,
    model TEXT NOT NULL,
    notes TEXT,
    is_stock INTEGER NOT NULL DEFAULT 0,
    hours_used REAL NOT NULL DEFAULT 0,
    service_due_at_hours REAL,
    last_serviced_at TEXT,
    baseline_wear_percent REAL NOT NULL DEFAULT 0
        CHECK (baseline_wear_percent >= 0 AND baseline_wear_percent <= 100),
    baseline_method TEXT NOT NULL DEFAULT 'DEFAULT',
    baseline_confidence TEXT NOT NULL DEFAULT 'LOW',
    baseline_set_at TEXT,
    status TEXT NOT NULL DEFAULT 'INVENTORY',
    installed_at TEXT,
    retired_at TEXT,
    replaced_by_id TEXT REFERENCES components(id),
    pair_group_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_components_user_id ON components(user_id);
CREATE INDEX IF NOT EXISTS idx_components_bike_id ON components(bike_id);
CREATE INDEX IF NOT EXISTS idx_components_pair_group ON components(pair_group_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_components_bike_slot
    ON components(bike_id, component_type, location) WHERE bike_id IS NOT NULL;

-- Install history table (append-only)
CREATE TABLE IF NOT EXISTS bike_component_installs (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    bike_id TEXT NOT NULL REFERENCES bikes(id),
    component_id TEXT NOT NULL REFERENCES components(id) ON DELETE CASCADE,
    slot_key TEXT NOT NULL,
    installed_at TEXT NOT NULL,
    removed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_installs_component_id ON bike_component_installs(component_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_installs_open_slot
    ON bike_component_installs(bike_id, slot_key) WHERE removed_at IS NULL;

-- Service log table (immutable)
CREATE TABLE IF NOT EXISTS service_logs (
    id TEXT PRIMARY KEY,
    component_id TEXT NOT NULL REFERENCES components(id) ON DELETE CASCADE,
    performed_at TEXT NOT NULL,
    notes TEXT,
    hours_at_service REAL NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_service_logs_component_id ON service_logs(component_id);
"#;

/// SQL for schema version tracking (migrations)
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// SQL for migration from v1 to v2 (front/rear pairing).
///
/// Existing rows keep a NULL group; `migrate_paired_components` backfills them.
pub const MIGRATION_V1_TO_V2: &str = r#"
ALTER TABLE components ADD COLUMN pair_group_id TEXT;

CREATE INDEX IF NOT EXISTS idx_components_pair_group ON components(pair_group_id);
"#;
