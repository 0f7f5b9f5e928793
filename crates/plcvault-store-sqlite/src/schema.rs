//! SQL schema for the plcvault working database.
//!
//! [`CONNECTION_PRAGMAS`] and [`METADATA`] run on every open, before the
//! filename binding is checked; [`SCHEMA`] runs only once the binding holds.
//! [`SECONDARY_INDEXES`] is rebuilt after imports unless indexing is skipped.

/// Durability-favoring connection settings.
pub const CONNECTION_PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous  = FULL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 30000;
";

pub const METADATA: &str = "
CREATE TABLE IF NOT EXISTS app_metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Metadata key holding the bound base filename. Written once, never updated.
pub const REGISTERED_FILENAME_KEY: &str = "registered_filename";

/// Core tables; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
-- Raw imports. Append-only; (filename, vendor, hash) is the dedup key.
CREATE TABLE IF NOT EXISTS plc_imports (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    filename    TEXT NOT NULL,
    vendor      TEXT NOT NULL,
    version     TEXT,
    xml_blob    TEXT NOT NULL,            -- canonical form
    hash        TEXT NOT NULL,            -- hex SHA-256 of xml_blob
    imported_at TEXT NOT NULL,            -- RFC 3339 UTC
    UNIQUE (filename, vendor, hash)
);

CREATE TABLE IF NOT EXISTS plc_modules (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    controller_name TEXT NOT NULL,
    vendor          TEXT NOT NULL,
    current_version INTEGER NOT NULL CHECK (current_version >= 1),
    last_import_id  INTEGER NOT NULL REFERENCES plc_imports(id),
    UNIQUE (controller_name, vendor)
);

CREATE TABLE IF NOT EXISTS plc_module_deltas (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id      INTEGER NOT NULL REFERENCES plc_modules(id),
    old_hash       TEXT NOT NULL,
    new_hash       TEXT NOT NULL,
    change_summary TEXT,
    recorded_at    TEXT NOT NULL,
    CHECK (old_hash != new_hash)
);

-- One snapshot per import; never deduplicated by name.
CREATE TABLE IF NOT EXISTS plc_controllers (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    vendor      TEXT NOT NULL,
    version     TEXT,
    description TEXT,
    hash        TEXT NOT NULL,
    import_id   INTEGER NOT NULL REFERENCES plc_imports(id),
    facility_id INTEGER,
    unit_id     INTEGER,
    created_at  TEXT NOT NULL,
    UNIQUE (import_id)
);

CREATE TABLE IF NOT EXISTS plc_programs (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    controller_id INTEGER NOT NULL REFERENCES plc_controllers(id),
    name          TEXT NOT NULL,
    description   TEXT,
    UNIQUE (name, controller_id)
);

CREATE TABLE IF NOT EXISTS plc_routines (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    program_id   INTEGER NOT NULL REFERENCES plc_programs(id),
    name         TEXT NOT NULL,
    routine_type TEXT,
    logic_xml    TEXT,                    -- opaque serialized subtree
    UNIQUE (name, program_id)
);

CREATE TABLE IF NOT EXISTS plc_tags (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    controller_id INTEGER NOT NULL REFERENCES plc_controllers(id),
    name          TEXT NOT NULL,
    data_type     TEXT,
    scope         TEXT NOT NULL,
    initial_value TEXT,
    UNIQUE (name, controller_id, scope)
);

CREATE TABLE IF NOT EXISTS plc_aois (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    controller_id  INTEGER NOT NULL REFERENCES plc_controllers(id),
    name           TEXT NOT NULL,
    definition_xml TEXT,
    UNIQUE (name, controller_id)
);

-- Newest row per vendor is authoritative.
CREATE TABLE IF NOT EXISTS schema_registry (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    vendor        TEXT NOT NULL,
    version       TEXT NOT NULL,
    schema_path   TEXT NOT NULL,
    hash          TEXT NOT NULL,
    registered_at TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS plc_imports_immutable
BEFORE UPDATE ON plc_imports
BEGIN
    SELECT RAISE(ABORT, 'plc_imports rows are immutable');
END;

CREATE TRIGGER IF NOT EXISTS plc_module_deltas_immutable
BEFORE UPDATE ON plc_module_deltas
BEGIN
    SELECT RAISE(ABORT, 'plc_module_deltas rows are immutable');
END;

CREATE TRIGGER IF NOT EXISTS plc_modules_version_monotonic
BEFORE UPDATE OF current_version ON plc_modules
WHEN NEW.current_version < OLD.current_version
BEGIN
    SELECT RAISE(ABORT, 'module version must not decrease');
END;

CREATE INDEX IF NOT EXISTS idx_plc_imports_hash     ON plc_imports(hash);
CREATE INDEX IF NOT EXISTS idx_schema_registry_vendor ON schema_registry(vendor);
CREATE INDEX IF NOT EXISTS idx_plc_programs_controller ON plc_programs(controller_id);
CREATE INDEX IF NOT EXISTS idx_plc_routines_program ON plc_routines(program_id);
CREATE INDEX IF NOT EXISTS idx_plc_tags_controller  ON plc_tags(controller_id);
CREATE INDEX IF NOT EXISTS idx_plc_aois_controller  ON plc_aois(controller_id);

PRAGMA user_version = 1;
";

/// Name-lookup indexes used by hierarchy rendering.
pub const SECONDARY_INDEXES: &str = "
CREATE INDEX IF NOT EXISTS idx_plc_controllers_name ON plc_controllers(name);
CREATE INDEX IF NOT EXISTS idx_plc_modules_name     ON plc_modules(controller_name);
CREATE INDEX IF NOT EXISTS idx_plc_routines_name    ON plc_routines(name);
CREATE INDEX IF NOT EXISTS idx_plc_tags_name        ON plc_tags(name);
CREATE INDEX IF NOT EXISTS idx_plc_aois_name        ON plc_aois(name);
PRAGMA optimize;
";
