//! SQL schema for the confstore SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per version. Rows are only ever inserted, except for the content
-- revision performed by an in-place update.
CREATE TABLE IF NOT EXISTS configurations (
    id          TEXT PRIMARY KEY,
    client_id   TEXT NOT NULL,
    name        TEXT NOT NULL,
    kind        TEXT NOT NULL,     -- 'object' | 'standard'
    schema_json TEXT NOT NULL CHECK (json_valid(schema_json)),
    input_json  TEXT NOT NULL CHECK (json_valid(input_json)),
    version     INTEGER NOT NULL CHECK (version > 0),
    created_at  TEXT NOT NULL,     -- RFC 3339 UTC
    created_by  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (name, version)
);

-- Materialised copy of the highest-versioned row per name.
CREATE TABLE IF NOT EXISTS latest_configurations (
    name        TEXT PRIMARY KEY,
    id          TEXT NOT NULL UNIQUE REFERENCES configurations(id),
    client_id   TEXT NOT NULL,
    kind        TEXT NOT NULL,
    schema_json TEXT NOT NULL,
    input_json  TEXT NOT NULL,
    version     INTEGER NOT NULL,
    created_at  TEXT NOT NULL,
    created_by  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS configurations_name_idx ON configurations(name);

PRAGMA user_version = 1;
";
