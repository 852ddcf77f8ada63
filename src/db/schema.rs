// src/db/schema.rs

//! Database schema definitions and migrations for srcwatch
//!
//! Three tables carry the whole model: sources (tracked upstream
//! projects), packages (release units with metadata, one row each), and
//! versions (append-only observation facts keyed by source, origin and
//! version string).

use crate::error::Result;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        debug!("Schema is up to date");
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!(
        "Schema migration complete. Now at version {}",
        SCHEMA_VERSION
    );
    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => panic!("Unknown migration version: {}", version),
    }
}

/// Initial schema - Version 1
///
/// - sources: tracked upstream projects, unique by name
/// - packages: release units owned by a source, metadata keyed by name
/// - versions: observation facts; at most one row per
///   (source, origin, version) triple
///
/// versions cascade when their source is deleted. packages do not:
/// the reconciler removes packages explicitly before a source goes
/// away, and a leftover package must make the source delete fail
/// loudly instead of vanishing silently.
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE INDEX idx_sources_name ON sources(name);

        CREATE TABLE packages (
            name TEXT PRIMARY KEY NOT NULL,
            source_id INTEGER NOT NULL,
            maintainer TEXT,
            homepage_url TEXT,
            license TEXT,
            category TEXT,
            summary TEXT,
            description TEXT,
            FOREIGN KEY (source_id) REFERENCES sources(id)
        );

        CREATE INDEX idx_packages_source_id ON packages(source_id);

        CREATE TABLE versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id INTEGER NOT NULL,
            version TEXT NOT NULL,
            origin TEXT NOT NULL,
            timestamp TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(source_id, version, origin),
            FOREIGN KEY (source_id) REFERENCES sources(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_versions_source_id ON versions(source_id);
        CREATE INDEX idx_versions_origin ON versions(origin);
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}
