// src/db/mod.rs

//! Database layer for srcwatch
//!
//! This module handles all SQLite operations including:
//! - Database initialization and schema creation
//! - Connection management
//! - The version store: sources, packages, and version history
//!
//! Write operations never propagate storage errors to callers; they log
//! the failure and report it as a boolean, so a reconciliation cycle can
//! always run to completion. Read operations signal "nothing stored" as
//! `None` or an empty vector.

pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use crate::version;
use models::{PackageFields, PackageRecord, SourceSummary, VersionFact};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use tracing::{debug, warn};

/// Initialize a new srcwatch database at the specified path
///
/// Creates the database file and sets up the schema. This is idempotent -
/// calling it on an existing database is safe.
pub fn init(db_path: &str) -> Result<()> {
    debug!("Initializing database at: {}", db_path);

    if let Some(parent) = Path::new(db_path).parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Init(format!("Failed to create database directory: {}", e)))?;
    }

    let conn = Connection::open(db_path)?;

    // Set pragmas for better performance and reliability
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    schema::migrate(&conn)?;

    debug!("Database initialized successfully");
    Ok(())
}

/// Open an existing srcwatch database
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        return Err(Error::DatabaseNotFound(db_path.to_string()));
    }

    let conn = Connection::open(db_path)?;

    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    Ok(conn)
}

/// Durable, queryable storage of sources, packages, and version history.
///
/// Owns one SQLite connection. Concurrent stores over the same file need
/// external mutual exclusion.
pub struct VersionStore {
    conn: Connection,
}

impl VersionStore {
    /// Open (creating and migrating if needed) the store at `db_path`
    pub fn open(db_path: &str) -> Result<Self> {
        init(db_path)?;
        let conn = open(db_path)?;
        Ok(Self { conn })
    }

    /// Record a version observation for a source.
    ///
    /// Creates the source row on first sight. Re-observing the
    /// partition's current latest version is a no-op that keeps the
    /// original timestamp. Re-observing an older version makes it the
    /// partition's newest fact again, so a revert settles instead of
    /// reading as a permanent difference. Returns false on storage
    /// failure.
    pub fn upsert_source_version(&self, source: &str, version: &str, origin: &str) -> bool {
        let result = (|| -> Result<()> {
            self.conn.execute(
                "INSERT OR IGNORE INTO sources (name) VALUES (?1)",
                [source],
            )?;
            let inserted = self.conn.execute(
                "INSERT OR IGNORE INTO versions (source_id, version, origin)
                 SELECT id, ?2, ?3 FROM sources WHERE name = ?1",
                params![source, version, origin],
            )?;

            if inserted == 0 {
                let latest: Option<String> = self
                    .conn
                    .query_row(
                        "SELECT v.version
                         FROM versions v
                         JOIN sources s ON v.source_id = s.id
                         WHERE s.name = ?1 AND v.origin = ?2
                         ORDER BY v.timestamp DESC, v.id DESC
                         LIMIT 1",
                        params![source, origin],
                        |row| row.get(0),
                    )
                    .optional()?;

                if latest.as_deref() != Some(version) {
                    // Re-insert so the fact gets a fresh timestamp and a
                    // fresh id, winning same-second ordering ties
                    self.conn.execute(
                        "DELETE FROM versions
                         WHERE source_id = (SELECT id FROM sources WHERE name = ?1)
                           AND version = ?2 AND origin = ?3",
                        params![source, version, origin],
                    )?;
                    self.conn.execute(
                        "INSERT INTO versions (source_id, version, origin)
                         SELECT id, ?2, ?3 FROM sources WHERE name = ?1",
                        params![source, version, origin],
                    )?;
                }
            }
            Ok(())
        })();

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Failed to record version {} ({}) for {}: {}",
                    version, origin, source, e
                );
                false
            }
        }
    }

    /// Most recent (version, timestamp) observed for a source from one origin
    pub fn latest_version_for_origin(&self, source: &str, origin: &str) -> Option<(String, String)> {
        let result = self
            .conn
            .query_row(
                "SELECT v.version, v.timestamp
                 FROM versions v
                 JOIN sources s ON v.source_id = s.id
                 WHERE s.name = ?1 AND v.origin = ?2
                 ORDER BY v.timestamp DESC, v.id DESC
                 LIMIT 1",
                params![source, origin],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional();

        match result {
            Ok(found) => found,
            Err(e) => {
                warn!("Failed to query latest {} version of {}: {}", origin, source, e);
                None
            }
        }
    }

    /// All version facts for a source, newest first
    pub fn all_versions(&self, source: &str) -> Vec<VersionFact> {
        let result = (|| -> Result<Vec<VersionFact>> {
            let mut stmt = self.conn.prepare(
                "SELECT v.version, v.origin, v.timestamp
                 FROM versions v
                 JOIN sources s ON v.source_id = s.id
                 WHERE s.name = ?1
                 ORDER BY v.timestamp DESC, v.id DESC",
            )?;
            let facts = stmt
                .query_map([source], VersionFact::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(facts)
        })();

        result.unwrap_or_else(|e| {
            warn!("Failed to list versions for {}: {}", source, e);
            Vec::new()
        })
    }

    /// Latest (origin, version) per origin for a source, ordered by origin name
    pub fn latest_per_origin(&self, source: &str) -> Vec<(String, String)> {
        let result = (|| -> Result<Vec<(String, String)>> {
            let mut stmt = self.conn.prepare(
                "WITH latest AS (
                     SELECT v.origin,
                            v.version,
                            ROW_NUMBER() OVER (
                                PARTITION BY v.origin
                                ORDER BY v.timestamp DESC, v.id DESC
                            ) AS rn
                     FROM versions v
                     JOIN sources s ON v.source_id = s.id
                     WHERE s.name = ?1
                 )
                 SELECT origin, version FROM latest WHERE rn = 1 ORDER BY origin",
            )?;
            let rows = stmt
                .query_map([source], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })();

        result.unwrap_or_else(|e| {
            warn!("Failed to query per-origin versions for {}: {}", source, e);
            Vec::new()
        })
    }

    /// The comparator-maximal latest version across all origins.
    ///
    /// Ties keep the first origin in sort order. None when the source has
    /// no recorded versions.
    pub fn latest_overall(&self, source: &str) -> Option<(String, String)> {
        let mut best: Option<(String, String)> = None;
        for (origin, ver) in self.latest_per_origin(source) {
            match &best {
                Some((_, best_ver)) if !version::is_newer(&ver, best_ver) => {}
                _ => best = Some((origin, ver)),
            }
        }
        best
    }

    /// Insert or fully replace package metadata.
    ///
    /// The package name defaults to the source name. Fails (returns
    /// false) when the owning source is unknown.
    pub fn upsert_package_metadata(
        &self,
        source: &str,
        name: Option<&str>,
        fields: &PackageFields,
    ) -> bool {
        let package_name = name.unwrap_or(source);

        let result = (|| -> Result<bool> {
            let source_id: Option<i64> = self
                .conn
                .query_row("SELECT id FROM sources WHERE name = ?1", [source], |row| {
                    row.get(0)
                })
                .optional()?;

            let Some(source_id) = source_id else {
                return Ok(false);
            };

            self.conn.execute(
                "INSERT OR REPLACE INTO packages
                 (name, source_id, maintainer, homepage_url, license, category, summary, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    package_name,
                    source_id,
                    fields.maintainer,
                    fields.homepage_url,
                    fields.license,
                    fields.category,
                    fields.summary,
                    fields.description,
                ],
            )?;
            Ok(true)
        })();

        match result {
            Ok(ok) => {
                if !ok {
                    warn!(
                        "Cannot store metadata for {}: source {} is unknown",
                        package_name, source
                    );
                }
                ok
            }
            Err(e) => {
                warn!("Failed to store metadata for {}: {}", package_name, e);
                false
            }
        }
    }

    /// All source names, lexicographically ordered
    pub fn list_source_names(&self) -> Vec<String> {
        self.list_names("SELECT name FROM sources ORDER BY name")
    }

    /// All package names, lexicographically ordered
    pub fn list_package_names(&self) -> Vec<String> {
        self.list_names("SELECT name FROM packages ORDER BY name")
    }

    fn list_names(&self, sql: &str) -> Vec<String> {
        let result = (|| -> Result<Vec<String>> {
            let mut stmt = self.conn.prepare(sql)?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(names)
        })();

        result.unwrap_or_else(|e| {
            warn!("Failed to list names: {}", e);
            Vec::new()
        })
    }

    /// Look up one package with its owning source name
    pub fn get_package(&self, name: &str) -> Option<PackageRecord> {
        let result = self
            .conn
            .query_row(
                "SELECT p.name, s.name, p.maintainer, p.homepage_url, p.license,
                        p.category, p.summary, p.description
                 FROM packages p
                 JOIN sources s ON p.source_id = s.id
                 WHERE p.name = ?1",
                [name],
                PackageRecord::from_row,
            )
            .optional();

        match result {
            Ok(found) => found,
            Err(e) => {
                warn!("Failed to look up package {}: {}", name, e);
                None
            }
        }
    }

    /// All packages owned by a source (empty for unknown sources)
    pub fn packages_for_source(&self, source: &str) -> Vec<PackageRecord> {
        let result = (|| -> Result<Vec<PackageRecord>> {
            let mut stmt = self.conn.prepare(
                "SELECT p.name, s.name, p.maintainer, p.homepage_url, p.license,
                        p.category, p.summary, p.description
                 FROM packages p
                 JOIN sources s ON p.source_id = s.id
                 WHERE s.name = ?1
                 ORDER BY p.name",
            )?;
            let packages = stmt
                .query_map([source], PackageRecord::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(packages)
        })();

        result.unwrap_or_else(|e| {
            warn!("Failed to list packages for {}: {}", source, e);
            Vec::new()
        })
    }

    /// Delete a package row. Deleting an absent package is a harmless no-op.
    pub fn delete_package(&self, name: &str) -> bool {
        match self
            .conn
            .execute("DELETE FROM packages WHERE name = ?1", [name])
        {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to delete package {}: {}", name, e);
                false
            }
        }
    }

    /// Delete a source together with its version facts.
    ///
    /// Returns false for unknown sources and when packages still
    /// reference the source.
    pub fn delete_source(&self, name: &str) -> bool {
        let result = (|| -> Result<bool> {
            let deleted = self
                .conn
                .execute("DELETE FROM sources WHERE name = ?1", [name])?;
            Ok(deleted > 0)
        })();

        match result {
            Ok(found) => found,
            Err(e) => {
                warn!("Failed to delete source {}: {}", name, e);
                false
            }
        }
    }

    /// Packages with no maintainer recorded, as (package, source) pairs
    pub fn packages_missing_maintainer(&self) -> Vec<(String, String)> {
        let result = (|| -> Result<Vec<(String, String)>> {
            let mut stmt = self.conn.prepare(
                "SELECT p.name, s.name
                 FROM packages p
                 JOIN sources s ON p.source_id = s.id
                 WHERE p.maintainer IS NULL OR p.maintainer = ''
                 ORDER BY p.name",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })();

        result.unwrap_or_else(|e| {
            warn!("Failed to list unmaintained packages: {}", e);
            Vec::new()
        })
    }

    /// Case-sensitive substring search over source names, enriched with
    /// the local and overall-latest versions, ordered by name
    pub fn search_sources(&self, term: &str) -> Vec<SourceSummary> {
        let names = (|| -> Result<Vec<String>> {
            let mut stmt = self.conn.prepare(
                "SELECT name FROM sources WHERE instr(name, ?1) > 0 ORDER BY name",
            )?;
            let names = stmt
                .query_map([term], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(names)
        })();

        let names = names.unwrap_or_else(|e| {
            warn!("Source search failed: {}", e);
            Vec::new()
        });

        names
            .into_iter()
            .map(|name| {
                let local_version = self
                    .latest_version_for_origin(&name, "local")
                    .map(|(version, _)| version);
                let latest_version = self.latest_overall(&name);
                SourceSummary {
                    name,
                    local_version,
                    latest_version,
                }
            })
            .collect()
    }
}
