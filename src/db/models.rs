// src/db/models.rs

//! Row types for srcwatch database entities

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;

/// A stored version observation: one fact per (source, origin, version)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionFact {
    pub version: String,
    pub origin: String,
    /// Raw row stamp, UTC, as written by SQLite
    pub timestamp: String,
}

impl VersionFact {
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            version: row.get(0)?,
            origin: row.get(1)?,
            timestamp: row.get(2)?,
        })
    }

    /// Observation time as a typed UTC instant, None if the stamp is
    /// not in SQLite's CURRENT_TIMESTAMP format
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Package metadata fields as written by a reconciliation pass.
///
/// An upsert replaces every column, so absent fields clear previously
/// stored values rather than merging with them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageFields {
    pub maintainer: Option<String>,
    pub homepage_url: Option<String>,
    pub license: Option<String>,
    pub category: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
}

/// A stored package row, joined with its owning source name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub source_name: String,
    pub maintainer: Option<String>,
    pub homepage_url: Option<String>,
    pub license: Option<String>,
    pub category: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
}

impl PackageRecord {
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            source_name: row.get(1)?,
            maintainer: row.get(2)?,
            homepage_url: row.get(3)?,
            license: row.get(4)?,
            category: row.get(5)?,
            summary: row.get(6)?,
            description: row.get(7)?,
        })
    }
}

/// Search result row: a source plus its local and best-known versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub name: String,
    pub local_version: Option<String>,
    /// (origin, version) of the comparator-maximal latest observation
    pub latest_version: Option<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observed_at_parses_row_stamp() {
        let fact = VersionFact {
            version: "1.0.0".to_string(),
            origin: "local".to_string(),
            timestamp: "2024-05-01 12:30:00".to_string(),
        };
        let at = fact.observed_at().unwrap();
        assert_eq!(at.to_rfc3339(), "2024-05-01T12:30:00+00:00");

        let bad = VersionFact {
            timestamp: "yesterday".to_string(),
            ..fact
        };
        assert!(bad.observed_at().is_none());
    }
}
