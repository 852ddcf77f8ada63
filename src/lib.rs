// src/lib.rs

//! srcwatch - distribution version drift tracker
//!
//! Tracks the versions a distribution declares for its sources against
//! the versions visible in upstream repositories, keeps the full version
//! history in SQLite, and reports additions, removals, and version
//! changes to interested observers.
//!
//! # Architecture
//!
//! - Database-first: all observed state lives in SQLite
//! - One reconciliation cycle diffs a fresh snapshot against the store
//! - Change observers receive typed add/remove/update events
//! - Upstream providers answer "what version does repository X carry"

pub mod db;
pub mod distro;
mod error;
pub mod git;
pub mod notify;
pub mod reconcile;
pub mod upstream;
pub mod version;

pub use error::{Error, Result};
