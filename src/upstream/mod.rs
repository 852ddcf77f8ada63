// src/upstream/mod.rs

//! Upstream version providers
//!
//! A provider answers "what version does repository X currently carry
//! for source Y". Providers own their download and caching policy; the
//! reconciler only sees an optional version string per source and
//! catches provider failures per item.

pub mod nixos;

use crate::error::Result;
use std::path::Path;

/// Capability contract for an upstream repository
pub trait UpstreamProvider {
    /// Origin identifier recorded with every version fact from this provider
    fn origin(&self) -> &str;

    /// Current upstream version for the named source, if the repository
    /// carries it at all
    fn get_version(&mut self, source: &str) -> Result<Option<String>>;
}

/// Construct the provider registered under `name`, keeping its payload
/// cache inside `cache_dir`
pub fn provider_for(name: &str, cache_dir: &Path) -> Option<Box<dyn UpstreamProvider>> {
    match name {
        "nixos" => Some(Box::new(nixos::NixosProvider::new(
            cache_dir.join("nixos_packages.json"),
        ))),
        _ => None,
    }
}
