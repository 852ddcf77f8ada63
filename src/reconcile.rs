// src/reconcile.rs

//! The reconciliation engine
//!
//! One cycle pulls a fresh snapshot of the distribution, diffs it
//! against the version store, applies the delta, and notifies change
//! observers. Each store write commits independently; a cycle always
//! runs to completion and surfaces per-item failures only through logs
//! and boolean results. Only a broken snapshot collaborator aborts it.

use crate::db::VersionStore;
use crate::db::models::PackageFields;
use crate::distro::{DistroSnapshot, PackageEntry, SourceEntry, VersionOutcome};
use crate::error::Result;
use crate::upstream::UpstreamProvider;
use std::collections::HashSet;
use tracing::{info, warn};

/// Version string recorded when a rolling source has no usable id
pub const ROLLING_ID_SENTINEL: &str = "RollingIDUnavailable";

/// Receives change events from a reconciliation cycle.
///
/// Observers run synchronously in registration order; all methods
/// default to no-ops so an observer implements only what it cares
/// about. Update events are suppressed for sources seen for the first
/// time; added and removed events always fire.
pub trait ChangeObserver {
    fn on_package_added(&self, _name: &str, _source: &str) {}
    fn on_package_removed(&self, _name: &str, _source: &str) {}
    fn on_local_version_updated(&self, _source: &str, _version: &str, _origin: &str) {}
    fn on_upstream_version_updated(&self, _source: &str, _version: &str, _origin: &str) {}
}

/// Counters from one reconciliation cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub sources_seen: usize,
    pub packages_seen: usize,
    pub versions_recorded: usize,
    pub packages_added: usize,
    pub packages_removed: usize,
    pub sources_removed: usize,
}

/// Diffs live snapshots against the version store and applies the delta
pub struct Reconciler {
    store: VersionStore,
    providers: Vec<Box<dyn UpstreamProvider>>,
    observers: Vec<Box<dyn ChangeObserver>>,
}

impl Reconciler {
    pub fn new(store: VersionStore) -> Self {
        Self {
            store,
            providers: Vec::new(),
            observers: Vec::new(),
        }
    }

    pub fn add_provider(&mut self, provider: Box<dyn UpstreamProvider>) {
        self.providers.push(provider);
    }

    pub fn add_observer(&mut self, observer: Box<dyn ChangeObserver>) {
        self.observers.push(observer);
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Run one reconciliation cycle against the given snapshot provider.
    ///
    /// Fails only when the snapshot itself cannot be read; every
    /// per-source, per-package, and per-provider failure is logged and
    /// skipped.
    pub fn run(&mut self, distro: &dyn DistroSnapshot) -> Result<CycleReport> {
        info!("Starting reconciliation cycle");
        let mut report = CycleReport::default();

        // Baseline: the prior cycle's known universe, read once
        let existing_sources: HashSet<String> =
            self.store.list_source_names().into_iter().collect();
        let existing_packages: HashSet<String> =
            self.store.list_package_names().into_iter().collect();

        let snapshot_sources = distro.sources()?;
        let snapshot_packages = distro.packages()?;

        let current_sources: HashSet<String> =
            snapshot_sources.iter().map(|s| s.name.clone()).collect();
        let current_packages: HashSet<String> =
            snapshot_packages.iter().map(|p| p.name.clone()).collect();

        for source in &snapshot_sources {
            report.sources_seen += 1;
            let is_new = !existing_sources.contains(&source.name);
            report.versions_recorded += self.reconcile_source(source, is_new);
        }

        for package in &snapshot_packages {
            report.packages_seen += 1;
            if self.reconcile_package(package, &existing_packages) {
                report.packages_added += 1;
            }
        }

        report.packages_removed += self.sweep_removed_packages(&existing_packages, &current_packages);

        let (removed_sources, removed_packages) =
            self.sweep_removed_sources(&existing_sources, &current_sources);
        report.sources_removed = removed_sources;
        report.packages_removed += removed_packages;

        info!(
            "Reconciliation cycle complete: {} sources, {} packages, {} versions recorded, \
             {} packages added, {} packages removed, {} sources removed",
            report.sources_seen,
            report.packages_seen,
            report.versions_recorded,
            report.packages_added,
            report.packages_removed,
            report.sources_removed
        );
        Ok(report)
    }

    /// Record local and upstream versions for one source. Returns how
    /// many new version facts were stored.
    fn reconcile_source(&mut self, source: &SourceEntry, is_new: bool) -> usize {
        let mut recorded = 0;

        let local_version = match &source.version {
            VersionOutcome::Known(v) => v.clone(),
            VersionOutcome::RollingIdUnavailable => ROLLING_ID_SENTINEL.to_string(),
            VersionOutcome::Error(e) => {
                warn!("Error getting version for source {}: {}", source.name, e);
                format!("Error: {}", e)
            }
        };

        let stored_local = self
            .store
            .latest_version_for_origin(&source.name, "local")
            .map(|(version, _)| version);
        if stored_local.as_deref() != Some(local_version.as_str()) {
            self.store
                .upsert_source_version(&source.name, &local_version, "local");
            recorded += 1;

            if !is_new {
                info!(
                    "Local version updated for {}: {}",
                    source.name, local_version
                );
                for observer in &self.observers {
                    observer.on_local_version_updated(&source.name, &local_version, "local");
                }
            }
        }

        for provider in &mut self.providers {
            let origin = provider.origin().to_string();
            let upstream_version = match provider.get_version(&source.name) {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        "Error getting upstream version for {} from {}: {}",
                        source.name, origin, e
                    );
                    continue;
                }
            };

            let Some(upstream_version) = upstream_version else {
                continue;
            };

            let stored_upstream = self
                .store
                .latest_version_for_origin(&source.name, &origin)
                .map(|(version, _)| version);
            if stored_upstream.as_deref() != Some(upstream_version.as_str()) {
                self.store
                    .upsert_source_version(&source.name, &upstream_version, &origin);
                recorded += 1;

                if !is_new {
                    info!(
                        "Upstream version updated for {}: {} ({})",
                        source.name, upstream_version, origin
                    );
                    for observer in &self.observers {
                        observer.on_upstream_version_updated(
                            &source.name,
                            &upstream_version,
                            &origin,
                        );
                    }
                }
            }
        }

        recorded
    }

    /// Upsert one package's metadata, reporting whether it was new
    fn reconcile_package(
        &mut self,
        package: &PackageEntry,
        existing_packages: &HashSet<String>,
    ) -> bool {
        let is_new = !existing_packages.contains(&package.name);
        if is_new {
            info!(
                "New package added: {} (source: {})",
                package.name, package.source
            );
            for observer in &self.observers {
                observer.on_package_added(&package.name, &package.source);
            }
        }

        // Metadata upsert always runs, new or not
        let fields = PackageFields {
            maintainer: package.metadata.maintainer.clone(),
            homepage_url: package.metadata.homepage_url.clone(),
            license: package.metadata.license.clone(),
            category: package.metadata.category_string(),
            summary: package.metadata.summary.clone(),
            description: package.metadata.description.clone(),
        };
        if !self
            .store
            .upsert_package_metadata(&package.source, Some(&package.name), &fields)
        {
            warn!("Failed to store metadata for package {}", package.name);
        }

        is_new
    }

    /// Delete packages that disappeared from the snapshot
    fn sweep_removed_packages(
        &mut self,
        existing_packages: &HashSet<String>,
        current_packages: &HashSet<String>,
    ) -> usize {
        let mut removed: Vec<&String> = existing_packages.difference(current_packages).collect();
        removed.sort();

        let mut count = 0;
        for package_name in removed {
            if let Some(record) = self.store.get_package(package_name) {
                info!(
                    "Package removed: {} (source: {})",
                    package_name, record.source_name
                );
                for observer in &self.observers {
                    observer.on_package_removed(package_name, &record.source_name);
                }
            }

            if self.store.delete_package(package_name) {
                count += 1;
            } else {
                warn!("Failed to delete package from database: {}", package_name);
            }
        }
        count
    }

    /// Delete sources that disappeared from the snapshot, removing any
    /// packages still attached to them first.
    ///
    /// When a source and its packages vanish in the same cycle the
    /// package sweep has usually deleted them already; any that remain
    /// attached are reported and deleted here, so observers may see a
    /// removal twice across the two sweeps.
    fn sweep_removed_sources(
        &mut self,
        existing_sources: &HashSet<String>,
        current_sources: &HashSet<String>,
    ) -> (usize, usize) {
        let mut removed: Vec<&String> = existing_sources.difference(current_sources).collect();
        removed.sort();

        let mut sources_removed = 0;
        let mut packages_removed = 0;
        for source_name in removed {
            for package in self.store.packages_for_source(source_name) {
                info!(
                    "Package removed: {} (source: {})",
                    package.name, source_name
                );
                for observer in &self.observers {
                    observer.on_package_removed(&package.name, source_name);
                }

                if self.store.delete_package(&package.name) {
                    packages_removed += 1;
                } else {
                    warn!("Failed to delete package from database: {}", package.name);
                }
            }

            if self.store.delete_source(source_name) {
                info!("Deleted source from database: {}", source_name);
                sources_removed += 1;
            } else {
                warn!("Failed to delete source from database: {}", source_name);
            }
        }
        (sources_removed, packages_removed)
    }
}
