// src/distro.rs

//! Distribution snapshot contract and the YAML manifest reader
//!
//! A snapshot provider yields the distribution's current universe of
//! sources and packages once per reconciliation cycle. The trait keeps
//! the reconciler independent of how a distribution definition is
//! actually stored; `ManifestDistro` reads one from a YAML manifest.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Outcome of asking the distribution for a source's declared version.
///
/// Version resolution can fail without aborting the snapshot: a rolling
/// source may have no usable id, and any other failure is carried as a
/// message. The reconciler maps both to sentinel version strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionOutcome {
    Known(String),
    RollingIdUnavailable,
    Error(String),
}

/// One source as declared by the distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub name: String,
    pub version: VersionOutcome,
}

/// Package metadata with explicit per-field presence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub maintainer: Option<String>,
    pub homepage_url: Option<String>,
    pub license: Option<String>,
    pub categories: Vec<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
}

impl PackageMetadata {
    /// Categories rendered as a single comma-joined string, or None when
    /// the package declares none
    pub fn category_string(&self) -> Option<String> {
        if self.categories.is_empty() {
            None
        } else {
            Some(self.categories.join(", "))
        }
    }
}

/// One package as declared by the distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub name: String,
    pub source: String,
    pub metadata: PackageMetadata,
}

/// A live view of the distribution definition, pulled once per cycle
pub trait DistroSnapshot {
    fn sources(&self) -> Result<Vec<SourceEntry>>;
    fn packages(&self) -> Result<Vec<PackageEntry>>;
}

// Manifest wire format. Field names follow the distribution definition:
// `website` for the homepage, `spdx` for the license identifier.

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    sources: Vec<ManifestSource>,
    #[serde(default)]
    packages: Vec<ManifestPackage>,
}

#[derive(Debug, Deserialize)]
struct ManifestSource {
    name: String,
    version: Option<String>,
    #[serde(default, rename = "rolling-id")]
    rolling_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManifestPackage {
    name: String,
    source: String,
    #[serde(default)]
    metadata: Option<ManifestMetadata>,
}

#[derive(Debug, Deserialize)]
struct ManifestMetadata {
    maintainer: Option<String>,
    website: Option<String>,
    spdx: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    summary: Option<String>,
    description: Option<String>,
}

/// Snapshot provider backed by a single YAML manifest file.
///
/// The manifest is re-read on every call, so each reconciliation cycle
/// sees the definition as it is on disk at that moment.
pub struct ManifestDistro {
    path: PathBuf,
}

impl ManifestDistro {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn load(&self) -> Result<Manifest> {
        let text = std::fs::read_to_string(&self.path)?;
        serde_yaml::from_str(&text)
            .map_err(|e| Error::Parse(format!("{}: {}", self.path.display(), e)))
    }
}

impl DistroSnapshot for ManifestDistro {
    fn sources(&self) -> Result<Vec<SourceEntry>> {
        let manifest = self.load()?;
        Ok(manifest
            .sources
            .into_iter()
            .map(|s| {
                let version = match (s.version, s.rolling_id.as_deref()) {
                    (Some(v), _) => VersionOutcome::Known(v),
                    (None, Some("unavailable")) | (None, None) => {
                        VersionOutcome::RollingIdUnavailable
                    }
                    (None, Some(id)) => VersionOutcome::Known(id.to_string()),
                };
                SourceEntry {
                    name: s.name,
                    version,
                }
            })
            .collect())
    }

    fn packages(&self) -> Result<Vec<PackageEntry>> {
        let manifest = self.load()?;
        Ok(manifest
            .packages
            .into_iter()
            .map(|p| {
                let metadata = match p.metadata {
                    Some(m) => PackageMetadata {
                        maintainer: m.maintainer,
                        homepage_url: m.website,
                        license: m.spdx,
                        categories: m.categories,
                        summary: m.summary,
                        description: m.description,
                    },
                    None => PackageMetadata::default(),
                };
                PackageEntry {
                    name: p.name,
                    source: p.source,
                    metadata,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_manifest(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_manifest_sources_and_packages() {
        let file = write_manifest(
            "
sources:
  - name: openssl
    version: 3.0.1
  - name: linux-headers
    rolling-id: unavailable
packages:
  - name: libssl
    source: openssl
    metadata:
      maintainer: Jo Dev <jo@example.org>
      website: https://openssl.org
      spdx: Apache-2.0
      categories: [crypto, libraries]
      summary: TLS toolkit
      description: A TLS/SSL and crypto library
  - name: bare-package
    source: openssl
",
        );

        let distro = ManifestDistro::new(file.path());

        let sources = distro.sources().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "openssl");
        assert_eq!(
            sources[0].version,
            VersionOutcome::Known("3.0.1".to_string())
        );
        assert_eq!(sources[1].version, VersionOutcome::RollingIdUnavailable);

        let packages = distro.packages().unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "libssl");
        assert_eq!(packages[0].source, "openssl");
        assert_eq!(
            packages[0].metadata.category_string().as_deref(),
            Some("crypto, libraries")
        );
        assert_eq!(
            packages[0].metadata.homepage_url.as_deref(),
            Some("https://openssl.org")
        );

        // Missing metadata map means all-empty metadata
        assert_eq!(packages[1].metadata, PackageMetadata::default());
        assert!(packages[1].metadata.category_string().is_none());
    }

    #[test]
    fn test_manifest_empty_sections() {
        let file = write_manifest("sources: []\n");
        let distro = ManifestDistro::new(file.path());
        assert!(distro.sources().unwrap().is_empty());
        assert!(distro.packages().unwrap().is_empty());
    }

    #[test]
    fn test_manifest_malformed_yaml() {
        let file = write_manifest("sources: {not-a-list: true}\n");
        let distro = ManifestDistro::new(file.path());
        assert!(distro.sources().is_err());
    }

    #[test]
    fn test_manifest_missing_file() {
        let distro = ManifestDistro::new("/nonexistent/manifest.yml");
        assert!(distro.sources().is_err());
    }
}
