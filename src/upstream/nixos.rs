// src/upstream/nixos.rs

//! NixOS channel version provider
//!
//! Reads the nixpkgs channel package index (packages.json) and answers
//! version queries from it. The index is large, so the raw payload is
//! cached on disk and the parsed map in memory; both expire together
//! after the cache TTL and are owned by the provider instance.

use super::UpstreamProvider;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Default channel index URL (served brotli-compressed)
pub const DEFAULT_CHANNEL_URL: &str =
    "https://nixos.org/channels/nixpkgs-unstable/packages.json.br";

/// Payloads older than this are refetched
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Timeout for index downloads
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Maximum retry attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct ChannelIndex {
    packages: HashMap<String, ChannelPackage>,
}

#[derive(Debug, Deserialize)]
struct ChannelPackage {
    version: String,
}

/// Parsed payload plus the moment it was loaded
struct PayloadCache {
    ttl: Duration,
    loaded: Option<(ChannelIndex, SystemTime)>,
}

impl PayloadCache {
    fn new(ttl: Duration) -> Self {
        Self { ttl, loaded: None }
    }

    fn fresh(&self) -> Option<&ChannelIndex> {
        let (index, at) = self.loaded.as_ref()?;
        let age = SystemTime::now().duration_since(*at).unwrap_or_default();
        if age > self.ttl { None } else { Some(index) }
    }

    fn store(&mut self, index: ChannelIndex) {
        self.loaded = Some((index, SystemTime::now()));
    }
}

/// Version provider backed by the nixpkgs channel index
pub struct NixosProvider {
    url: String,
    cache_path: PathBuf,
    always_refresh: bool,
    cache: PayloadCache,
}

impl NixosProvider {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            url: DEFAULT_CHANNEL_URL.to_string(),
            cache_path: cache_path.into(),
            always_refresh: false,
            cache: PayloadCache::new(DEFAULT_CACHE_TTL),
        }
    }

    /// Override the channel index URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Override the cache TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl = ttl;
        self
    }

    /// Force a download on the next query regardless of cache age
    pub fn always_refresh(mut self) -> Self {
        self.always_refresh = true;
        self
    }

    /// True when the on-disk payload exists and is younger than the TTL
    fn disk_cache_fresh(&self) -> bool {
        let Ok(metadata) = fs::metadata(&self.cache_path) else {
            return false;
        };
        let Ok(modified) = metadata.modified() else {
            return false;
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        age <= self.cache.ttl
    }

    /// Download the index payload to the cache path (temp file, then
    /// atomic rename)
    fn download_index(&self) -> Result<()> {
        info!("Downloading channel index from {}", self.url);

        if let Some(parent) = self.cache_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Download(format!("Failed to create HTTP client: {}", e)))?;

        let mut attempt = 0;
        let body = loop {
            attempt += 1;
            match client.get(&self.url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::Download(format!(
                            "HTTP {} from {}",
                            response.status(),
                            self.url
                        )));
                    }
                    break response.bytes().map_err(|e| {
                        Error::Download(format!("Failed to read index payload: {}", e))
                    })?;
                }
                Err(e) => {
                    if attempt >= MAX_RETRIES {
                        return Err(Error::Download(format!(
                            "Failed to fetch {} after {} attempts: {}",
                            self.url, attempt, e
                        )));
                    }
                    warn!("Index fetch attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        };

        let temp_path = self.cache_path.with_extension("tmp");
        fs::write(&temp_path, &body)?;
        fs::rename(&temp_path, &self.cache_path)?;

        debug!(
            "Channel index cached at {} ({} bytes)",
            self.cache_path.display(),
            body.len()
        );
        Ok(())
    }

    fn load_index(&mut self) -> Result<()> {
        if self.always_refresh || !self.disk_cache_fresh() {
            self.download_index()?;
        }

        let payload = fs::read(&self.cache_path)?;
        let index: ChannelIndex = serde_json::from_slice(&payload)
            .map_err(|e| Error::Parse(format!("{}: {}", self.cache_path.display(), e)))?;

        debug!("Loaded channel index with {} packages", index.packages.len());
        self.cache.store(index);
        Ok(())
    }
}

impl UpstreamProvider for NixosProvider {
    fn origin(&self) -> &str {
        "nixos"
    }

    fn get_version(&mut self, source: &str) -> Result<Option<String>> {
        if self.cache.fresh().is_none() {
            self.load_index()?;
        }

        let index = self
            .cache
            .fresh()
            .ok_or_else(|| Error::Parse("channel index expired immediately".to_string()))?;

        Ok(index.packages.get(source).map(|p| p.version.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_index(dir: &Path) -> PathBuf {
        let path = dir.join("nixos_packages.json");
        fs::write(
            &path,
            r#"{"packages": {"openssl": {"version": "3.0.2"}, "zlib": {"version": "1.3"}}}"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn test_get_version_from_disk_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path());

        let mut provider = NixosProvider::new(&path);
        assert_eq!(
            provider.get_version("openssl").unwrap(),
            Some("3.0.2".to_string())
        );
        assert_eq!(provider.get_version("zlib").unwrap(), Some("1.3".to_string()));
    }

    #[test]
    fn test_unknown_package_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path());

        let mut provider = NixosProvider::new(&path);
        assert_eq!(provider.get_version("no-such-package").unwrap(), None);
    }

    #[test]
    fn test_memory_cache_survives_file_removal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path());

        let mut provider = NixosProvider::new(&path);
        assert!(provider.get_version("openssl").unwrap().is_some());

        // Parsed payload is held by the provider, not re-read per query
        fs::remove_file(&path).unwrap();
        assert_eq!(provider.get_version("zlib").unwrap(), Some("1.3".to_string()));
    }

    #[test]
    fn test_malformed_payload_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nixos_packages.json");
        fs::write(&path, "not json").unwrap();

        let mut provider = NixosProvider::new(&path);
        assert!(matches!(
            provider.get_version("openssl"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_payload_cache_expiry() {
        let mut cache = PayloadCache::new(Duration::from_secs(3600));
        assert!(cache.fresh().is_none());

        cache.store(ChannelIndex {
            packages: HashMap::new(),
        });
        assert!(cache.fresh().is_some());

        // Backdate the load past the TTL
        if let Some((_, at)) = cache.loaded.as_mut() {
            *at = SystemTime::now() - Duration::from_secs(7200);
        }
        assert!(cache.fresh().is_none());
    }
}
