// src/notify/mod.rs

//! Update notification dispatch
//!
//! Turns upstream version events into per-package notifications. The
//! dispatch logic is independent of the delivery channel: a
//! `NotificationSink` delivers one notification and reports success as
//! a boolean, so a failed delivery never disturbs the cycle.

pub mod email;

use crate::db::VersionStore;
use crate::reconcile::ChangeObserver;
use tracing::{info, warn};

/// One out-of-date package, ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateNotification {
    pub package: String,
    pub source: String,
    pub local_version: String,
    pub upstream_version: String,
    pub origin: String,
    /// None marks the package unmaintained
    pub maintainer_email: Option<String>,
}

/// Delivery channel for update notifications
pub trait NotificationSink {
    /// Deliver one notification, reporting success
    fn send(&self, notification: &UpdateNotification) -> bool;
}

/// Sink that only logs, for runs without a mail server
pub struct LogSink;

impl NotificationSink for LogSink {
    fn send(&self, notification: &UpdateNotification) -> bool {
        info!(
            "Update available for {} (source {}): {} -> {} ({})",
            notification.package,
            notification.source,
            notification.local_version,
            notification.upstream_version,
            notification.origin
        );
        true
    }
}

/// Pull the mail address out of a maintainer field.
///
/// Handles the usual "Name <addr>" form; a bare field is taken as an
/// address when it contains '@'. Anything else means no contact.
pub fn extract_contact(maintainer: &str) -> Option<String> {
    if !maintainer.contains('@') {
        return None;
    }
    if let Some(start) = maintainer.rfind('<') {
        let tail = &maintainer[start + 1..];
        let end = tail.find('>').unwrap_or(tail.len());
        return Some(tail[..end].to_string());
    }
    Some(maintainer.to_string())
}

/// Fan an upstream version event out to one notification per package.
///
/// Skips the event entirely when no local version is stored for the
/// source. A source with no packages gets one synthetic, unmaintained
/// notification under its own name.
pub fn dispatch_update(
    store: &VersionStore,
    sink: &dyn NotificationSink,
    source: &str,
    upstream_version: &str,
    origin: &str,
) {
    let Some((local_version, _)) = store.latest_version_for_origin(source, "local") else {
        warn!("No local version found for {}, skipping notification", source);
        return;
    };

    let packages: Vec<(String, Option<String>)> = {
        let records = store.packages_for_source(source);
        if records.is_empty() {
            vec![(source.to_string(), None)]
        } else {
            records
                .into_iter()
                .map(|r| (r.name, r.maintainer))
                .collect()
        }
    };

    for (package, maintainer) in packages {
        let notification = UpdateNotification {
            package,
            source: source.to_string(),
            local_version: local_version.clone(),
            upstream_version: upstream_version.to_string(),
            origin: origin.to_string(),
            maintainer_email: maintainer.as_deref().and_then(extract_contact),
        };
        if !sink.send(&notification) {
            warn!(
                "Failed to deliver update notification for {}",
                notification.package
            );
        }
    }
}

/// Change observer that forwards upstream version events to a sink.
///
/// Owns its own read-only store handle so it can look up packages and
/// local versions while a cycle is running.
pub struct UpdateNotifier {
    store: VersionStore,
    sink: Box<dyn NotificationSink>,
}

impl UpdateNotifier {
    pub fn new(store: VersionStore, sink: Box<dyn NotificationSink>) -> Self {
        Self { store, sink }
    }
}

impl ChangeObserver for UpdateNotifier {
    fn on_upstream_version_updated(&self, source: &str, version: &str, origin: &str) {
        dispatch_update(&self.store, self.sink.as_ref(), source, version, origin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PackageFields;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::NamedTempFile;

    struct RecordingSink {
        sent: Rc<RefCell<Vec<UpdateNotification>>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                sent: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl NotificationSink for RecordingSink {
        fn send(&self, notification: &UpdateNotification) -> bool {
            self.sent.borrow_mut().push(notification.clone());
            true
        }
    }

    fn test_store() -> (NamedTempFile, VersionStore) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();
        let store = VersionStore::open(&db_path).unwrap();
        (temp_file, store)
    }

    #[test]
    fn test_extract_contact() {
        assert_eq!(
            extract_contact("Jo Dev <jo@example.org>").as_deref(),
            Some("jo@example.org")
        );
        assert_eq!(
            extract_contact("jo@example.org").as_deref(),
            Some("jo@example.org")
        );
        assert_eq!(extract_contact("Jo Dev"), None);
        assert_eq!(extract_contact(""), None);
    }

    #[test]
    fn test_dispatch_one_notification_per_package() {
        let (_temp, store) = test_store();
        store.upsert_source_version("openssl", "3.0.1", "local");
        store.upsert_package_metadata(
            "openssl",
            Some("libssl"),
            &PackageFields {
                maintainer: Some("Jo Dev <jo@example.org>".to_string()),
                ..Default::default()
            },
        );
        store.upsert_package_metadata("openssl", Some("openssl-bin"), &PackageFields::default());

        let sink = RecordingSink::new();
        dispatch_update(&store, &sink, "openssl", "3.0.2", "nixos");

        let sent = sink.sent.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].package, "libssl");
        assert_eq!(sent[0].local_version, "3.0.1");
        assert_eq!(sent[0].upstream_version, "3.0.2");
        assert_eq!(sent[0].origin, "nixos");
        assert_eq!(sent[0].maintainer_email.as_deref(), Some("jo@example.org"));
        assert_eq!(sent[1].package, "openssl-bin");
        assert!(sent[1].maintainer_email.is_none());
    }

    #[test]
    fn test_dispatch_synthesizes_package_for_bare_source() {
        let (_temp, store) = test_store();
        store.upsert_source_version("zlib", "1.2", "local");

        let sink = RecordingSink::new();
        dispatch_update(&store, &sink, "zlib", "1.3", "nixos");

        let sent = sink.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].package, "zlib");
        assert!(sent[0].maintainer_email.is_none());
    }

    #[test]
    fn test_dispatch_skips_without_local_version() {
        let (_temp, store) = test_store();
        store.upsert_source_version("zlib", "1.3", "nixos");

        let sink = RecordingSink::new();
        dispatch_update(&store, &sink, "zlib", "1.3", "nixos");
        assert!(sink.sent.borrow().is_empty());
    }

    #[test]
    fn test_notifier_observer_forwards_events() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();

        let store = VersionStore::open(&db_path).unwrap();
        store.upsert_source_version("openssl", "3.0.1", "local");
        store.upsert_package_metadata("openssl", Some("libssl"), &PackageFields::default());

        let sink = RecordingSink::new();
        let sent = sink.sent.clone();

        // The observer gets its own handle to the same database
        let notifier =
            UpdateNotifier::new(VersionStore::open(&db_path).unwrap(), Box::new(sink));
        notifier.on_upstream_version_updated("openssl", "3.0.2", "nixos");

        let sent = sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].package, "libssl");
        assert_eq!(sent[0].upstream_version, "3.0.2");
    }
}
