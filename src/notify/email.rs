// src/notify/email.rs

//! SMTP delivery of update notifications
//!
//! Unmaintained packages are routed to a fallback address with a marked
//! subject line so an administrator can pick them up.

use super::{NotificationSink, UpdateNotification};
use crate::error::{Error, Result};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{info, warn};

pub const DEFAULT_SENDER: &str = "noreply@srcwatch.invalid";
pub const DEFAULT_FALLBACK: &str = "admin@srcwatch.invalid";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP connection settings
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender: String,
    pub fallback: String,
    pub use_tls: bool,
}

impl EmailConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: DEFAULT_SMTP_PORT,
            username: None,
            password: None,
            sender: DEFAULT_SENDER.to_string(),
            fallback: DEFAULT_FALLBACK.to_string(),
            use_tls: true,
        }
    }
}

/// Notification sink that delivers over SMTP
pub struct EmailSink {
    transport: SmtpTransport,
    sender: String,
    fallback: String,
}

impl EmailSink {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let mut builder = if config.use_tls {
            SmtpTransport::starttls_relay(&config.server)
                .map_err(|e| Error::Notify(format!("Bad SMTP relay {}: {}", config.server, e)))?
        } else {
            SmtpTransport::builder_dangerous(&config.server)
        };
        builder = builder.port(config.port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            sender: config.sender.clone(),
            fallback: config.fallback.clone(),
        })
    }

    fn subject(notification: &UpdateNotification) -> String {
        if notification.maintainer_email.is_none() {
            format!(
                "[UNMAINTAINED] Package update available: {}",
                notification.package
            )
        } else {
            format!("Package update available: {}", notification.package)
        }
    }

    fn body(notification: &UpdateNotification) -> String {
        let (greeting, note) = if notification.maintainer_email.is_none() {
            (
                "Hello Administrator,",
                "This package is currently unmaintained. \
                 Please consider assigning a maintainer to it.\n\n",
            )
        } else {
            ("Hello Package Maintainer,", "")
        };

        format!(
            "\n{greeting}\n\n\
             A new version of a package you maintain is available:\n\n\
             Package: {package}\n\
             Source: {source}\n\
             Current Version: {local}\n\
             New Version: {upstream}\n\
             Repository: {origin}\n\n\
             {note}Please update the package to the latest version.\n\n\
             Thank you,\n\
             srcwatch\n",
            greeting = greeting,
            package = notification.package,
            source = notification.source,
            local = notification.local_version,
            upstream = notification.upstream_version,
            origin = notification.origin,
            note = note,
        )
    }
}

impl NotificationSink for EmailSink {
    fn send(&self, notification: &UpdateNotification) -> bool {
        let recipient = notification
            .maintainer_email
            .as_deref()
            .unwrap_or(&self.fallback);
        let subject = Self::subject(notification);

        let message = match Message::builder()
            .from(match self.sender.parse() {
                Ok(mailbox) => mailbox,
                Err(e) => {
                    warn!("Invalid sender address {}: {}", self.sender, e);
                    return false;
                }
            })
            .to(match recipient.parse() {
                Ok(mailbox) => mailbox,
                Err(e) => {
                    warn!("Invalid recipient address {}: {}", recipient, e);
                    return false;
                }
            })
            .subject(&subject)
            .body(Self::body(notification))
        {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to build notification email: {}", e);
                return false;
            }
        };

        match self.transport.send(&message) {
            Ok(_) => {
                info!("Email notification sent to {} about {}", recipient, subject);
                true
            }
            Err(e) => {
                warn!("Failed to send email notification: {}", e);
                false
            }
        }
    }
}
