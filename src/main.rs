// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use srcwatch::db::VersionStore;
use srcwatch::distro::ManifestDistro;
use srcwatch::notify::email::{EmailConfig, EmailSink, DEFAULT_FALLBACK, DEFAULT_SENDER};
use srcwatch::notify::{LogSink, UpdateNotifier};
use srcwatch::reconcile::Reconciler;
use srcwatch::{git, upstream};
use std::path::PathBuf;
use tracing::{info, warn};

const DEFAULT_DB_PATH: &str = "/var/lib/srcwatch/srcwatch.db";

#[derive(Parser)]
#[command(name = "srcwatch")]
#[command(author, version, about = "Track distribution source versions against upstream repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the version database
    Init {
        /// Database path
        #[arg(short, long, default_value = DEFAULT_DB_PATH)]
        db_path: String,
    },
    /// Run one reconciliation cycle against the distribution definition
    Update {
        /// Database path
        #[arg(short, long, default_value = DEFAULT_DB_PATH)]
        db_path: String,
        /// Path to the distribution manifest (YAML)
        #[arg(long)]
        distro_path: PathBuf,
        /// Upstream repository to consult (repeatable)
        #[arg(long = "upstream", value_name = "NAME")]
        upstreams: Vec<String>,
        /// Directory for upstream payload caches
        #[arg(long, default_value = "/var/cache/srcwatch")]
        cache_dir: PathBuf,
        /// Pull the distribution git checkout before the cycle
        #[arg(long)]
        update_git: bool,
        /// Git remote to pull from
        #[arg(long, default_value = "origin")]
        git_remote: String,
        /// Git branch to pull (default: current branch)
        #[arg(long)]
        git_branch: Option<String>,
        /// Send email notifications for upstream version updates
        #[arg(long)]
        email_notifications: bool,
        /// SMTP server address (required with --email-notifications)
        #[arg(long, required_if_eq("email_notifications", "true"))]
        smtp_server: Option<String>,
        /// SMTP server port
        #[arg(long, default_value_t = 587)]
        smtp_port: u16,
        /// SMTP username
        #[arg(long)]
        smtp_username: Option<String>,
        /// SMTP password
        #[arg(long)]
        smtp_password: Option<String>,
        /// Sender address for notifications
        #[arg(long, default_value = DEFAULT_SENDER)]
        sender_email: String,
        /// Recipient for unmaintained packages
        #[arg(long, default_value = DEFAULT_FALLBACK)]
        fallback_email: String,
        /// Disable STARTTLS for the SMTP connection
        #[arg(long)]
        no_tls: bool,
    },
    /// Show stored versions for sources
    Query {
        /// Source name (shows all sources if omitted)
        name: Option<String>,
        /// Database path
        #[arg(short, long, default_value = DEFAULT_DB_PATH)]
        db_path: String,
    },
    /// Substring search over source names
    Search {
        /// Search term (case-sensitive)
        term: String,
        /// Database path
        #[arg(short, long, default_value = DEFAULT_DB_PATH)]
        db_path: String,
    },
    /// List packages without a maintainer
    MissingMaintainer {
        /// Database path
        #[arg(short, long, default_value = DEFAULT_DB_PATH)]
        db_path: String,
    },
}

fn print_source(store: &VersionStore, name: &str) {
    let local = store
        .latest_version_for_origin(name, "local")
        .map(|(version, _)| version);
    match store.latest_overall(name) {
        Some((origin, version)) => println!(
            "{}: local {} / latest {} ({})",
            name,
            local.as_deref().unwrap_or("-"),
            version,
            origin
        ),
        None => println!("{}: no versions recorded", name),
    }
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_path } => {
            info!("Initializing version database at: {}", db_path);
            srcwatch::db::init(&db_path)?;
            println!("Database initialized successfully at: {}", db_path);
            Ok(())
        }
        Commands::Update {
            db_path,
            distro_path,
            upstreams,
            cache_dir,
            update_git,
            git_remote,
            git_branch,
            email_notifications,
            smtp_server,
            smtp_port,
            smtp_username,
            smtp_password,
            sender_email,
            fallback_email,
            no_tls,
        } => {
            if update_git {
                let checkout = distro_path
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| distro_path.clone());
                if !git::refresh(&checkout, &git_remote, git_branch.as_deref()) {
                    warn!("Continuing with the existing checkout");
                }
            }

            let store = VersionStore::open(&db_path)?;
            let mut reconciler = Reconciler::new(store);

            for name in &upstreams {
                match upstream::provider_for(name, &cache_dir) {
                    Some(provider) => reconciler.add_provider(provider),
                    None => {
                        return Err(anyhow::anyhow!("Unknown upstream repository: {}", name));
                    }
                }
            }

            let sink: Box<dyn srcwatch::notify::NotificationSink> = if email_notifications {
                let server = smtp_server
                    .ok_or_else(|| anyhow::anyhow!("--smtp-server is required for email notifications"))?;
                let mut config = EmailConfig::new(server);
                config.port = smtp_port;
                config.username = smtp_username;
                config.password = smtp_password;
                config.sender = sender_email;
                config.fallback = fallback_email;
                config.use_tls = !no_tls;
                Box::new(EmailSink::new(&config)?)
            } else {
                Box::new(LogSink)
            };
            reconciler.add_observer(Box::new(UpdateNotifier::new(
                VersionStore::open(&db_path)?,
                sink,
            )));

            let distro = ManifestDistro::new(&distro_path);
            let report = reconciler.run(&distro)?;

            println!(
                "Cycle complete: {} sources, {} packages, {} versions recorded",
                report.sources_seen, report.packages_seen, report.versions_recorded
            );
            println!(
                "  added {} / removed {} packages, removed {} sources",
                report.packages_added, report.packages_removed, report.sources_removed
            );
            Ok(())
        }
        Commands::Query { name, db_path } => {
            let store = VersionStore::open(&db_path)?;
            match name {
                Some(name) => {
                    print_source(&store, &name);
                    for fact in store.all_versions(&name) {
                        let at = fact
                            .observed_at()
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| fact.timestamp.clone());
                        println!("  {} ({}) at {}", fact.version, fact.origin, at);
                    }
                }
                None => {
                    for name in store.list_source_names() {
                        print_source(&store, &name);
                    }
                }
            }
            Ok(())
        }
        Commands::Search { term, db_path } => {
            let store = VersionStore::open(&db_path)?;
            let results = store.search_sources(&term);
            if results.is_empty() {
                println!("No sources matching '{}'", term);
            }
            for summary in results {
                let latest = summary
                    .latest_version
                    .map(|(origin, version)| format!("{} ({})", version, origin));
                println!(
                    "{}: local {} / latest {}",
                    summary.name,
                    summary.local_version.as_deref().unwrap_or("-"),
                    latest.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        Commands::MissingMaintainer { db_path } => {
            let store = VersionStore::open(&db_path)?;
            let missing = store.packages_missing_maintainer();
            if missing.is_empty() {
                println!("All packages have a maintainer");
            }
            for (package, source) in missing {
                println!("{} (source: {})", package, source);
            }
            Ok(())
        }
    }
}
