//! Sitewatch Server - multi-tenant website and route monitoring
//!
//! Owners register websites, each with optional API routes. A scheduler
//! sweeps every website on a fixed interval, persists the latest status of
//! each site and route, emails owners when something breaks, and pushes
//! live status events to the owner's connected clients.
//!
//! # Components
//!
//! - **Registry**: Websites, routes, latest statuses and the email log
//! - **Monitor**: Probes one website, persists statuses, alerts, publishes
//! - **Scheduler**: Periodic sweeps in bounded concurrent chunks
//! - **Notifier**: Alert emails with a per-recipient cooldown
//! - **Broadcaster**: Per-owner live status channels
//! - **API**: Validated create, update, delete, list and check operations

pub mod api;
pub mod broadcaster;
pub mod clock;
pub mod config;
pub mod contacts;
pub mod http_server;
pub mod mail;
pub mod metrics;
pub mod monitor;
pub mod notifier;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod types;

pub use api::MonitoringService;
pub use broadcaster::StatusBroadcaster;
pub use config::{Config, ConfigError};
pub use metrics::MetricsRegistry;
pub use monitor::{CheckMode, Monitor};
pub use notifier::{Alert, Notifier, NotifyOutcome};
pub use registry::{MemoryRegistry, TargetRegistry};
pub use scheduler::{Scheduler, SweepReport};
pub use server::SitewatchServer;
pub use types::ServerConfig;
