//! Types for the monitoring engine: targets, statuses, inputs and events.

use chrono::{DateTime, Utc};
use probe::{HttpMethod, RouteRequest, RouteState, SiteState};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Website ID
pub type WebsiteId = Uuid;

/// Route ID
pub type RouteId = Uuid;

/// Owner ID, as issued by the external identity provider
pub type OwnerId = String;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen address
    pub listen_addr: String,

    /// Interval between sweeps
    pub sweep_interval: Duration,

    /// Websites probed concurrently within a sweep
    pub chunk_size: usize,

    /// Upper bound for a single probe
    pub probe_timeout: Duration,

    /// Captured route responses are truncated to this many characters
    pub max_response_len: usize,

    /// Run one sweep immediately at startup
    pub run_on_startup: bool,

    pub quotas: Quotas,

    /// Minimum time between two alerts for the same (address, website)
    pub notification_cooldown: Duration,

    /// Sender address for alert emails
    pub mail_from: String,

    pub mailer: MailerKind,

    /// Buffered events per owner channel before slow clients lag
    pub broadcast_capacity: usize,

    pub metrics_enabled: bool,

    /// Seed records for the in-memory contact directory
    pub contacts: Vec<Contact>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            sweep_interval: Duration::from_secs(30 * 60),
            chunk_size: 5,
            probe_timeout: Duration::from_secs(10),
            max_response_len: 4096,
            run_on_startup: false,
            quotas: Quotas::default(),
            notification_cooldown: Duration::from_secs(24 * 60 * 60),
            mail_from: "alerts@sitewatch.local".to_string(),
            mailer: MailerKind::Log,
            broadcast_capacity: 64,
            metrics_enabled: true,
            contacts: Vec::new(),
        }
    }
}

/// Per-owner creation limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quotas {
    pub max_websites_per_owner: usize,
    pub max_routes_per_website: usize,
}

impl Default for Quotas {
    fn default() -> Self {
        Self {
            max_websites_per_owner: 10,
            max_routes_per_website: 20,
        }
    }
}

/// How alert emails leave the process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MailerKind {
    /// Write rendered messages to the log
    Log,
    /// POST rendered messages as JSON to a mail relay
    Webhook { url: String },
}

/// Latest status of a website root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatus {
    pub status: SiteState,
    pub last_checked_at: DateTime<Utc>,
}

/// Latest status of a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStatus {
    pub status: RouteState,
    pub response: Option<String>,
    pub last_checked_at: DateTime<Utc>,
}

/// A monitored sub-route of a website
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(rename = "uuid")]
    pub id: RouteId,
    pub website_id: WebsiteId,
    pub method: HttpMethod,
    #[serde(rename = "route")]
    pub path: String,
    pub body: Option<String>,
    pub status: Option<RouteStatus>,
}

impl Route {
    pub fn request(&self) -> RouteRequest<'_> {
        RouteRequest {
            method: self.method,
            path: &self.path,
            body: self.body.as_deref(),
        }
    }
}

/// A monitored website with its routes eagerly loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Website {
    #[serde(rename = "uuid")]
    pub id: WebsiteId,
    #[serde(rename = "userId")]
    pub owner_id: OwnerId,
    pub name: String,
    pub url: String,
    /// Bearer token used for every probe against this website
    #[serde(skip_serializing, default)]
    pub token: Option<String>,
    pub routes: Vec<Route>,
    pub status: Option<SiteStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Record of a sent alert, used for the cooldown window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLog {
    pub address: String,
    /// Website the alert was about; the cooldown itself matches on name
    pub website_id: WebsiteId,
    pub website_name: String,
    pub sent_at: DateTime<Utc>,
}

/// Route to insert as part of a new website
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoute {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<String>,
}

/// Website to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWebsite {
    pub owner_id: OwnerId,
    pub name: String,
    pub url: String,
    pub token: Option<String>,
    pub routes: Vec<NewRoute>,
}

/// Route carried by an update: with an id it is upserted, without one inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteUpsert {
    pub id: Option<RouteId>,
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<String>,
}

/// Partial update of a website. Routes absent from `routes` are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebsitePatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub token: Option<String>,
    pub routes: Vec<RouteUpsert>,
}

/// Listing filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebsiteFilter {
    pub owner_id: Option<OwnerId>,
    /// Case-insensitive substring match over name and URL
    pub search: Option<String>,
}

impl WebsiteFilter {
    pub fn matches(&self, owner_id: &str, name: &str, url: &str) -> bool {
        if let Some(ref owner) = self.owner_id {
            if owner != owner_id {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(search) => {
                let needle = search.to_lowercase();
                name.to_lowercase().contains(&needle) || url.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}

/// One-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: usize,
    pub items_per_page: usize,
}

impl Page {
    pub const MAX_ITEMS_PER_PAGE: usize = 100;

    pub fn new(page: usize, items_per_page: usize) -> common::Result<Self> {
        if page == 0 {
            return Err(common::Error::validation("page must be at least 1"));
        }
        if items_per_page == 0 || items_per_page > Self::MAX_ITEMS_PER_PAGE {
            return Err(common::Error::validation(format!(
                "itemsPerPage must be between 1 and {}",
                Self::MAX_ITEMS_PER_PAGE
            )));
        }
        Ok(Self {
            page,
            items_per_page,
        })
    }

    /// Items to skip; saturates for pages far past the end
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.items_per_page)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            items_per_page: 10,
        }
    }
}

/// A page of results with the unpaginated total
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginated<T> {
    pub total: usize,
    pub items: Vec<T>,
}

/// A route joined with its owning website, for admin listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteListing {
    pub id: RouteId,
    pub path: String,
    pub method: HttpMethod,
    pub website_id: WebsiteId,
    pub website_name: String,
    pub owner_id: OwnerId,
}

/// Owner contact record supplied by the user directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub owner_id: OwnerId,
    pub email: String,
    #[serde(default = "default_receive_notifications")]
    pub receive_notifications: bool,
}

fn default_receive_notifications() -> bool {
    true
}

/// Per-route part of a status event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub route_id: RouteId,
    pub path: String,
    pub status: RouteState,
    pub response: Option<String>,
}

/// Live update pushed to an owner's channel after a website is checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub website_id: WebsiteId,
    pub name: String,
    pub status: SiteState,
    #[serde(default)]
    pub routes: Vec<RouteSummary>,
}
