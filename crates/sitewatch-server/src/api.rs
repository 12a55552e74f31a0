//! Monitoring API: validated operations over the target registry.

use crate::clock::Clock;
use crate::contacts::ContactDirectory;
use crate::monitor::{CheckMode, Monitor};
use crate::registry::TargetRegistry;
use crate::types::{
    NewRoute, NewWebsite, Page, Paginated, Quotas, RouteId, RouteUpsert, StatusEvent, Website,
    WebsiteFilter, WebsiteId, WebsitePatch,
};
use common::{Error, Result};
use probe::{HttpMethod, SiteState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Request body for creating a website
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebsiteRequest {
    #[validate(custom = "validate_site_name")]
    pub site_name: String,

    #[validate(custom = "validate_site_url")]
    pub site_url: String,

    pub token: Option<String>,

    #[validate(length(min = 1))]
    pub user_id: String,

    #[serde(default)]
    pub routes: Vec<RouteInput>,
}

/// Route in a create request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RouteInput {
    pub method: HttpMethod,

    #[validate(length(max = 2048))]
    pub route: String,

    pub body: Option<String>,
}

/// Request body for patching a website
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWebsiteRequest {
    #[validate(custom = "validate_site_name")]
    pub site_name: Option<String>,

    #[validate(custom = "validate_site_url")]
    pub site_url: Option<String>,

    pub token: Option<String>,

    pub routes: Option<Vec<RouteUpdateInput>>,
}

/// Route in an update request; `uuid` selects an existing route
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RouteUpdateInput {
    pub uuid: Option<RouteId>,

    pub method: HttpMethod,

    #[validate(length(max = 2048))]
    pub route: String,

    pub body: Option<String>,
}

/// Route joined with its website and owner contact, for admin views
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteView {
    pub uuid: RouteId,
    pub route: String,
    pub method: HttpMethod,
    pub website_id: WebsiteId,
    pub website_name: String,
    pub user_email: String,
}

/// Between 1 and 255 characters once surrounding whitespace is removed
pub fn validate_site_name(value: &str) -> std::result::Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(ValidationError::new("name_blank"));
    }
    if len > 255 {
        return Err(ValidationError::new("name_too_long"));
    }
    Ok(())
}

/// Absolute http(s) URL with a host
pub fn validate_site_url(value: &str) -> std::result::Result<(), ValidationError> {
    let parsed = url::Url::parse(value.trim()).map_err(|_| ValidationError::new("url_invalid"))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::new("url_scheme_unsupported"));
    }
    if parsed.host_str().is_none() {
        return Err(ValidationError::new("url_missing_host"));
    }
    Ok(())
}

fn validate_all<'a, T: Validate + 'a>(items: impl IntoIterator<Item = &'a T>) -> Result<()> {
    for item in items {
        item.validate().map_err(Error::validation)?;
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Create, update, delete, list and on-demand check of websites.
///
/// Every operation validates before writing; a rejected request changes
/// nothing.
pub struct MonitoringService {
    registry: Arc<dyn TargetRegistry>,
    monitor: Arc<Monitor>,
    contacts: Arc<dyn ContactDirectory>,
    quotas: Quotas,
}

impl MonitoringService {
    pub fn new(
        registry: Arc<dyn TargetRegistry>,
        monitor: Arc<Monitor>,
        contacts: Arc<dyn ContactDirectory>,
        quotas: Quotas,
    ) -> Self {
        Self {
            registry,
            monitor,
            contacts,
            quotas,
        }
    }

    /// Ad-hoc probe of any URL, nothing persisted
    pub async fn check_url(&self, url: &str, token: Option<&str>) -> Result<SiteState> {
        validate_site_url(url).map_err(|e| Error::validation(format!("url: {}", e)))?;
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        Ok(self.monitor.prober().probe_site(url.trim(), token).await)
    }

    pub async fn create_website(&self, request: CreateWebsiteRequest) -> Result<Website> {
        request.validate().map_err(Error::validation)?;
        validate_all(&request.routes)?;

        if request.routes.len() > self.quotas.max_routes_per_website {
            return Err(Error::validation(format!(
                "a website may have at most {} routes",
                self.quotas.max_routes_per_website
            )));
        }

        let new_website = NewWebsite {
            owner_id: request.user_id,
            name: request.site_name.trim().to_string(),
            url: request.site_url.trim().to_string(),
            token: non_empty(request.token),
            routes: request
                .routes
                .into_iter()
                .map(|route| NewRoute {
                    method: route.method,
                    path: route.route,
                    body: route.body,
                })
                .collect(),
        };
        let website = self
            .registry
            .create_website_within_quota(
                new_website,
                self.quotas.max_websites_per_owner,
                self.monitor.clock().now(),
            )
            .await?;

        info!(website_id = %website.id, owner_id = %website.owner_id, "Website registered");
        self.initial_check(website).await
    }

    pub async fn get_website(&self, id: WebsiteId) -> Result<Website> {
        self.registry
            .find_website_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("website {}", id)))
    }

    pub async fn delete_website(&self, id: WebsiteId) -> Result<()> {
        if !self.registry.delete_website(id).await? {
            return Err(Error::not_found(format!("website {}", id)));
        }
        info!(website_id = %id, "Website deleted");
        Ok(())
    }

    /// Patch fields and upsert the supplied routes. Routes missing from the
    /// request are kept.
    pub async fn update_website(&self, id: WebsiteId, request: UpdateWebsiteRequest) -> Result<Website> {
        request.validate().map_err(Error::validation)?;
        let routes = request.routes.unwrap_or_default();
        validate_all(&routes)?;

        let current = self.get_website(id).await?;

        let added = routes
            .iter()
            .filter(|route| match route.uuid {
                Some(route_id) => !current.routes.iter().any(|r| r.id == route_id),
                None => true,
            })
            .count();
        if current.routes.len() + added > self.quotas.max_routes_per_website {
            return Err(Error::validation(format!(
                "a website may have at most {} routes",
                self.quotas.max_routes_per_website
            )));
        }

        let patch = WebsitePatch {
            name: non_empty(request.site_name),
            url: non_empty(request.site_url),
            token: non_empty(request.token),
            routes: routes
                .into_iter()
                .map(|route| RouteUpsert {
                    id: route.uuid,
                    method: route.method,
                    path: route.route,
                    body: route.body,
                })
                .collect(),
        };

        let website = self
            .registry
            .update_website(id, patch, self.monitor.clock().now())
            .await?
            .ok_or_else(|| Error::not_found(format!("website {}", id)))?;

        info!(website_id = %id, routes = website.routes.len(), "Website updated");
        self.initial_check(website).await
    }

    pub async fn delete_route(&self, route_id: RouteId) -> Result<()> {
        if !self.registry.delete_route(route_id).await? {
            return Err(Error::not_found(format!("route {}", route_id)));
        }
        info!(route_id = %route_id, "Route deleted");
        Ok(())
    }

    pub async fn list_websites(&self, filter: WebsiteFilter, page: Page) -> Result<Paginated<Website>> {
        self.registry.list_websites(&filter, page).await
    }

    pub async fn list_websites_by_owner(
        &self,
        owner_id: &str,
        page: Page,
        search: Option<&str>,
    ) -> Result<Paginated<Website>> {
        self.registry.list_websites_by_owner(owner_id, page, search).await
    }

    /// Check one website now, outside the sweep cadence
    pub async fn check_now(&self, id: WebsiteId) -> Result<StatusEvent> {
        self.monitor.check_website(id, CheckMode::Alerting).await
    }

    /// All routes across all websites with owner contact addresses
    pub async fn list_routes(&self, page: Page) -> Result<Paginated<RouteView>> {
        let listings = self.registry.list_routes(page).await?;

        let mut emails: HashMap<String, String> = HashMap::new();
        let mut items = Vec::with_capacity(listings.items.len());
        for listing in listings.items {
            if !emails.contains_key(&listing.owner_id) {
                let email = match self.contacts.find_contact(&listing.owner_id).await {
                    Ok(contact) => contact.map(|c| c.email).unwrap_or_default(),
                    Err(e) => {
                        warn!(owner_id = %listing.owner_id, error = %e, "Contact lookup failed");
                        String::new()
                    }
                };
                emails.insert(listing.owner_id.clone(), email);
            }

            items.push(RouteView {
                uuid: listing.id,
                route: listing.path,
                method: listing.method,
                website_id: listing.website_id,
                website_name: listing.website_name,
                user_email: emails.get(&listing.owner_id).cloned().unwrap_or_default(),
            });
        }

        Ok(Paginated {
            total: listings.total,
            items,
        })
    }

    /// Probe a just-written website and return it with fresh statuses.
    /// A failed check is logged; the write itself already succeeded.
    async fn initial_check(&self, website: Website) -> Result<Website> {
        if let Err(e) = self.monitor.check(&website, CheckMode::Silent).await {
            warn!(website_id = %website.id, error = %e, "Initial check failed");
            return Ok(website);
        }

        Ok(self
            .registry
            .find_website_by_id(website.id)
            .await?
            .unwrap_or(website))
    }
}

/// Parse a path id, reporting malformed ids as not found
pub fn parse_id(raw: &str, kind: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| Error::not_found(format!("{} {}", kind, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_url_validation() {
        assert!(validate_site_url("https://example.com").is_ok());
        assert!(validate_site_url("http://localhost:8080/api/").is_ok());

        assert!(validate_site_url("").is_err());
        assert!(validate_site_url("example.com").is_err());
        assert!(validate_site_url("ftp://example.com").is_err());
        assert!(validate_site_url("/relative/path").is_err());
    }

    #[test]
    fn test_site_name_validation() {
        assert!(validate_site_name("shop").is_ok());
        assert!(validate_site_name("  shop  ").is_ok());
        assert!(validate_site_name("").is_err());
        assert!(validate_site_name(" \t\n ").is_err());
        assert!(validate_site_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_create_request_wire_format() {
        let json = r#"{
            "siteName": "shop",
            "siteUrl": "https://shop.example.com/",
            "userId": "owner-1",
            "routes": [{ "method": "POST", "route": "api/cart", "body": "{\"sku\": 1}" }]
        }"#;

        let request: CreateWebsiteRequest = serde_json::from_str(json).unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.routes[0].method, HttpMethod::Post);
        assert!(request.token.is_none());
    }

    #[test]
    fn test_create_request_rejects_bad_fields() {
        let request = CreateWebsiteRequest {
            site_name: String::new(),
            site_url: "not a url".to_string(),
            token: None,
            user_id: "owner".to_string(),
            routes: vec![],
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("site_name"));
        assert!(fields.contains_key("site_url"));
    }

    #[test]
    fn test_update_request_allows_partial() {
        let request: UpdateWebsiteRequest = serde_json::from_str(r#"{ "siteName": "renamed" }"#).unwrap();
        assert!(request.validate().is_ok());
        assert!(request.site_url.is_none());
        assert!(request.routes.is_none());

        let bad: UpdateWebsiteRequest = serde_json::from_str(r#"{ "siteUrl": "nope" }"#).unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_parse_id() {
        assert!(parse_id(&Uuid::new_v4().to_string(), "website").is_ok());
        assert!(matches!(parse_id("42", "website"), Err(Error::NotFound(_))));
    }
}
