//! Target registry: persistence of websites, routes, statuses and email logs.

use crate::types::{
    EmailLog, NewWebsite, OwnerId, Page, Paginated, Route, RouteId, RouteListing, RouteStatus,
    RouteUpsert, SiteStatus, Website, WebsiteFilter, WebsiteId, WebsitePatch,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Error, Result};
use probe::{HttpMethod, RouteState, SiteState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Persistence interface consumed by the monitoring engine.
///
/// Websites are always returned with their routes and latest statuses
/// eagerly loaded.
#[async_trait]
pub trait TargetRegistry: Send + Sync {
    async fn create_website(&self, website: NewWebsite, created_at: DateTime<Utc>) -> Result<Website>;

    /// Insert the website only while its owner holds fewer than
    /// `max_websites`. The count and the insert are one atomic step; a full
    /// quota is a validation error and nothing is written.
    async fn create_website_within_quota(
        &self,
        website: NewWebsite,
        max_websites: usize,
        created_at: DateTime<Utc>,
    ) -> Result<Website>;

    async fn find_website_by_id(&self, id: WebsiteId) -> Result<Option<Website>>;

    /// Remove the website, its site status, its routes, their statuses and
    /// the email logs recorded for it as one unit. Returns `false` when the
    /// website does not exist.
    async fn delete_website(&self, id: WebsiteId) -> Result<bool>;

    async fn list_websites(&self, filter: &WebsiteFilter, page: Page)
    -> Result<Paginated<Website>>;

    async fn list_websites_by_owner(
        &self,
        owner_id: &str,
        page: Page,
        search: Option<&str>,
    ) -> Result<Paginated<Website>> {
        let filter = WebsiteFilter {
            owner_id: Some(owner_id.to_string()),
            search: search.map(str::to_string),
        };
        self.list_websites(&filter, page).await
    }

    /// Every website, for a sweep snapshot
    async fn all_websites(&self) -> Result<Vec<Website>>;

    /// Apply a patch. Returns `None` when the website does not exist.
    async fn update_website(
        &self,
        id: WebsiteId,
        patch: WebsitePatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Website>>;

    async fn upsert_site_status(
        &self,
        website_id: WebsiteId,
        status: SiteState,
        checked_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn upsert_route_status(
        &self,
        route_id: RouteId,
        status: RouteState,
        response: Option<String>,
        checked_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn find_route(&self, route_id: RouteId) -> Result<Option<Route>>;

    /// Remove a route and its status. Returns `false` when it does not exist.
    async fn delete_route(&self, route_id: RouteId) -> Result<bool>;

    async fn list_routes(&self, page: Page) -> Result<Paginated<RouteListing>>;

    async fn count_websites_by_owner(&self, owner_id: &str) -> Result<usize>;

    async fn append_email_log(
        &self,
        address: &str,
        website_id: WebsiteId,
        website_name: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Most recent log for the pair across all websites sharing the name
    async fn find_last_email_log(&self, address: &str, website_name: &str)
    -> Result<Option<EmailLog>>;
}

struct WebsiteRow {
    seq: u64,
    owner_id: OwnerId,
    name: String,
    url: String,
    token: Option<String>,
    route_ids: Vec<RouteId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct RouteRow {
    website_id: WebsiteId,
    method: HttpMethod,
    path: String,
    body: Option<String>,
}

#[derive(Default)]
struct Tables {
    next_seq: u64,
    websites: HashMap<WebsiteId, WebsiteRow>,
    routes: HashMap<RouteId, RouteRow>,
    site_statuses: HashMap<WebsiteId, SiteStatus>,
    route_statuses: HashMap<RouteId, RouteStatus>,
    email_logs: Vec<EmailLog>,
}

impl Tables {
    fn load_route(&self, id: RouteId) -> Option<Route> {
        self.routes.get(&id).map(|row| Route {
            id,
            website_id: row.website_id,
            method: row.method,
            path: row.path.clone(),
            body: row.body.clone(),
            status: self.route_statuses.get(&id).cloned(),
        })
    }

    fn load_website(&self, id: WebsiteId) -> Option<Website> {
        self.websites.get(&id).map(|row| Website {
            id,
            owner_id: row.owner_id.clone(),
            name: row.name.clone(),
            url: row.url.clone(),
            token: row.token.clone(),
            routes: row
                .route_ids
                .iter()
                .filter_map(|route_id| self.load_route(*route_id))
                .collect(),
            status: self.site_statuses.get(&id).cloned(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    /// Website ids ordered by insertion
    fn ordered_ids(&self, filter: &WebsiteFilter) -> Vec<WebsiteId> {
        let mut ids: Vec<(u64, WebsiteId)> = self
            .websites
            .iter()
            .filter(|(_, row)| filter.matches(&row.owner_id, &row.name, &row.url))
            .map(|(id, row)| (row.seq, *id))
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    fn insert_website(&mut self, website: NewWebsite, created_at: DateTime<Utc>) -> Result<Website> {
        let id = Uuid::new_v4();
        self.next_seq += 1;
        let seq = self.next_seq;
        self.websites.insert(
            id,
            WebsiteRow {
                seq,
                owner_id: website.owner_id,
                name: website.name,
                url: website.url,
                token: website.token,
                route_ids: Vec::with_capacity(website.routes.len()),
                created_at,
                updated_at: created_at,
            },
        );

        for route in website.routes {
            self.insert_route(Uuid::new_v4(), id, route.method, route.path, route.body);
        }

        debug!(website_id = %id, "Website created");
        self.load_website(id)
            .ok_or_else(|| Error::persistence(format!("website {} vanished after insert", id)))
    }

    fn count_owned(&self, owner_id: &str) -> usize {
        self.websites.values().filter(|row| row.owner_id == owner_id).count()
    }

    fn insert_route(&mut self, id: RouteId, website_id: WebsiteId, method: HttpMethod, path: String, body: Option<String>) {
        self.routes.insert(
            id,
            RouteRow {
                website_id,
                method,
                path,
                body,
            },
        );
        if let Some(website) = self.websites.get_mut(&website_id) {
            website.route_ids.push(id);
        }
    }
}

/// In-memory registry.
///
/// A single lock guards every table, so multi-row operations such as the
/// cascading delete are observed all-or-nothing.
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored routes across all websites
    pub async fn route_count(&self) -> usize {
        self.tables.read().await.routes.len()
    }

    /// Number of stored route statuses across all routes
    pub async fn route_status_count(&self) -> usize {
        self.tables.read().await.route_statuses.len()
    }

    /// Number of stored email logs
    pub async fn email_log_count(&self) -> usize {
        self.tables.read().await.email_logs.len()
    }
}

#[async_trait]
impl TargetRegistry for MemoryRegistry {
    async fn create_website(&self, website: NewWebsite, created_at: DateTime<Utc>) -> Result<Website> {
        self.tables.write().await.insert_website(website, created_at)
    }

    async fn create_website_within_quota(
        &self,
        website: NewWebsite,
        max_websites: usize,
        created_at: DateTime<Utc>,
    ) -> Result<Website> {
        let mut tables = self.tables.write().await;
        if tables.count_owned(&website.owner_id) >= max_websites {
            return Err(Error::validation(format!(
                "owner already has the maximum of {} websites",
                max_websites
            )));
        }
        tables.insert_website(website, created_at)
    }

    async fn find_website_by_id(&self, id: WebsiteId) -> Result<Option<Website>> {
        Ok(self.tables.read().await.load_website(id))
    }

    async fn delete_website(&self, id: WebsiteId) -> Result<bool> {
        let mut tables = self.tables.write().await;

        let route_ids = match tables.websites.get(&id) {
            Some(row) => row.route_ids.clone(),
            None => return Ok(false),
        };

        tables.site_statuses.remove(&id);
        for route_id in &route_ids {
            tables.route_statuses.remove(route_id);
        }
        for route_id in &route_ids {
            tables.routes.remove(route_id);
        }
        tables.websites.remove(&id);
        tables.email_logs.retain(|log| log.website_id != id);

        debug!(website_id = %id, routes = route_ids.len(), "Website deleted");
        Ok(true)
    }

    async fn list_websites(
        &self,
        filter: &WebsiteFilter,
        page: Page,
    ) -> Result<Paginated<Website>> {
        let tables = self.tables.read().await;
        let ids = tables.ordered_ids(filter);

        let items = ids
            .iter()
            .skip(page.offset())
            .take(page.items_per_page)
            .filter_map(|id| tables.load_website(*id))
            .collect();

        Ok(Paginated {
            total: ids.len(),
            items,
        })
    }

    async fn all_websites(&self) -> Result<Vec<Website>> {
        let tables = self.tables.read().await;
        Ok(tables
            .ordered_ids(&WebsiteFilter::default())
            .into_iter()
            .filter_map(|id| tables.load_website(id))
            .collect())
    }

    async fn update_website(
        &self,
        id: WebsiteId,
        patch: WebsitePatch,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Website>> {
        let mut tables = self.tables.write().await;

        if !tables.websites.contains_key(&id) {
            return Ok(None);
        }

        // Reject before touching anything so a bad patch changes nothing.
        for route in &patch.routes {
            if let Some(route_id) = route.id {
                if let Some(existing) = tables.routes.get(&route_id) {
                    if existing.website_id != id {
                        return Err(Error::validation(format!(
                            "route {} belongs to another website",
                            route_id
                        )));
                    }
                }
            }
        }

        if let Some(row) = tables.websites.get_mut(&id) {
            if let Some(name) = patch.name {
                row.name = name;
            }
            if let Some(url) = patch.url {
                row.url = url;
            }
            if let Some(token) = patch.token {
                row.token = Some(token);
            }
            row.updated_at = updated_at;
        }

        for RouteUpsert {
            id: route_id,
            method,
            path,
            body,
        } in patch.routes
        {
            let existing = match route_id {
                Some(rid) => tables.routes.get_mut(&rid),
                None => None,
            };
            match existing {
                Some(existing) => {
                    existing.method = method;
                    existing.path = path;
                    existing.body = body;
                }
                None => {
                    let route_id = route_id.unwrap_or_else(Uuid::new_v4);
                    tables.insert_route(route_id, id, method, path, body);
                }
            }
        }

        Ok(tables.load_website(id))
    }

    async fn upsert_site_status(
        &self,
        website_id: WebsiteId,
        status: SiteState,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.websites.contains_key(&website_id) {
            return Err(Error::not_found(format!("website {}", website_id)));
        }

        tables.site_statuses.insert(
            website_id,
            SiteStatus {
                status,
                last_checked_at: checked_at,
            },
        );
        Ok(())
    }

    async fn upsert_route_status(
        &self,
        route_id: RouteId,
        status: RouteState,
        response: Option<String>,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.routes.contains_key(&route_id) {
            return Err(Error::not_found(format!("route {}", route_id)));
        }

        tables.route_statuses.insert(
            route_id,
            RouteStatus {
                status,
                response,
                last_checked_at: checked_at,
            },
        );
        Ok(())
    }

    async fn find_route(&self, route_id: RouteId) -> Result<Option<Route>> {
        Ok(self.tables.read().await.load_route(route_id))
    }

    async fn delete_route(&self, route_id: RouteId) -> Result<bool> {
        let mut tables = self.tables.write().await;

        let website_id = match tables.routes.get(&route_id) {
            Some(row) => row.website_id,
            None => return Ok(false),
        };

        tables.route_statuses.remove(&route_id);
        tables.routes.remove(&route_id);
        if let Some(website) = tables.websites.get_mut(&website_id) {
            website.route_ids.retain(|id| *id != route_id);
        }
        Ok(true)
    }

    async fn list_routes(&self, page: Page) -> Result<Paginated<RouteListing>> {
        let guard = self.tables.read().await;
        let tables: &Tables = &guard;

        let listings: Vec<RouteListing> = tables
            .ordered_ids(&WebsiteFilter::default())
            .into_iter()
            .filter_map(|website_id| tables.websites.get(&website_id).map(|row| (website_id, row)))
            .flat_map(|(website_id, website)| {
                website.route_ids.iter().filter_map(move |route_id| {
                    tables.routes.get(route_id).map(|route| RouteListing {
                        id: *route_id,
                        path: route.path.clone(),
                        method: route.method,
                        website_id,
                        website_name: website.name.clone(),
                        owner_id: website.owner_id.clone(),
                    })
                })
            })
            .collect();

        let total = listings.len();
        let items = listings
            .into_iter()
            .skip(page.offset())
            .take(page.items_per_page)
            .collect();

        Ok(Paginated { total, items })
    }

    async fn count_websites_by_owner(&self, owner_id: &str) -> Result<usize> {
        Ok(self.tables.read().await.count_owned(owner_id))
    }

    async fn append_email_log(
        &self,
        address: &str,
        website_id: WebsiteId,
        website_name: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<()> {
        self.tables.write().await.email_logs.push(EmailLog {
            address: address.to_string(),
            website_id,
            website_name: website_name.to_string(),
            sent_at,
        });
        Ok(())
    }

    async fn find_last_email_log(
        &self,
        address: &str,
        website_name: &str,
    ) -> Result<Option<EmailLog>> {
        Ok(self
            .tables
            .read()
            .await
            .email_logs
            .iter()
            .filter(|log| log.address == address && log.website_name == website_name)
            .max_by_key(|log| log.sent_at)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewRoute;
    use chrono::TimeZone;

    fn new_website(owner: &str, name: &str, routes: usize) -> NewWebsite {
        NewWebsite {
            owner_id: owner.to_string(),
            name: name.to_string(),
            url: format!("https://{}.example.com", name),
            token: None,
            routes: (0..routes)
                .map(|i| NewRoute {
                    method: HttpMethod::Get,
                    path: format!("/r{}", i),
                    body: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let registry = MemoryRegistry::new();
        let created = registry.create_website(new_website("o1", "shop", 2), Utc::now()).await.unwrap();

        let found = registry.find_website_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.routes.len(), 2);
        assert_eq!(found.routes[0].path, "/r0");
        assert_eq!(found.routes[1].path, "/r1");
        assert!(found.status.is_none());
    }

    #[tokio::test]
    async fn test_status_upserts_are_keyed_by_target() {
        let registry = MemoryRegistry::new();
        let website = registry.create_website(new_website("o1", "shop", 1), Utc::now()).await.unwrap();
        let route_id = website.routes[0].id;
        let t0 = Utc::now();

        registry.upsert_site_status(website.id, SiteState::Offline, t0).await.unwrap();
        registry.upsert_site_status(website.id, SiteState::Online, t0).await.unwrap();
        registry
            .upsert_route_status(route_id, RouteState::Failure, Some("boom".into()), t0)
            .await
            .unwrap();

        let found = registry.find_website_by_id(website.id).await.unwrap().unwrap();
        assert_eq!(found.status.unwrap().status, SiteState::Online);
        let route_status = found.routes[0].status.clone().unwrap();
        assert_eq!(route_status.status, RouteState::Failure);
        assert_eq!(route_status.response.as_deref(), Some("boom"));
        assert_eq!(registry.route_status_count().await, 1);
    }

    #[tokio::test]
    async fn test_status_upsert_for_unknown_target_fails() {
        let registry = MemoryRegistry::new();
        let err = registry
            .upsert_site_status(Uuid::new_v4(), SiteState::Online, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_last_email_log_is_most_recent() {
        let registry = MemoryRegistry::new();
        let t0 = Utc::now();
        let (shop, blog) = (Uuid::new_v4(), Uuid::new_v4());

        registry.append_email_log("a@x.com", shop, "shop", t0).await.unwrap();
        registry
            .append_email_log("a@x.com", shop, "shop", t0 + chrono::Duration::hours(2))
            .await
            .unwrap();
        registry
            .append_email_log("a@x.com", blog, "blog", t0 + chrono::Duration::hours(5))
            .await
            .unwrap();

        let last = registry.find_last_email_log("a@x.com", "shop").await.unwrap().unwrap();
        assert_eq!(last.sent_at, t0 + chrono::Duration::hours(2));
        assert!(registry.find_last_email_log("b@x.com", "shop").await.unwrap().is_none());
        assert_eq!(registry.email_log_count().await, 3);
    }

    #[tokio::test]
    async fn test_quota_insert_stops_at_cap() {
        let registry = MemoryRegistry::new();
        let at = Utc::now();
        for i in 0..2 {
            registry
                .create_website_within_quota(new_website("o1", &format!("s{}", i), 0), 2, at)
                .await
                .unwrap();
        }

        let err = registry
            .create_website_within_quota(new_website("o1", "third", 0), 2, at)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(registry.count_websites_by_owner("o1").await.unwrap(), 2);

        // Other owners have their own count
        registry.create_website_within_quota(new_website("o2", "first", 0), 2, at).await.unwrap();
    }

    #[tokio::test]
    async fn test_created_and_updated_at_come_from_caller() {
        let registry = MemoryRegistry::new();
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let website = registry.create_website(new_website("o1", "shop", 0), created).await.unwrap();
        assert_eq!(website.created_at, created);
        assert_eq!(website.updated_at, created);

        let later = created + chrono::Duration::hours(3);
        let updated = registry
            .update_website(website.id, WebsitePatch::default(), later)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.created_at, created);
        assert_eq!(updated.updated_at, later);
    }
}
