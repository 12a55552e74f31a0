//! Per-website check pipeline: evaluate, persist, alert, publish.

use crate::broadcaster::StatusBroadcaster;
use crate::clock::Clock;
use crate::metrics::MetricsRegistry;
use crate::notifier::{Alert, Notifier};
use crate::registry::TargetRegistry;
use crate::types::{RouteId, RouteSummary, StatusEvent, Website, WebsiteId};
use chrono::{DateTime, Utc};
use common::{Error, Result};
use futures::future::join_all;
use probe::{Prober, RouteState, SiteState};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of probing one route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    pub route_id: RouteId,
    pub path: String,
    pub state: RouteState,
    pub response: Option<String>,
}

/// Probe results for one website, before any side effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub site: SiteState,
    pub routes: Vec<RouteOutcome>,
}

impl Evaluation {
    /// Site-down wins over a failing route; only the first failing route counts.
    pub fn alert(&self) -> Option<Alert> {
        if self.site == SiteState::Offline {
            return Some(Alert::SiteOffline);
        }
        self.routes
            .iter()
            .find(|route| route.state == RouteState::Failure)
            .map(|route| Alert::RouteFailing {
                path: route.path.clone(),
            })
    }

    pub fn to_event(&self, website: &Website) -> StatusEvent {
        StatusEvent {
            website_id: website.id,
            name: website.name.clone(),
            status: self.site,
            routes: self
                .routes
                .iter()
                .map(|route| RouteSummary {
                    route_id: route.route_id,
                    path: route.path.clone(),
                    status: route.state,
                    response: route.response.clone(),
                })
                .collect(),
        }
    }
}

/// Probe a website root and all of its routes
pub async fn evaluate(prober: &dyn Prober, website: &Website) -> Evaluation {
    let site = prober.probe_site(&website.url, website.token.as_deref()).await;
    let routes = probe_routes(prober, website).await;
    Evaluation { site, routes }
}

/// Probe every route concurrently. Outcomes keep the website's route order.
pub async fn probe_routes(prober: &dyn Prober, website: &Website) -> Vec<RouteOutcome> {
    let token = website.token.as_deref();
    join_all(website.routes.iter().map(|route| async move {
        let result = prober.probe_route(route.request(), &website.url, token).await;
        RouteOutcome {
            route_id: route.id,
            path: route.path.clone(),
            state: result.state,
            response: result.response,
        }
    }))
    .await
}

/// Whether a check may send alert email
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Sweeps and on-demand checks
    Alerting,
    /// Checks right after a create or update
    Silent,
}

/// Runs the full check for one website
pub struct Monitor {
    registry: Arc<dyn TargetRegistry>,
    prober: Arc<dyn Prober>,
    notifier: Notifier,
    broadcaster: Arc<StatusBroadcaster>,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Monitor {
    pub fn new(
        registry: Arc<dyn TargetRegistry>,
        prober: Arc<dyn Prober>,
        notifier: Notifier,
        broadcaster: Arc<StatusBroadcaster>,
        clock: Arc<dyn Clock>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            registry,
            prober,
            notifier,
            broadcaster,
            clock,
            metrics,
        }
    }

    pub fn prober(&self) -> &Arc<dyn Prober> {
        &self.prober
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Re-fetch the website and check it
    pub async fn check_website(&self, id: WebsiteId, mode: CheckMode) -> Result<StatusEvent> {
        let website = self
            .registry
            .find_website_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("website {}", id)))?;

        self.check(&website, mode).await
    }

    /// Probe, persist site then route statuses, alert, and publish.
    ///
    /// The site status is stored before any route is probed, and the event
    /// is published only after every status is stored.
    pub async fn check(&self, website: &Website, mode: CheckMode) -> Result<StatusEvent> {
        let site = self
            .prober
            .probe_site(&website.url, website.token.as_deref())
            .await;
        self.registry
            .upsert_site_status(website.id, site, self.clock.now())
            .await?;
        if let Some(ref m) = self.metrics {
            m.record_site_probe(site);
        }

        let probed = probe_routes(self.prober.as_ref(), website).await;
        let routes = self.persist_routes(website, probed, self.clock.now()).await?;
        let evaluation = Evaluation { site, routes };

        if mode == CheckMode::Alerting {
            if let Some(alert) = evaluation.alert() {
                self.notifier
                    .notify(&website.owner_id, website.id, &website.name, &alert)
                    .await;
            }
        }

        let event = evaluation.to_event(website);
        self.broadcaster.publish(&website.owner_id, event.clone());

        info!(
            website_id = %website.id,
            status = %evaluation.site,
            failed_routes = evaluation.routes.iter().filter(|r| r.state == RouteState::Failure).count(),
            "Website checked"
        );
        Ok(event)
    }

    /// Store route statuses. Routes deleted while they were being probed
    /// are dropped from the result.
    async fn persist_routes(
        &self,
        website: &Website,
        routes: Vec<RouteOutcome>,
        checked_at: DateTime<Utc>,
    ) -> Result<Vec<RouteOutcome>> {
        let mut persisted = Vec::with_capacity(routes.len());
        for route in routes {
            let stored = self
                .registry
                .upsert_route_status(route.route_id, route.state, route.response.clone(), checked_at)
                .await;
            match stored {
                Ok(()) => {}
                Err(Error::NotFound(_)) => {
                    debug!(website_id = %website.id, route_id = %route.route_id, "Route removed during check");
                    continue;
                }
                Err(e) => return Err(e),
            }
            if let Some(ref m) = self.metrics {
                m.record_route_probe(route.state);
            }
            persisted.push(route);
        }

        debug!(website_id = %website.id, routes = persisted.len(), "Route statuses persisted");
        Ok(persisted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use probe::{HttpMethod, RouteProbe, RouteRequest};
    use crate::types::Route;
    use uuid::Uuid;

    /// Fails every route whose path contains "bad"
    struct PathProber {
        site: SiteState,
    }

    #[async_trait]
    impl Prober for PathProber {
        async fn probe_site(&self, _url: &str, _token: Option<&str>) -> SiteState {
            self.site
        }

        async fn probe_route(
            &self,
            route: RouteRequest<'_>,
            _website_url: &str,
            _token: Option<&str>,
        ) -> RouteProbe {
            if route.path.contains("bad") {
                RouteProbe::failure("boom")
            } else {
                RouteProbe::success("{}")
            }
        }
    }

    fn website(paths: &[&str]) -> Website {
        let id = Uuid::new_v4();
        let now = Utc::now();
        Website {
            id,
            owner_id: "owner".to_string(),
            name: "shop".to_string(),
            url: "https://shop.example.com".to_string(),
            token: None,
            routes: paths
                .iter()
                .map(|path| Route {
                    id: Uuid::new_v4(),
                    website_id: id,
                    method: HttpMethod::Get,
                    path: path.to_string(),
                    body: None,
                    status: None,
                })
                .collect(),
            status: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_evaluate_keeps_route_order() {
        let site = website(&["/a", "/bad-1", "/c", "/bad-2"]);
        let evaluation = evaluate(&PathProber { site: SiteState::Online }, &site).await;

        let paths: Vec<&str> = evaluation.routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/a", "/bad-1", "/c", "/bad-2"]);
        assert_eq!(
            evaluation.alert(),
            Some(Alert::RouteFailing {
                path: "/bad-1".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_offline_site_alert_wins() {
        let site = website(&["/bad"]);
        let evaluation = evaluate(&PathProber { site: SiteState::Offline }, &site).await;
        assert_eq!(evaluation.alert(), Some(Alert::SiteOffline));
    }

    #[tokio::test]
    async fn test_healthy_website_has_no_alert() {
        let site = website(&["/a", "/b"]);
        let evaluation = evaluate(&PathProber { site: SiteState::Online }, &site).await;
        assert_eq!(evaluation.alert(), None);

        let event = evaluation.to_event(&site);
        assert_eq!(event.website_id, site.id);
        assert_eq!(event.status, SiteState::Online);
        assert_eq!(event.routes.len(), 2);
        assert!(event.routes.iter().all(|r| r.status == RouteState::Success));
    }
}
