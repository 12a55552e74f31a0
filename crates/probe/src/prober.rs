//! Probe implementations.

use crate::join::join_url;
use crate::types::{ProbeConfig, RouteProbe, RouteRequest, SiteState};
use async_trait::async_trait;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Prober trait
///
/// Implementations must not fail: every outcome is reported as a value.
#[async_trait]
pub trait Prober: Send + Sync {
    /// `GET` a website root, optionally with a bearer token.
    async fn probe_site(&self, url: &str, token: Option<&str>) -> SiteState;

    /// Send a route's request against `website_url` joined with its path.
    async fn probe_route(
        &self,
        route: RouteRequest<'_>,
        website_url: &str,
        token: Option<&str>,
    ) -> RouteProbe;
}

/// HTTP prober backed by a shared `reqwest` client
#[derive(Clone)]
pub struct HttpProber {
    config: ProbeConfig,
    client: reqwest::Client,
}

impl HttpProber {
    /// Create a new HTTP prober
    pub fn new(config: ProbeConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Compact JSON when the payload parses, raw text otherwise, truncated.
    fn render_payload(&self, text: &str) -> String {
        let rendered = serde_json::from_str::<serde_json::Value>(text)
            .ok()
            .and_then(|value| serde_json::to_string(&value).ok())
            .unwrap_or_else(|| text.to_string());
        truncate(rendered, self.config.max_response_len)
    }
}

fn truncate(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text,
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe_site(&self, url: &str, token: Option<&str>) -> SiteState {
        let start = Instant::now();

        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        match timeout(self.config.timeout, request.send()).await {
            Ok(Ok(response)) => {
                let status = response.status();
                if status.is_success() {
                    debug!(url = %url, status = status.as_u16(), duration_ms = start.elapsed().as_millis(),
                           "Site probe successful");
                    SiteState::Online
                } else {
                    warn!(url = %url, status = status.as_u16(), "Site probe failed: unexpected status code");
                    SiteState::Offline
                }
            }
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "Site probe failed");
                SiteState::Offline
            }
            Err(_) => {
                warn!(url = %url, "Site probe timed out");
                SiteState::Offline
            }
        }
    }

    async fn probe_route(
        &self,
        route: RouteRequest<'_>,
        website_url: &str,
        token: Option<&str>,
    ) -> RouteProbe {
        let url = join_url(website_url, route.path);

        let body = match route.body.map(str::trim).filter(|b| !b.is_empty()) {
            Some(raw) => match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(url = %url, error = %e, "Route body is not valid JSON");
                    return RouteProbe::failure(format!("Invalid request body: {}", e));
                }
            },
            None => None,
        };

        let mut request = self.client.request(route.method.into(), &url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        match timeout(self.config.timeout, exchange).await {
            Ok(Ok((status, text))) if status.is_success() => {
                debug!(url = %url, method = %route.method, status = status.as_u16(), "Route probe successful");
                RouteProbe::success(self.render_payload(&text))
            }
            Ok(Ok((status, text))) => {
                warn!(url = %url, method = %route.method, status = status.as_u16(), "Route probe failed: unexpected status code");
                let message = format!(
                    "Request failed with status code {}: {}",
                    status.as_u16(),
                    self.render_payload(&text)
                );
                RouteProbe::failure(truncate(message, self.config.max_response_len))
            }
            Ok(Err(e)) => {
                warn!(url = %url, method = %route.method, error = %e, "Route probe failed");
                RouteProbe::failure(format!("Request failed: {}", e))
            }
            Err(_) => {
                warn!(url = %url, method = %route.method, "Route probe timed out");
                RouteProbe::failure(format!(
                    "Request timed out after {}ms",
                    self.config.timeout.as_millis()
                ))
            }
        }
    }
}
