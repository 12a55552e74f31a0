//! Shared fixtures for the sitewatch-server integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use common::Result;
use probe::{HttpMethod, Prober, RouteProbe, RouteRequest, SiteState};
use sitewatch_server::api::{CreateWebsiteRequest, RouteInput};
use sitewatch_server::clock::ManualClock;
use sitewatch_server::contacts::MemoryContacts;
use sitewatch_server::mail::{MailMessage, Mailer};
use sitewatch_server::types::{Contact, Quotas};
use sitewatch_server::{
    MemoryRegistry, MetricsRegistry, Monitor, MonitoringService, Notifier, StatusBroadcaster,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const OWNER: &str = "owner-1";
pub const OWNER_EMAIL: &str = "owner@example.com";

/// Prober with scripted answers.
///
/// URLs containing `down` are offline, route paths containing `bad` fail,
/// URLs containing the `panic_on` marker panic.
#[derive(Default)]
pub struct StubProber {
    delay: Duration,
    panic_on: Option<String>,
    site_probes: AtomicUsize,
    route_probes: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubProber {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn panicking_on(marker: &str) -> Self {
        Self {
            panic_on: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub fn site_probes(&self) -> usize {
        self.site_probes.load(Ordering::SeqCst)
    }

    pub fn route_probes(&self) -> usize {
        self.route_probes.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for StubProber {
    async fn probe_site(&self, url: &str, _token: Option<&str>) -> SiteState {
        self.site_probes.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(ref marker) = self.panic_on {
            if url.contains(marker.as_str()) {
                panic!("probe exploded for {}", url);
            }
        }

        if url.contains("down") {
            SiteState::Offline
        } else {
            SiteState::Online
        }
    }

    async fn probe_route(
        &self,
        route: RouteRequest<'_>,
        _website_url: &str,
        _token: Option<&str>,
    ) -> RouteProbe {
        self.route_probes.fetch_add(1, Ordering::SeqCst);
        if route.path.contains("bad") {
            RouteProbe::failure("Request failed with status code 500: boom")
        } else {
            RouteProbe::success("{\"ok\":true}")
        }
    }
}

/// Mailer that keeps every message
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Fully wired engine over in-memory collaborators
pub struct Harness {
    pub registry: Arc<MemoryRegistry>,
    pub contacts: Arc<MemoryContacts>,
    pub clock: Arc<ManualClock>,
    pub mailer: Arc<RecordingMailer>,
    pub broadcaster: Arc<StatusBroadcaster>,
    pub metrics: Arc<MetricsRegistry>,
    pub monitor: Arc<Monitor>,
    pub service: Arc<MonitoringService>,
}

impl Harness {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self::with_quotas(prober, Quotas::default())
    }

    pub fn with_quotas(prober: Arc<dyn Prober>, quotas: Quotas) -> Self {
        let registry = Arc::new(MemoryRegistry::new());
        let contacts = Arc::new(MemoryContacts::with_contacts([Contact {
            owner_id: OWNER.to_string(),
            email: OWNER_EMAIL.to_string(),
            receive_notifications: true,
        }]));
        let clock = Arc::new(ManualClock::default());
        let mailer = Arc::new(RecordingMailer::default());
        let metrics = Arc::new(MetricsRegistry::new());
        let broadcaster = Arc::new(StatusBroadcaster::new(16, Some(metrics.clone())));

        let notifier = Notifier::new(
            registry.clone(),
            contacts.clone(),
            mailer.clone(),
            clock.clone(),
            Duration::from_secs(24 * 60 * 60),
            Some(metrics.clone()),
        );
        let monitor = Arc::new(Monitor::new(
            registry.clone(),
            prober,
            notifier,
            broadcaster.clone(),
            clock.clone(),
            Some(metrics.clone()),
        ));
        let service = Arc::new(MonitoringService::new(
            registry.clone(),
            monitor.clone(),
            contacts.clone(),
            quotas,
        ));

        Self {
            registry,
            contacts,
            clock,
            mailer,
            broadcaster,
            metrics,
            monitor,
            service,
        }
    }
}

/// Create request with `routes` GET routes named `/r0`, `/r1`, ...
pub fn create_request(owner: &str, name: &str, url: &str, routes: usize) -> CreateWebsiteRequest {
    CreateWebsiteRequest {
        site_name: name.to_string(),
        site_url: url.to_string(),
        token: None,
        user_id: owner.to_string(),
        routes: (0..routes)
            .map(|i| RouteInput {
                method: HttpMethod::Get,
                route: format!("/r{}", i),
                body: None,
            })
            .collect(),
    }
}

/// Loopback HTTP server answering every request with `status`.
/// Returns the base URL.
pub async fn spawn_http_stub(status: u16) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => read += n,
                    }
                    if read == buf.len() {
                        break;
                    }
                }
                let body = "{\"ok\":true}";
                let response = format!(
                    "HTTP/1.1 {} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

/// Prober against real loopback endpoints with a short timeout
pub fn http_prober() -> Arc<dyn Prober> {
    Arc::new(
        probe::HttpProber::new(probe::ProbeConfig {
            timeout: Duration::from_millis(500),
            max_response_len: 256,
        })
        .unwrap(),
    )
}
