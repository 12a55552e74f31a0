//! Main sitewatch server implementation.

use crate::api::MonitoringService;
use crate::broadcaster::StatusBroadcaster;
use crate::clock::SystemClock;
use crate::contacts::MemoryContacts;
use crate::http_server::{self, AppState};
use crate::mail::{LogMailer, Mailer, WebhookMailer};
use crate::metrics::MetricsRegistry;
use crate::monitor::Monitor;
use crate::notifier::Notifier;
use crate::registry::MemoryRegistry;
use crate::scheduler::Scheduler;
use crate::types::{MailerKind, ServerConfig};
use axum::Router;
use common::{Error, Result};
use probe::{HttpProber, ProbeConfig};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Sitewatch server: registry, scheduler and HTTP surface wired together
pub struct SitewatchServer {
    config: ServerConfig,
    scheduler: Arc<Scheduler>,
    state: AppState,
}

impl SitewatchServer {
    /// Build every component from configuration
    pub fn new(config: ServerConfig) -> Result<Self> {
        let metrics = if config.metrics_enabled {
            info!("Metrics enabled on {}/metrics", config.listen_addr);
            Some(Arc::new(MetricsRegistry::new()))
        } else {
            info!("Metrics disabled");
            None
        };

        let registry = Arc::new(MemoryRegistry::new());
        let contacts = Arc::new(MemoryContacts::with_contacts(config.contacts.clone()));
        let clock = Arc::new(SystemClock);
        let prober = Arc::new(
            HttpProber::new(ProbeConfig {
                timeout: config.probe_timeout,
                max_response_len: config.max_response_len,
            })
            .map_err(Error::config)?,
        );
        let mailer = Self::build_mailer(&config)?;

        let notifier = Notifier::new(
            registry.clone(),
            contacts.clone(),
            mailer,
            clock.clone(),
            config.notification_cooldown,
            metrics.clone(),
        );
        let broadcaster = Arc::new(StatusBroadcaster::new(
            config.broadcast_capacity,
            metrics.clone(),
        ));
        let monitor = Arc::new(Monitor::new(
            registry.clone(),
            prober,
            notifier,
            broadcaster.clone(),
            clock,
            metrics.clone(),
        ));
        let scheduler = Arc::new(Scheduler::new(
            monitor.clone(),
            registry.clone(),
            config.sweep_interval,
            config.chunk_size,
            config.run_on_startup,
            metrics.clone(),
        ));
        let service = Arc::new(MonitoringService::new(
            registry,
            monitor,
            contacts,
            config.quotas,
        ));

        Ok(Self {
            config,
            scheduler,
            state: AppState {
                service,
                broadcaster,
                metrics,
            },
        })
    }

    fn build_mailer(config: &ServerConfig) -> Result<Arc<dyn Mailer>> {
        match config.mailer {
            MailerKind::Log => {
                info!("Alert emails are logged only");
                Ok(Arc::new(LogMailer))
            }
            MailerKind::Webhook { ref url } => {
                info!(url = %url, "Alert emails are relayed by webhook");
                Ok(Arc::new(WebhookMailer::new(
                    url.clone(),
                    config.mail_from.clone(),
                    config.probe_timeout,
                )?))
            }
        }
    }

    /// HTTP router over this server's state
    pub fn router(&self) -> Router {
        http_server::router(self.state.clone())
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr).await?;
        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve(self, listener: TcpListener, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        info!(listen_addr = %listener.local_addr()?, "Sitewatch server listening");

        let scheduler_handle = tokio::spawn(self.scheduler.clone().run());

        let app = self.router();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        self.scheduler.stop();
        if let Err(e) = scheduler_handle.await {
            warn!(error = %e, "Scheduler task ended abnormally");
        }

        served?;
        info!("Sitewatch server stopped");
        Ok(())
    }
}
