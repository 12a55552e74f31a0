//! Notifier for deduplicated alert emails.

use crate::clock::Clock;
use crate::contacts::ContactDirectory;
use crate::mail::{MailMessage, MailTemplate, Mailer};
use crate::metrics::MetricsRegistry;
use crate::registry::TargetRegistry;
use crate::types::WebsiteId;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Condition that warrants an alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    SiteOffline,
    RouteFailing { path: String },
}

impl Alert {
    fn message(&self, to: &str, website_name: &str) -> MailMessage {
        match self {
            Alert::SiteOffline => {
                MailMessage::new(to, MailTemplate::WebsiteOffline).with("website_name", website_name)
            }
            Alert::RouteFailing { path } => MailMessage::new(to, MailTemplate::RouteFailure)
                .with("website_name", website_name)
                .with("route_path", path.as_str()),
        }
    }
}

/// What the notifier did with an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    /// An alert for the same (address, website) went out within the cooldown
    CoolingDown,
    OptedOut,
    NoContact,
    /// Lookup or delivery failed; logged and dropped
    Failed,
}

impl fmt::Display for NotifyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyOutcome::Sent => write!(f, "sent"),
            NotifyOutcome::CoolingDown => write!(f, "cooling_down"),
            NotifyOutcome::OptedOut => write!(f, "opted_out"),
            NotifyOutcome::NoContact => write!(f, "no_contact"),
            NotifyOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Notifier decides whether an alert is sent and hands it to the mailer.
///
/// The cooldown is keyed by (address, website name) only, so site-down and
/// route-down alerts for one website share a single slot. Lookup, send and
/// log for one slot run under that slot's lock, so concurrent checks of the
/// same website send at most one alert.
pub struct Notifier {
    registry: Arc<dyn TargetRegistry>,
    contacts: Arc<dyn ContactDirectory>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    cooldown: chrono::Duration,
    metrics: Option<Arc<MetricsRegistry>>,
    slots: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl Notifier {
    /// Create a new notifier
    pub fn new(
        registry: Arc<dyn TargetRegistry>,
        contacts: Arc<dyn ContactDirectory>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        cooldown: Duration,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            registry,
            contacts,
            mailer,
            clock,
            cooldown: chrono::Duration::from_std(cooldown)
                .unwrap_or_else(|_| chrono::Duration::weeks(52 * 100)),
            metrics,
            slots: DashMap::new(),
        }
    }

    fn slot(&self, address: &str, website_name: &str) -> Arc<Mutex<()>> {
        self.slots
            .entry((address.to_string(), website_name.to_string()))
            .or_default()
            .clone()
    }

    /// Send an alert unless the owner opted out or the cooldown is active.
    /// Never fails.
    pub async fn notify(
        &self,
        owner_id: &str,
        website_id: WebsiteId,
        website_name: &str,
        alert: &Alert,
    ) -> NotifyOutcome {
        let outcome = self.try_notify(owner_id, website_id, website_name, alert).await;

        if let Some(ref m) = self.metrics {
            m.record_notification(&outcome.to_string());
        }
        outcome
    }

    async fn try_notify(
        &self,
        owner_id: &str,
        website_id: WebsiteId,
        website_name: &str,
        alert: &Alert,
    ) -> NotifyOutcome {
        let contact = match self.contacts.find_contact(owner_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                warn!(owner_id = %owner_id, website = %website_name, "No contact for owner, alert dropped");
                return NotifyOutcome::NoContact;
            }
            Err(e) => {
                warn!(owner_id = %owner_id, error = %e, "Contact lookup failed");
                return NotifyOutcome::Failed;
            }
        };

        if !contact.receive_notifications {
            debug!(owner_id = %owner_id, website = %website_name, "Owner opted out of alerts");
            return NotifyOutcome::OptedOut;
        }

        let slot = self.slot(&contact.email, website_name);
        let _held = slot.lock().await;

        let now = self.clock.now();
        match self.registry.find_last_email_log(&contact.email, website_name).await {
            Ok(Some(last)) if now - last.sent_at < self.cooldown => {
                debug!(
                    to = %contact.email,
                    website = %website_name,
                    last_sent = %last.sent_at,
                    "Alert suppressed by cooldown"
                );
                return NotifyOutcome::CoolingDown;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(website = %website_name, error = %e, "Email log lookup failed");
                return NotifyOutcome::Failed;
            }
        }

        let message = alert.message(&contact.email, website_name);
        if let Err(e) = self.mailer.send(message).await {
            warn!(to = %contact.email, website = %website_name, error = %e, "Failed to send alert");
            return NotifyOutcome::Failed;
        }

        let logged = self
            .registry
            .append_email_log(&contact.email, website_id, website_name, now)
            .await;
        if let Err(e) = logged {
            warn!(to = %contact.email, website = %website_name, error = %e, "Failed to record sent alert");
        }

        info!(to = %contact.email, website = %website_name, alert = ?alert, "Alert sent");
        NotifyOutcome::Sent
    }
}
