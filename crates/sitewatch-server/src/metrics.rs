//! Prometheus metrics for the monitoring engine.

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use probe::{RouteState, SiteState};
use std::time::Duration;

/// Labels for probe result metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProbeLabels {
    /// Target kind (site, route)
    pub target: String,
    /// Result (online, offline, success, failure)
    pub result: String,
}

/// Labels for sweep metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct SweepLabels {
    /// Outcome (completed, skipped)
    pub outcome: String,
}

/// Labels for notification metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct NotificationLabels {
    /// Outcome (sent, cooling_down, opted_out, no_contact, failed)
    pub outcome: String,
}

/// Labels for status event metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EventLabels {
    /// Whether at least one client received the event
    pub delivered: String,
}

/// Metrics registry with all monitoring metrics
pub struct MetricsRegistry {
    /// Prometheus registry
    pub registry: Registry,

    /// Probes performed
    probes_total: Family<ProbeLabels, Counter>,
    /// Sweeps triggered
    sweeps_total: Family<SweepLabels, Counter>,
    /// Sweep wall time
    sweep_duration_seconds: Histogram,
    /// Websites whose check failed inside a sweep
    sweep_errors_total: Counter,
    /// Notifier decisions
    notifications_total: Family<NotificationLabels, Counter>,
    /// Status events published
    status_events_total: Family<EventLabels, Counter>,
    /// Websites in the last sweep snapshot
    websites_monitored: Gauge,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let probes_total = Family::<ProbeLabels, Counter>::default();
        registry.register(
            "sitewatch_probes",
            "Total probes performed",
            probes_total.clone(),
        );

        let sweeps_total = Family::<SweepLabels, Counter>::default();
        registry.register(
            "sitewatch_sweeps",
            "Total sweeps triggered",
            sweeps_total.clone(),
        );

        // Exponential buckets from 100ms to ~27min
        let sweep_duration_seconds = Histogram::new(exponential_buckets(0.1, 2.0, 15));
        registry.register(
            "sitewatch_sweep_duration_seconds",
            "Sweep duration in seconds",
            sweep_duration_seconds.clone(),
        );

        let sweep_errors_total = Counter::default();
        registry.register(
            "sitewatch_sweep_errors",
            "Websites whose check failed during a sweep",
            sweep_errors_total.clone(),
        );

        let notifications_total = Family::<NotificationLabels, Counter>::default();
        registry.register(
            "sitewatch_notifications",
            "Alert decisions by outcome",
            notifications_total.clone(),
        );

        let status_events_total = Family::<EventLabels, Counter>::default();
        registry.register(
            "sitewatch_status_events",
            "Status events published to owner channels",
            status_events_total.clone(),
        );

        let websites_monitored = Gauge::default();
        registry.register(
            "sitewatch_websites_monitored",
            "Websites in the most recent sweep",
            websites_monitored.clone(),
        );

        Self {
            registry,
            probes_total,
            sweeps_total,
            sweep_duration_seconds,
            sweep_errors_total,
            notifications_total,
            status_events_total,
            websites_monitored,
        }
    }

    pub fn record_site_probe(&self, state: SiteState) {
        self.probes_total
            .get_or_create(&ProbeLabels {
                target: "site".to_string(),
                result: state.to_string(),
            })
            .inc();
    }

    pub fn record_route_probe(&self, state: RouteState) {
        self.probes_total
            .get_or_create(&ProbeLabels {
                target: "route".to_string(),
                result: state.to_string(),
            })
            .inc();
    }

    pub fn record_sweep(&self, outcome: &str, duration: Option<Duration>) {
        self.sweeps_total
            .get_or_create(&SweepLabels {
                outcome: outcome.to_string(),
            })
            .inc();
        if let Some(duration) = duration {
            self.sweep_duration_seconds.observe(duration.as_secs_f64());
        }
    }

    pub fn record_sweep_errors(&self, count: usize) {
        self.sweep_errors_total.inc_by(count as u64);
    }

    pub fn record_notification(&self, outcome: &str) {
        self.notifications_total
            .get_or_create(&NotificationLabels {
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn record_status_event(&self, delivered: bool) {
        self.status_events_total
            .get_or_create(&EventLabels {
                delivered: delivered.to_string(),
            })
            .inc();
    }

    pub fn set_websites_monitored(&self, count: usize) {
        self.websites_monitored.set(count as i64);
    }

    /// Encode in Prometheus text format
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
