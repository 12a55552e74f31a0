//! Sweep scheduler: periodic, chunked checking of every website.

use crate::metrics::MetricsRegistry;
use crate::monitor::{CheckMode, Monitor};
use crate::registry::TargetRegistry;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Result of one sweep trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Another sweep was still running, nothing was done
    pub skipped: bool,
    /// Websites in the snapshot
    pub websites: usize,
    /// Websites checked and published
    pub checked: usize,
    /// Websites whose check failed
    pub failed: usize,
}

/// Drives sweeps on a fixed interval
pub struct Scheduler {
    monitor: Arc<Monitor>,
    registry: Arc<dyn TargetRegistry>,
    interval: Duration,
    chunk_size: usize,
    run_on_startup: bool,
    /// Held for the duration of a sweep
    sweep_lock: Mutex<()>,
    stop_signal: Notify,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(
        monitor: Arc<Monitor>,
        registry: Arc<dyn TargetRegistry>,
        interval: Duration,
        chunk_size: usize,
        run_on_startup: bool,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Self {
        Self {
            monitor,
            registry,
            interval,
            chunk_size: chunk_size.max(1),
            run_on_startup,
            sweep_lock: Mutex::new(()),
            stop_signal: Notify::new(),
            metrics,
        }
    }

    /// Run the timer loop until `stop` is called
    pub async fn run(self: Arc<Self>) {
        info!(interval = ?self.interval, chunk_size = self.chunk_size, "Scheduler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        if !self.run_on_startup {
            ticker.tick().await; // Skip first immediate tick
        }

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Detached; the overlap guard decides whether it runs.
                    let scheduler = self.clone();
                    tokio::spawn(async move {
                        scheduler.sweep().await;
                    });
                }
                _ = self.stop_signal.notified() => {
                    info!("Scheduler stopping");
                    break;
                }
            }
        }
    }

    /// Stop the timer loop. A sweep already running finishes.
    pub fn stop(&self) {
        self.stop_signal.notify_one();
    }

    /// Check every website once.
    ///
    /// Websites are taken from a snapshot loaded at sweep start and checked
    /// in chunks: all websites of a chunk run concurrently, chunks run one
    /// after another. A failing website is logged and never affects others.
    pub async fn sweep(&self) -> SweepReport {
        let Ok(_guard) = self.sweep_lock.try_lock() else {
            warn!("Previous sweep still running, skipping");
            if let Some(ref m) = self.metrics {
                m.record_sweep("skipped", None);
            }
            return SweepReport {
                skipped: true,
                ..SweepReport::default()
            };
        };

        let start = Instant::now();
        let websites = match self.registry.all_websites().await {
            Ok(websites) => websites,
            Err(e) => {
                error!(error = %e, "Failed to load websites for sweep");
                if let Some(ref m) = self.metrics {
                    m.record_sweep("failed", Some(start.elapsed()));
                }
                return SweepReport::default();
            }
        };

        info!(websites = websites.len(), "Sweep started");
        if let Some(ref m) = self.metrics {
            m.set_websites_monitored(websites.len());
        }

        let mut report = SweepReport {
            websites: websites.len(),
            ..SweepReport::default()
        };

        for chunk in websites.chunks(self.chunk_size) {
            let handles = chunk.iter().map(|website| {
                let monitor = self.monitor.clone();
                let id = website.id;
                (id, tokio::spawn(async move {
                    monitor.check_website(id, CheckMode::Alerting).await
                }))
            });
            let (ids, handles): (Vec<_>, Vec<_>) = handles.unzip();

            for (id, joined) in ids.into_iter().zip(join_all(handles).await) {
                match joined {
                    Ok(Ok(_)) => report.checked += 1,
                    Ok(Err(common::Error::NotFound(_))) => {
                        // Deleted after the snapshot was taken.
                        debug!(website_id = %id, "Website disappeared during sweep");
                    }
                    Ok(Err(e)) => {
                        warn!(website_id = %id, error = %e, "Website check failed");
                        report.failed += 1;
                    }
                    Err(e) => {
                        error!(website_id = %id, error = %e, "Website check panicked");
                        report.failed += 1;
                    }
                }
            }
        }

        let elapsed = start.elapsed();
        if let Some(ref m) = self.metrics {
            m.record_sweep_errors(report.failed);
            m.record_sweep("completed", Some(elapsed));
        }
        info!(
            websites = report.websites,
            checked = report.checked,
            failed = report.failed,
            duration_ms = elapsed.as_millis(),
            "Sweep finished"
        );
        report
    }
}
