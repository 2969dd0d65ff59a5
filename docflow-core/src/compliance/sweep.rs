//! Periodic compliance sweep.
//!
//! Runs [`ComplianceMonitor::monitor`] on a fixed interval and, when
//! `auto_enforce` is set, [`ComplianceMonitor::fix_all`] whenever the sweep
//! finds drift. The task stops when its [`SweepHandle`] is stopped or dropped.

use super::{ComplianceMonitor, ComplianceSummary};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct ComplianceSweep {
    monitor: Arc<ComplianceMonitor>,
    period: Duration,
    auto_enforce: bool,
}

/// Owner of a running sweep.
pub struct SweepHandle {
    shutdown: watch::Sender<bool>,
    latest: watch::Receiver<Option<ComplianceSummary>>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Summary from the most recent completed sweep.
    pub fn latest(&self) -> Option<ComplianceSummary> {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ComplianceSummary>> {
        self.latest.clone()
    }

    /// Signal the loop to exit and wait for it.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = ?e, "compliance sweep task ended abnormally");
        }
    }
}

impl ComplianceSweep {
    pub fn new(monitor: Arc<ComplianceMonitor>, period: Duration, auto_enforce: bool) -> Self {
        Self {
            monitor,
            period,
            auto_enforce,
        }
    }

    /// Spawn the sweep loop. The first sweep runs one full period after spawn.
    pub fn spawn(self) -> SweepHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (latest_tx, latest) = watch::channel(None);
        let task = tokio::spawn(self.run(shutdown_rx, latest_tx));
        SweepHandle {
            shutdown,
            latest,
            task,
        }
    }

    async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        latest_tx: watch::Sender<Option<ComplianceSummary>>,
    ) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick
        ticker.tick().await;

        info!(
            interval_ms = millis(self.period),
            auto_enforce = self.auto_enforce,
            "compliance sweep started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(summary) = self.sweep_once().await {
                        latest_tx.send_replace(Some(summary));
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }

        info!("compliance sweep stopped");
    }

    async fn sweep_once(&self) -> Option<ComplianceSummary> {
        let summary = match self.monitor.monitor().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "compliance sweep failed (non-fatal)");
                return None;
            }
        };
        debug!(
            total = summary.total_processes,
            non_compliant = summary.non_compliant_processes,
            "compliance sweep tick"
        );

        if self.auto_enforce && summary.non_compliant_processes > 0 {
            match self.monitor.fix_all().await {
                Ok(report) => info!(
                    fixed = report.fixed,
                    failed = report.failed,
                    "compliance sweep remediated drift"
                ),
                Err(e) => warn!(error = %e, "compliance remediation sweep failed (non-fatal)"),
            }
        }
        Some(summary)
    }
}

/// Saturates instead of truncating.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
