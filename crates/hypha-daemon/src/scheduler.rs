// crates/hypha-daemon/src/scheduler.rs
//
// Trigger scheduler for the Hypha daemon.
//
// Epoch distribution and report expiry are permissionless operations that
// nothing runs on its own. The scheduler wakes on a fixed interval and
// invokes whichever of them is due, through the same EngineHandle the RPC
// server uses.

use std::time::Duration;

use hypha_core::{ReportId, Timestamp};
use hypha_economics::EpochSummary;
use hypha_rpc::{Clock, EngineHandle};

/// What a single scheduler tick did.
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// The epoch distributed during this tick, if any.
    pub distributed: Option<EpochSummary>,
    /// Reports closed as expired during this tick.
    pub expired: Vec<ReportId>,
}

/// Periodically triggers epoch distribution and report expiry.
pub struct TriggerScheduler {
    handle: EngineHandle,
    interval: Duration,
    clock: Clock,
}

impl TriggerScheduler {
    pub fn new(handle: EngineHandle, interval_secs: u64, clock: Clock) -> Self {
        Self {
            handle,
            interval: Duration::from_secs(interval_secs.max(1)),
            clock,
        }
    }

    /// Run the scheduler loop until ctrl-c.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            "Trigger scheduler started (interval={}s)",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Trigger scheduler received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    let now = (self.clock)();
                    self.tick(now).await;
                }
            }
        }

        Ok(())
    }

    /// Run every due trigger at `now`.
    pub async fn tick(&self, now: Timestamp) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        if self.handle.read(|engine| engine.epoch_due(now)).await {
            match self
                .handle
                .mutate(|engine| engine.distribute_rewards(now))
                .await
            {
                Ok(summary) => {
                    tracing::info!(
                        "=== EPOCH {} DISTRIBUTED === ({} to {} nodes)",
                        summary.epoch,
                        summary.total_distributed,
                        summary.node_count
                    );
                    outcome.distributed = Some(summary);
                }
                Err(e) => {
                    // Retried next tick; typically no eligible nodes yet.
                    tracing::warn!("Epoch distribution skipped: {}", e);
                }
            }
        }

        let expired = self.handle.read(|engine| engine.expired_reports(now)).await;
        for report in expired {
            match self
                .handle
                .mutate(|engine| engine.check_expired_report(report, now))
                .await
            {
                Ok(resolution) => {
                    tracing::info!(
                        "Report {} expired (reporter penalty {})",
                        report,
                        resolution.reporter_penalty
                    );
                    outcome.expired.push(report);
                }
                Err(e) => {
                    tracing::debug!("Report {} not expired: {}", report, e);
                }
            }
        }

        outcome
    }
}
