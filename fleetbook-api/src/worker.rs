use std::sync::Arc;

use chrono::Utc;
use fleetbook_core::{CallContext, CoreError, CoreResult, CredentialProvider};
use fleetbook_order::{DashboardSnapshot, RefreshOrchestrator, SnapshotStore};
use fleetbook_shared::models::events::DashboardEvent;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Executes one refresh cycle and publishes its outcome.
#[derive(Clone)]
pub struct CycleRunner {
    pub orchestrator: Arc<RefreshOrchestrator>,
    pub snapshots: Arc<SnapshotStore>,
    pub events_tx: broadcast::Sender<DashboardEvent>,
    pub credentials: Arc<dyn CredentialProvider>,
}

impl CycleRunner {
    pub async fn execute(&self, generation: u64, cancel: CancellationToken) {
        let ctx = match CallContext::from_provider(self.credentials.as_ref(), cancel.clone()) {
            Ok(ctx) => ctx,
            Err(err) => return self.fail(err).await,
        };

        let outcome = self.orchestrator.run_cycle(&ctx).await;
        self.settle(generation, &cancel, outcome).await;
    }

    /// Publish or report a finished cycle, unless it was superseded meanwhile.
    async fn settle(&self, generation: u64, cancel: &CancellationToken, outcome: CoreResult<DashboardSnapshot>) {
        if cancel.is_cancelled() {
            debug!(generation, "Refresh cycle superseded before publish");
            return;
        }

        match outcome {
            Ok(snapshot) => {
                let event = DashboardEvent::SnapshotPublished {
                    generation,
                    refreshed_at: snapshot.refreshed_at,
                    partial: snapshot.partial,
                    total_bookings: snapshot.bookings.len(),
                };
                if self.snapshots.publish(generation, snapshot).await {
                    // No subscribers is fine.
                    let _ = self.events_tx.send(event);
                }
            }
            Err(CoreError::Cancelled) => debug!(generation, "Refresh cycle superseded"),
            Err(err) => self.fail(err).await,
        }
    }

    async fn fail(&self, err: CoreError) {
        let auth_expired = err == CoreError::AuthExpired;
        if auth_expired {
            warn!("Refresh credential rejected, keeping last snapshot");
        } else {
            error!(error = %err, "Refresh cycle failed");
        }
        self.snapshots.mark_failed(err.to_string(), auth_expired).await;
        let _ = self.events_tx.send(DashboardEvent::RefreshFailed {
            reason: err.to_string(),
            auth_expired,
            timestamp: Utc::now().timestamp(),
        });
    }
}

/// Periodic poll plus manual triggers. Starting a cycle cancels the one still
/// in flight; its results are discarded.
pub async fn start_refresh_worker(
    runner: CycleRunner,
    period: Duration,
    mut triggers: mpsc::Receiver<()>,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight: Option<CancellationToken> = None;

    info!(period_secs = period.as_secs(), "Refresh worker started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => debug!("Scheduled refresh"),
            Some(()) = triggers.recv() => {
                debug!("Manual refresh");
                ticker.reset();
            }
        }

        // 1. Supersede the previous cycle
        if let Some(previous) = in_flight.take() {
            previous.cancel();
        }

        // 2. Start the next one under its own token
        let cycle = shutdown.child_token();
        in_flight = Some(cycle.clone());
        let generation = runner.snapshots.next_generation();
        let runner = runner.clone();
        tokio::spawn(async move { runner.execute(generation, cycle).await });
    }

    if let Some(previous) = in_flight.take() {
        previous.cancel();
    }
    info!("Refresh worker stopped");
}
