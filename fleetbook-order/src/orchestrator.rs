use std::sync::Arc;

use fleetbook_catalog::{AvailabilityCalculator, AvailabilityRequest, Normalizer};
use fleetbook_core::repository::{HoldsService, ProofSource, TicketSource};
use fleetbook_core::{CallContext, CoreError, CoreResult, TripIdentity};
use fleetbook_shared::BookingCategory;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::grouping::group;
use crate::models::GroupedTrips;
use crate::reconciler::Reconciler;
use crate::snapshot::DashboardSnapshot;

/// Tunables of one refresh cycle
#[derive(Debug, Clone, Copy)]
pub struct RefreshSettings {
    pub default_capacity: u32,
    pub availability_concurrency: usize,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            default_capacity: 40,
            availability_concurrency: 8,
        }
    }
}

/// Runs one refresh: fetch both sources, reconcile, group, then price seat trips.
pub struct RefreshOrchestrator {
    tickets: Arc<dyn TicketSource>,
    proofs: Arc<dyn ProofSource>,
    normalizer: Normalizer,
    reconciler: Reconciler,
    availability: AvailabilityCalculator,
    settings: RefreshSettings,
}

impl RefreshOrchestrator {
    pub fn new(
        tickets: Arc<dyn TicketSource>,
        proofs: Arc<dyn ProofSource>,
        holds: Arc<dyn HoldsService>,
        normalizer: Normalizer,
        settings: RefreshSettings,
    ) -> Self {
        let reconciler = Reconciler::new(*normalizer.classifier());
        Self {
            tickets,
            proofs,
            reconciler,
            normalizer,
            availability: AvailabilityCalculator::new(holds, settings.availability_concurrency),
            settings,
        }
    }

    pub fn availability(&self) -> &AvailabilityCalculator {
        &self.availability
    }

    /// Source failures degrade the cycle to `partial`; auth failure or
    /// cancellation aborts it and nothing is produced.
    pub async fn run_cycle(&self, ctx: &CallContext) -> CoreResult<DashboardSnapshot> {
        // 1. Both sources, concurrently; reconciliation waits for both.
        let (tickets, proofs) = tokio::join!(self.tickets.fetch_tickets(ctx), self.proofs.fetch_proofs(ctx));
        let mut partial = false;
        let tickets = settle("tickets", tickets, &mut partial)?;
        let proofs = settle("proofs", proofs, &mut partial)?;
        if ctx.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        // 2. Normalize and reconcile
        let (tickets, skipped_tickets) = self.normalizer.normalize_tickets(&tickets);
        let (proofs, skipped_proofs) = self.normalizer.normalize_proofs(&proofs);
        let reconciliation = self.reconciler.reconcile(tickets, proofs);

        // 3. Live availability for seat trips
        let groups = group(&reconciliation.bookings);
        let requests = self.availability_requests(&groups);
        debug!(trips = requests.len(), "Querying seat availability");
        let availability = self.availability.fan_out(ctx, requests).await?;

        if ctx.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let snapshot = DashboardSnapshot::build(
            reconciliation.bookings,
            availability,
            partial,
            skipped_tickets + skipped_proofs,
            reconciliation.stats,
        );
        info!(
            bookings = snapshot.bookings.len(),
            groups = snapshot.groups.len(),
            partial,
            skipped = snapshot.skipped_records,
            "Refresh cycle complete"
        );
        Ok(snapshot)
    }

    /// One request per (seat group, distinct time) with a known vehicle id
    fn availability_requests(&self, groups: &GroupedTrips) -> Vec<AvailabilityRequest> {
        let mut requests = Vec::new();
        for group in groups.by_category(BookingCategory::Seat) {
            let Some(vehicle_id) = group.vehicle_id.as_deref() else {
                debug!(vehicle = %group.key.vehicle, "No vehicle id, skipping availability");
                continue;
            };
            for time in &group.distinct_times {
                match TripIdentity::new(vehicle_id, &group.key.arrival_date, time) {
                    Ok(trip) => requests.push(AvailabilityRequest {
                        trip,
                        capacity: group.capacity.unwrap_or(self.settings.default_capacity),
                        owner_reserved: group.owner_reserved.clone(),
                    }),
                    Err(err) => debug!(vehicle_id, error = %err, "Skipping unreadable trip"),
                }
            }
        }
        requests
    }
}

fn settle(origin: &str, fetched: CoreResult<Vec<Value>>, partial: &mut bool) -> CoreResult<Vec<Value>> {
    match fetched {
        Ok(records) => Ok(records),
        Err(err) if err.aborts_cycle() => Err(err),
        Err(err) => {
            warn!(origin, error = %err, "Source failed, continuing without it");
            *partial = true;
            Ok(Vec::new())
        }
    }
}
