use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleetbook_catalog::AvailabilityResult;
use fleetbook_shared::{Booking, BookingCategory, BookingStatus, PaymentStatus, PaymentType};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::finance::Aggregator;
use crate::grouping::group;
use crate::models::{GroupedTrips, ReconcileStats, Rollup, RollupScope};

/// Everything one refresh cycle produced, swapped in as a unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub snapshot_id: Uuid,
    pub refreshed_at: DateTime<Utc>,
    /// A source failed this cycle and contributed nothing
    pub partial: bool,
    pub skipped_records: usize,
    pub reconcile: ReconcileStats,
    pub bookings: Vec<Booking>,
    pub groups: GroupedTrips,
    pub availability: Vec<AvailabilityResult>,
    pub rollups: Vec<Rollup>,
}

impl DashboardSnapshot {
    pub fn build(
        bookings: Vec<Booking>,
        availability: Vec<AvailabilityResult>,
        partial: bool,
        skipped_records: usize,
        reconcile: ReconcileStats,
    ) -> Self {
        let groups = group(&bookings);
        let rollups = Aggregator::dashboard_rollups(&groups);
        Self {
            snapshot_id: Uuid::new_v4(),
            refreshed_at: Utc::now(),
            partial,
            skipped_records,
            reconcile,
            bookings,
            groups,
            availability,
            rollups,
        }
    }

    /// Same cycle data with one booking's statuses changed; groups and rollups
    /// are rebuilt. Returns the updated booking alongside, or None when the
    /// reference is not in this snapshot.
    pub fn with_status(
        &self,
        booking_ref: &str,
        booking_status: BookingStatus,
        payment_status: PaymentStatus,
    ) -> Option<(Self, Booking)> {
        let position = self
            .bookings
            .iter()
            .position(|b| b.has_ref() && b.booking_ref == booking_ref.trim())?;

        let mut bookings = self.bookings.clone();
        bookings[position].apply_status(booking_status, payment_status);
        let patched = bookings[position].clone();
        let groups = group(&bookings);
        let rollups = Aggregator::dashboard_rollups(&groups);

        let next = Self {
            snapshot_id: Uuid::new_v4(),
            bookings,
            groups,
            rollups,
            ..self.clone()
        };
        Some((next, patched))
    }

    pub fn find_booking(&self, booking_ref: &str) -> Option<&Booking> {
        let booking_ref = booking_ref.trim();
        if booking_ref.is_empty() {
            return None;
        }
        self.bookings.iter().find(|b| b.booking_ref == booking_ref)
    }

    pub fn bookings_by_payment(&self, payment_type: PaymentType) -> Vec<&Booking> {
        self.bookings
            .iter()
            .filter(|b| b.payment_type == payment_type)
            .collect()
    }

    pub fn rollup(&self, scope: RollupScope) -> Option<&Rollup> {
        self.rollups.iter().find(|r| r.scope == scope)
    }

    pub fn category_rollup(&self, category: BookingCategory) -> Option<&Rollup> {
        self.rollup(RollupScope::Category(category))
    }
}

/// Freshness of what readers are shown
#[derive(Debug, Clone, Default)]
pub struct SnapshotState {
    pub generation: u64,
    pub snapshot: Option<Arc<DashboardSnapshot>>,
    pub last_error: Option<String>,
    pub auth_expired: bool,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Last good snapshot plus a degradation indicator. Publishes are ordered by
/// generation so an older cycle can never overwrite newer state.
#[derive(Default)]
pub struct SnapshotStore {
    state: RwLock<SnapshotState>,
    generations: AtomicU64,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a generation number before starting work that may publish.
    pub fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns false (and discards the snapshot) when newer state is already visible.
    pub async fn publish(&self, generation: u64, snapshot: DashboardSnapshot) -> bool {
        let mut state = self.state.write().await;
        if generation <= state.generation {
            warn!(generation, current = state.generation, "Discarding stale snapshot");
            return false;
        }
        info!(
            generation,
            bookings = snapshot.bookings.len(),
            partial = snapshot.partial,
            "Publishing dashboard snapshot"
        );
        state.generation = generation;
        state.snapshot = Some(Arc::new(snapshot));
        state.last_error = None;
        state.auth_expired = false;
        true
    }

    /// Apply a remotely confirmed status change to whatever snapshot is visible
    /// now, so fields refreshed since the caller read the booking are kept.
    /// Returns the new generation and the booking as now shown, or None when
    /// there is nothing to patch.
    pub async fn apply_patch(
        &self,
        booking_ref: &str,
        booking_status: BookingStatus,
        payment_status: PaymentStatus,
    ) -> Option<(u64, Booking)> {
        let mut state = self.state.write().await;
        let Some(current) = state.snapshot.clone() else {
            warn!(booking_ref, "No dashboard snapshot published yet, skipping local patch");
            return None;
        };
        let Some((next, patched)) = current.with_status(booking_ref, booking_status, payment_status) else {
            warn!(booking_ref, "Booking no longer in the visible snapshot, skipping local patch");
            return None;
        };

        let generation = self.next_generation();
        state.generation = state.generation.max(generation);
        state.snapshot = Some(Arc::new(next));
        Some((state.generation, patched))
    }

    /// Keep the last good snapshot, flag it as stale.
    pub async fn mark_failed(&self, reason: impl Into<String>, auth_expired: bool) {
        let mut state = self.state.write().await;
        state.last_error = Some(reason.into());
        state.auth_expired = auth_expired;
        state.last_failure_at = Some(Utc::now());
    }

    pub async fn current(&self) -> Option<Arc<DashboardSnapshot>> {
        self.state.read().await.snapshot.clone()
    }

    pub async fn state(&self) -> SnapshotState {
        self.state.read().await.clone()
    }

    pub async fn find_booking(&self, booking_ref: &str) -> Option<Booking> {
        let state = self.state.read().await;
        state
            .snapshot
            .as_ref()
            .and_then(|s| s.find_booking(booking_ref))
            .cloned()
    }
}
