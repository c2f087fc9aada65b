use chrono::{DateTime, Utc};

use super::booking::{BookingStatus, PaymentStatus};

/// Broadcast to dashboard subscribers whenever the visible state changes
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    SnapshotPublished {
        generation: u64,
        refreshed_at: DateTime<Utc>,
        partial: bool,
        total_bookings: usize,
    },
    BookingPatched {
        generation: u64,
        booking_ref: String,
        booking_status: BookingStatus,
        payment_status: PaymentStatus,
    },
    RefreshFailed {
        reason: String,
        auth_expired: bool,
        timestamp: i64,
    },
}

impl DashboardEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            Self::SnapshotPublished { .. } => "snapshot_published",
            Self::BookingPatched { .. } => "booking_patched",
            Self::RefreshFailed { .. } => "refresh_failed",
        }
    }
}
