use async_trait::async_trait;
use serde_json::Value;

use crate::{CallContext, CoreResult, StatusUpdate, TripIdentity};

/// Primary source: issued tickets, one raw record per booking
#[async_trait]
pub trait TicketSource: Send + Sync {
    async fn fetch_tickets(&self, ctx: &CallContext) -> CoreResult<Vec<Value>>;
}

/// Secondary source: manual-payment records carrying payment proof
#[async_trait]
pub trait ProofSource: Send + Sync {
    async fn fetch_proofs(&self, ctx: &CallContext) -> CoreResult<Vec<Value>>;
}

/// Live seat holds for one trip instance
#[async_trait]
pub trait HoldsService: Send + Sync {
    /// Seat labels already committed by other customers. Implementations return
    /// `CoreError::NotFound` when the service has no record of the trip.
    async fn held_seats(&self, ctx: &CallContext, trip: &TripIdentity) -> CoreResult<Vec<String>>;
}

/// Remote write endpoint for booking/payment status
#[async_trait]
pub trait StatusUpdater: Send + Sync {
    async fn update_status(
        &self,
        ctx: &CallContext,
        booking_ref: &str,
        update: &StatusUpdate,
    ) -> CoreResult<Value>;
}
