use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use fleetbook_core::repository::StatusUpdater;
use fleetbook_core::{CallContext, CoreError, CoreResult, StatusUpdate};
use fleetbook_shared::{Booking, BookingStatus, PaymentStatus};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// An operator's requested status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub booking_status: BookingStatus,
    pub payment_status: PaymentStatus,
    /// Operator acknowledged confirming an unpaid booking
    #[serde(default)]
    pub operator_confirmed: bool,
}

/// Validates and submits status transitions, one in flight per booking reference.
pub struct StatusGateway {
    updater: Arc<dyn StatusUpdater>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Releases the booking reference when the transition finishes, whatever the outcome.
struct InFlightGuard {
    booking_ref: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        set.remove(&self.booking_ref);
    }
}

impl StatusGateway {
    pub fn new(updater: Arc<dyn StatusUpdater>) -> Self {
        Self {
            updater,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Submit the change remotely and return the patched booking. On any
    /// failure the caller's booking is left as it was.
    pub async fn transition(
        &self,
        ctx: &CallContext,
        current: &Booking,
        request: TransitionRequest,
    ) -> CoreResult<Booking> {
        // 1. Validate
        if !current.has_ref() {
            return Err(CoreError::ValidationError(
                "booking has no reference to update".to_string(),
            ));
        }
        if !request.booking_status.is_known() || !request.payment_status.is_known() {
            return Err(CoreError::ValidationError(
                "target booking and payment status must be known values".to_string(),
            ));
        }

        // 2. Confirmation gate
        let update = StatusUpdate::new(request.booking_status, request.payment_status);
        if update.confirms_unpaid() && !request.operator_confirmed {
            return Err(CoreError::ConfirmationRequired(current.booking_ref.clone()));
        }

        // 3. One request per booking at a time
        let _guard = self.acquire(&current.booking_ref)?;

        // 4. Remote update
        let booking_ref = current.booking_ref.as_str();
        match self.updater.update_status(ctx, booking_ref, &update).await {
            Ok(_) => {
                info!(
                    booking_ref,
                    booking_status = update.booking_status.as_str(),
                    payment_status = update.new_payment_status.as_str(),
                    "Status transition applied"
                );
                let mut patched = current.clone();
                patched.apply_status(update.booking_status, update.new_payment_status);
                Ok(patched)
            }
            Err(err) => {
                warn!(booking_ref, error = %err, "Status transition failed");
                Err(match err {
                    CoreError::AuthExpired | CoreError::Cancelled | CoreError::TransitionRejected { .. } => err,
                    other => CoreError::TransitionRejected {
                        booking_ref: booking_ref.to_string(),
                        detail: other.to_string(),
                    },
                })
            }
        }
    }

    pub fn is_in_flight(&self, booking_ref: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(booking_ref)
    }

    fn acquire(&self, booking_ref: &str) -> CoreResult<InFlightGuard> {
        let mut set = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !set.insert(booking_ref.to_string()) {
            return Err(CoreError::TransitionInFlight(booking_ref.to_string()));
        }
        Ok(InFlightGuard {
            booking_ref: booking_ref.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }
}
