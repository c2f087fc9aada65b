use axum::{
    extract::{Path, State},
    routing::patch,
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use fleetbook_core::CallContext;
use fleetbook_order::TransitionRequest;
use fleetbook_shared::models::events::DashboardEvent;
use fleetbook_shared::{Booking, BookingStatus, PaymentStatus};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/bookings/{booking_ref}/status", patch(update_status))
}

/// Wire shape mirrors the remote status endpoint.
#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub booking_status: String,
    pub new_payment_status: String,
    #[serde(default)]
    pub confirm_unpaid: bool,
}

async fn update_status(
    State(state): State<AppState>,
    Path(booking_ref): Path<String>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<Booking>, AppError> {
    // 1. Resolve against the visible snapshot
    let current = state
        .snapshots
        .find_booking(&booking_ref)
        .await
        .ok_or_else(|| AppError::NotFoundError(format!("Booking {} not found", booking_ref)))?;

    // 2. Submit remotely with the operator's credential
    let request = TransitionRequest {
        booking_status: BookingStatus::parse(&req.booking_status),
        payment_status: PaymentStatus::parse(&req.new_payment_status),
        operator_confirmed: req.confirm_unpaid,
    };
    let ctx = CallContext::new(bearer.token().to_string().into(), CancellationToken::new());
    let patched = state.gateway.transition(&ctx, &current, request).await?;

    // 3. Patch whatever snapshot is visible now and tell subscribers
    let Some((generation, visible)) = state
        .snapshots
        .apply_patch(&patched.booking_ref, patched.booking_status, patched.payment_status)
        .await
    else {
        return Ok(Json(patched));
    };
    info!(booking_ref = %visible.booking_ref, generation, "Booking patched locally");

    let _ = state.events_tx.send(DashboardEvent::BookingPatched {
        generation,
        booking_ref: visible.booking_ref.clone(),
        booking_status: visible.booking_status,
        payment_status: visible.payment_status,
    });

    Ok(Json(visible))
}
