use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use fleetbook_catalog::AvailabilityResult;
use fleetbook_core::{CallContext, TripIdentity};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/trips/availability", get(trip_availability))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub vehicle_id: String,
    pub arrival_date: String,
    pub arrival_time: String,
    pub capacity: Option<u32>,
    /// Comma-separated seat labels, e.g. `1,2,A3`
    #[serde(default)]
    pub owner_reserved: String,
}

/// Live seat count for one trip, queried with the caller's own credential.
async fn trip_availability(
    State(state): State<AppState>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResult>, AppError> {
    // 1. Validate the trip
    let trip = TripIdentity::new(&query.vehicle_id, &query.arrival_date, &query.arrival_time)?;
    let owner_reserved: Vec<String> = query
        .owner_reserved
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let capacity = query
        .capacity
        .unwrap_or(state.business_rules.default_vehicle_capacity);

    // 2. Query holds on behalf of the caller
    let ctx = CallContext::new(bearer.token().to_string().into(), CancellationToken::new());
    let result = state
        .availability
        .available_seats(&ctx, &trip, capacity, &owner_reserved)
        .await?;

    Ok(Json(result))
}
