use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use fleetbook_catalog::AvailabilityResult;
use fleetbook_order::{Aggregator, DashboardSnapshot, ReconcileStats, Rollup, TripGroup};
use fleetbook_shared::{Booking, BookingCategory, PaymentType};
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/dashboard", get(get_dashboard))
        .route("/v1/dashboard/groups", get(list_groups))
        .route("/v1/dashboard/bookings", get(list_bookings))
        .route("/v1/dashboard/availability", get(list_availability))
        .route("/v1/dashboard/refresh", post(request_refresh))
        .route("/v1/dashboard/stream", get(stream_events))
}

#[derive(Debug, Serialize)]
pub struct Freshness {
    pub generation: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub partial: bool,
    pub skipped_records: usize,
    pub last_error: Option<String>,
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Refresh credential rejected; the data shown is the last good snapshot.
    pub auth_expired: bool,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub freshness: Freshness,
    pub reconcile: ReconcileStats,
    pub rollups: Vec<Rollup>,
}

#[derive(Debug, Deserialize)]
pub struct GroupQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GroupView {
    #[serde(flatten)]
    pub group: TripGroup,
    pub rollup: Rollup,
}

#[derive(Debug, Deserialize)]
pub struct BookingQuery {
    pub payment_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshAccepted {
    pub status: &'static str,
}

async fn published(state: &AppState) -> Result<Arc<DashboardSnapshot>, AppError> {
    state
        .snapshots
        .current()
        .await
        .ok_or_else(|| AppError::NotFoundError("No dashboard snapshot published yet".to_string()))
}

async fn get_dashboard(State(state): State<AppState>) -> Json<DashboardResponse> {
    let current = state.snapshots.state().await;
    let snapshot = current.snapshot.as_deref();

    Json(DashboardResponse {
        freshness: Freshness {
            generation: current.generation,
            refreshed_at: snapshot.map(|s| s.refreshed_at),
            partial: snapshot.is_some_and(|s| s.partial),
            skipped_records: snapshot.map_or(0, |s| s.skipped_records),
            last_error: current.last_error.clone(),
            last_failure_at: current.last_failure_at,
            auth_expired: current.auth_expired,
        },
        reconcile: snapshot.map(|s| s.reconcile.clone()).unwrap_or_default(),
        rollups: snapshot.map(|s| s.rollups.clone()).unwrap_or_default(),
    })
}

async fn list_groups(
    State(state): State<AppState>,
    Query(query): Query<GroupQuery>,
) -> Result<Json<Vec<GroupView>>, AppError> {
    let category = match query.category.as_deref() {
        Some(raw) => Some(
            BookingCategory::parse(raw)
                .ok_or_else(|| AppError::ValidationError(format!("Unknown category '{}'", raw)))?,
        ),
        None => None,
    };

    let snapshot = published(&state).await?;
    let views = snapshot
        .groups
        .groups()
        .iter()
        .filter(|g| category.map_or(true, |c| g.key.category == c))
        .map(|g| GroupView {
            rollup: Aggregator::group_rollup(g),
            group: g.clone(),
        })
        .collect();
    Ok(Json(views))
}

async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let snapshot = published(&state).await?;
    let bookings = match query.payment_type.as_deref() {
        Some(raw) => snapshot
            .bookings_by_payment(PaymentType::parse(raw))
            .into_iter()
            .cloned()
            .collect(),
        None => snapshot.bookings.clone(),
    };
    Ok(Json(bookings))
}

async fn list_availability(State(state): State<AppState>) -> Result<Json<Vec<AvailabilityResult>>, AppError> {
    let snapshot = published(&state).await?;
    Ok(Json(snapshot.availability.clone()))
}

/// Coalesces: a refresh already queued absorbs this one.
async fn request_refresh(State(state): State<AppState>) -> (StatusCode, Json<RefreshAccepted>) {
    match state.refresh_tx.try_send(()) {
        Ok(()) => debug!("Manual refresh queued"),
        Err(err) => debug!(error = %err, "Refresh already pending"),
    }
    (StatusCode::ACCEPTED, Json(RefreshAccepted { status: "queued" }))
}

async fn stream_events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => match Event::default().event(event.name()).json_data(&event) {
                Ok(sse) => Some(Ok(sse)),
                Err(err) => {
                    warn!(error = %err, "Failed to encode dashboard event");
                    None
                }
            },
            // Lagged subscribers skip ahead; the next event carries fresh state.
            Err(err) => {
                debug!(error = %err, "Dashboard subscriber lagged");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
