use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use fleetbook_api::{app, AppState};
use fleetbook_catalog::{AvailabilityCalculator, Classifier, Normalizer};
use fleetbook_core::repository::{HoldsService, StatusUpdater};
use fleetbook_core::{CallContext, CoreResult, StatusUpdate, TripIdentity};
use fleetbook_order::{DashboardSnapshot, ReconcileStats, SnapshotStore, StatusGateway};
use fleetbook_shared::models::events::DashboardEvent;
use fleetbook_store::app_config::BusinessRules;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tower::ServiceExt;

/// Records calls; optionally lands a refresh while the remote call is in flight.
#[derive(Default)]
struct RecordingUpdater {
    calls: Mutex<Vec<(String, String)>>,
    concurrent_refresh: Mutex<Option<(Arc<SnapshotStore>, DashboardSnapshot)>>,
}

impl RecordingUpdater {
    fn refresh_during_call(&self, store: Arc<SnapshotStore>, snapshot: DashboardSnapshot) {
        *self.concurrent_refresh.lock().unwrap() = Some((store, snapshot));
    }
}

#[async_trait]
impl StatusUpdater for RecordingUpdater {
    async fn update_status(&self, ctx: &CallContext, booking_ref: &str, _update: &StatusUpdate) -> CoreResult<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((booking_ref.to_string(), ctx.credential.expose().clone()));
        let refresh = self.concurrent_refresh.lock().unwrap().take();
        if let Some((store, snapshot)) = refresh {
            let generation = store.next_generation();
            assert!(store.publish(generation, snapshot).await);
        }
        Ok(json!({ "booking": booking_ref }))
    }
}

struct FixedHolds(Vec<String>);

#[async_trait]
impl HoldsService for FixedHolds {
    async fn held_seats(&self, _ctx: &CallContext, _trip: &TripIdentity) -> CoreResult<Vec<String>> {
        Ok(self.0.clone())
    }
}

struct Harness {
    router: Router,
    snapshots: Arc<SnapshotStore>,
    updater: Arc<RecordingUpdater>,
    refresh_rx: mpsc::Receiver<()>,
    events_tx: broadcast::Sender<DashboardEvent>,
}

fn harness() -> Harness {
    let snapshots = Arc::new(SnapshotStore::new());
    let updater = Arc::new(RecordingUpdater::default());
    let holds = Arc::new(FixedHolds(vec!["2".into(), "3".into(), "4".into()]));
    let (refresh_tx, refresh_rx) = mpsc::channel(1);
    let (events_tx, _) = broadcast::channel(16);

    let state = AppState {
        snapshots: snapshots.clone(),
        gateway: Arc::new(StatusGateway::new(updater.clone())),
        availability: Arc::new(AvailabilityCalculator::new(holds, 4)),
        refresh_tx,
        events_tx: events_tx.clone(),
        business_rules: BusinessRules::default(),
    };

    Harness {
        router: app(state),
        snapshots,
        updater,
        refresh_rx,
        events_tx,
    }
}

fn fixture(bk1_amount: f64, with_bk1: bool) -> DashboardSnapshot {
    let mut raws = vec![
        json!({
            "booking": "BK-1", "vehicle_id": 7, "vehicle_number": "KA-01",
            "arrival_date": "2025-03-09", "arrival_time": "14:30",
            "seats": ["1", "2"], "total_amount": bk1_amount,
            "status": "RESERVED", "payment_status": "UNPAID", "payment_type": "Manual"
        }),
        json!({
            "booking": "BK-2", "vehicle_id": 9, "vehicle_number": "KA-02",
            "arrival_date": "2025-03-10", "total_amount": 15000,
            "status": "CONFIRMED", "payment_status": "PAID", "payment_type": "cash"
        }),
    ];
    if !with_bk1 {
        raws.remove(0);
    }
    let (bookings, _) = Normalizer::new(Classifier::default(), None).normalize_tickets(&raws);
    DashboardSnapshot::build(bookings, Vec::new(), false, 0, ReconcileStats::default())
}

async fn publish_fixture(store: &SnapshotStore) {
    let generation = store.next_generation();
    assert!(store.publish(generation, fixture(1000.0, true)).await);
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", "Bearer operator-token")
        .body(Body::empty())
        .unwrap()
}

fn patch_status(booking_ref: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri(format!("/v1/bookings/{}/status", booking_ref))
        .header("authorization", "Bearer operator-token")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_dashboard_before_first_refresh() {
    let h = harness();

    let (status, body) = send(&h.router, get("/v1/dashboard")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["freshness"]["generation"], 0);
    assert!(body["freshness"]["refreshed_at"].is_null());

    let (status, _) = send(&h.router, get("/v1/dashboard/groups")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_groups_filtered_by_category() {
    let h = harness();
    publish_fixture(&h.snapshots).await;

    let (status, body) = send(&h.router, get("/v1/dashboard/groups?category=seat")).await;
    assert_eq!(status, StatusCode::OK);
    let groups = body.as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["rollup"]["total_bookings"], 1);
    assert_eq!(groups[0]["rollup"]["total_revenue"], 1000.0);

    let (status, _) = send(&h.router, get("/v1/dashboard/groups?category=boat")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bookings_filtered_by_payment_type() {
    let h = harness();
    publish_fixture(&h.snapshots).await;

    let (status, body) = send(&h.router, get("/v1/dashboard/bookings?payment_type=cash")).await;
    assert_eq!(status, StatusCode::OK);
    let bookings = body.as_array().unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0]["booking_ref"], "BK-2");
}

#[tokio::test]
async fn test_manual_refresh_is_queued() {
    let mut h = harness();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/dashboard/refresh")
        .header("authorization", "Bearer operator-token")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(h.refresh_rx.try_recv().is_ok());
}

#[tokio::test]
async fn test_confirming_unpaid_needs_operator_ack() {
    let h = harness();
    publish_fixture(&h.snapshots).await;

    let (status, _) = send(
        &h.router,
        patch_status("BK-1", json!({ "booking_status": "CONFIRMED", "new_payment_status": "UNPAID" })),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);
    assert!(h.updater.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_status_change_patches_snapshot() {
    let h = harness();
    publish_fixture(&h.snapshots).await;
    let mut events = h.events_tx.subscribe();

    let (status, body) = send(
        &h.router,
        patch_status("BK-1", json!({ "booking_status": "CONFIRMED", "new_payment_status": "PAID" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking_status"], "CONFIRMED");
    assert_eq!(body["payment_status"], "PAID");

    let calls = h.updater.calls.lock().unwrap().clone();
    assert_eq!(calls, vec![("BK-1".to_string(), "operator-token".to_string())]);

    let visible = h.snapshots.find_booking("BK-1").await.unwrap();
    assert_eq!(visible.payment_status.as_str(), "PAID");
    assert!(matches!(
        events.try_recv().unwrap(),
        DashboardEvent::BookingPatched { ref booking_ref, .. } if booking_ref == "BK-1"
    ));
}

#[tokio::test]
async fn test_status_change_for_unknown_booking() {
    let h = harness();
    publish_fixture(&h.snapshots).await;

    let (status, _) = send(
        &h.router,
        patch_status("BK-404", json!({ "booking_status": "CONFIRMED", "new_payment_status": "PAID" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_change_requires_bearer() {
    let h = harness();
    publish_fixture(&h.snapshots).await;

    let request = Request::builder()
        .method("PATCH")
        .uri("/v1/bookings/BK-1/status")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "booking_status": "CONFIRMED", "new_payment_status": "PAID" }).to_string()))
        .unwrap();
    let (status, _) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(h.updater.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_dashboard_reads_require_bearer() {
    let h = harness();
    publish_fixture(&h.snapshots).await;

    for uri in [
        "/v1/dashboard",
        "/v1/dashboard/groups",
        "/v1/dashboard/bookings",
        "/v1/dashboard/availability",
        "/v1/dashboard/stream",
        "/v1/trips/availability?vehicle_id=7&arrival_date=2025-03-09&arrival_time=14:30",
    ] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, _) = send(&h.router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }

    let blank = Request::builder()
        .uri("/v1/dashboard/bookings")
        .header("authorization", "Bearer ")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&h.router, blank).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_change_keeps_fields_refreshed_mid_call() {
    let h = harness();
    publish_fixture(&h.snapshots).await;
    h.updater.refresh_during_call(h.snapshots.clone(), fixture(5000.0, true));

    let (status, body) = send(
        &h.router,
        patch_status("BK-1", json!({ "booking_status": "CONFIRMED", "new_payment_status": "PAID" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], 5000.0);
    assert_eq!(body["booking_status"], "CONFIRMED");

    let visible = h.snapshots.find_booking("BK-1").await.unwrap();
    assert_eq!(visible.amount, 5000.0);
    assert_eq!(visible.payment_status.as_str(), "PAID");
}

#[tokio::test]
async fn test_status_change_succeeds_when_booking_leaves_snapshot_mid_call() {
    let h = harness();
    publish_fixture(&h.snapshots).await;
    h.updater.refresh_during_call(h.snapshots.clone(), fixture(1000.0, false));
    let mut events = h.events_tx.subscribe();

    let (status, body) = send(
        &h.router,
        patch_status("BK-1", json!({ "booking_status": "CONFIRMED", "new_payment_status": "PAID" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking_ref"], "BK-1");
    assert_eq!(body["booking_status"], "CONFIRMED");

    assert!(h.snapshots.find_booking("BK-1").await.is_none());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_live_trip_availability() {
    let h = harness();
    let request = Request::builder()
        .uri("/v1/trips/availability?vehicle_id=7&arrival_date=2025-03-09&arrival_time=14:30&capacity=40&owner_reserved=1,2")
        .header("authorization", "Bearer operator-token")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], 36);
    assert_eq!(body["degraded"], false);
}

#[tokio::test]
async fn test_availability_rejects_unreadable_date() {
    let h = harness();
    let request = Request::builder()
        .uri("/v1/trips/availability?vehicle_id=7&arrival_date=someday&arrival_time=14:30")
        .header("authorization", "Bearer operator-token")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
