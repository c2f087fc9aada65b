use std::sync::Arc;

use fleetbook_catalog::AvailabilityCalculator;
use fleetbook_order::{SnapshotStore, StatusGateway};
use fleetbook_shared::models::events::DashboardEvent;
use fleetbook_store::app_config::BusinessRules;
use tokio::sync::{broadcast, mpsc};

#[derive(Clone)]
pub struct AppState {
    pub snapshots: Arc<SnapshotStore>,
    pub gateway: Arc<StatusGateway>,
    /// Live per-trip queries made with the caller's credential
    pub availability: Arc<AvailabilityCalculator>,
    pub refresh_tx: mpsc::Sender<()>,
    pub events_tx: broadcast::Sender<DashboardEvent>,
    pub business_rules: BusinessRules,
}
