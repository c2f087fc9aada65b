pub mod finance;
pub mod grouping;
pub mod manager;
pub mod models;
pub mod orchestrator;
pub mod reconciler;
pub mod snapshot;

pub use finance::Aggregator;
pub use grouping::group;
pub use manager::{StatusGateway, TransitionRequest};
pub use models::{GroupKey, GroupedTrips, ReconcileStats, Rollup, RollupScope, TripGroup};
pub use orchestrator::{RefreshOrchestrator, RefreshSettings};
pub use reconciler::{Reconciler, Reconciliation};
pub use snapshot::{DashboardSnapshot, SnapshotState, SnapshotStore};
