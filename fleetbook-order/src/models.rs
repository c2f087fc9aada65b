use std::collections::HashMap;

use fleetbook_shared::{Booking, BookingCategory};
use serde::{Deserialize, Serialize};

/// Aggregation key of a trip group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    /// Vehicle id, or the plate number when the id is unknown
    pub vehicle: String,
    pub arrival_date: String,
    pub category: BookingCategory,
}

/// Bookings sharing one vehicle, date and category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripGroup {
    pub key: GroupKey,
    /// First known vehicle id; holds can only be queried by id.
    pub vehicle_id: Option<String>,
    pub vehicle_number: String,
    pub route_from: String,
    pub route_to: String,
    /// Most recent first
    pub bookings: Vec<Booking>,
    /// Ascending, canonical "HH:MM:SS" where the source time was readable
    pub distinct_times: Vec<String>,
    pub capacity: Option<u32>,
    pub owner_reserved: Vec<String>,
}

/// Trip groups in presentation order, addressable by key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<TripGroup>", into = "Vec<TripGroup>")]
pub struct GroupedTrips {
    groups: Vec<TripGroup>,
    index: HashMap<GroupKey, usize>,
}

impl GroupedTrips {
    pub fn groups(&self) -> &[TripGroup] {
        &self.groups
    }

    pub fn get(&self, key: &GroupKey) -> Option<&TripGroup> {
        self.index.get(key).map(|&i| &self.groups[i])
    }

    pub fn by_category(&self, category: BookingCategory) -> impl Iterator<Item = &TripGroup> {
        self.groups.iter().filter(move |g| g.key.category == category)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl From<Vec<TripGroup>> for GroupedTrips {
    fn from(groups: Vec<TripGroup>) -> Self {
        let index = groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.key.clone(), i))
            .collect();
        Self { groups, index }
    }
}

impl From<GroupedTrips> for Vec<TripGroup> {
    fn from(grouped: GroupedTrips) -> Self {
        grouped.groups
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollupScope {
    Category(BookingCategory),
    All,
}

impl RollupScope {
    pub fn includes(&self, category: BookingCategory) -> bool {
        match self {
            RollupScope::Category(c) => *c == category,
            RollupScope::All => true,
        }
    }
}

/// Dashboard counters for one group or one category scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rollup {
    pub scope: RollupScope,
    pub total_groups: usize,
    pub total_bookings: usize,
    pub total_reserved: usize,
    pub total_booked: usize,
    pub total_revenue: f64,
}

impl Rollup {
    pub fn empty(scope: RollupScope) -> Self {
        Self {
            scope,
            total_groups: 0,
            total_bookings: 0,
            total_reserved: 0,
            total_booked: 0,
            total_revenue: 0.0,
        }
    }
}

/// Counters from one reconciliation pass, for logging and the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub merged: usize,
    pub proof_only: usize,
    pub ambiguous: usize,
    pub duplicates_folded: usize,
    pub proofs_dropped: usize,
}
