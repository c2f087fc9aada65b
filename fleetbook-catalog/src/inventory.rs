use std::collections::BTreeSet;

use fleetbook_core::TripIdentity;
use serde::{Deserialize, Serialize};

/// Seat labels are compared after canonicalization: "02" and "2" are the same seat.
pub fn canonical_seat(label: &str) -> Option<String> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u32>() {
        Ok(n) => Some(n.to_string()),
        Err(_) => Some(trimmed.to_ascii_uppercase()),
    }
}

pub fn seat_set<I, S>(labels: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .filter_map(|label| canonical_seat(label.as_ref()))
        .collect()
}

/// Owner-blocked and customer-held seats for one trip instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatHold {
    pub owner_reserved: BTreeSet<String>,
    pub customer_held: BTreeSet<String>,
}

impl SeatHold {
    pub fn new<I, J, S, T>(owner_reserved: I, customer_held: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            owner_reserved: seat_set(owner_reserved),
            customer_held: seat_set(customer_held),
        }
    }

    /// A seat both owner-reserved and customer-held counts once.
    pub fn occupied(&self) -> BTreeSet<String> {
        self.owner_reserved.union(&self.customer_held).cloned().collect()
    }

    pub fn available(&self, capacity: u32) -> u32 {
        let occupied = u32::try_from(self.occupied().len()).unwrap_or(u32::MAX);
        capacity.saturating_sub(occupied)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResult {
    pub trip: TripIdentity,
    pub capacity: u32,
    pub owner_reserved: Vec<String>,
    pub customer_held: Vec<String>,
    pub available: u32,
    /// Holds could not be read; `available` is then the bare capacity.
    pub degraded: bool,
    pub reason: Option<String>,
}

impl AvailabilityResult {
    pub fn confirmed(trip: TripIdentity, capacity: u32, hold: &SeatHold) -> Self {
        Self {
            trip,
            capacity,
            owner_reserved: hold.owner_reserved.iter().cloned().collect(),
            customer_held: hold.customer_held.iter().cloned().collect(),
            available: hold.available(capacity),
            degraded: false,
            reason: None,
        }
    }

    /// Conservative over-estimate used when live holds are unknown.
    pub fn degraded(trip: TripIdentity, capacity: u32, owner_reserved: &BTreeSet<String>, reason: impl Into<String>) -> Self {
        Self {
            trip,
            capacity,
            owner_reserved: owner_reserved.iter().cloned().collect(),
            customer_held: Vec::new(),
            available: capacity,
            degraded: true,
            reason: Some(reason.into()),
        }
    }
}
