use fleetbook_shared::{Booking, BookingCategory, BookingStatus};

use crate::models::{GroupedTrips, Rollup, RollupScope, TripGroup};

/// Revenue and status counters over trip groups
pub struct Aggregator;

impl Aggregator {
    /// Each booking sits in exactly one group, so summing groups never double counts.
    pub fn rollup(groups: &GroupedTrips, scope: RollupScope) -> Rollup {
        let mut rollup = Rollup::empty(scope);
        for group in groups.groups().iter().filter(|g| scope.includes(g.key.category)) {
            rollup.total_groups += 1;
            tally(&mut rollup, &group.bookings);
        }
        rollup
    }

    pub fn group_rollup(group: &TripGroup) -> Rollup {
        let mut rollup = Rollup::empty(RollupScope::Category(group.key.category));
        rollup.total_groups = 1;
        tally(&mut rollup, &group.bookings);
        rollup
    }

    /// Seat, full-vehicle and overall rollups, in that order
    pub fn dashboard_rollups(groups: &GroupedTrips) -> Vec<Rollup> {
        [
            RollupScope::Category(BookingCategory::Seat),
            RollupScope::Category(BookingCategory::FullVehicle),
            RollupScope::All,
        ]
        .into_iter()
        .map(|scope| Self::rollup(groups, scope))
        .collect()
    }
}

fn tally(rollup: &mut Rollup, bookings: &[Booking]) {
    for booking in bookings {
        rollup.total_bookings += 1;
        match booking.booking_status {
            BookingStatus::Reserved => rollup.total_reserved += 1,
            BookingStatus::Booked | BookingStatus::Confirmed => rollup.total_booked += 1,
            _ => {}
        }
        rollup.total_revenue += booking.amount;
    }
}
