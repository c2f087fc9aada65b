use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use fleetbook_catalog::inventory::canonical_seat;
use fleetbook_core::time::{parse_date, parse_time};
use fleetbook_shared::models::booking::is_placeholder;
use fleetbook_shared::Booking;

use crate::models::{GroupKey, GroupedTrips, TripGroup};

/// Partitions bookings into trip groups. Always a full rebuild from the given slice.
pub fn group(bookings: &[Booking]) -> GroupedTrips {
    let mut order: Vec<GroupKey> = Vec::new();
    let mut members: HashMap<GroupKey, Vec<&Booking>> = HashMap::new();

    for booking in bookings {
        let key = GroupKey {
            vehicle: booking.vehicle_key().to_string(),
            arrival_date: booking.arrival_date.clone(),
            category: booking.category,
        };
        members
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(booking);
    }

    let mut groups: Vec<TripGroup> = order
        .into_iter()
        .filter_map(|key| {
            let bookings = members.remove(&key)?;
            Some(build_group(key, bookings))
        })
        .collect();

    // Stable: equal dates keep insertion order, unreadable dates sink to the end.
    groups.sort_by(|a, b| descending(group_date(a), group_date(b)));

    GroupedTrips::from(groups)
}

fn build_group(key: GroupKey, mut bookings: Vec<&Booking>) -> TripGroup {
    // Vehicle facts come from the first booking seen.
    let first_seen = bookings.first().copied();
    let vehicle_id = bookings
        .iter()
        .map(|b| b.vehicle_id.trim())
        .find(|id| !is_placeholder(id))
        .map(str::to_string);
    let capacity = bookings.iter().find_map(|b| b.hints.capacity);

    bookings.sort_by(|a, b| descending(recency(a), recency(b)));

    let distinct_times: BTreeSet<String> = bookings
        .iter()
        .map(|b| b.arrival_time.trim())
        .filter(|t| !is_placeholder(t))
        .map(str::to_string)
        .collect();

    let owner_reserved: BTreeSet<String> = bookings
        .iter()
        .flat_map(|b| b.hints.owner_reserved.iter())
        .filter_map(|s| canonical_seat(s))
        .collect();

    let (vehicle_number, route_from, route_to) = match first_seen {
        Some(b) => (b.vehicle_number.clone(), b.route_from.clone(), b.route_to.clone()),
        None => Default::default(),
    };

    TripGroup {
        key,
        vehicle_id,
        vehicle_number,
        route_from,
        route_to,
        bookings: bookings.into_iter().cloned().collect(),
        distinct_times: distinct_times.into_iter().collect(),
        capacity,
        owner_reserved: owner_reserved.into_iter().collect(),
    }
}

/// Larger first; `None` always last.
fn descending<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    b.cmp(&a)
}

fn group_date(group: &TripGroup) -> Option<NaiveDate> {
    parse_date(&group.key.arrival_date)
}

/// Creation time when known, else the scheduled arrival.
fn recency(booking: &Booking) -> Option<DateTime<Utc>> {
    booking.created_at.or_else(|| {
        let date = parse_date(&booking.arrival_date)?;
        let time = parse_time(&booking.arrival_time).or_else(|| NaiveTime::from_hms_opt(0, 0, 0))?;
        Some(date.and_time(time).and_utc())
    })
}
