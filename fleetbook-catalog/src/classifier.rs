use fleetbook_shared::{Booking, BookingCategory, CategorySignals};
use serde::{Deserialize, Serialize};

/// Amount above which an otherwise untagged booking is treated as a full-vehicle hire
pub const DEFAULT_FULL_VEHICLE_THRESHOLD: f64 = 10_000.0;

const FULL_VEHICLE_TAGS: &[&str] = &["fullvehicle", "full_vehicle", "full vehicle", "vehicle"];
const SEAT_TAGS: &[&str] = &["seat", "seats", "seat_booking"];
const FULL_VEHICLE_OFFERS: &[&str] = &["whole_hire", "whole_vehicle"];
const FULL_VEHICLE_SERVICES: &[&str] = &["long_drive"];
const HIRE_MARKERS: &[&str] = &["hire", "rental"];

/// Which signal decided the category, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationRule {
    CategoryTag,
    OfferTag,
    VehicleTypeMarker,
    AmountThreshold,
    Default,
}

/// Assigns a booking category from normalized signals. Pure: no state besides the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classifier {
    full_vehicle_threshold: f64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_FULL_VEHICLE_THRESHOLD)
    }
}

impl Classifier {
    pub fn new(full_vehicle_threshold: f64) -> Self {
        Self { full_vehicle_threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.full_vehicle_threshold
    }

    pub fn classify(&self, booking: &Booking) -> BookingCategory {
        self.explain(&booking.signals, booking.amount).0
    }

    /// Evaluates signals in fixed priority order; first match wins.
    pub fn explain(&self, signals: &CategorySignals, amount: f64) -> (BookingCategory, ClassificationRule) {
        // 1. Explicit category tag
        if signals.full_vehicle_flag {
            return (BookingCategory::FullVehicle, ClassificationRule::CategoryTag);
        }
        if let Some(tag) = signals.ticket_type.as_deref() {
            if matches_any(tag, FULL_VEHICLE_TAGS) {
                return (BookingCategory::FullVehicle, ClassificationRule::CategoryTag);
            }
            if matches_any(tag, SEAT_TAGS) {
                return (BookingCategory::Seat, ClassificationRule::CategoryTag);
            }
        }

        // 2. Explicit offer-type tag
        let offer_hit = signals
            .offer_type
            .as_deref()
            .is_some_and(|offer| matches_any(offer, FULL_VEHICLE_OFFERS));
        let service_hit = signals
            .service_type
            .as_deref()
            .is_some_and(|service| matches_any(service, FULL_VEHICLE_SERVICES));
        if offer_hit || service_hit {
            return (BookingCategory::FullVehicle, ClassificationRule::OfferTag);
        }

        // 3. Free-text vehicle type mentioning a hire
        if let Some(vehicle_type) = signals.vehicle_type.as_deref() {
            let lowered = vehicle_type.to_ascii_lowercase();
            if HIRE_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                return (BookingCategory::FullVehicle, ClassificationRule::VehicleTypeMarker);
            }
        }

        // 4. Amount heuristic, last resort
        if amount > self.full_vehicle_threshold {
            return (BookingCategory::FullVehicle, ClassificationRule::AmountThreshold);
        }

        (BookingCategory::Seat, ClassificationRule::Default)
    }
}

fn matches_any(value: &str, candidates: &[&str]) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    candidates.iter().any(|candidate| lowered == *candidate)
}
