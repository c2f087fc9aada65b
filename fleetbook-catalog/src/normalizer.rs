use chrono::{Days, Duration, Months, NaiveDate};
use fleetbook_core::time::{canonical_date, canonical_time, parse_date, parse_timestamp};
use fleetbook_core::{CoreError, CoreResult};
use fleetbook_shared::models::booking::{NOT_AVAILABLE, UNKNOWN};
use fleetbook_shared::{
    Booking, BookingCategory, BookingStatus, CategorySignals, DurationUnit, Masked,
    PaymentProofRecord, PaymentStatus, PaymentType, Provenance, RentalDuration, RentalWindow,
    TripHints,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::aliases::{self, common, proof, ticket, AliasList};
use crate::classifier::{ClassificationRule, Classifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Ticket,
    Proof,
}

impl RecordKind {
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Ticket => "ticket",
            RecordKind::Proof => "proof",
        }
    }
}

/// Converts raw source records into canonical values. Missing fields take
/// defaults; only a record that is not an object at all is rejected.
#[derive(Debug, Clone)]
pub struct Normalizer {
    classifier: Classifier,
    media_base_url: Option<String>,
}

impl Normalizer {
    pub fn new(classifier: Classifier, media_base_url: Option<String>) -> Self {
        Self {
            classifier,
            media_base_url: media_base_url.filter(|base| !base.trim().is_empty()),
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn normalize_ticket(&self, raw: &Value) -> CoreResult<Booking> {
        let record = as_record(raw, RecordKind::Ticket)?;

        let id = aliases::text(record, ticket::ID).unwrap_or_default();
        let booking_ref = aliases::text(record, ticket::BOOKING_REF)
            .or_else(|| (!id.is_empty()).then(|| format!("TICKET-{}", id)))
            .unwrap_or_default();

        let mut seats = seat_list(record, ticket::SEATS);
        let signals = category_signals(record);

        // Amount: explicit total, else price per seat times seat count (at least one)
        let explicit_total = aliases::number(record, ticket::TOTAL_AMOUNT);
        let price = aliases::number(record, ticket::PRICE_PER_SEAT).unwrap_or(0.0);
        let per_seat_total = price * seats.len().max(1) as f64;
        let provisional = non_negative(explicit_total.unwrap_or(per_seat_total));

        let (category, rule) = self.classifier.explain(&signals, provisional);
        let amount = match (explicit_total, category, rule) {
            (Some(_), _, _) => provisional,
            // A hire tagged as such is priced per vehicle, not per seat.
            (None, BookingCategory::FullVehicle, r) if r != ClassificationRule::AmountThreshold => non_negative(price),
            _ => provisional,
        };
        if category == BookingCategory::FullVehicle {
            seats.clear();
        }

        let booking = Booking {
            id: if id.is_empty() { NOT_AVAILABLE.to_string() } else { id },
            booking_ref,
            category,
            vehicle_id: text_or(record, ticket::VEHICLE_ID, NOT_AVAILABLE),
            vehicle_number: text_or(record, ticket::VEHICLE_NUMBER, UNKNOWN),
            route_from: text_or(record, ticket::ROUTE_FROM, UNKNOWN),
            route_to: text_or(record, ticket::ROUTE_TO, UNKNOWN),
            arrival_date: date_or(record, ticket::ARRIVAL_DATE),
            arrival_time: time_or(record, ticket::ARRIVAL_TIME),
            passenger_name: Masked(text_or(record, ticket::PASSENGER_NAME, UNKNOWN)),
            passenger_contact: text_or(record, ticket::PASSENGER_CONTACT, NOT_AVAILABLE),
            seats,
            amount,
            booking_status: booking_status(record, ticket::BOOKING_STATUS),
            payment_status: payment_status(record, ticket::PAYMENT_STATUS),
            payment_type: payment_type(record, ticket::PAYMENT_TYPE, PaymentType::Unknown),
            proof: None,
            source: Provenance::TicketOnly,
            rental: rental_window(record, category),
            hints: trip_hints(record),
            created_at: aliases::text(record, ticket::CREATED_AT).and_then(|ts| parse_timestamp(&ts)),
            signals,
        };

        debug!(booking_ref = %booking.booking_ref, category = ?booking.category, rule = ?rule, "Normalized ticket");
        Ok(booking)
    }

    pub fn normalize_proof(&self, raw: &Value) -> CoreResult<PaymentProofRecord> {
        let record = as_record(raw, RecordKind::Proof)?;

        let signals = category_signals(record);
        let amount = non_negative(aliases::number(record, proof::AMOUNT).unwrap_or(0.0));
        let category = self.classifier.explain(&signals, amount).0;

        Ok(PaymentProofRecord {
            source_id: aliases::text(record, proof::SOURCE_ID).unwrap_or_default(),
            booking_ref_guess: aliases::text(record, proof::BOOKING_REF_GUESS),
            passenger_name: Masked(text_or(record, proof::PASSENGER_NAME, UNKNOWN)),
            passenger_contact: text_or(record, proof::PASSENGER_CONTACT, NOT_AVAILABLE),
            vehicle_id: text_or(record, proof::VEHICLE_ID, NOT_AVAILABLE),
            vehicle_number: text_or(record, proof::VEHICLE_NUMBER, UNKNOWN),
            route_from: text_or(record, proof::ROUTE_FROM, UNKNOWN),
            route_to: text_or(record, proof::ROUTE_TO, UNKNOWN),
            arrival_date: date_or(record, proof::ARRIVAL_DATE),
            arrival_time: time_or(record, proof::ARRIVAL_TIME),
            seats: seat_list(record, proof::SEATS),
            screenshot_ref: aliases::text(record, proof::SCREENSHOT).map(|s| self.resolve_screenshot(&s)),
            amount,
            booking_status: booking_status(record, proof::BOOKING_STATUS),
            payment_status: payment_status(record, proof::PAYMENT_STATUS),
            payment_type: payment_type(record, proof::PAYMENT_TYPE, PaymentType::Manual),
            rental: rental_window(record, category),
            created_at: aliases::text(record, proof::CREATED_AT).and_then(|ts| parse_timestamp(&ts)),
            signals,
        })
    }

    /// Best-effort batch: malformed records are logged and skipped. Returns the skip count.
    pub fn normalize_tickets(&self, raws: &[Value]) -> (Vec<Booking>, usize) {
        normalize_batch(raws, RecordKind::Ticket, |raw| self.normalize_ticket(raw))
    }

    pub fn normalize_proofs(&self, raws: &[Value]) -> (Vec<PaymentProofRecord>, usize) {
        normalize_batch(raws, RecordKind::Proof, |raw| self.normalize_proof(raw))
    }

    /// Absolute and inline references pass through; media paths are anchored at the media base.
    pub fn resolve_screenshot(&self, raw: &str) -> String {
        let raw = raw.trim();
        let Some(base) = self.media_base_url.as_deref().map(|b| b.trim_end_matches('/')) else {
            return raw.to_string();
        };
        if raw.starts_with("http://") || raw.starts_with("https://") || raw.starts_with("data:image") {
            raw.to_string()
        } else if raw.starts_with("/media/") {
            format!("{}{}", base, raw)
        } else {
            format!("{}/media/{}", base, raw.trim_start_matches('/'))
        }
    }
}

fn normalize_batch<T, F>(raws: &[Value], kind: RecordKind, mut normalize: F) -> (Vec<T>, usize)
where
    F: FnMut(&Value) -> CoreResult<T>,
{
    let mut out = Vec::with_capacity(raws.len());
    let mut skipped = 0;
    for (index, raw) in raws.iter().enumerate() {
        match normalize(raw) {
            Ok(value) => out.push(value),
            Err(err) => {
                skipped += 1;
                warn!(kind = kind.label(), index, error = %err, "Skipping record");
            }
        }
    }
    (out, skipped)
}

fn as_record(raw: &Value, kind: RecordKind) -> CoreResult<&Map<String, Value>> {
    raw.as_object().ok_or_else(|| CoreError::MalformedRecord {
        origin: kind.label(),
        reason: format!("expected an object, got {}", json_kind(raw)),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn non_negative(amount: f64) -> f64 {
    if amount.is_finite() && amount > 0.0 {
        amount
    } else {
        0.0
    }
}

fn text_or(record: &Map<String, Value>, aliases: AliasList, default: &str) -> String {
    aliases::text(record, aliases).unwrap_or_else(|| default.to_string())
}

fn date_or(record: &Map<String, Value>, aliases: AliasList) -> String {
    match aliases::text(record, aliases) {
        Some(raw) => canonical_date(&raw).unwrap_or(raw),
        None => NOT_AVAILABLE.to_string(),
    }
}

fn time_or(record: &Map<String, Value>, aliases: AliasList) -> String {
    match aliases::text(record, aliases) {
        Some(raw) => canonical_time(&raw).unwrap_or(raw),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Seats arrive as a list (strings or numbers) or as one delimited string.
fn seat_list(record: &Map<String, Value>, aliases: AliasList) -> Vec<String> {
    match aliases::lookup(record, aliases) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        Some(Value::Number(n)) => vec![n.to_string()],
        _ => Vec::new(),
    }
}

fn booking_status(record: &Map<String, Value>, aliases: AliasList) -> BookingStatus {
    aliases::text(record, aliases)
        .map(|s| BookingStatus::parse(&s))
        .unwrap_or(BookingStatus::Unknown)
}

fn payment_status(record: &Map<String, Value>, aliases: AliasList) -> PaymentStatus {
    aliases::text(record, aliases)
        .map(|s| PaymentStatus::parse(&s))
        .unwrap_or(PaymentStatus::Unknown)
}

fn payment_type(record: &Map<String, Value>, aliases: AliasList, default: PaymentType) -> PaymentType {
    let labelled = aliases::text(record, aliases)
        .map(|s| PaymentType::parse(&s))
        .unwrap_or(PaymentType::Unknown);
    if labelled != PaymentType::Unknown {
        return labelled;
    }
    if aliases::flag(record, common::MANUAL_PAYMENT_FLAG) {
        PaymentType::Manual
    } else if aliases::flag(record, common::CASH_PAYMENT_FLAG) {
        PaymentType::Cash
    } else {
        default
    }
}

fn category_signals(record: &Map<String, Value>) -> CategorySignals {
    CategorySignals {
        ticket_type: aliases::text(record, common::TICKET_TYPE),
        offer_type: aliases::text(record, common::OFFER_TYPE),
        service_type: aliases::text(record, common::SERVICE_TYPE),
        vehicle_type: aliases::text(record, common::VEHICLE_TYPE),
        full_vehicle_flag: aliases::flag(record, common::FULL_VEHICLE_FLAG),
    }
}

fn trip_hints(record: &Map<String, Value>) -> TripHints {
    let capacity = aliases::number(record, common::CAPACITY)
        .filter(|c| *c >= 1.0 && *c <= u32::MAX as f64)
        .map(|c| c as u32);
    TripHints {
        capacity,
        owner_reserved: seat_list(record, common::OWNER_RESERVED),
    }
}

fn rental_window(record: &Map<String, Value>, category: BookingCategory) -> Option<RentalWindow> {
    if category != BookingCategory::FullVehicle {
        return None;
    }

    let departure_date = aliases::text(record, common::DEPARTURE_DATE).and_then(|d| parse_date(&d));
    let duration = rental_duration(record);
    let return_date = aliases::text(record, common::RETURN_DATE)
        .and_then(|d| parse_date(&d))
        .or_else(|| match (departure_date, duration) {
            (Some(start), Some(duration)) => derive_return_date(start, duration),
            _ => None,
        });

    Some(RentalWindow {
        departure_date,
        return_date,
        duration,
    })
}

fn rental_duration(record: &Map<String, Value>) -> Option<RentalDuration> {
    let unit = aliases::text(record, common::DURATION_TYPE).and_then(|u| DurationUnit::parse(&u))?;
    let value = aliases::number(record, common::DURATION_VALUE)
        .filter(|v| *v >= 1.0)
        .map(|v| v as u32)
        .unwrap_or(1);
    Some(RentalDuration { unit, value })
}

/// Return date of a hire that only states its start and duration
pub fn derive_return_date(start: NaiveDate, duration: RentalDuration) -> Option<NaiveDate> {
    let value = duration.value;
    match duration.unit {
        DurationUnit::Hourly => {
            let start = start.and_hms_opt(0, 0, 0)?;
            start
                .checked_add_signed(Duration::hours(i64::from(value)))
                .map(|end| end.date())
        }
        DurationUnit::Daily => start.checked_add_days(Days::new(u64::from(value))),
        DurationUnit::Weekly => start.checked_add_days(Days::new(u64::from(value) * 7)),
        DurationUnit::Monthly => start.checked_add_months(Months::new(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::new(Classifier::default(), None)
    }

    #[test]
    fn test_ticket_with_seat_list_and_price() {
        let booking = normalizer()
            .normalize_ticket(&json!({
                "id": 11,
                "booking": "BK-100",
                "passenger_name": "Ali",
                "vehicle_id": 7,
                "vehicle_number": "GLT-101",
                "route_from": "Gilgit",
                "route_to": "Skardu",
                "arrival_date": "2025-03-09",
                "arrival_time": "14:30",
                "seats": ["A1", "A2"],
                "price_per_seat": "2500",
                "status": "reserved",
                "payment_status": "UNPAID",
                "payment_type": "online"
            }))
            .unwrap();

        assert_eq!(booking.booking_ref, "BK-100");
        assert_eq!(booking.vehicle_id, "7");
        assert_eq!(booking.seats, vec!["A1", "A2"]);
        assert_eq!(booking.amount, 5000.0);
        assert_eq!(booking.category, BookingCategory::Seat);
        assert_eq!(booking.arrival_time, "14:30:00");
        assert_eq!(booking.booking_status, BookingStatus::Reserved);
        assert_eq!(booking.payment_status, PaymentStatus::Unpaid);
        assert_eq!(booking.payment_type, PaymentType::Online);
        assert_eq!(booking.source, Provenance::TicketOnly);
    }

    #[test]
    fn test_delimited_seats_and_nested_transport() {
        let booking = normalizer()
            .normalize_ticket(&json!({
                "id": "t-2",
                "seats": "3, 4 ,5",
                "price_per_seat": 1000,
                "transport": {
                    "vehicle_number": "GLT-202",
                    "arrival_date": "2025/03/10",
                    "vehicle_seats": 22,
                    "reserve_seats": [1, 2]
                }
            }))
            .unwrap();

        assert_eq!(booking.seats, vec!["3", "4", "5"]);
        assert_eq!(booking.amount, 3000.0);
        assert_eq!(booking.vehicle_number, "GLT-202");
        assert_eq!(booking.arrival_date, "2025-03-10");
        assert_eq!(booking.hints.capacity, Some(22));
        assert_eq!(booking.hints.owner_reserved, vec!["1", "2"]);
        assert_eq!(booking.booking_ref, "TICKET-t-2");
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let booking = normalizer().normalize_ticket(&json!({})).unwrap();
        assert_eq!(booking.id, "N/A");
        assert_eq!(booking.booking_ref, "");
        assert_eq!(booking.passenger_name.expose(), "Unknown");
        assert_eq!(booking.passenger_contact, "N/A");
        assert_eq!(booking.arrival_date, "N/A");
        assert_eq!(booking.amount, 0.0);
        assert_eq!(booking.booking_status, BookingStatus::Unknown);
        assert_eq!(booking.payment_status, PaymentStatus::Unknown);
        assert_eq!(booking.payment_type, PaymentType::Unknown);
        assert_eq!(booking.category, BookingCategory::Seat);
    }

    #[test]
    fn test_single_seat_when_absent_and_negative_amount_clamped() {
        let n = normalizer();
        let booking = n.normalize_ticket(&json!({ "price_per_seat": 800 })).unwrap();
        assert_eq!(booking.amount, 800.0);

        let negative = n.normalize_ticket(&json!({ "total_amount": -50 })).unwrap();
        assert_eq!(negative.amount, 0.0);
    }

    #[test]
    fn test_full_vehicle_tag_keeps_total_and_clears_seats() {
        let booking = normalizer()
            .normalize_ticket(&json!({
                "booking": "BK-7",
                "ticket_type": "FULLVEHICLE",
                "seats": ["1", "2", "3"],
                "price_per_seat": 3000,
                "start_date": "2025-04-01",
                "duration_type": "daily",
                "duration_value": "3"
            }))
            .unwrap();

        assert_eq!(booking.category, BookingCategory::FullVehicle);
        assert_eq!(booking.amount, 3000.0);
        assert!(booking.seats.is_empty());

        let rental = booking.rental.unwrap();
        assert_eq!(rental.departure_date, NaiveDate::from_ymd_opt(2025, 4, 1));
        assert_eq!(rental.return_date, NaiveDate::from_ymd_opt(2025, 4, 4));
        assert_eq!(rental.duration, Some(RentalDuration { unit: DurationUnit::Daily, value: 3 }));
    }

    #[test]
    fn test_amount_threshold_classification_matches_final_amount() {
        let classifier = Classifier::default();
        let n = Normalizer::new(classifier, None);
        let booking = n
            .normalize_ticket(&json!({ "seats": ["1", "2"], "price_per_seat": 6000 }))
            .unwrap();

        assert_eq!(booking.category, BookingCategory::FullVehicle);
        assert_eq!(booking.amount, 12000.0);
        assert_eq!(classifier.classify(&booking), booking.category);
    }

    #[test]
    fn test_payment_type_flags() {
        let n = normalizer();
        let manual = n.normalize_ticket(&json!({ "is_manual_payment": true })).unwrap();
        assert_eq!(manual.payment_type, PaymentType::Manual);

        let cash = n.normalize_ticket(&json!({ "is_cash_payment": true })).unwrap();
        assert_eq!(cash.payment_type, PaymentType::Cash);

        let labelled = n
            .normalize_ticket(&json!({ "payment_method": "Manual (Advance)", "is_cash_payment": true }))
            .unwrap();
        assert_eq!(labelled.payment_type, PaymentType::Manual);
    }

    #[test]
    fn test_proof_record() {
        let proof = normalizer()
            .normalize_proof(&json!({
                "id": 5,
                "booking": "BK-100",
                "passenger_name": "Ali",
                "vehicle_number": "GLT-101",
                "screenshot_url": "s1.png",
                "amount": "5000",
                "booking_status": "PENDING",
                "payment_status": "PAID"
            }))
            .unwrap();

        assert_eq!(proof.source_id, "5");
        assert_eq!(proof.booking_ref_guess.as_deref(), Some("BK-100"));
        assert_eq!(proof.screenshot_ref.as_deref(), Some("s1.png"));
        assert_eq!(proof.amount, 5000.0);
        assert_eq!(proof.payment_type, PaymentType::Manual);
        assert_eq!(proof.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_screenshot_resolution_with_media_base() {
        let n = Normalizer::new(Classifier::default(), Some("https://cdn.example.com/".to_string()));
        assert_eq!(n.resolve_screenshot("s1.png"), "https://cdn.example.com/media/s1.png");
        assert_eq!(n.resolve_screenshot("/media/p/s2.png"), "https://cdn.example.com/media/p/s2.png");
        assert_eq!(n.resolve_screenshot("https://x.io/s3.png"), "https://x.io/s3.png");
        assert_eq!(n.resolve_screenshot("data:image/png;base64,AAA"), "data:image/png;base64,AAA");
    }

    #[test]
    fn test_batch_skips_malformed_records() {
        let raws = vec![json!({ "booking": "A" }), json!("not a record"), json!(null), json!({ "booking": "B" })];
        let (bookings, skipped) = normalizer().normalize_tickets(&raws);
        assert_eq!(bookings.len(), 2);
        assert_eq!(skipped, 2);
        assert_eq!(bookings[1].booking_ref, "B");
    }

    #[test]
    fn test_derive_return_date_units() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let hours = RentalDuration { unit: DurationUnit::Hourly, value: 30 };
        assert_eq!(derive_return_date(start, hours), NaiveDate::from_ymd_opt(2025, 2, 1));

        let weeks = RentalDuration { unit: DurationUnit::Weekly, value: 2 };
        assert_eq!(derive_return_date(start, weeks), NaiveDate::from_ymd_opt(2025, 2, 14));

        let months = RentalDuration { unit: DurationUnit::Monthly, value: 1 };
        assert_eq!(derive_return_date(start, months), NaiveDate::from_ymd_opt(2025, 2, 28));
    }
}
