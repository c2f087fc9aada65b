//! Source-field aliases per canonical field. Earlier entries win; a dotted
//! path reads a nested object's field (`transport.vehicle_number`).

use serde_json::{Map, Value};

pub type AliasList = &'static [&'static str];

/// Aliases for records from the ticket listing
pub mod ticket {
    use super::AliasList;

    pub const ID: AliasList = &["id", "ticket_id"];
    pub const BOOKING_REF: AliasList = &["booking", "booking_number", "booking_id", "booking_ref"];
    pub const PASSENGER_NAME: AliasList = &["passenger_name", "user.name", "user.username", "customer_name"];
    pub const PASSENGER_CONTACT: AliasList = &["passenger_contact", "user.phone", "user.contact", "customer_phone"];
    pub const VEHICLE_ID: AliasList = &["vehicle_id", "vehicle", "transport.vehicle_id", "transport.vehicle", "transport_id"];
    pub const VEHICLE_NUMBER: AliasList = &["vehicle_number", "transport.vehicle_number"];
    pub const ROUTE_FROM: AliasList = &["route_from", "transport.route_from", "from_location"];
    pub const ROUTE_TO: AliasList = &["route_to", "transport.route_to", "to_location"];
    pub const ARRIVAL_DATE: AliasList = &["arrival_date", "transport.arrival_date", "travel_date", "start_date", "departure_date"];
    pub const ARRIVAL_TIME: AliasList = &["arrival_time", "transport.arrival_time", "travel_time", "departure_time"];
    pub const SEATS: AliasList = &["seats", "seat_numbers", "seat_number"];
    pub const TOTAL_AMOUNT: AliasList = &["total_amount", "total_price", "total_fare", "fixed_fare"];
    pub const PRICE_PER_SEAT: AliasList = &["price_per_seat", "transport.price_per_seat", "fare"];
    pub const BOOKING_STATUS: AliasList = &["status", "booking_status"];
    pub const PAYMENT_STATUS: AliasList = &["payment_status"];
    pub const PAYMENT_TYPE: AliasList = &["payment_type", "payment_method"];
    pub const CREATED_AT: AliasList = &["created_at", "booked_at", "updated_at"];
}

/// Aliases for records from the manual-payment (proof) listing
pub mod proof {
    use super::AliasList;

    pub const SOURCE_ID: AliasList = &["id"];
    pub const BOOKING_REF_GUESS: AliasList = &["booking", "booking_id", "booking_ref", "booking_number"];
    pub const PASSENGER_NAME: AliasList = &["passenger_name", "customer_name", "user.name"];
    pub const PASSENGER_CONTACT: AliasList = &["passenger_contact", "customer_phone", "user.phone"];
    pub const VEHICLE_ID: AliasList = &["vehicle_id", "vehicle", "transport.vehicle_id"];
    pub const VEHICLE_NUMBER: AliasList = &["vehicle_number", "transport.vehicle_number"];
    pub const ROUTE_FROM: AliasList = &["route_from", "transport.route_from"];
    pub const ROUTE_TO: AliasList = &["route_to", "transport.route_to"];
    pub const ARRIVAL_DATE: AliasList = &["arrival_date", "travel_date", "start_date", "departure_date"];
    pub const ARRIVAL_TIME: AliasList = &["arrival_time", "travel_time"];
    pub const SEATS: AliasList = &["seats", "seat_numbers"];
    pub const SCREENSHOT: AliasList = &["screenshot_url", "screenshot", "payment_screenshot"];
    pub const AMOUNT: AliasList = &["total_amount", "amount"];
    pub const BOOKING_STATUS: AliasList = &["booking_status", "status"];
    pub const PAYMENT_STATUS: AliasList = &["payment_status"];
    pub const PAYMENT_TYPE: AliasList = &["payment_method", "payment_type"];
    pub const CREATED_AT: AliasList = &["created_at", "submitted_at"];
}

/// Shared by both sources
pub mod common {
    use super::AliasList;

    pub const TICKET_TYPE: AliasList = &["ticket_type", "transport.ticket_type"];
    pub const OFFER_TYPE: AliasList = &["offer_type", "transport.offer_type"];
    pub const SERVICE_TYPE: AliasList = &["service_type", "transport.service_type"];
    pub const VEHICLE_TYPE: AliasList = &["vehicle_type", "transport.vehicle_type"];
    pub const FULL_VEHICLE_FLAG: AliasList = &["is_full_vehicle"];
    pub const MANUAL_PAYMENT_FLAG: AliasList = &["is_manual_payment"];
    pub const CASH_PAYMENT_FLAG: AliasList = &["is_cash_payment"];
    pub const DEPARTURE_DATE: AliasList = &["departure_date", "start_date", "travel_start_date", "travel_date", "arrival_date"];
    pub const RETURN_DATE: AliasList = &["return_date", "end_date", "travel_end_date"];
    pub const DURATION_TYPE: AliasList = &["duration_type"];
    pub const DURATION_VALUE: AliasList = &["duration_value"];
    pub const CAPACITY: AliasList = &[
        "vehicle_seats",
        "vehicle_seats_snapshot",
        "transport.vehicle_seats",
        "transport.vehicle_seats_snapshot",
        "seats_available",
        "transport.seats_available",
    ];
    pub const OWNER_RESERVED: AliasList = &["reserve_seats", "transport.reserve_seats"];
}

fn resolve_path<'a>(record: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = record.get(first)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// First alias holding a non-blank value
pub fn lookup<'a>(record: &'a Map<String, Value>, aliases: AliasList) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|path| resolve_path(record, path))
        .find(|value| !is_blank(value))
}

/// Scalar rendered as text; objects and arrays are skipped so the next alias can win.
pub fn text(record: &Map<String, Value>, aliases: AliasList) -> Option<String> {
    aliases
        .iter()
        .filter_map(|path| resolve_path(record, path))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

pub fn number(record: &Map<String, Value>, aliases: AliasList) -> Option<f64> {
    aliases
        .iter()
        .filter_map(|path| resolve_path(record, path))
        .find_map(as_f64)
}

pub fn flag(record: &Map<String, Value>, aliases: AliasList) -> bool {
    match lookup(record, aliases) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        Some(Value::Number(n)) => n.as_i64().map(|v| v != 0).unwrap_or(false),
        _ => false,
    }
}

/// Numbers arrive both as JSON numbers and as decimal strings ("5000.00").
pub fn as_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_flat_field_wins_over_nested() {
        let record = obj(json!({
            "vehicle_number": "GLT-101",
            "transport": { "vehicle_number": "GLT-999" }
        }));
        assert_eq!(text(&record, ticket::VEHICLE_NUMBER).as_deref(), Some("GLT-101"));
    }

    #[test]
    fn test_nested_field_used_when_flat_missing() {
        let record = obj(json!({
            "vehicle_number": "",
            "transport": { "vehicle_number": "GLT-999", "arrival_date": "2025-03-09" }
        }));
        assert_eq!(text(&record, ticket::VEHICLE_NUMBER).as_deref(), Some("GLT-999"));
        assert_eq!(text(&record, ticket::ARRIVAL_DATE).as_deref(), Some("2025-03-09"));
    }

    #[test]
    fn test_numeric_strings_and_ids() {
        let record = obj(json!({ "id": 42, "price_per_seat": "1500.50" }));
        assert_eq!(text(&record, ticket::ID).as_deref(), Some("42"));
        assert_eq!(number(&record, ticket::PRICE_PER_SEAT), Some(1500.5));
    }

    #[test]
    fn test_object_valued_alias_falls_through() {
        let record = obj(json!({ "vehicle": { "id": 3 }, "transport_id": 9 }));
        assert_eq!(text(&record, ticket::VEHICLE_ID).as_deref(), Some("9"));
    }

    #[test]
    fn test_flags() {
        let record = obj(json!({ "is_full_vehicle": "true", "is_cash_payment": 0 }));
        assert!(flag(&record, common::FULL_VEHICLE_FLAG));
        assert!(!flag(&record, common::CASH_PAYMENT_FLAG));
        assert!(!flag(&record, common::MANUAL_PAYMENT_FLAG));
    }
}
