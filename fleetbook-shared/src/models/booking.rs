use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::pii::Masked;

/// Default for absent free-text fields.
pub const NOT_AVAILABLE: &str = "N/A";
/// Default for absent names and locations.
pub const UNKNOWN: &str = "Unknown";

/// True when a normalized string field carries a default rather than source data.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case(NOT_AVAILABLE)
        || trimmed.eq_ignore_ascii_case(UNKNOWN)
}

/// Booking category, derived by the classifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingCategory {
    FullVehicle,
    Seat,
}

impl BookingCategory {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full_vehicle" | "fullvehicle" | "vehicle" => Some(Self::FullVehicle),
            "seat" => Some(Self::Seat),
            _ => None,
        }
    }
}

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Reserved,
    Booked,
    Confirmed,
    Cancelled,
    Expired,
    Failed,
    Unknown,
}

impl BookingStatus {
    /// Case-insensitive parse; anything unrecognised is `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "reserved" => Self::Reserved,
            "booked" => Self::Booked,
            "confirmed" => Self::Confirmed,
            "cancelled" | "canceled" => Self::Cancelled,
            "expired" => Self::Expired,
            "failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Wire label used by the remote status endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Reserved => "RESERVED",
            Self::Booked => "BOOKED",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
            Self::Failed => "FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Self::Unknown
    }
}

/// Payment status, independent from the booking status axis
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
    Unknown,
}

impl PaymentStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "unpaid" => Self::Unpaid,
            "paid" => Self::Paid,
            "refunded" => Self::Refunded,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "UNPAID",
            Self::Paid => "PAID",
            Self::Refunded => "REFUNDED",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Self::Unknown
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Cash,
    Online,
    Manual,
    Unknown,
}

impl PaymentType {
    /// Accepts the labels the ticket screens emit, e.g. "Manual (Advance)".
    pub fn parse(value: &str) -> Self {
        let lowered = value.trim().to_ascii_lowercase();
        if lowered == "cash" {
            Self::Cash
        } else if lowered == "online" || lowered == "card" {
            Self::Online
        } else if lowered.starts_with("manual") || lowered == "advance" {
            Self::Manual
        } else {
            Self::Unknown
        }
    }

    /// Proofs only ever attach to non-cash payments.
    pub fn accepts_proof(&self) -> bool {
        !matches!(self, Self::Cash)
    }
}

/// Provenance marker, not business data
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    TicketOnly,
    ProofOnly,
    Merged,
}

/// Raw signals the classifier reads, captured verbatim by the normalizer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategorySignals {
    pub ticket_type: Option<String>,
    pub offer_type: Option<String>,
    pub service_type: Option<String>,
    pub vehicle_type: Option<String>,
    pub full_vehicle_flag: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl DurationUnit {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hourly" | "hour" | "hours" => Some(Self::Hourly),
            "daily" | "day" | "days" => Some(Self::Daily),
            "weekly" | "week" | "weeks" => Some(Self::Weekly),
            "monthly" | "month" | "months" => Some(Self::Monthly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RentalDuration {
    pub unit: DurationUnit,
    pub value: u32,
}

/// Date range of a full-vehicle hire
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RentalWindow {
    pub departure_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub duration: Option<RentalDuration>,
}

/// Vehicle facts a ticket may carry about its trip instance
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TripHints {
    pub capacity: Option<u32>,
    pub owner_reserved: Vec<String>,
}

/// Secondary-source record: an off-platform payment with its evidence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentProofRecord {
    pub source_id: String,
    pub booking_ref_guess: Option<String>,
    pub passenger_name: Masked<String>,
    pub passenger_contact: String,
    pub vehicle_id: String,
    pub vehicle_number: String,
    pub route_from: String,
    pub route_to: String,
    pub arrival_date: String,
    pub arrival_time: String,
    pub seats: Vec<String>,
    pub screenshot_ref: Option<String>,
    pub amount: f64,
    pub booking_status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_type: PaymentType,
    pub signals: CategorySignals,
    pub rental: Option<RentalWindow>,
    pub created_at: Option<DateTime<Utc>>,
}

/// The canonical booking, one per real-world booking reference after reconciliation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: String,
    pub booking_ref: String,
    pub category: BookingCategory,
    pub vehicle_id: String,
    pub vehicle_number: String,
    pub route_from: String,
    pub route_to: String,
    pub arrival_date: String,
    pub arrival_time: String,
    pub passenger_name: Masked<String>,
    pub passenger_contact: String,
    pub seats: Vec<String>,
    pub amount: f64,
    pub booking_status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_type: PaymentType,
    pub proof: Option<PaymentProofRecord>,
    pub source: Provenance,
    pub signals: CategorySignals,
    pub rental: Option<RentalWindow>,
    pub hints: TripHints,
    pub created_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Vehicle identity used for grouping: the id when known, else the plate number.
    pub fn vehicle_key(&self) -> &str {
        if is_placeholder(&self.vehicle_id) {
            &self.vehicle_number
        } else {
            &self.vehicle_id
        }
    }

    pub fn has_ref(&self) -> bool {
        !self.booking_ref.trim().is_empty()
    }

    /// Apply a confirmed remote status change in place
    pub fn apply_status(&mut self, booking_status: BookingStatus, payment_status: PaymentStatus) {
        self.booking_status = booking_status;
        self.payment_status = payment_status;
        if let Some(proof) = self.proof.as_mut() {
            proof.booking_status = booking_status;
            proof.payment_status = payment_status;
        }
    }
}
