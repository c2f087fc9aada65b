pub mod models;
pub mod pii;

pub use models::booking::{
    Booking, BookingCategory, BookingStatus, CategorySignals, DurationUnit, PaymentProofRecord,
    PaymentStatus, PaymentType, Provenance, RentalDuration, RentalWindow, TripHints,
};
pub use pii::Masked;
