use fleetbook_shared::{BookingStatus, PaymentStatus};
use serde::{Deserialize, Serialize};

/// Body of the remote status-update call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusUpdate {
    pub booking_status: BookingStatus,
    pub new_payment_status: PaymentStatus,
}

impl StatusUpdate {
    pub fn new(booking_status: BookingStatus, new_payment_status: PaymentStatus) -> Self {
        Self { booking_status, new_payment_status }
    }

    /// Confirming a booking nobody has paid for unlocks ticket issuance early.
    pub fn confirms_unpaid(&self) -> bool {
        self.booking_status == BookingStatus::Confirmed
            && self.new_payment_status == PaymentStatus::Unpaid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_update_wire_shape() {
        let update = StatusUpdate::new(BookingStatus::Confirmed, PaymentStatus::Paid);
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["booking_status"], "CONFIRMED");
        assert_eq!(json["new_payment_status"], "PAID");
    }

    #[test]
    fn test_confirms_unpaid() {
        assert!(StatusUpdate::new(BookingStatus::Confirmed, PaymentStatus::Unpaid).confirms_unpaid());
        assert!(!StatusUpdate::new(BookingStatus::Confirmed, PaymentStatus::Paid).confirms_unpaid());
        assert!(!StatusUpdate::new(BookingStatus::Reserved, PaymentStatus::Unpaid).confirms_unpaid());
    }
}
