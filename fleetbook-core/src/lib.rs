pub mod context;
pub mod payment;
pub mod repository;
pub mod time;
pub mod trip;

pub use context::{CallContext, CredentialProvider, StaticCredential};
pub use payment::StatusUpdate;
pub use trip::TripIdentity;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Malformed {origin} record: {reason}")]
    MalformedRecord { origin: &'static str, reason: String },
    #[error("Source unavailable ({origin}): {reason}")]
    SourceUnavailable { origin: String, reason: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Availability query failed for {trip}: {reason}")]
    AvailabilityQueryFailed { trip: String, reason: String },
    #[error("Credential expired or rejected")]
    AuthExpired,
    #[error("Transition rejected for {booking_ref}: {detail}")]
    TransitionRejected { booking_ref: String, detail: String },
    #[error("Transition already in flight for {0}")]
    TransitionInFlight(String),
    #[error("Confirming {0} while unpaid requires operator confirmation")]
    ConfirmationRequired(String),
    #[error("Ambiguous reconciliation for {booking_ref}: {candidates} candidate proofs")]
    ReconciliationAmbiguous { booking_ref: String, candidates: usize },
    #[error("Request cancelled")]
    Cancelled,
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl CoreError {
    /// Cycle-level failures abort a refresh instead of degrading it.
    pub fn aborts_cycle(&self) -> bool {
        matches!(self, CoreError::AuthExpired | CoreError::Cancelled)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
