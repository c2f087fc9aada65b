pub mod aliases;
pub mod availability;
pub mod classifier;
pub mod inventory;
pub mod normalizer;

pub use availability::{AvailabilityCalculator, AvailabilityRequest};
pub use classifier::{ClassificationRule, Classifier};
pub use inventory::{AvailabilityResult, SeatHold};
pub use normalizer::{Normalizer, RecordKind};
