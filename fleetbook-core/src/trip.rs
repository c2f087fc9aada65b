use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::time::{format_date, format_time, parse_date, parse_time};
use crate::{CoreError, CoreResult};

/// A specific (vehicle, date, time) on which seats can be sold
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripIdentity {
    pub vehicle_id: String,
    pub arrival_date: NaiveDate,
    pub arrival_time: NaiveTime,
}

impl TripIdentity {
    pub fn new(vehicle_id: &str, arrival_date: &str, arrival_time: &str) -> CoreResult<Self> {
        let vehicle_id = vehicle_id.trim();
        if vehicle_id.is_empty() {
            return Err(CoreError::ValidationError("vehicle id is required".to_string()));
        }
        let date = parse_date(arrival_date)
            .ok_or_else(|| CoreError::ValidationError(format!("unreadable arrival date '{}'", arrival_date)))?;
        let time = parse_time(arrival_time)
            .ok_or_else(|| CoreError::ValidationError(format!("unreadable arrival time '{}'", arrival_time)))?;

        Ok(Self {
            vehicle_id: vehicle_id.to_string(),
            arrival_date: date,
            arrival_time: time,
        })
    }

    pub fn date_param(&self) -> String {
        format_date(&self.arrival_date)
    }

    pub fn time_param(&self) -> String {
        format_time(&self.arrival_time)
    }

    /// Query pairs for the holds service, in canonical form
    pub fn query_pairs(&self) -> [(&'static str, String); 3] {
        [
            ("vehicle_id", self.vehicle_id.clone()),
            ("arrival_date", self.date_param()),
            ("arrival_time", self.time_param()),
        ]
    }
}

impl fmt::Display for TripIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} {}", self.vehicle_id, self.date_param(), self.time_param())
    }
}
