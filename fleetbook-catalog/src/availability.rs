use std::sync::Arc;

use fleetbook_core::repository::HoldsService;
use fleetbook_core::{CallContext, CoreError, CoreResult, TripIdentity};
use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::inventory::{seat_set, AvailabilityResult, SeatHold};

/// One trip instance to price, with the vehicle facts known locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityRequest {
    pub trip: TripIdentity,
    pub capacity: u32,
    pub owner_reserved: Vec<String>,
}

/// Combines owner-reserved seats with live customer holds.
pub struct AvailabilityCalculator {
    holds: Arc<dyn HoldsService>,
    concurrency: usize,
}

impl AvailabilityCalculator {
    pub fn new(holds: Arc<dyn HoldsService>, concurrency: usize) -> Self {
        Self {
            holds,
            concurrency: concurrency.max(1),
        }
    }

    /// Per-trip failures degrade the result; only auth and cancellation propagate.
    pub async fn available_seats(
        &self,
        ctx: &CallContext,
        trip: &TripIdentity,
        capacity: u32,
        owner_reserved: &[String],
    ) -> CoreResult<AvailabilityResult> {
        let held = match self.holds.held_seats(ctx, trip).await {
            Ok(seats) => seats,
            // No record of the trip means nobody holds a seat yet.
            Err(CoreError::NotFound(_)) => Vec::new(),
            Err(err) if err.aborts_cycle() => return Err(err),
            Err(err) => {
                let failure = CoreError::AvailabilityQueryFailed {
                    trip: trip.to_string(),
                    reason: err.to_string(),
                };
                warn!(%trip, error = %failure, "Holds query failed, reporting capacity");
                return Ok(AvailabilityResult::degraded(
                    trip.clone(),
                    capacity,
                    &seat_set(owner_reserved),
                    failure.to_string(),
                ));
            }
        };

        let hold = SeatHold::new(owner_reserved, &held);
        let result = AvailabilityResult::confirmed(trip.clone(), capacity, &hold);
        debug!(%trip, capacity, available = result.available, "Availability computed");
        Ok(result)
    }

    /// Bounded fan-out over many trips. Results come back in request order.
    pub async fn fan_out(
        &self,
        ctx: &CallContext,
        requests: Vec<AvailabilityRequest>,
    ) -> CoreResult<Vec<AvailabilityResult>> {
        let mut indexed: Vec<(usize, CoreResult<AvailabilityResult>)> = stream::iter(requests.into_iter().enumerate())
            .map(|(index, request)| async move {
                let result = self
                    .available_seats(ctx, &request.trip, request.capacity, &request.owner_reserved)
                    .await;
                (index, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, result)| result).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio_util::sync::CancellationToken;

    struct FakeHolds {
        by_vehicle: HashMap<String, CoreResult<Vec<String>>>,
    }

    #[async_trait]
    impl HoldsService for FakeHolds {
        async fn held_seats(&self, _ctx: &CallContext, trip: &TripIdentity) -> CoreResult<Vec<String>> {
            self.by_vehicle
                .get(&trip.vehicle_id)
                .cloned()
                .unwrap_or_else(|| Err(CoreError::NotFound(trip.to_string())))
        }
    }

    fn calculator(entries: Vec<(&str, CoreResult<Vec<String>>)>) -> AvailabilityCalculator {
        let by_vehicle = entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        AvailabilityCalculator::new(Arc::new(FakeHolds { by_vehicle }), 4)
    }

    fn ctx() -> CallContext {
        CallContext::new("token".into(), CancellationToken::new())
    }

    fn trip(vehicle: &str) -> TripIdentity {
        TripIdentity::new(vehicle, "2025-03-09", "14:30").unwrap()
    }

    fn seats(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_union_of_owner_and_customer_holds() {
        let calc = calculator(vec![("7", Ok(seats(&["2", "3", "4"])))]);
        let result = calc.available_seats(&ctx(), &trip("7"), 40, &seats(&["1", "2"])).await.unwrap();
        assert_eq!(result.available, 36);
        assert!(!result.degraded);
    }

    #[tokio::test]
    async fn test_not_found_means_no_holds() {
        let calc = calculator(vec![]);
        let result = calc.available_seats(&ctx(), &trip("9"), 40, &[]).await.unwrap();
        assert!(result.customer_held.is_empty());
        assert!(!result.degraded);
        assert_eq!(result.available, 40);
    }

    #[tokio::test]
    async fn test_query_failure_degrades_to_capacity() {
        let failure = Err(CoreError::SourceUnavailable {
            origin: "holds".to_string(),
            reason: "HTTP 500".to_string(),
        });
        let calc = calculator(vec![("7", failure)]);
        let result = calc.available_seats(&ctx(), &trip("7"), 30, &seats(&["1"])).await.unwrap();
        assert!(result.degraded);
        assert_eq!(result.available, 30);
        assert!(result.reason.unwrap().contains("HTTP 500"));
    }

    #[tokio::test]
    async fn test_auth_expired_propagates() {
        let calc = calculator(vec![("7", Err(CoreError::AuthExpired))]);
        let err = calc.available_seats(&ctx(), &trip("7"), 30, &[]).await.unwrap_err();
        assert_eq!(err, CoreError::AuthExpired);
    }

    #[tokio::test]
    async fn test_fan_out_keeps_request_order() {
        let calc = calculator(vec![
            ("1", Ok(seats(&["1"]))),
            ("2", Ok(seats(&["1", "2"]))),
            ("3", Err(CoreError::SourceUnavailable { origin: "holds".into(), reason: "timeout".into() })),
        ]);
        let requests = ["1", "2", "3", "4"]
            .iter()
            .map(|v| AvailabilityRequest { trip: trip(v), capacity: 10, owner_reserved: Vec::new() })
            .collect();

        let results = calc.fan_out(&ctx(), requests).await.unwrap();
        let available: Vec<u32> = results.iter().map(|r| r.available).collect();
        assert_eq!(available, vec![9, 8, 10, 10]);
        assert!(results[2].degraded);
        assert!(!results[3].degraded);
    }
}
