use std::time::Duration;

use async_trait::async_trait;
use fleetbook_core::repository::{HoldsService, ProofSource, StatusUpdater, TicketSource};
use fleetbook_core::{CallContext, CoreError, CoreResult, StatusUpdate, TripIdentity};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use crate::app_config::BackendConfig;
use crate::envelope;

const MAX_ERROR_BODY: usize = 200;

/// HTTP client for the remote booking backend. Every call carries the
/// context's bearer credential and is raced against its cancellation token.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    config: BackendConfig,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> CoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)))
            .build()
            .map_err(|e| CoreError::SourceUnavailable {
                origin: "http client".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn status_url(&self, booking_ref: &str) -> CoreResult<Url> {
        let rejected = |detail: String| CoreError::TransitionRejected {
            booking_ref: booking_ref.to_string(),
            detail,
        };
        let mut url = Url::parse(&self.config.base_url).map_err(|e| rejected(format!("Invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| rejected("Base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(self.config.status_segments(booking_ref));
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder, ctx: &CallContext) -> RequestBuilder {
        request.bearer_auth(ctx.credential.expose())
    }

    async fn send(&self, ctx: &CallContext, origin: &str, request: RequestBuilder) -> CoreResult<Value> {
        let request = self.authorized(request, ctx);
        ctx.guard(async {
            let response = request.send().await.map_err(|e| CoreError::SourceUnavailable {
                origin: origin.to_string(),
                reason: e.to_string(),
            })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(error_for(origin, status, &body));
            }

            // Some endpoints answer 204 or an empty 200.
            let bytes = response.bytes().await.map_err(|e| CoreError::SourceUnavailable {
                origin: origin.to_string(),
                reason: e.to_string(),
            })?;
            if bytes.is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_slice(&bytes).map_err(|e| CoreError::SourceUnavailable {
                origin: origin.to_string(),
                reason: format!("invalid JSON: {}", e),
            })
        })
        .await
    }

    async fn get_list(&self, ctx: &CallContext, origin: &str, path: &str) -> CoreResult<Vec<Value>> {
        let body = self.send(ctx, origin, self.client.get(self.url(path))).await?;
        let records = envelope::unwrap_list(origin, body)?;
        debug!(origin, count = records.len(), "Fetched records");
        Ok(records)
    }
}

fn error_for(origin: &str, status: StatusCode, body: &str) -> CoreError {
    match status {
        StatusCode::UNAUTHORIZED => CoreError::AuthExpired,
        StatusCode::NOT_FOUND => CoreError::NotFound(origin.to_string()),
        status => CoreError::SourceUnavailable {
            origin: origin.to_string(),
            reason: format!("HTTP {}: {}", status.as_u16(), truncate(body)),
        },
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

/// Human-readable reason from a rejected update: `detail`, `error` or `message`, else the raw body.
fn rejection_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["detail", "error", "message"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| truncate(body).to_string())
}

#[async_trait]
impl TicketSource for BackendClient {
    async fn fetch_tickets(&self, ctx: &CallContext) -> CoreResult<Vec<Value>> {
        self.get_list(ctx, "tickets", &self.config.tickets_path).await
    }
}

#[async_trait]
impl ProofSource for BackendClient {
    async fn fetch_proofs(&self, ctx: &CallContext) -> CoreResult<Vec<Value>> {
        self.get_list(ctx, "proofs", &self.config.proofs_path).await
    }
}

#[async_trait]
impl HoldsService for BackendClient {
    async fn held_seats(&self, ctx: &CallContext, trip: &TripIdentity) -> CoreResult<Vec<String>> {
        let request = self
            .client
            .get(self.url(&self.config.holds_path))
            .query(&trip.query_pairs());
        let body = self.send(ctx, "holds", request).await?;
        Ok(envelope::seat_labels(body))
    }
}

#[async_trait]
impl StatusUpdater for BackendClient {
    async fn update_status(&self, ctx: &CallContext, booking_ref: &str, update: &StatusUpdate) -> CoreResult<Value> {
        let url = self.status_url(booking_ref)?;
        let request = self.authorized(self.client.patch(url).json(update), ctx);

        ctx.guard(async {
            let response = request.send().await.map_err(|e| CoreError::TransitionRejected {
                booking_ref: booking_ref.to_string(),
                detail: e.to_string(),
            })?;

            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::UNAUTHORIZED {
                return Err(CoreError::AuthExpired);
            }
            if !status.is_success() {
                return Err(CoreError::TransitionRejected {
                    booking_ref: booking_ref.to_string(),
                    detail: format!("HTTP {}: {}", status.as_u16(), rejection_detail(&body)),
                });
            }
            Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert_eq!(error_for("tickets", StatusCode::UNAUTHORIZED, ""), CoreError::AuthExpired);
        assert_eq!(
            error_for("holds", StatusCode::NOT_FOUND, ""),
            CoreError::NotFound("holds".to_string())
        );
        assert!(matches!(
            error_for("proofs", StatusCode::BAD_GATEWAY, "upstream"),
            CoreError::SourceUnavailable { ref reason, .. } if reason == "HTTP 502: upstream"
        ));
    }

    #[test]
    fn test_rejection_detail() {
        assert_eq!(rejection_detail(r#"{"detail":"Invalid status"}"#), "Invalid status");
        assert_eq!(rejection_detail("plain text"), "plain text");
    }

    fn client(base_url: &str) -> BackendClient {
        BackendClient::new(BackendConfig {
            base_url: base_url.to_string(),
            tickets_path: "/checkout/admin/tickets/".to_string(),
            proofs_path: "/checkout/admin/manual-bookings/".to_string(),
            holds_path: "/checkout/bookings/".to_string(),
            status_path: "/checkout/admin/manual-bookings/{booking_ref}/status/".to_string(),
            media_base_url: None,
            request_timeout_seconds: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_status_url_encodes_reference_as_one_segment() {
        let backend = client("http://localhost:8000/api");
        assert_eq!(
            backend.status_url("a/b?c#d").unwrap().as_str(),
            "http://localhost:8000/api/checkout/admin/manual-bookings/a%2Fb%3Fc%23d/status/"
        );

        let trailing = client("http://localhost:8000/api/");
        assert_eq!(
            trailing.status_url("BK-1").unwrap().as_str(),
            "http://localhost:8000/api/checkout/admin/manual-bookings/BK-1/status/"
        );
    }

    #[test]
    fn test_truncate_long_bodies() {
        let body = "x".repeat(500);
        assert_eq!(truncate(&body).len(), MAX_ERROR_BODY);
    }
}
