//! Provider webhook handlers
//!
//! The raw body bytes feed the HMAC, so these routes must never go
//! through JSON extraction. Anything already-handled (duplicate, stale,
//! unknown event) acknowledges with 200, since providers retry on
//! everything else.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use paylane_recon::normalize;
use paylane_types::Provider;

use crate::error::ApiResult;
use crate::state::AppState;

/// Acknowledgement body returned on acceptance
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    pub outcome: &'static str,
}

/// POST /webhooks/paystack
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    handle_webhook(state, Provider::Paystack, "x-paystack-signature", headers, body).await
}

/// POST /webhooks/stitch
pub async fn stitch_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    handle_webhook(state, Provider::Stitch, "x-stitch-signature", headers, body).await
}

async fn handle_webhook(
    state: AppState,
    provider: Provider,
    signature_header: &str,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let start = Instant::now();

    let signature = headers
        .get(signature_header)
        .and_then(|value| value.to_str().ok());

    state.verifier.verify(provider, &body, signature)?;
    let event = normalize(provider, &body)?;
    let outcome = state.reconciler.process_webhook(event).await;

    let result = if outcome.is_ok() { "ok" } else { "err" };
    metrics::counter!(
        "recon_webhooks_processed_total",
        "provider" => provider.as_str(),
        "result" => result
    )
    .increment(1);
    metrics::histogram!(
        "recon_webhook_duration_seconds",
        "provider" => provider.as_str()
    )
    .record(start.elapsed().as_secs_f64());

    let outcome = outcome?;
    Ok(Json(WebhookAck {
        status: "ok",
        outcome: outcome.as_str(),
    }))
}
