//! Payment redirect callback
//!
//! The customer lands here when the bank flow redirects back to us. The
//! query string is unauthenticated, so the claimed status is only ever
//! logged; the engine verifies against the provider before touching
//! state. This route always redirects; errors become a coarse outcome
//! code on the result page, never a rendered failure.

use axum::extract::{Query, State};
use axum::response::Redirect;
use serde::Deserialize;

use paylane_types::Provider;

use crate::state::AppState;

/// Query parameters the bank provider appends to the redirect
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(rename = "externalId")]
    pub external_id: String,
    /// Claimed outcome; untrusted
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "externalReference", default)]
    pub external_reference: Option<String>,
}

/// GET /payments/callback
pub async fn payment_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    tracing::debug!(
        external_id = %params.external_id,
        claimed_status = params.status.as_deref().unwrap_or("-"),
        "payment callback received"
    );

    let outcome = state
        .reconciler
        .reconcile_callback(Provider::Stitch, &params.external_id)
        .await;

    // Only a truncated reference reaches the browser.
    let display_ref: String = params
        .external_reference
        .as_deref()
        .unwrap_or(&params.external_id)
        .chars()
        .take(8)
        .collect();

    Redirect::to(&format!(
        "{}?status={}&ref={}",
        state.config.callback_result_url,
        outcome.as_str(),
        display_ref
    ))
}
