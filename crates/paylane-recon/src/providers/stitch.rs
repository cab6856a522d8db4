//! Stitch API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use paylane_types::DisbursementStatus;

use crate::error::ReconError;
use crate::providers::{BankApi, DisbursementReceipt, DisbursementRequest, ProviderPaymentStatus};

const STITCH_API_BASE: &str = "https://api.stitch.money";

/// Stitch API client
#[derive(Clone)]
pub struct StitchClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl StitchClient {
    /// Create a new client with the given request timeout
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: STITCH_API_BASE.to_string(),
            timeout,
        }
    }

    /// Point the client at a different API base (tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_payment(&self, provider_ref: &str) -> Result<ProviderPaymentStatus, ReconError> {
        let url = format!("{}/payments/{provider_ref}", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "stitch payment status request failed");
                ReconError::ProviderVerification(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(status = %status, "stitch payment status returned an error");
            return Err(ReconError::ProviderVerification(format!(
                "stitch returned {status}"
            )));
        }

        let body: StitchPayment = response.json().await.map_err(|e| {
            error!(error = %e, "failed to parse stitch payment response");
            ReconError::ProviderVerification(e.to_string())
        })?;

        debug!(provider_ref, status = %body.status, "stitch payment status fetched");
        Ok(match body.status.to_ascii_lowercase().as_str() {
            "completed" => ProviderPaymentStatus::Completed,
            "failed" => ProviderPaymentStatus::Failed,
            "cancelled" => ProviderPaymentStatus::Cancelled,
            _ => ProviderPaymentStatus::Pending,
        })
    }
}

#[async_trait]
impl BankApi for StitchClient {
    #[instrument(skip(self))]
    async fn payment_status(
        &self,
        provider_ref: &str,
    ) -> Result<ProviderPaymentStatus, ReconError> {
        match self.fetch_payment(provider_ref).await {
            Err(e) if e.is_retryable() => {
                warn!(provider_ref, error = %e, "retrying stitch verification once");
                self.fetch_payment(provider_ref).await
            }
            other => other,
        }
    }

    #[instrument(skip(self, request), fields(payment_ref = %request.payment_ref))]
    async fn create_disbursement(
        &self,
        request: DisbursementRequest,
    ) -> Result<DisbursementReceipt, ReconError> {
        let url = format!("{}/disbursements", self.base_url);
        let body = StitchDisbursementBody {
            amount: request.amount,
            bank_code: &request.bank_code,
            account_number: &request.account_number,
            account_name: &request.account_name,
            account_type: request.account_type.as_str(),
            payment_ref: &request.payment_ref,
        };

        // The provider deduplicates on the idempotency key, so a crashed
        // submission retried by ops cannot pay out twice.
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", &request.idempotency_ref)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "stitch disbursement request failed");
                ReconError::SideEffect(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "stitch disbursement rejected");
            return Err(ReconError::SideEffect(format!("stitch returned {status}")));
        }

        let receipt: StitchDisbursement = response.json().await.map_err(|e| {
            error!(error = %e, "failed to parse stitch disbursement response");
            ReconError::SideEffect(e.to_string())
        })?;

        let status = receipt
            .status
            .to_ascii_lowercase()
            .parse()
            .unwrap_or(DisbursementStatus::Submitted);

        Ok(DisbursementReceipt {
            provider_ref: receipt.id,
            status,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StitchDisbursementBody<'a> {
    amount: i64,
    bank_code: &'a str,
    account_number: &'a str,
    account_name: &'a str,
    account_type: &'a str,
    payment_ref: &'a str,
}

#[derive(Debug, Deserialize)]
struct StitchPayment {
    status: String,
}

#[derive(Debug, Deserialize)]
struct StitchDisbursement {
    id: String,
    status: String,
}
