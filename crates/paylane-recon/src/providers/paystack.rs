//! Paystack API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, instrument, warn};

use crate::error::ReconError;
use crate::providers::{CardApi, ProviderPaymentStatus};

const PAYSTACK_API_BASE: &str = "https://api.paystack.co";

/// Paystack API client
#[derive(Clone)]
pub struct PaystackClient {
    client: Client,
    secret_key: String,
    base_url: String,
    timeout: Duration,
}

impl PaystackClient {
    /// Create a new client with the given request timeout
    pub fn new(secret_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            secret_key: secret_key.into(),
            base_url: PAYSTACK_API_BASE.to_string(),
            timeout,
        }
    }

    /// Point the client at a different API base (tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_transaction(&self, reference: &str) -> Result<ProviderPaymentStatus, ReconError> {
        let url = format!("{}/transaction/verify/{reference}", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "paystack verify request failed");
                ReconError::ProviderVerification(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(status = %status, "paystack verify returned an error");
            return Err(ReconError::ProviderVerification(format!(
                "paystack returned {status}"
            )));
        }

        let body: PaystackVerifyResponse = response.json().await.map_err(|e| {
            error!(error = %e, "failed to parse paystack verify response");
            ReconError::ProviderVerification(e.to_string())
        })?;

        debug!(reference, status = %body.data.status, "paystack transaction verified");
        Ok(match body.data.status.as_str() {
            "success" => ProviderPaymentStatus::Completed,
            "failed" => ProviderPaymentStatus::Failed,
            "abandoned" | "reversed" => ProviderPaymentStatus::Cancelled,
            _ => ProviderPaymentStatus::Pending,
        })
    }
}

#[async_trait]
impl CardApi for PaystackClient {
    #[instrument(skip(self))]
    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<ProviderPaymentStatus, ReconError> {
        // Single retry; beyond that the provider's webhook retry loop is
        // the system's retry mechanism.
        match self.fetch_transaction(reference).await {
            Err(e) if e.is_retryable() => {
                warn!(reference, error = %e, "retrying paystack verification once");
                self.fetch_transaction(reference).await
            }
            other => other,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PaystackVerifyResponse {
    data: PaystackTransaction,
}

#[derive(Debug, Deserialize)]
struct PaystackTransaction {
    status: String,
}
