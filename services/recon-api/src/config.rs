//! Configuration for the Reconciliation API service.

use std::time::Duration;

use paylane_recon::{ReconConfig, WebhookSecret};

/// Reconciliation API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Database URL
    pub database_url: String,
    /// Paystack API secret key
    pub paystack_secret_key: String,
    /// Paystack webhook signing secret
    pub paystack_webhook_secret: WebhookSecret,
    /// Stitch API key
    pub stitch_api_key: String,
    /// Stitch webhook signing secret
    pub stitch_webhook_secret: WebhookSecret,
    /// Engine configuration (commission, billing period)
    pub recon: ReconConfig,
    /// Where the payment callback redirects the customer
    pub callback_result_url: String,
    /// Timeout for outbound provider calls
    pub provider_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Database
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        // Server port
        let http_port = std::env::var("HTTP_PORT")
            .unwrap_or_else(|_| "8082".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("HTTP_PORT"))?;

        // Provider credentials
        let paystack_secret_key = std::env::var("PAYSTACK_SECRET_KEY")
            .map_err(|_| ConfigError::Missing("PAYSTACK_SECRET_KEY"))?;
        let stitch_api_key =
            std::env::var("STITCH_API_KEY").map_err(|_| ConfigError::Missing("STITCH_API_KEY"))?;

        // Unsigned webhooks are a local-development concession and must
        // be asked for twice: the secret absent AND the explicit flag.
        let allow_unsigned = std::env::var("ALLOW_UNSIGNED_WEBHOOKS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let paystack_webhook_secret =
            webhook_secret("PAYSTACK_WEBHOOK_SECRET", allow_unsigned)?;
        let stitch_webhook_secret = webhook_secret("STITCH_WEBHOOK_SECRET", allow_unsigned)?;

        // Commission
        let commission_bps: u16 = std::env::var("COMMISSION_BPS")
            .unwrap_or_else(|_| "500".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("COMMISSION_BPS"))?;
        if commission_bps > 10_000 {
            return Err(ConfigError::Invalid("COMMISSION_BPS"));
        }

        // Redirect target for the payment callback
        let callback_result_url = std::env::var("CALLBACK_RESULT_URL")
            .unwrap_or_else(|_| "https://app.paylane.example/payments/result".to_string());

        // Timeouts
        let provider_timeout_secs: u64 = std::env::var("PROVIDER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("PROVIDER_TIMEOUT_SECS"))?;
        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("REQUEST_TIMEOUT_SECS"))?;

        // Metrics
        let metrics_enabled = std::env::var("METRICS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        Ok(Self {
            http_port,
            database_url,
            paystack_secret_key,
            paystack_webhook_secret,
            stitch_api_key,
            stitch_webhook_secret,
            recon: ReconConfig::new(commission_bps),
            callback_result_url,
            provider_timeout: Duration::from_secs(provider_timeout_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled,
        })
    }
}

fn webhook_secret(var: &'static str, allow_unsigned: bool) -> Result<WebhookSecret, ConfigError> {
    match std::env::var(var) {
        Ok(secret) => Ok(WebhookSecret::Key(secret)),
        Err(_) if allow_unsigned => {
            tracing::warn!(var, "webhook secret not set; signature verification DISABLED");
            Ok(WebhookSecret::Disabled)
        }
        Err(_) => Err(ConfigError::Missing(var)),
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
