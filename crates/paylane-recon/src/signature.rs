//! Webhook signature verification
//!
//! Each provider signs deliveries its own way: Paystack sends an
//! HMAC-SHA512 of the raw body in `x-paystack-signature`; Stitch sends
//! `t=<unix>,hmac_sha256=<hex>` in `x-stitch-signature`, signing
//! `"{t}.{body}"`. Comparison is constant-time in both cases.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use tracing::warn;

use paylane_types::Provider;

use crate::error::ReconError;

/// Maximum age of a Stitch signature timestamp, in seconds
const SIGNATURE_MAX_AGE_SECS: i64 = 300;

/// A provider's webhook signing secret
#[derive(Clone)]
pub enum WebhookSecret {
    /// Deliveries must carry a matching signature
    Key(String),
    /// Verification is skipped. Only for local development; configuration
    /// loading refuses this unless explicitly opted in.
    Disabled,
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(_) => f.write_str("Key(<redacted>)"),
            Self::Disabled => f.write_str("Disabled"),
        }
    }
}

/// Verifies inbound webhook authenticity per provider
#[derive(Clone)]
pub struct SignatureVerifier {
    paystack: WebhookSecret,
    stitch: WebhookSecret,
}

impl SignatureVerifier {
    /// Create a verifier with the given provider secrets
    pub fn new(paystack: WebhookSecret, stitch: WebhookSecret) -> Self {
        Self { paystack, stitch }
    }

    /// Accept or reject a delivery.
    ///
    /// A configured secret with a missing header is a rejection, not a
    /// skip; only `WebhookSecret::Disabled` skips, loudly.
    pub fn verify(
        &self,
        provider: Provider,
        body: &[u8],
        header: Option<&str>,
    ) -> Result<(), ReconError> {
        let secret = match provider {
            Provider::Paystack => &self.paystack,
            Provider::Stitch => &self.stitch,
        };

        let key = match secret {
            WebhookSecret::Key(key) => key,
            WebhookSecret::Disabled => {
                warn!(%provider, "signature verification disabled; accepting unsigned delivery");
                return Ok(());
            }
        };

        let Some(header) = header else {
            warn!(%provider, "missing signature header");
            return Err(ReconError::AuthFailure);
        };

        match provider {
            Provider::Paystack => verify_paystack(key, body, header),
            Provider::Stitch => verify_stitch(key, body, header),
        }
    }
}

fn verify_paystack(key: &str, body: &[u8], header: &str) -> Result<(), ReconError> {
    let mut mac = Hmac::<Sha512>::new_from_slice(key.as_bytes())
        .map_err(|_| ReconError::AuthFailure)?;
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if constant_time_eq(header.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        warn!("paystack signature mismatch");
        Err(ReconError::AuthFailure)
    }
}

fn verify_stitch(key: &str, body: &[u8], header: &str) -> Result<(), ReconError> {
    // Header format: t=<unix>,hmac_sha256=<hex>
    let mut timestamp: Option<&str> = None;
    let mut signature: Option<&str> = None;

    for part in header.split(',') {
        if let Some((name, value)) = part.split_once('=') {
            match name {
                "t" => timestamp = Some(value),
                "hmac_sha256" => signature = Some(value),
                _ => {}
            }
        }
    }

    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        warn!("stitch signature header missing components");
        return Err(ReconError::AuthFailure);
    };

    let body = std::str::from_utf8(body)
        .map_err(|_| ReconError::MalformedPayload("body is not valid UTF-8".into()))?;
    let signed_payload = format!("{timestamp}.{body}");

    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
        .map_err(|_| ReconError::AuthFailure)?;
    mac.update(signed_payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if !constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
        warn!("stitch signature mismatch");
        return Err(ReconError::AuthFailure);
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| ReconError::AuthFailure)?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).abs() > SIGNATURE_MAX_AGE_SECS {
        warn!(timestamp = ts, "stitch signature timestamp outside tolerance");
        return Err(ReconError::AuthFailure);
    }

    Ok(())
}

/// Constant-time comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}
