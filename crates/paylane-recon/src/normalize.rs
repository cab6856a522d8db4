//! Event normalization
//!
//! Each provider has its own event vocabulary and payload shape. This
//! module is a pure mapping layer: raw bytes in, canonical `WebhookEvent`
//! out. Event names we don't recognize normalize to `EventKind::Ignored`;
//! providers retry on anything but acceptance, so unknown-but-harmless
//! deliveries must not error.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use paylane_types::Provider;

use crate::error::ReconError;

/// Canonical webhook event
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Provider that delivered the event
    pub provider: Provider,
    /// Raw provider event name, kept for the delivery ledger and logs
    pub event_type: String,
    /// What the event means to the state machines
    pub kind: EventKind,
    /// External reference of the subject entity
    pub reference: String,
    /// Provider-supplied failure/status reason
    pub reason: Option<String>,
    /// SHA-256 of the raw body; the delivery ledger key
    pub fingerprint: String,
    /// When we received the delivery
    pub received_at: DateTime<Utc>,
}

/// Normalized meaning of a provider event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A card charge settled; the reference may belong to a payment or to
    /// a subscription checkout
    ChargeSucceeded,
    /// The billing provider registered the recurring subscription
    SubscriptionStarted {
        /// Recurring billing code to store on the subscription
        subscription_code: String,
    },
    /// The subscription will not renew or was disabled
    SubscriptionCancelled,
    /// A renewal charge failed
    SubscriptionPastDue,
    /// EFT payment settled
    PaymentCompleted,
    /// EFT payment failed
    PaymentFailed,
    /// EFT payment cancelled
    PaymentCancelled,
    /// Payout reached the merchant account
    DisbursementCompleted,
    /// Payout failed at the provider
    DisbursementError,
    /// Payout on hold
    DisbursementPaused,
    /// Payout cancelled before completion
    DisbursementCancelled,
    /// Payout funds returned
    DisbursementReversed,
    /// Recognized delivery with no state to change
    Ignored,
}

/// Parse a raw provider payload into a canonical event
pub fn normalize(provider: Provider, body: &[u8]) -> Result<WebhookEvent, ReconError> {
    let fingerprint = hex::encode(Sha256::digest(body));
    match provider {
        Provider::Paystack => normalize_paystack(body, fingerprint),
        Provider::Stitch => normalize_stitch(body, fingerprint),
    }
}

// Paystack: {"event": "charge.success", "data": {...}}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope {
    event: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PaystackCharge {
    reference: String,
    gateway_response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaystackSubscriptionCreated {
    subscription_code: String,
    /// Reference of the checkout charge the subscription grew out of
    reference: String,
}

#[derive(Debug, Deserialize)]
struct PaystackSubscriptionLifecycle {
    subscription_code: String,
}

#[derive(Debug, Deserialize)]
struct PaystackInvoice {
    subscription: PaystackInvoiceSubscription,
}

#[derive(Debug, Deserialize)]
struct PaystackInvoiceSubscription {
    subscription_code: String,
}

fn normalize_paystack(body: &[u8], fingerprint: String) -> Result<WebhookEvent, ReconError> {
    let envelope: PaystackEnvelope = serde_json::from_slice(body)
        .map_err(|e| ReconError::MalformedPayload(e.to_string()))?;

    let (kind, reference, reason) = match envelope.event.as_str() {
        "charge.success" => {
            let charge: PaystackCharge = parse_data(envelope.data)?;
            (
                EventKind::ChargeSucceeded,
                charge.reference,
                charge.gateway_response,
            )
        }
        "subscription.create" => {
            let sub: PaystackSubscriptionCreated = parse_data(envelope.data)?;
            (
                EventKind::SubscriptionStarted {
                    subscription_code: sub.subscription_code,
                },
                sub.reference,
                None,
            )
        }
        "subscription.disable" | "subscription.not_renew" => {
            let sub: PaystackSubscriptionLifecycle = parse_data(envelope.data)?;
            (EventKind::SubscriptionCancelled, sub.subscription_code, None)
        }
        "invoice.payment_failed" => {
            let invoice: PaystackInvoice = parse_data(envelope.data)?;
            (
                EventKind::SubscriptionPastDue,
                invoice.subscription.subscription_code,
                None,
            )
        }
        _ => (EventKind::Ignored, String::new(), None),
    };

    Ok(WebhookEvent {
        provider: Provider::Paystack,
        event_type: envelope.event,
        kind,
        reference,
        reason,
        fingerprint,
        received_at: Utc::now(),
    })
}

// Stitch: {"eventType": "PaymentInitiationRequestCompleted", "resource": {...}}

#[derive(Debug, Deserialize)]
struct StitchEnvelope {
    #[serde(rename = "eventType")]
    event_type: String,
    resource: StitchResource,
}

#[derive(Debug, Deserialize)]
struct StitchResource {
    id: String,
    #[serde(rename = "failureReason")]
    failure_reason: Option<String>,
}

fn normalize_stitch(body: &[u8], fingerprint: String) -> Result<WebhookEvent, ReconError> {
    let envelope: StitchEnvelope = serde_json::from_slice(body)
        .map_err(|e| ReconError::MalformedPayload(e.to_string()))?;

    let kind = match envelope.event_type.as_str() {
        "PaymentInitiationRequestCompleted" => EventKind::PaymentCompleted,
        "PaymentInitiationRequestFailed" => EventKind::PaymentFailed,
        "PaymentInitiationRequestCancelled" => EventKind::PaymentCancelled,
        "DisbursementCompleted" => EventKind::DisbursementCompleted,
        "DisbursementError" => EventKind::DisbursementError,
        "DisbursementPaused" => EventKind::DisbursementPaused,
        "DisbursementCancelled" => EventKind::DisbursementCancelled,
        "DisbursementReversed" => EventKind::DisbursementReversed,
        _ => EventKind::Ignored,
    };

    Ok(WebhookEvent {
        provider: Provider::Stitch,
        event_type: envelope.event_type,
        kind,
        reference: envelope.resource.id,
        reason: envelope.resource.failure_reason,
        fingerprint,
        received_at: Utc::now(),
    })
}

fn parse_data<T: serde::de::DeserializeOwned>(data: serde_json::Value) -> Result<T, ReconError> {
    serde_json::from_value(data).map_err(|e| ReconError::MalformedPayload(e.to_string()))
}
