//! Webhook security tests
//!
//! Signature fixtures for both providers, driven through the same
//! verifier the webhook handlers use.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

use paylane_recon::{ReconError, SignatureVerifier, WebhookSecret};
use paylane_types::Provider;

/// Generate a valid Paystack webhook signature for testing
fn paystack_signature(payload: &[u8], secret: &str) -> String {
    let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Generate a valid Stitch webhook signature for testing
fn stitch_signature(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signed_payload = format!("{}.{}", timestamp, std::str::from_utf8(payload).unwrap());

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(signed_payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    format!("t={timestamp},hmac_sha256={signature}")
}

fn verifier() -> SignatureVerifier {
    SignatureVerifier::new(
        WebhookSecret::Key("sk_test_paystack".into()),
        WebhookSecret::Key("whsec_test_stitch".into()),
    )
}

fn paystack_payload(event: &str) -> Vec<u8> {
    let payload = serde_json::json!({
        "event": event,
        "data": {
            "reference": "ps_ref_123",
            "gateway_response": "Successful"
        }
    });
    serde_json::to_vec(&payload).unwrap()
}

fn stitch_payload(event_type: &str) -> Vec<u8> {
    let payload = serde_json::json!({
        "eventType": event_type,
        "resource": {
            "id": "st_ref_123"
        }
    });
    serde_json::to_vec(&payload).unwrap()
}

#[test]
fn paystack_valid_signature_accepted() {
    let body = paystack_payload("charge.success");
    let signature = paystack_signature(&body, "sk_test_paystack");

    assert!(verifier()
        .verify(Provider::Paystack, &body, Some(&signature))
        .is_ok());
}

#[test]
fn paystack_wrong_secret_rejected() {
    let body = paystack_payload("charge.success");
    let signature = paystack_signature(&body, "sk_wrong_secret");

    let err = verifier()
        .verify(Provider::Paystack, &body, Some(&signature))
        .unwrap_err();
    assert!(matches!(err, ReconError::AuthFailure));
}

#[test]
fn paystack_tampered_amount_rejected() {
    let body = paystack_payload("charge.success");
    let signature = paystack_signature(&body, "sk_test_paystack");

    let mut tampered = body.clone();
    tampered.extend_from_slice(b" ");

    let err = verifier()
        .verify(Provider::Paystack, &tampered, Some(&signature))
        .unwrap_err();
    assert!(matches!(err, ReconError::AuthFailure));
}

#[test]
fn stitch_valid_signature_accepted() {
    let body = stitch_payload("PaymentInitiationRequestCompleted");
    let signature = stitch_signature(&body, "whsec_test_stitch", Utc::now().timestamp());

    assert!(verifier()
        .verify(Provider::Stitch, &body, Some(&signature))
        .is_ok());
}

#[test]
fn stitch_replayed_signature_rejected() {
    // A captured signature from 10 minutes ago fails the freshness check
    // even though the HMAC itself still matches.
    let body = stitch_payload("PaymentInitiationRequestCompleted");
    let signature =
        stitch_signature(&body, "whsec_test_stitch", Utc::now().timestamp() - 600);

    let err = verifier()
        .verify(Provider::Stitch, &body, Some(&signature))
        .unwrap_err();
    assert!(matches!(err, ReconError::AuthFailure));
}

#[test]
fn stitch_malformed_header_rejected() {
    let body = stitch_payload("PaymentInitiationRequestCompleted");

    for header in ["", "garbage", "t=123", "hmac_sha256=abc"] {
        let err = verifier()
            .verify(Provider::Stitch, &body, Some(header))
            .unwrap_err();
        assert!(matches!(err, ReconError::AuthFailure), "header: {header}");
    }
}

#[test]
fn missing_header_with_configured_secret_rejected() {
    let body = paystack_payload("charge.success");
    let err = verifier()
        .verify(Provider::Paystack, &body, None)
        .unwrap_err();
    assert!(matches!(err, ReconError::AuthFailure));

    let body = stitch_payload("DisbursementCompleted");
    let err = verifier().verify(Provider::Stitch, &body, None).unwrap_err();
    assert!(matches!(err, ReconError::AuthFailure));
}

#[test]
fn disabled_secrets_accept_unsigned_deliveries() {
    let insecure = SignatureVerifier::new(WebhookSecret::Disabled, WebhookSecret::Disabled);

    assert!(insecure
        .verify(Provider::Paystack, &paystack_payload("charge.success"), None)
        .is_ok());
    assert!(insecure
        .verify(Provider::Stitch, &stitch_payload("DisbursementError"), None)
        .is_ok());
}

#[test]
fn signature_covers_the_exact_bytes() {
    // Re-serializing JSON can reorder keys; the verifier must work on the
    // raw bytes the provider sent, so two bodies with identical meaning
    // but different bytes have different signatures.
    let a = br#"{"event":"charge.success","data":{"reference":"r"}}"#;
    let b = br#"{"data":{"reference":"r"},"event":"charge.success"}"#;

    assert_ne!(
        paystack_signature(a, "sk_test_paystack"),
        paystack_signature(b, "sk_test_paystack")
    );
}
