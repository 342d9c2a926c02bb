use axum::{extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse, Json};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{info, warn};

use crate::services::checkout_fulfillment::CheckoutCompleted;
use crate::{errors::ServiceError, AppState};

type HmacSha256 = Hmac<Sha256>;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

// POST /api/v1/payments/webhook
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted"),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    if let Some(secret) = state.config.payment_webhook_secret.as_deref() {
        if !verify_signature(&headers, &payload, secret, state.config.webhook_tolerance_secs()) {
            warn!("Payment webhook signature verification failed");
            return Err(ServiceError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }
    }

    let json: Value = serde_json::from_slice(&payload)
        .map_err(|e| ServiceError::BadRequest(format!("invalid json: {}", e)))?;

    let event_type = json.get("type").and_then(Value::as_str).unwrap_or("");
    match event_type {
        CHECKOUT_COMPLETED => {
            let checkout = parse_checkout_completed(&json, &state.config.default_currency)?;
            let outcome = state
                .fulfillment
                .handle_checkout_completed(&checkout)
                .await?;
            Ok((
                StatusCode::OK,
                Json(json!({
                    "received": true,
                    "orderId": outcome.order_id,
                    "orderNumber": outcome.order_number,
                    "orderCreated": outcome.order_created,
                    "trackingNumber": outcome.tracking_number,
                })),
            ))
        }
        _ => {
            info!("Unhandled payment webhook type: {}", event_type);
            Ok((StatusCode::OK, Json(json!({ "received": true }))))
        }
    }
}

/// Pulls the session id, buyer and amount out of a checkout session event.
/// The buyer comes from `metadata.userId`, falling back to `client_reference_id`.
pub fn parse_checkout_completed(
    event: &Value,
    default_currency: &str,
) -> Result<CheckoutCompleted, ServiceError> {
    let session = event
        .pointer("/data/object")
        .ok_or_else(|| ServiceError::BadRequest("missing data.object".to_string()))?;

    let session_id = session
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServiceError::BadRequest("missing checkout session id".to_string()))?;

    let user_id = ["/metadata/userId", "/metadata/user_id", "/client_reference_id"]
        .iter()
        .find_map(|pointer| session.pointer(pointer).and_then(Value::as_str))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ServiceError::BadRequest("checkout session carries no user id".to_string())
        })?;

    Ok(CheckoutCompleted {
        session_id: session_id.to_string(),
        user_id: user_id.to_string(),
        amount_total: session
            .get("amount_total")
            .and_then(Value::as_i64)
            .unwrap_or(0),
        currency: session
            .get("currency")
            .and_then(Value::as_str)
            .unwrap_or(default_currency)
            .to_uppercase(),
    })
}

fn sign(secret: &str, timestamp: &str, payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

fn within_tolerance(timestamp: &str, tolerance_secs: u64) -> bool {
    match timestamp.parse::<i64>() {
        Ok(ts) => (chrono::Utc::now().timestamp() - ts).unsigned_abs() <= tolerance_secs,
        Err(_) => false,
    }
}

/// Accepts either `x-timestamp`/`x-signature` headers or a Stripe-style
/// `Stripe-Signature: t=..,v1=..` header, both HMAC-SHA256 over `"{t}.{body}"`.
pub fn verify_signature(
    headers: &HeaderMap,
    payload: &[u8],
    secret: &str,
    tolerance_secs: u64,
) -> bool {
    if let (Some(ts), Some(sig)) = (headers.get("x-timestamp"), headers.get("x-signature")) {
        if let (Ok(ts), Ok(sig)) = (ts.to_str(), sig.to_str()) {
            if !within_tolerance(ts, tolerance_secs) {
                return false;
            }
            return sign(secret, ts, payload)
                .map(|expected| constant_time_eq(&expected, sig))
                .unwrap_or(false);
        }
    }

    if let Some(sig) = headers.get("Stripe-Signature").and_then(|h| h.to_str().ok()) {
        let mut ts = "";
        let mut candidates = Vec::new();
        for part in sig.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => ts = value,
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }
        if ts.is_empty() || candidates.is_empty() || !within_tolerance(ts, tolerance_secs) {
            return false;
        }
        if let Some(expected) = sign(secret, ts, payload) {
            return candidates
                .iter()
                .any(|candidate| constant_time_eq(&expected, candidate));
        }
    }

    false
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
