//! Integration tests for checkout fulfillment through the payment webhook.
//!
//! Tests cover:
//! - Paid checkout → order, line items, shipment and cleared cart
//! - Replayed webhook deliveries are idempotent
//! - Signature enforcement when a secret is configured
//! - Delivery failures never fail the webhook

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{checkout_completed_event, response_json, signed_headers, TestApp, WEBHOOK_SECRET};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use storefront_delivery::{
    entities::{delivery_shipment, order, order_item, ShipmentStatus},
    errors::ServiceError,
    services::delivery::{
        CreateShipmentRequest, DeliveryProvider, DeliveryService, RateRequest,
        ShipmentConfirmation, ShippingRate, TrackingEvent,
    },
};
use uuid::Uuid;

#[tokio::test]
async fn paid_checkout_creates_order_and_shipment() {
    let app = TestApp::new().await;
    let lamp = app
        .seed_product("Desk Lamp", Decimal::new(12_900, 2), Some(1_200.0))
        .await;
    let mug = app
        .seed_product("Coffee Mug", Decimal::new(3_500, 2), None)
        .await;
    app.add_to_cart("user-1", lamp.id, 1).await;
    app.add_to_cart("user-1", mug.id, 2).await;

    let payload = checkout_completed_event("cs_test_001", "user-1", 19_900);
    let response = app.post_webhook(payload.as_bytes(), &[]).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["received"], true);
    assert_eq!(body["orderCreated"], true);
    let tracking_number = body["trackingNumber"].as_str().expect("tracking number");
    assert!(tracking_number.starts_with("MOC"), "{}", tracking_number);
    assert_eq!(tracking_number.len(), 13);

    let order_id: Uuid = body["orderId"].as_str().unwrap().parse().unwrap();
    let stored = order::Entity::find_by_id(order_id)
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .expect("order persisted");
    assert_eq!(stored.payment_session_id, "cs_test_001");
    assert_eq!(stored.total_amount, dec!(199.00));
    assert_eq!(stored.currency, "AED");
    assert_eq!(stored.tracking_number.as_deref(), Some(tracking_number));
    assert_eq!(stored.delivery_provider.as_deref(), Some("mock"));
    assert!(stored.estimated_delivery.is_some());

    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(app.state.db.as_ref())
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(app.cart_count("user-1").await, 0);

    let shipment = app
        .deliveries
        .find_by_tracking_number(tracking_number)
        .await
        .unwrap()
        .expect("shipment persisted");
    assert_eq!(shipment.order_id, order_id);
    assert_eq!(shipment.status, ShipmentStatus::Pending);
    assert_eq!(shipment.provider, "mock");
    assert_eq!(shipment.destination_city, "Dubai");
    // 1.2 kg lamp plus two mugs at the 500 g default
    assert!((shipment.weight_kg - 2.2).abs() < 1e-9);
    assert_eq!(shipment.estimated_delivery, stored.estimated_delivery);
    assert!(shipment.provider_response.is_some());

    let updates = app.deliveries.tracking_updates(shipment.id).await.unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, ShipmentStatus::Pending);
    assert_eq!(updates[0].description, "Shipment information received");
    assert_eq!(updates[0].location, None);
    assert_eq!(updates[0].timestamp, shipment.created_at);
}

#[tokio::test]
async fn replayed_webhook_is_idempotent() {
    let app = TestApp::new().await;
    let lamp = app
        .seed_product("Desk Lamp", Decimal::new(12_900, 2), Some(1_200.0))
        .await;
    app.add_to_cart("user-2", lamp.id, 1).await;

    let payload = checkout_completed_event("cs_test_replay", "user-2", 12_900);
    let first = response_json(app.post_webhook(payload.as_bytes(), &[]).await).await;
    let second = response_json(app.post_webhook(payload.as_bytes(), &[]).await).await;

    assert_eq!(first["orderCreated"], true);
    assert_eq!(second["orderCreated"], false);
    assert_eq!(first["orderId"], second["orderId"]);
    assert_eq!(first["trackingNumber"], second["trackingNumber"]);

    assert_eq!(app.order_count().await, 1);
    assert_eq!(app.shipment_count().await, 1);
}

#[tokio::test]
async fn signed_webhook_is_accepted_and_unsigned_rejected() {
    let app = TestApp::with_webhook_secret().await;
    let payload = checkout_completed_event("cs_test_signed", "user-3", 5_000);

    let unsigned = app.post_webhook(payload.as_bytes(), &[]).await;
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

    let forged = signed_headers("whsec_wrong", payload.as_bytes());
    let rejected = app.post_webhook(payload.as_bytes(), &forged).await;
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.order_count().await, 0);

    let headers = signed_headers(WEBHOOK_SECRET, payload.as_bytes());
    let accepted = app.post_webhook(payload.as_bytes(), &headers).await;
    assert_eq!(accepted.status(), StatusCode::OK);
    assert_eq!(app.order_count().await, 1);
}

#[tokio::test]
async fn empty_cart_creates_order_without_shipment() {
    let app = TestApp::new().await;
    let payload = checkout_completed_event("cs_test_empty", "user-4", 1_000);

    let response = app.post_webhook(payload.as_bytes(), &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["orderCreated"], true);
    assert!(body["trackingNumber"].is_null());

    assert_eq!(app.order_count().await, 1);
    assert_eq!(app.shipment_count().await, 0);
}

#[tokio::test]
async fn missing_provider_does_not_fail_the_webhook() {
    let app = TestApp::with_registry(|cfg, _ledger| DeliveryService::from_store(&cfg.delivery.store))
        .await;
    let lamp = app
        .seed_product("Desk Lamp", Decimal::new(12_900, 2), Some(1_200.0))
        .await;
    app.add_to_cart("user-5", lamp.id, 1).await;

    let payload = checkout_completed_event("cs_test_noprovider", "user-5", 12_900);
    let response = app.post_webhook(payload.as_bytes(), &[]).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["orderCreated"], true);
    assert!(body["trackingNumber"].is_null());

    let order_id: Uuid = body["orderId"].as_str().unwrap().parse().unwrap();
    let stored = order::Entity::find_by_id(order_id)
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert!(stored.tracking_number.is_none());
    assert_eq!(app.shipment_count().await, 0);
    assert_eq!(app.cart_count("user-5").await, 0);
}

struct BrokenCourier;

#[async_trait]
impl DeliveryProvider for BrokenCourier {
    fn name(&self) -> &str {
        "broken"
    }

    fn display_name(&self) -> &str {
        "Broken Courier"
    }

    async fn create_shipment(
        &self,
        _request: &CreateShipmentRequest,
    ) -> Result<ShipmentConfirmation, ServiceError> {
        Err(ServiceError::ProviderError("courier API unavailable".into()))
    }

    async fn track_shipment(
        &self,
        _tracking_number: &str,
    ) -> Result<Vec<TrackingEvent>, ServiceError> {
        Ok(Vec::new())
    }

    async fn cancel_shipment(&self, _tracking_number: &str) -> Result<bool, ServiceError> {
        Ok(false)
    }

    async fn get_shipping_rates(
        &self,
        _request: &RateRequest,
    ) -> Result<Vec<ShippingRate>, ServiceError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn provider_error_does_not_fail_the_webhook() {
    let app = TestApp::with_registry(|cfg, _ledger| {
        let mut delivery = DeliveryService::from_store(&cfg.delivery.store);
        delivery.register_provider("mock", Arc::new(BrokenCourier));
        delivery
    })
    .await;
    let lamp = app
        .seed_product("Desk Lamp", Decimal::new(12_900, 2), Some(1_200.0))
        .await;
    app.add_to_cart("user-6", lamp.id, 1).await;

    let payload = checkout_completed_event("cs_test_broken", "user-6", 12_900);
    let response = app.post_webhook(payload.as_bytes(), &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["orderCreated"], true);
    assert!(body["trackingNumber"].is_null());

    let shipments = delivery_shipment::Entity::find()
        .all(app.state.db.as_ref())
        .await
        .unwrap();
    assert!(shipments.is_empty());
}

#[tokio::test]
async fn other_event_types_are_acknowledged() {
    let app = TestApp::new().await;
    let payload = json!({
        "type": "payment_intent.created",
        "data": { "object": { "id": "pi_123" } }
    })
    .to_string();

    let response = app.post_webhook(payload.as_bytes(), &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body, json!({ "received": true }));
    assert_eq!(app.order_count().await, 0);
}

#[tokio::test]
async fn malformed_payloads_are_rejected() {
    let app = TestApp::new().await;

    let garbage = app.post_webhook(b"not json", &[]).await;
    assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);

    let anonymous = json!({
        "type": "checkout.session.completed",
        "data": { "object": { "id": "cs_test_anon", "amount_total": 100 } }
    })
    .to_string();
    let response = app.post_webhook(anonymous.as_bytes(), &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.order_count().await, 0);
}
