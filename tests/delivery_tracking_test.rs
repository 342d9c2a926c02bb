//! Integration tests for shipment tracking and cancellation.
//!
//! Tracking reads persist newly reached milestones exactly once and keep the
//! shipment's cached status in step with its history.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use chrono::{DateTime, Duration, Utc};
use common::{response_json, TestApp};
use storefront_delivery::{
    entities::ShipmentStatus,
    errors::ServiceError,
    services::delivery::{
        CreateShipmentRequest, DeliveryProvider, DeliveryService, MockDeliveryProvider,
        RateRequest, ShipmentConfirmation, ShippingRate, TrackingEvent,
    },
};

fn tracking_uri(tracking_number: &str) -> String {
    format!("/api/v1/delivery/tracking/{}", tracking_number)
}

fn cancel_uri(tracking_number: &str) -> String {
    format!("/api/v1/delivery/shipments/{}/cancel", tracking_number)
}

#[tokio::test]
async fn unknown_tracking_number_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, &tracking_uri("MOC0000000000"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("No tracking information available"));
}

#[tokio::test]
async fn fresh_shipment_reports_pending() {
    let app = TestApp::new().await;
    let tracking_number = app.checkout_with_shipment("user-1", "cs_track_fresh").await;

    let response = app
        .request(Method::GET, &tracking_uri(&tracking_number), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    let data = &body["data"];
    assert_eq!(data["trackingNumber"], tracking_number.as_str());
    assert_eq!(data["status"], "pending");
    assert_eq!(data["provider"], "mock");
    assert!(data["orderNumber"].as_str().unwrap().starts_with("ORD-"));
    assert!(data["actualDelivery"].is_null());
    assert_eq!(data["updates"].as_array().unwrap().len(), 1);
    assert_eq!(data["updates"][0]["description"], "Shipment information received");
    assert!(data["updates"][0]["location"].is_null());
    assert_eq!(app.tracking_update_count(&tracking_number).await, 1);
}

#[tokio::test]
async fn partially_elapsed_timeline_advances_status() {
    let app = TestApp::new().await;
    let tracking_number = app.checkout_with_shipment("user-2", "cs_track_partial").await;
    app.backdate_shipment(&tracking_number, 7).await;

    let body = response_json(
        app.request(Method::GET, &tracking_uri(&tracking_number), None)
            .await,
    )
    .await;
    let data = &body["data"];
    assert_eq!(data["status"], "picked_up");

    let updates = data["updates"].as_array().unwrap();
    let statuses: Vec<&str> = updates
        .iter()
        .map(|update| update["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["picked_up", "confirmed", "pending"]);
    assert_eq!(updates[0]["location"], "Dubai Fulfillment Center");

    let shipment = app
        .deliveries
        .find_by_tracking_number(&tracking_number)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipment.status, ShipmentStatus::PickedUp);
    assert!(shipment.actual_delivery.is_none());
}

#[tokio::test]
async fn delivered_timeline_is_persisted_exactly_once() {
    let app = TestApp::new().await;
    let tracking_number = app.checkout_with_shipment("user-3", "cs_track_done").await;
    app.backdate_shipment(&tracking_number, 80).await;

    let first = response_json(
        app.request(Method::GET, &tracking_uri(&tracking_number), None)
            .await,
    )
    .await;
    let data = &first["data"];
    assert_eq!(data["status"], "delivered");
    assert_eq!(data["updates"].as_array().unwrap().len(), 6);
    assert_eq!(data["updates"][0]["status"], "delivered");

    let actual: DateTime<Utc> = data["actualDelivery"].as_str().unwrap().parse().unwrap();
    let estimated: DateTime<Utc> = data["estimatedDelivery"].as_str().unwrap().parse().unwrap();
    // Delivered 72h after the backdated creation, well before the original promise
    assert!(actual < estimated);
    assert!(Utc::now() - actual >= Duration::hours(7));

    let second = response_json(
        app.request(Method::GET, &tracking_uri(&tracking_number), None)
            .await,
    )
    .await;
    assert_eq!(second["data"]["updates"].as_array().unwrap().len(), 6);
    assert_eq!(second["data"]["actualDelivery"], data["actualDelivery"]);
    assert_eq!(app.tracking_update_count(&tracking_number).await, 6);

    let shipment = app
        .deliveries
        .find_by_tracking_number(&tracking_number)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Delivered);
    assert!(shipment.actual_delivery.is_some());
}

#[tokio::test]
async fn cancel_within_window_succeeds_once() {
    let app = TestApp::new().await;
    let tracking_number = app.checkout_with_shipment("user-4", "cs_cancel_ok").await;

    let response = app
        .request(Method::POST, &cancel_uri(&tracking_number), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["cancelled"], true);
    assert_eq!(body["data"]["status"], "cancelled");

    let shipment = app
        .deliveries
        .find_by_tracking_number(&tracking_number)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Cancelled);
    assert_eq!(app.tracking_update_count(&tracking_number).await, 2);

    // Already cancelled: declined, nothing appended
    let again = response_json(
        app.request(Method::POST, &cancel_uri(&tracking_number), None)
            .await,
    )
    .await;
    assert_eq!(again["data"]["cancelled"], false);
    assert_eq!(again["data"]["status"], "cancelled");
    assert_eq!(app.tracking_update_count(&tracking_number).await, 2);

    // Tracking a cancelled shipment never moves it forward
    let tracked = response_json(
        app.request(Method::GET, &tracking_uri(&tracking_number), None)
            .await,
    )
    .await;
    assert_eq!(tracked["data"]["status"], "cancelled");
    assert_eq!(tracked["data"]["updates"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn cancel_outside_window_is_declined() {
    let app = TestApp::new().await;
    let tracking_number = app.checkout_with_shipment("user-5", "cs_cancel_late").await;
    app.backdate_shipment(&tracking_number, 3).await;

    let response = app
        .request(Method::POST, &cancel_uri(&tracking_number), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["cancelled"], false);
    // Three hours in, the confirmed milestone has been reached
    assert_eq!(body["data"]["status"], "confirmed");

    let shipment = app
        .deliveries
        .find_by_tracking_number(&tracking_number)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Confirmed);
    assert_eq!(app.tracking_update_count(&tracking_number).await, 2);

    let tracked = response_json(
        app.request(Method::GET, &tracking_uri(&tracking_number), None)
            .await,
    )
    .await;
    assert_eq!(tracked["data"]["status"], body["data"]["status"]);
}

/// Delegates to the mock courier but accepts every cancellation.
struct LenientCourier {
    inner: MockDeliveryProvider,
}

#[async_trait]
impl DeliveryProvider for LenientCourier {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn display_name(&self) -> &str {
        self.inner.display_name()
    }

    async fn create_shipment(
        &self,
        request: &CreateShipmentRequest,
    ) -> Result<ShipmentConfirmation, ServiceError> {
        self.inner.create_shipment(request).await
    }

    async fn track_shipment(
        &self,
        tracking_number: &str,
    ) -> Result<Vec<TrackingEvent>, ServiceError> {
        self.inner.track_shipment(tracking_number).await
    }

    async fn cancel_shipment(&self, _tracking_number: &str) -> Result<bool, ServiceError> {
        Ok(true)
    }

    async fn get_shipping_rates(
        &self,
        request: &RateRequest,
    ) -> Result<Vec<ShippingRate>, ServiceError> {
        self.inner.get_shipping_rates(request).await
    }
}

#[tokio::test]
async fn accepted_cancel_reports_the_stored_status() {
    let app = TestApp::with_registry(|cfg, ledger| {
        let mut delivery = DeliveryService::from_store(&cfg.delivery.store);
        delivery.register_provider(
            MockDeliveryProvider::NAME,
            Arc::new(LenientCourier {
                inner: MockDeliveryProvider::new(cfg.delivery.mock_display_name.clone(), ledger),
            }),
        );
        delivery
    })
    .await;
    let tracking_number = app.checkout_with_shipment("user-6", "cs_cancel_lenient").await;
    app.backdate_shipment(&tracking_number, 7).await;

    // Reading tracking moves the stored row past pending
    app.request(Method::GET, &tracking_uri(&tracking_number), None)
        .await;

    let body = response_json(
        app.request(Method::POST, &cancel_uri(&tracking_number), None)
            .await,
    )
    .await;
    assert_eq!(body["data"]["cancelled"], false);
    assert_eq!(body["data"]["status"], "picked_up");

    let shipment = app
        .deliveries
        .find_by_tracking_number(&tracking_number)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipment.status, ShipmentStatus::PickedUp);
    assert_eq!(app.tracking_update_count(&tracking_number).await, 3);
}

#[tokio::test]
async fn cancel_unknown_shipment_is_not_found() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::POST, &cancel_uri("MOC0000000000"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
