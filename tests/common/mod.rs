#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use serde_json::{json, Value};
use sha2::Sha256;
use storefront_delivery::{
    config::AppConfig,
    db,
    entities::{cart_item, delivery_shipment, delivery_tracking_update, order, product},
    events::{self, EventSender},
    repositories::DeliveryRepository,
    services::delivery::{DeliveryService, MockDeliveryProvider, ShipmentLedger},
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const WEBHOOK_PATH: &str = "/api/v1/payments/webhook";

/// Application harness over a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub deliveries: Arc<DeliveryRepository>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Default wiring: the mock courier registered and set as default.
    pub async fn new() -> Self {
        Self::build(|_| {}, register_mock).await
    }

    /// Same as [`TestApp::new`] with webhook signatures enforced.
    pub async fn with_webhook_secret() -> Self {
        Self::build(
            |cfg| cfg.payment_webhook_secret = Some(WEBHOOK_SECRET.to_string()),
            register_mock,
        )
        .await
    }

    /// Custom provider registry; the closure receives the shipment ledger.
    pub async fn with_registry(
        registry: impl FnOnce(&AppConfig, Arc<dyn ShipmentLedger>) -> DeliveryService,
    ) -> Self {
        Self::build(|_| {}, registry).await
    }

    async fn build(
        customize: impl FnOnce(&mut AppConfig),
        registry: impl FnOnce(&AppConfig, Arc<dyn ShipmentLedger>) -> DeliveryService,
    ) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection keeps every query on the same in-memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        customize(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let deliveries = Arc::new(DeliveryRepository::new(db_arc.clone()));
        let ledger: Arc<dyn ShipmentLedger> = deliveries.clone();
        let delivery = Arc::new(registry(&cfg, ledger));

        let state = AppState::new(
            db_arc,
            Arc::new(cfg),
            event_sender,
            delivery,
            deliveries.clone(),
        );
        let router = storefront_delivery::app(state.clone());

        Self {
            router,
            state,
            deliveries,
            _event_task: event_task,
        }
    }

    /// Send a request against the router with an optional JSON body.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Posts a raw webhook payload with the given extra headers.
    pub async fn post_webhook(&self, payload: &[u8], headers: &[(&str, String)]) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(WEBHOOK_PATH)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }

        let request = builder
            .body(Body::from(payload.to_vec()))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_product(
        &self,
        name: &str,
        price: Decimal,
        weight_grams: Option<f64>,
    ) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            price: Set(price),
            weight_grams: Set(weight_grams),
            length_cm: Set(None),
            width_cm: Set(None),
            height_cm: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("insert product")
    }

    pub async fn add_to_cart(&self, user_id: &str, product_id: Uuid, quantity: i32) {
        cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.to_string()),
            product_id: Set(product_id),
            quantity: Set(quantity),
            created_at: Set(Utc::now()),
        }
        .insert(self.state.db.as_ref())
        .await
        .expect("insert cart item");
    }

    /// Seeds a one-product cart and completes checkout for it.
    /// Returns the tracking number of the resulting shipment.
    pub async fn checkout_with_shipment(&self, user_id: &str, session_id: &str) -> String {
        let product = self
            .seed_product("Desk Lamp", Decimal::new(12_900, 2), Some(1_200.0))
            .await;
        self.add_to_cart(user_id, product.id, 1).await;

        let payload = checkout_completed_event(session_id, user_id, 12_900);
        let response = self.post_webhook(payload.as_bytes(), &[]).await;
        assert_eq!(response.status(), 200);
        let body = response_json(response).await;
        body["trackingNumber"]
            .as_str()
            .expect("checkout should create a shipment")
            .to_string()
    }

    /// Moves a shipment and its stored history `hours` into the past.
    pub async fn backdate_shipment(&self, tracking_number: &str, hours: i64) {
        let created_at = Utc::now() - Duration::hours(hours);
        delivery_shipment::Entity::update_many()
            .col_expr(delivery_shipment::Column::CreatedAt, Expr::value(created_at))
            .col_expr(delivery_shipment::Column::UpdatedAt, Expr::value(created_at))
            .filter(delivery_shipment::Column::TrackingNumber.eq(tracking_number))
            .exec(self.state.db.as_ref())
            .await
            .expect("backdate shipment");
        delivery_tracking_update::Entity::update_many()
            .col_expr(
                delivery_tracking_update::Column::Timestamp,
                Expr::value(created_at),
            )
            .filter(delivery_tracking_update::Column::TrackingNumber.eq(tracking_number))
            .exec(self.state.db.as_ref())
            .await
            .expect("backdate tracking updates");
    }

    pub async fn order_count(&self) -> u64 {
        order::Entity::find()
            .count(self.state.db.as_ref())
            .await
            .expect("count orders")
    }

    pub async fn shipment_count(&self) -> u64 {
        delivery_shipment::Entity::find()
            .count(self.state.db.as_ref())
            .await
            .expect("count shipments")
    }

    pub async fn tracking_update_count(&self, tracking_number: &str) -> u64 {
        delivery_tracking_update::Entity::find()
            .filter(delivery_tracking_update::Column::TrackingNumber.eq(tracking_number))
            .count(self.state.db.as_ref())
            .await
            .expect("count tracking updates")
    }

    pub async fn cart_count(&self, user_id: &str) -> u64 {
        cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .count(self.state.db.as_ref())
            .await
            .expect("count cart items")
    }
}

fn register_mock(cfg: &AppConfig, ledger: Arc<dyn ShipmentLedger>) -> DeliveryService {
    let mut delivery = DeliveryService::from_store(&cfg.delivery.store);
    delivery.register_provider(
        MockDeliveryProvider::NAME,
        Arc::new(MockDeliveryProvider::new(
            cfg.delivery.mock_display_name.clone(),
            ledger,
        )),
    );
    delivery
        .set_default_provider(&cfg.delivery.provider)
        .expect("mock provider registered");
    delivery
}

/// A `checkout.session.completed` payload as the payment processor sends it.
pub fn checkout_completed_event(session_id: &str, user_id: &str, amount_total: i64) -> String {
    json!({
        "id": format!("evt_{}", session_id),
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "amount_total": amount_total,
                "currency": "aed",
                "metadata": { "userId": user_id }
            }
        }
    })
    .to_string()
}

/// `x-timestamp`/`x-signature` headers for `payload` signed now.
pub fn signed_headers(secret: &str, payload: &[u8]) -> Vec<(&'static str, String)> {
    let timestamp = Utc::now().timestamp().to_string();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let signature = hex::encode(mac.finalize().into_bytes());
    vec![("x-timestamp", timestamp), ("x-signature", signature)]
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Rate request body between two cities with a 2 kg shoebox-sized parcel.
pub fn rate_request(destination_city: &str, destination_country: &str) -> Value {
    json!({
        "origin": {
            "name": "Storefront Warehouse",
            "phone": "+971 4 000 0000",
            "address": "Warehouse 12, Al Quoz",
            "city": "Dubai",
            "country": "AE"
        },
        "destination": {
            "name": "Customer",
            "phone": "+971 50 000 0000",
            "address": "Corniche Road",
            "city": destination_city,
            "country": destination_country
        },
        "package": {
            "weight": 2.0,
            "length": 30.0,
            "width": 20.0,
            "height": 10.0
        }
    })
}
