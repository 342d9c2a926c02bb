//! Storefront delivery service
//!
//! Courier provider registry, shipment tracking and rate quotes, and the
//! payment-webhook fulfillment that turns a paid checkout into an order and
//! a shipment.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::repositories::{DeliveryRepository, OrderRepository};
use crate::services::checkout_fulfillment::CheckoutFulfillmentService;
use crate::services::delivery::DeliveryService;
use crate::services::rate_quotes::RateQuoteService;
use crate::services::tracking::TrackingService;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: Arc<events::EventSender>,
    pub delivery: Arc<DeliveryService>,
    pub tracking: Arc<TrackingService>,
    pub rate_quotes: Arc<RateQuoteService>,
    pub fulfillment: Arc<CheckoutFulfillmentService>,
}

impl AppState {
    /// Wires the delivery services around an already populated provider
    /// registry. `deliveries` is shared with any provider that reads it as
    /// its shipment ledger.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<config::AppConfig>,
        event_sender: Arc<events::EventSender>,
        delivery: Arc<DeliveryService>,
        deliveries: Arc<DeliveryRepository>,
    ) -> Self {
        let tracking = Arc::new(TrackingService::new(
            deliveries.clone(),
            OrderRepository::new(db.clone()),
            delivery.clone(),
            event_sender.clone(),
        ));
        let rate_quotes = Arc::new(RateQuoteService::new(
            deliveries.clone(),
            delivery.clone(),
            config.rate_cache_ttl(),
        ));
        let fulfillment = Arc::new(CheckoutFulfillmentService::new(
            db.clone(),
            deliveries,
            delivery.clone(),
            event_sender.clone(),
            config.delivery.provider.clone(),
        ));

        Self {
            db,
            config,
            event_sender,
            delivery,
            tracking,
            rate_quotes,
            fulfillment,
        }
    }
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/payments/webhook",
            post(handlers::payment_webhooks::payment_webhook),
        )
        .route(
            "/delivery/tracking/:tracking_number",
            get(handlers::delivery::track_shipment),
        )
        .route("/delivery/rates", post(handlers::delivery::get_shipping_rates))
        .route(
            "/delivery/rates/expired",
            delete(handlers::delivery::cleanup_expired_rates),
        )
        .route(
            "/delivery/shipments/:tracking_number/cancel",
            post(handlers::delivery::cancel_shipment),
        )
        .route("/delivery/providers", get(handlers::delivery::list_providers))
}

/// Explicit origins from config; permissive outside production when none are set.
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.is_production() {
        CorsLayer::new()
    } else {
        CorsLayer::permissive()
    }
}

/// Full HTTP surface: health, OpenAPI document and the v1 API.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .nest("/api/v1", api_v1_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn response_without_request_scope_has_no_id() {
        let response = ApiResponse::success(1);
        let meta = response.meta.expect("metadata expected");
        assert!(meta.request_id.is_none());
    }
}
