use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront Delivery API",
        version = "0.1.0",
        description = r#"
# Storefront Delivery API

Delivery orchestration for the storefront: shipments are created from paid
checkouts, tracked through their courier, and priced through a cached
rate-quote lookup.

## Errors

Failures use a consistent body carrying the request id:

```json
{
  "error": "Not Found",
  "message": "No tracking information available",
  "request_id": "2f6c...",
  "timestamp": "2025-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Delivery", description = "Shipment tracking, cancellation and rate quotes"),
        (name = "Payments", description = "Payment processor webhooks"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::delivery::track_shipment,
        crate::handlers::delivery::get_shipping_rates,
        crate::handlers::delivery::cleanup_expired_rates,
        crate::handlers::delivery::cancel_shipment,
        crate::handlers::delivery::list_providers,
        crate::handlers::payment_webhooks::payment_webhook,
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::services::delivery::Address,
            crate::services::delivery::PackageDetails,
            crate::services::delivery::RateRequest,
            crate::services::delivery::ShippingRate,
            crate::services::delivery::TrackingEvent,
            crate::services::delivery::CreateShipmentResponse,
            crate::services::rate_quotes::RateQuotes,
            crate::services::tracking::TrackingView,
            crate::services::tracking::TrackingUpdateView,
            crate::services::tracking::CancellationResult,
            crate::handlers::delivery::ProvidersView,
            crate::handlers::delivery::CleanupResult,
            crate::handlers::health::HealthResponse,
            crate::entities::ShipmentStatus,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

// GET /api-docs/openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDocV1::openapi())
}
