use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::delivery::RateRequest;
use crate::services::rate_quotes::RateQuotes;
use crate::services::tracking::{CancellationResult, TrackingView};
use crate::{errors::ServiceError, ApiResponse, AppState};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersView {
    pub providers: Vec<String>,
    pub default_provider: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
    pub deleted: u64,
}

// GET /api/v1/delivery/tracking/{tracking_number}
#[utoipa::path(
    get,
    path = "/api/v1/delivery/tracking/{tracking_number}",
    params(("tracking_number" = String, Path, description = "Provider-assigned tracking number")),
    responses(
        (status = 200, description = "Shipment timeline, newest update first", body = TrackingView),
        (status = 404, description = "No tracking information available", body = crate::errors::ErrorResponse)
    ),
    tag = "Delivery"
)]
pub async fn track_shipment(
    State(state): State<AppState>,
    Path(tracking_number): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let view = state.tracking.track(tracking_number.trim()).await?;
    Ok(Json(ApiResponse::success(view)))
}

// POST /api/v1/delivery/rates
#[utoipa::path(
    post,
    path = "/api/v1/delivery/rates",
    request_body = RateRequest,
    responses(
        (status = 200, description = "Quotes from every provider, cheapest first", body = RateQuotes),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "Delivery"
)]
pub async fn get_shipping_rates(
    State(state): State<AppState>,
    Json(request): Json<RateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let quotes = state.rate_quotes.quote(&request).await?;
    Ok(Json(ApiResponse::success(quotes)))
}

// DELETE /api/v1/delivery/rates/expired
#[utoipa::path(
    delete,
    path = "/api/v1/delivery/rates/expired",
    responses(
        (status = 200, description = "Expired quotes removed", body = CleanupResult)
    ),
    tag = "Delivery"
)]
pub async fn cleanup_expired_rates(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let deleted = state.rate_quotes.cleanup_expired().await?;
    Ok(Json(ApiResponse::success(CleanupResult { deleted })))
}

// POST /api/v1/delivery/shipments/{tracking_number}/cancel
#[utoipa::path(
    post,
    path = "/api/v1/delivery/shipments/{tracking_number}/cancel",
    params(("tracking_number" = String, Path, description = "Provider-assigned tracking number")),
    responses(
        (status = 200, description = "Cancellation outcome; `cancelled` is false once the shipment has left pending", body = CancellationResult),
        (status = 404, description = "Unknown tracking number", body = crate::errors::ErrorResponse)
    ),
    tag = "Delivery"
)]
pub async fn cancel_shipment(
    State(state): State<AppState>,
    Path(tracking_number): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state.tracking.cancel(tracking_number.trim()).await?;
    Ok(Json(ApiResponse::success(result)))
}

// GET /api/v1/delivery/providers
#[utoipa::path(
    get,
    path = "/api/v1/delivery/providers",
    responses(
        (status = 200, description = "Registered delivery providers", body = ProvidersView)
    ),
    tag = "Delivery"
)]
pub async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(ProvidersView {
        providers: state.delivery.provider_names(),
        default_provider: state.delivery.default_provider().map(str::to_string),
    }))
}
