use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::ShipmentStatus;
use crate::errors::ServiceError;

/// Postal address used for both ends of a shipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub phone: String,
    #[validate(length(min = 1, message = "Address line is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(equal = 2, message = "Country must be an ISO 3166-1 alpha-2 code"))]
    pub country: String,
}

/// Aggregated parcel measurements, kilograms and centimetres
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackageDetails {
    #[validate(range(min = 0.0, message = "Weight cannot be negative"))]
    pub weight: f64,
    #[validate(range(min = 0.0))]
    pub length: f64,
    #[validate(range(min = 0.0))]
    pub width: f64,
    #[validate(range(min = 0.0))]
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PackageDetails {
    /// Volume in cubic centimetres
    pub fn volume(&self) -> f64 {
        self.length * self.width * self.height
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateShipmentRequest {
    #[validate]
    pub origin: Address,
    #[validate]
    pub destination: Address,
    #[validate]
    pub package: PackageDetails,
    pub order_id: Uuid,
    pub order_number: String,
}

impl CreateShipmentRequest {
    pub fn rate_request(&self) -> RateRequest {
        RateRequest {
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            package: self.package.clone(),
        }
    }
}

/// Quote request; a shipment request without the order identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateRequest {
    #[validate]
    pub origin: Address,
    #[validate]
    pub destination: Address,
    #[validate]
    pub package: PackageDetails,
}

/// What a provider hands back after accepting a shipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentConfirmation {
    pub tracking_number: String,
    pub estimated_delivery: DateTime<Utc>,
    pub cost: f64,
    pub currency: String,
    /// Opaque provider payload, stored verbatim on the shipment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

/// Flattened outcome of a dispatcher `create_shipment` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateShipmentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_delivery: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub raw: Option<serde_json::Value>,
}

impl CreateShipmentResponse {
    pub fn confirmed(provider: &str, confirmation: ShipmentConfirmation) -> Self {
        Self {
            success: true,
            tracking_number: Some(confirmation.tracking_number),
            estimated_delivery: Some(confirmation.estimated_delivery),
            cost: Some(confirmation.cost),
            currency: Some(confirmation.currency),
            provider: Some(provider.to_string()),
            error: None,
            raw: confirmation.raw,
        }
    }

    pub fn failed(provider: Option<&str>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            tracking_number: None,
            estimated_delivery: None,
            cost: None,
            currency: None,
            provider: provider.map(str::to_string),
            error: Some(error.into()),
            raw: None,
        }
    }
}

/// One milestone in a shipment's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub status: ShipmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// A quoted service tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingRate {
    pub provider: String,
    pub service_name: String,
    pub cost: f64,
    pub currency: String,
    pub estimated_days_min: i32,
    pub estimated_days_max: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Courier integration seam. Any real carrier replaces the mock by
/// implementing these four operations.
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    /// Registry key, e.g. `mock`
    fn name(&self) -> &str;

    fn display_name(&self) -> &str;

    async fn create_shipment(
        &self,
        request: &CreateShipmentRequest,
    ) -> Result<ShipmentConfirmation, ServiceError>;

    /// History oldest to newest; empty for an unknown tracking number.
    async fn track_shipment(&self, tracking_number: &str)
        -> Result<Vec<TrackingEvent>, ServiceError>;

    /// `Ok(false)` when the shipment is unknown or past the cancellable window.
    async fn cancel_shipment(&self, tracking_number: &str) -> Result<bool, ServiceError>;

    async fn get_shipping_rates(
        &self,
        request: &RateRequest,
    ) -> Result<Vec<ShippingRate>, ServiceError>;
}
