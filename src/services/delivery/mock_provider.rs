use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde_json::json;
use tracing::{debug, info, instrument};
use validator::Validate;

use super::ledger::ShipmentLedger;
use super::provider::{
    CreateShipmentRequest, DeliveryProvider, RateRequest, ShipmentConfirmation, ShippingRate,
    TrackingEvent,
};
use super::{rates, timeline};
use crate::errors::ServiceError;

const TRACKING_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const TRACKING_SUFFIX_LEN: usize = 10;

/// Simulated courier. Tracking histories are derived from the ledger's
/// shipment record and the current clock, so the provider itself is stateless.
pub struct MockDeliveryProvider {
    display_name: String,
    ledger: Arc<dyn ShipmentLedger>,
}

impl MockDeliveryProvider {
    pub const NAME: &'static str = "mock";

    pub fn new(display_name: impl Into<String>, ledger: Arc<dyn ShipmentLedger>) -> Self {
        Self {
            display_name: display_name.into(),
            ledger,
        }
    }

    /// Three-letter prefix from the display name plus ten base-36 characters.
    pub fn generate_tracking_number(&self) -> String {
        let mut prefix: String = self
            .display_name
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .take(3)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        while prefix.len() < 3 {
            prefix.push('X');
        }

        let mut rng = rand::thread_rng();
        let suffix: String = (0..TRACKING_SUFFIX_LEN)
            .map(|_| TRACKING_ALPHABET[rng.gen_range(0..TRACKING_ALPHABET.len())] as char)
            .collect();

        format!("{}{}", prefix, suffix)
    }
}

#[async_trait]
impl DeliveryProvider for MockDeliveryProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    #[instrument(skip(self, request), fields(order_number = %request.order_number))]
    async fn create_shipment(
        &self,
        request: &CreateShipmentRequest,
    ) -> Result<ShipmentConfirmation, ServiceError> {
        request.validate()?;

        let now = Utc::now();
        let tracking_number = self.generate_tracking_number();
        let factor = rates::distance_factor(&request.destination.city, &request.destination.country);
        let cost = rates::base_cost(&request.package, factor);
        let estimated_delivery = timeline::estimated_delivery(now);

        info!(
            tracking_number = %tracking_number,
            cost,
            destination = %request.destination.city,
            "Mock shipment issued"
        );

        Ok(ShipmentConfirmation {
            raw: Some(json!({
                "provider": Self::NAME,
                "trackingNumber": tracking_number,
                "service": "standard",
                "distanceFactor": factor,
                "issuedAt": now,
            })),
            tracking_number,
            estimated_delivery,
            cost,
            currency: rates::CURRENCY.to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn track_shipment(
        &self,
        tracking_number: &str,
    ) -> Result<Vec<TrackingEvent>, ServiceError> {
        let Some(shipment) = self.ledger.find_shipment(tracking_number).await? else {
            debug!("Unknown tracking number");
            return Ok(Vec::new());
        };
        Ok(timeline::synthesize(&shipment, Utc::now()))
    }

    #[instrument(skip(self))]
    async fn cancel_shipment(&self, tracking_number: &str) -> Result<bool, ServiceError> {
        let Some(shipment) = self.ledger.find_shipment(tracking_number).await? else {
            return Ok(false);
        };

        let now = Utc::now();
        if !timeline::is_cancellable(&shipment, now) {
            debug!(status = %shipment.status, "Shipment is past the cancellation window");
            return Ok(false);
        }

        self.ledger.mark_cancelled(tracking_number, now).await
    }

    async fn get_shipping_rates(
        &self,
        request: &RateRequest,
    ) -> Result<Vec<ShippingRate>, ServiceError> {
        request.validate()?;
        let factor = rates::distance_factor(&request.destination.city, &request.destination.country);
        let base = rates::base_cost(&request.package, factor);
        Ok(rates::service_tiers(Self::NAME, base))
    }
}
