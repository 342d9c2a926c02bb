use std::sync::Arc;

use chrono::{Duration, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::repositories::DeliveryRepository;
use crate::services::delivery::{DeliveryService, RateRequest, ShippingRate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateQuotes {
    pub rates: Vec<ShippingRate>,
    /// Whether the quotes came from the rate cache
    pub cached: bool,
}

/// Rate lookups through the time-boxed quote cache
pub struct RateQuoteService {
    deliveries: Arc<DeliveryRepository>,
    delivery: Arc<DeliveryService>,
    ttl: Duration,
}

impl RateQuoteService {
    pub fn new(
        deliveries: Arc<DeliveryRepository>,
        delivery: Arc<DeliveryService>,
        ttl: Duration,
    ) -> Self {
        Self {
            deliveries,
            delivery,
            ttl,
        }
    }

    #[instrument(skip(self, request), fields(destination = %request.destination.city))]
    pub async fn quote(&self, request: &RateRequest) -> Result<RateQuotes, ServiceError> {
        request.validate()?;

        let now = Utc::now();
        let cached = self.deliveries.get_cached_rates(request, now).await?;
        if !cached.is_empty() {
            counter!("storefront_delivery.rates.cache_hit", 1);
            debug!(count = cached.len(), "Serving cached rates");
            return Ok(RateQuotes {
                rates: cached.iter().map(ShippingRate::from).collect(),
                cached: true,
            });
        }

        counter!("storefront_delivery.rates.cache_miss", 1);
        let collected = self.delivery.get_shipping_rates(request).await;
        if !collected.is_complete() {
            // A partial set would hide the failed providers for the whole TTL
            warn!(failed = ?collected.failed, "Not caching incomplete rate quotes");
        } else if let Err(e) = self
            .deliveries
            .store_rates(request, &collected.rates, now + self.ttl)
            .await
        {
            warn!(error = %e, "Failed to cache shipping rates");
        }

        Ok(RateQuotes {
            rates: collected.rates,
            cached: false,
        })
    }

    /// Removes expired quotes; returns how many were deleted.
    #[instrument(skip(self))]
    pub async fn cleanup_expired(&self) -> Result<u64, ServiceError> {
        let removed = self.deliveries.cleanup_expired_rates(Utc::now()).await?;
        counter!("storefront_delivery.rates.expired_removed", removed);
        Ok(removed)
    }
}
