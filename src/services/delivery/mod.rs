pub mod ledger;
pub mod mock_provider;
pub mod provider;
pub mod rates;
pub mod timeline;

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use metrics::counter;
use tracing::{error, info, instrument, warn};

use crate::config::StoreConfig;
use crate::errors::ServiceError;

pub use ledger::{InMemoryShipmentLedger, ShipmentLedger, ShipmentSnapshot};
pub use mock_provider::MockDeliveryProvider;
pub use provider::{
    Address, CreateShipmentRequest, CreateShipmentResponse, DeliveryProvider, PackageDetails,
    RateRequest, ShipmentConfirmation, ShippingRate, TrackingEvent,
};

pub const NO_PROVIDER_AVAILABLE: &str = "No delivery provider available";

/// Provider registry and dispatcher.
///
/// Built once at start-up and shared behind an `Arc`; registration takes
/// `&mut self` so the registry is read-only while serving.
pub struct DeliveryService {
    providers: BTreeMap<String, Arc<dyn DeliveryProvider>>,
    default_provider: Option<String>,
    origin: Address,
}

impl DeliveryService {
    pub fn new(origin: Address) -> Self {
        Self {
            providers: BTreeMap::new(),
            default_provider: None,
            origin,
        }
    }

    pub fn from_store(store: &StoreConfig) -> Self {
        Self::new(Address {
            name: store.name.clone(),
            phone: store.phone.clone(),
            address: store.address.clone(),
            city: store.city.clone(),
            country: store.country.clone(),
        })
    }

    /// Adds or replaces a provider. The first one registered becomes the default.
    pub fn register_provider(&mut self, name: impl Into<String>, provider: Arc<dyn DeliveryProvider>) {
        let name = name.into();
        info!(provider = %name, display_name = provider.display_name(), "Registering delivery provider");
        if self.default_provider.is_none() {
            self.default_provider = Some(name.clone());
        }
        self.providers.insert(name, provider);
    }

    pub fn set_default_provider(&mut self, name: &str) -> Result<(), ServiceError> {
        if !self.providers.contains_key(name) {
            return Err(ServiceError::Configuration(format!(
                "Delivery provider '{}' is not registered",
                name
            )));
        }
        self.default_provider = Some(name.to_string());
        Ok(())
    }

    pub fn default_provider(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Store address every shipment departs from
    pub fn origin(&self) -> &Address {
        &self.origin
    }

    /// An explicit name resolves only that provider; otherwise the default.
    fn resolve(&self, provider_name: Option<&str>) -> Option<(&str, &Arc<dyn DeliveryProvider>)> {
        let name = provider_name.or(self.default_provider.as_deref())?;
        self.providers
            .get_key_value(name)
            .map(|(name, provider)| (name.as_str(), provider))
    }

    #[instrument(skip(self, request), fields(order_number = %request.order_number))]
    pub async fn create_shipment(
        &self,
        request: &CreateShipmentRequest,
        provider_name: Option<&str>,
    ) -> CreateShipmentResponse {
        let Some((name, provider)) = self.resolve(provider_name) else {
            warn!(requested = ?provider_name, "{}", NO_PROVIDER_AVAILABLE);
            counter!("storefront_delivery.shipments.no_provider", 1);
            return CreateShipmentResponse::failed(None, NO_PROVIDER_AVAILABLE);
        };

        match provider.create_shipment(request).await {
            Ok(confirmation) => {
                counter!("storefront_delivery.shipments.created", 1, "provider" => name.to_string());
                info!(
                    provider = name,
                    tracking_number = %confirmation.tracking_number,
                    "Shipment created"
                );
                CreateShipmentResponse::confirmed(name, confirmation)
            }
            Err(e) => {
                counter!("storefront_delivery.shipments.failed", 1, "provider" => name.to_string());
                error!(provider = name, error = %e, "Provider failed to create shipment");
                CreateShipmentResponse::failed(Some(name), e.to_string())
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn track_shipment(
        &self,
        tracking_number: &str,
        provider_name: Option<&str>,
    ) -> Vec<TrackingEvent> {
        let Some((name, provider)) = self.resolve(provider_name) else {
            warn!("{}", NO_PROVIDER_AVAILABLE);
            return Vec::new();
        };

        match provider.track_shipment(tracking_number).await {
            Ok(events) => events,
            Err(e) => {
                error!(provider = name, error = %e, "Provider failed to track shipment");
                Vec::new()
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn cancel_shipment(&self, tracking_number: &str, provider_name: Option<&str>) -> bool {
        let Some((name, provider)) = self.resolve(provider_name) else {
            warn!("{}", NO_PROVIDER_AVAILABLE);
            return false;
        };

        match provider.cancel_shipment(tracking_number).await {
            Ok(cancelled) => {
                if cancelled {
                    counter!("storefront_delivery.shipments.cancelled", 1, "provider" => name.to_string());
                }
                cancelled
            }
            Err(e) => {
                error!(provider = name, error = %e, "Provider failed to cancel shipment");
                false
            }
        }
    }

    /// Quotes from every registered provider, cheapest first. A failing
    /// provider is logged, left out and named in [`CollectedRates::failed`].
    #[instrument(skip(self, request))]
    pub async fn get_shipping_rates(&self, request: &RateRequest) -> CollectedRates {
        let quotes = join_all(self.providers.iter().map(|(name, provider)| async move {
            (name, provider.get_shipping_rates(request).await)
        }))
        .await;

        let mut collected = CollectedRates::default();
        for (name, result) in quotes {
            match result {
                Ok(rates) => collected
                    .rates
                    .extend(rates.into_iter().map(|rate| ShippingRate {
                        provider: name.clone(),
                        ..rate
                    })),
                Err(e) => {
                    counter!("storefront_delivery.rates.provider_failed", 1, "provider" => name.clone());
                    error!(provider = %name, error = %e, "Provider failed to quote rates");
                    collected.failed.push(name.clone());
                }
            }
        }

        collected.rates.sort_by(|a, b| a.cost.total_cmp(&b.cost));
        collected
    }
}

/// Quotes gathered from the whole registry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedRates {
    pub rates: Vec<ShippingRate>,
    /// Providers that returned an error instead of quotes
    pub failed: Vec<String>,
}

impl CollectedRates {
    /// Whether every registered provider answered
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
