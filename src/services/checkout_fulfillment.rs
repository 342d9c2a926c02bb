//! Turns a completed checkout into an order and, best effort, a shipment.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::entities::{cart_item, order, order_item, product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::repositories::delivery_repository::is_unique_violation;
use crate::repositories::{DeliveryRepository, NewShipment, OrderRepository};
use crate::services::delivery::{Address, CreateShipmentRequest, DeliveryService, PackageDetails};

const DEFAULT_ITEM_WEIGHT_GRAMS: f64 = 500.0;
const DEFAULT_ITEM_LENGTH_CM: f64 = 20.0;
const DEFAULT_ITEM_WIDTH_CM: f64 = 15.0;
const DEFAULT_ITEM_HEIGHT_CM: f64 = 10.0;
/// Stacked height never exceeds this, however many items are ordered
pub const MAX_PACKAGE_HEIGHT_CM: f64 = 50.0;
const ORDER_INSERT_ATTEMPTS: usize = 3;

// Customer shipping addresses are not captured at checkout yet, so every
// shipment is addressed here.
pub const PLACEHOLDER_DESTINATION_NAME: &str = "Storefront Customer";
pub const PLACEHOLDER_DESTINATION_PHONE: &str = "+971 50 000 0000";
pub const PLACEHOLDER_DESTINATION_ADDRESS: &str = "Dubai Marina, Marina Walk";
pub const PLACEHOLDER_DESTINATION_CITY: &str = "Dubai";
pub const PLACEHOLDER_DESTINATION_COUNTRY: &str = "AE";

pub fn placeholder_destination() -> Address {
    Address {
        name: PLACEHOLDER_DESTINATION_NAME.to_string(),
        phone: PLACEHOLDER_DESTINATION_PHONE.to_string(),
        address: PLACEHOLDER_DESTINATION_ADDRESS.to_string(),
        city: PLACEHOLDER_DESTINATION_CITY.to_string(),
        country: PLACEHOLDER_DESTINATION_COUNTRY.to_string(),
    }
}

/// Per-unit shipping attributes of one purchased line
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PackageLine {
    pub quantity: i32,
    pub weight_grams: Option<f64>,
    pub length_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
}

impl From<&order_item::Model> for PackageLine {
    fn from(item: &order_item::Model) -> Self {
        Self {
            quantity: item.quantity,
            weight_grams: item.weight_grams,
            length_cm: item.length_cm,
            width_cm: item.width_cm,
            height_cm: item.height_cm,
        }
    }
}

/// Aggregate parcel for a whole order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackageProfile {
    pub weight_kg: f64,
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
}

impl PackageProfile {
    /// Items are stacked: weight and height add up per unit, footprint is
    /// the largest item's. Missing attributes take per-item defaults.
    pub fn aggregate(lines: &[PackageLine]) -> Self {
        let mut weight_grams = 0.0;
        let mut length_cm: f64 = 0.0;
        let mut width_cm: f64 = 0.0;
        let mut height_cm = 0.0;

        for line in lines {
            let quantity = f64::from(line.quantity.max(0));
            weight_grams += line.weight_grams.unwrap_or(DEFAULT_ITEM_WEIGHT_GRAMS) * quantity;
            length_cm = length_cm.max(line.length_cm.unwrap_or(DEFAULT_ITEM_LENGTH_CM));
            width_cm = width_cm.max(line.width_cm.unwrap_or(DEFAULT_ITEM_WIDTH_CM));
            height_cm += line.height_cm.unwrap_or(DEFAULT_ITEM_HEIGHT_CM) * quantity;
        }

        Self {
            weight_kg: weight_grams / 1000.0,
            length_cm,
            width_cm,
            height_cm: f64::min(height_cm, MAX_PACKAGE_HEIGHT_CM),
        }
    }

    pub fn into_details(self, description: Option<String>) -> PackageDetails {
        PackageDetails {
            weight: self.weight_kg,
            length: self.length_cm,
            width: self.width_cm,
            height: self.height_cm,
            description,
        }
    }
}

/// The parts of a `checkout.session.completed` event this service uses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutCompleted {
    pub session_id: String,
    pub user_id: String,
    /// Total in minor currency units
    pub amount_total: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FulfillmentOutcome {
    pub order_id: Uuid,
    pub order_number: String,
    /// `false` when the session had already been fulfilled
    pub order_created: bool,
    pub tracking_number: Option<String>,
}

pub struct CheckoutFulfillmentService {
    db: Arc<DatabaseConnection>,
    orders: OrderRepository,
    deliveries: Arc<DeliveryRepository>,
    delivery: Arc<DeliveryService>,
    event_sender: Arc<EventSender>,
    provider_name: String,
}

impl CheckoutFulfillmentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        deliveries: Arc<DeliveryRepository>,
        delivery: Arc<DeliveryService>,
        event_sender: Arc<EventSender>,
        provider_name: impl Into<String>,
    ) -> Self {
        Self {
            orders: OrderRepository::new(db.clone()),
            db,
            deliveries,
            delivery,
            event_sender,
            provider_name: provider_name.into(),
        }
    }

    /// Records the paid order (once per checkout session), clears the cart
    /// and initialises delivery. Only order persistence can fail this call;
    /// delivery problems are logged and leave the order in place.
    #[instrument(skip(self, checkout), fields(session_id = %checkout.session_id, user_id = %checkout.user_id))]
    pub async fn handle_checkout_completed(
        &self,
        checkout: &CheckoutCompleted,
    ) -> Result<FulfillmentOutcome, ServiceError> {
        let (order, order_created) = match self
            .orders
            .find_by_payment_session(&checkout.session_id)
            .await?
        {
            Some(existing) => {
                info!(order_id = %existing.id, "Checkout session already fulfilled");
                (existing, false)
            }
            None => self.create_order(checkout).await?,
        };

        if order_created {
            self.event_sender
                .send_or_log(Event::OrderCreated {
                    order_id: order.id,
                    order_number: order.order_number.clone(),
                    payment_session_id: checkout.session_id.clone(),
                })
                .await;
        }

        let order_id = order.id;
        let order_number = order.order_number.clone();
        let tracking_number = match order.tracking_number.clone() {
            Some(tracking_number) => Some(tracking_number),
            None => match self.initialize_delivery(order).await {
                Ok(tracking_number) => tracking_number,
                Err(e) => {
                    error!(%order_id, error = %e, "Delivery initialization failed");
                    self.event_sender
                        .send_or_log(Event::DeliveryInitializationFailed {
                            order_id,
                            reason: e.to_string(),
                        })
                        .await;
                    None
                }
            },
        };

        Ok(FulfillmentOutcome {
            order_id,
            order_number,
            order_created,
            tracking_number,
        })
    }

    async fn create_order(
        &self,
        checkout: &CheckoutCompleted,
    ) -> Result<(order::Model, bool), ServiceError> {
        self.create_order_with_ids(checkout, Uuid::new_v4).await
    }

    /// Creates the order under a fresh id from `next_id`. A unique violation
    /// is either a concurrent delivery of the same session, answered with the
    /// existing order, or an order number already taken, retried.
    async fn create_order_with_ids(
        &self,
        checkout: &CheckoutCompleted,
        mut next_id: impl FnMut() -> Uuid,
    ) -> Result<(order::Model, bool), ServiceError> {
        for attempt in 1..=ORDER_INSERT_ATTEMPTS {
            if let Some(order) = self.insert_order(checkout, next_id()).await? {
                return Ok((order, true));
            }

            if let Some(existing) = self
                .orders
                .find_by_payment_session(&checkout.session_id)
                .await?
            {
                info!(order_id = %existing.id, "Concurrent delivery of the same checkout session");
                return Ok((existing, false));
            }
            warn!(attempt, "Order number already taken; retrying with a new id");
        }

        Err(ServiceError::Conflict(format!(
            "Order for session {} could not be created",
            checkout.session_id
        )))
    }

    /// Inserts the order and its line items from the user's cart, then
    /// empties the cart, in one transaction. `Ok(None)` on a unique
    /// violation, with nothing written.
    async fn insert_order(
        &self,
        checkout: &CheckoutCompleted,
        order_id: Uuid,
    ) -> Result<Option<order::Model>, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = cart_item::Entity::find()
            .filter(cart_item::Column::UserId.eq(checkout.user_id.as_str()))
            .find_also_related(product::Entity)
            .all(&txn)
            .await?;

        let now = Utc::now();
        let order_number = order::order_number_for(order_id);

        let inserted = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            user_id: Set(checkout.user_id.clone()),
            payment_session_id: Set(checkout.session_id.clone()),
            status: Set(order::STATUS_CONFIRMED.to_string()),
            payment_status: Set(order::PAYMENT_STATUS_PAID.to_string()),
            total_amount: Set(Decimal::new(checkout.amount_total, 2)),
            currency: Set(checkout.currency.to_uppercase()),
            tracking_number: Set(None),
            delivery_provider: Set(None),
            estimated_delivery: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await;

        let order = match inserted {
            Ok(order) => order,
            Err(e) if is_unique_violation(&e) => {
                txn.rollback().await?;
                return Ok(None);
            }
            Err(e) => return Err(ServiceError::db_error(e)),
        };

        for (item, product) in &cart {
            let Some(product) = product else {
                warn!(product_id = %item.product_id, "Cart item references a missing product");
                continue;
            };
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                name: Set(product.name.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(product.price),
                weight_grams: Set(product.weight_grams),
                length_cm: Set(product.length_cm),
                width_cm: Set(product.width_cm),
                height_cm: Set(product.height_cm),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::UserId.eq(checkout.user_id.as_str()))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        info!(%order_id, %order_number, items = cart.len(), "Order created from checkout");
        Ok(Some(order))
    }

    /// Requests a shipment for the order and records it. `Ok(None)` when the
    /// order has nothing to ship or the provider declined.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    async fn initialize_delivery(
        &self,
        order: order::Model,
    ) -> Result<Option<String>, ServiceError> {
        if let Some(existing) = self.deliveries.find_by_order_id(order.id).await? {
            let tracking_number = existing.tracking_number.clone();
            self.orders
                .set_tracking(
                    order,
                    &existing.tracking_number,
                    &existing.provider,
                    existing.estimated_delivery,
                )
                .await?;
            return Ok(Some(tracking_number));
        }

        let items = self.orders.items(order.id).await?;
        if items.is_empty() {
            warn!("Order has no line items; skipping delivery");
            return Ok(None);
        }

        let lines: Vec<PackageLine> = items.iter().map(PackageLine::from).collect();
        let package = PackageProfile::aggregate(&lines)
            .into_details(Some(format!("Order {}", order.order_number)));

        let request = CreateShipmentRequest {
            origin: self.delivery.origin().clone(),
            destination: placeholder_destination(),
            package,
            order_id: order.id,
            order_number: order.order_number.clone(),
        };

        let response = self
            .delivery
            .create_shipment(&request, Some(self.provider_name.as_str()))
            .await;
        if !response.success {
            let reason = response
                .error
                .unwrap_or_else(|| "unknown provider error".to_string());
            warn!(%reason, "Shipment was not created");
            self.event_sender
                .send_or_log(Event::DeliveryInitializationFailed {
                    order_id: order.id,
                    reason,
                })
                .await;
            return Ok(None);
        }

        let tracking_number = response.tracking_number.ok_or_else(|| {
            ServiceError::ProviderError("Provider accepted the shipment without a tracking number".to_string())
        })?;
        let provider = response
            .provider
            .unwrap_or_else(|| self.provider_name.clone());

        let (shipment, created) = self
            .deliveries
            .create_if_absent(NewShipment {
                order_id: order.id,
                tracking_number,
                provider,
                origin: request.origin,
                destination: request.destination,
                package: request.package,
                estimated_delivery: response.estimated_delivery,
                shipping_cost: response.cost,
                currency: response
                    .currency
                    .unwrap_or_else(|| order.currency.clone()),
                provider_response: response.raw,
            })
            .await?;

        self.orders
            .set_tracking(
                order,
                &shipment.tracking_number,
                &shipment.provider,
                shipment.estimated_delivery,
            )
            .await?;

        if created {
            self.event_sender
                .send_or_log(Event::ShipmentCreated {
                    order_id: shipment.order_id,
                    shipment_id: shipment.id,
                    tracking_number: shipment.tracking_number.clone(),
                    provider: shipment.provider.clone(),
                })
                .await;
        }

        info!(tracking_number = %shipment.tracking_number, created, "Delivery initialized");
        Ok(Some(shipment.tracking_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio::sync::mpsc;

    use crate::config::AppConfig;

    fn line(quantity: i32, weight_grams: Option<f64>, height_cm: Option<f64>) -> PackageLine {
        PackageLine {
            quantity,
            weight_grams,
            height_cm,
            ..PackageLine::default()
        }
    }

    #[test]
    fn unset_weight_defaults_to_half_a_kilo_per_unit() {
        let profile = PackageProfile::aggregate(&[line(2, None, None), line(1, Some(300.0), None)]);
        assert_eq!(profile.weight_kg, 1.3);
    }

    #[test]
    fn footprint_is_the_largest_item_with_defaults() {
        let mut big = line(1, None, None);
        big.length_cm = Some(40.0);
        let mut wide = line(1, None, None);
        wide.width_cm = Some(35.0);

        let profile = PackageProfile::aggregate(&[big, wide]);
        assert_eq!(profile.length_cm, 40.0);
        assert_eq!(profile.width_cm, 35.0);

        let defaults = PackageProfile::aggregate(&[line(1, None, None)]);
        assert_eq!((defaults.length_cm, defaults.width_cm), (20.0, 15.0));
    }

    #[test]
    fn stacked_height_is_capped() {
        let profile = PackageProfile::aggregate(&[line(3, None, None)]);
        assert_eq!(profile.height_cm, 30.0);

        let tall = PackageProfile::aggregate(&[line(4, None, Some(12.0)), line(3, None, None)]);
        assert_eq!(tall.height_cm, MAX_PACKAGE_HEIGHT_CM);
    }

    #[test]
    fn negative_quantities_contribute_nothing() {
        let profile = PackageProfile::aggregate(&[line(-2, Some(1000.0), Some(10.0))]);
        assert_eq!(profile.weight_kg, 0.0);
        assert_eq!(profile.height_cm, 0.0);
    }

    #[test]
    fn placeholder_destination_is_dubai() {
        let destination = placeholder_destination();
        assert_eq!(destination.city, "Dubai");
        assert_eq!(destination.country, "AE");
    }

    async fn service() -> CheckoutFulfillmentService {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        let pool = crate::db::establish_connection_from_app_config(&cfg)
            .await
            .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();

        let db = Arc::new(pool);
        let (event_tx, _event_rx) = mpsc::channel(16);
        CheckoutFulfillmentService::new(
            db.clone(),
            Arc::new(DeliveryRepository::new(db)),
            Arc::new(DeliveryService::from_store(&cfg.delivery.store)),
            Arc::new(EventSender::new(event_tx)),
            "mock",
        )
    }

    fn checkout(session_id: &str) -> CheckoutCompleted {
        CheckoutCompleted {
            session_id: session_id.to_string(),
            user_id: "user-1".to_string(),
            amount_total: 4_200,
            currency: "aed".to_string(),
        }
    }

    fn id(value: &str) -> Uuid {
        Uuid::parse_str(value).unwrap()
    }

    #[tokio::test]
    async fn taken_order_number_is_retried_with_a_new_id() {
        let service = service().await;
        let (first, created) = service
            .create_order_with_ids(&checkout("cs_first"), || {
                id("1a2b3c4d-5e6f-4000-8000-000000000001")
            })
            .await
            .unwrap();
        assert!(created);

        let mut ids = vec![
            id("1a2b3c4d-5e6f-4000-8000-000000000002"),
            id("9f8e7d6c-5b4a-4000-8000-000000000003"),
        ]
        .into_iter();
        let (second, created) = service
            .create_order_with_ids(&checkout("cs_second"), || ids.next().unwrap())
            .await
            .unwrap();

        assert!(created);
        assert_eq!(second.id, id("9f8e7d6c-5b4a-4000-8000-000000000003"));
        assert_eq!(second.order_number, "ORD-9F8E7D6C5B4A");
        assert_ne!(second.order_number, first.order_number);
        assert_eq!(second.payment_session_id, "cs_second");
    }

    #[tokio::test]
    async fn same_session_returns_the_existing_order() {
        let service = service().await;
        let (first, _) = service
            .create_order_with_ids(&checkout("cs_same"), Uuid::new_v4)
            .await
            .unwrap();

        let (again, created) = service
            .create_order_with_ids(&checkout("cs_same"), Uuid::new_v4)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(again.id, first.id);
    }

    #[tokio::test]
    async fn persistent_order_number_clashes_end_in_conflict() {
        let service = service().await;
        let taken = id("1a2b3c4d-5e6f-4000-8000-000000000001");
        service
            .create_order_with_ids(&checkout("cs_taken"), || taken)
            .await
            .unwrap();

        let err = service
            .create_order_with_ids(&checkout("cs_unlucky"), || {
                id("1a2b3c4d-5e6f-4000-8000-0000000000ff")
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::Conflict(_));
    }
}
