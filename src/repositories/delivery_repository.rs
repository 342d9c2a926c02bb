use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr, TransactionTrait,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::entities::delivery_rate::{self, Entity as DeliveryRate};
use crate::entities::delivery_shipment::{self, Entity as DeliveryShipment};
use crate::entities::delivery_tracking_update::{self, Entity as TrackingUpdate};
use crate::entities::ShipmentStatus;
use crate::errors::ServiceError;
use crate::services::delivery::{
    timeline, Address, PackageDetails, RateRequest, ShipmentLedger, ShipmentSnapshot,
    ShippingRate, TrackingEvent,
};

use super::{BaseRepository, Repository};

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Everything needed to persist a shipment a provider has accepted
#[derive(Debug, Clone)]
pub struct NewShipment {
    pub order_id: Uuid,
    pub tracking_number: String,
    pub provider: String,
    pub origin: Address,
    pub destination: Address,
    pub package: PackageDetails,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub shipping_cost: Option<f64>,
    pub currency: String,
    pub provider_response: Option<serde_json::Value>,
}

/// Status change to apply alongside newly observed milestones
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusAdvance {
    pub status: ShipmentStatus,
    pub actual_delivery: Option<DateTime<Utc>>,
}

/// Shipments, their tracking history and the rate-quote cache
#[derive(Debug)]
pub struct DeliveryRepository {
    base: BaseRepository,
}

impl DeliveryRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_by_tracking_number(
        &self,
        tracking_number: &str,
    ) -> Result<Option<delivery_shipment::Model>, ServiceError> {
        DeliveryShipment::find()
            .filter(delivery_shipment::Column::TrackingNumber.eq(tracking_number))
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn find_by_order_id(
        &self,
        order_id: Uuid,
    ) -> Result<Option<delivery_shipment::Model>, ServiceError> {
        DeliveryShipment::find()
            .filter(delivery_shipment::Column::OrderId.eq(order_id))
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Persists the shipment and its initial `pending` update, unless the
    /// order already has one. Returns the stored row and whether it was new.
    #[instrument(skip(self, new), fields(order_id = %new.order_id, tracking_number = %new.tracking_number))]
    pub async fn create_if_absent(
        &self,
        new: NewShipment,
    ) -> Result<(delivery_shipment::Model, bool), ServiceError> {
        if let Some(existing) = self.find_by_order_id(new.order_id).await? {
            debug!("Order already has a shipment");
            return Ok((existing, false));
        }

        let now = Utc::now();
        let shipment_id = Uuid::new_v4();
        let txn = self.base.get_db().begin().await?;

        let inserted = delivery_shipment::ActiveModel {
            id: Set(shipment_id),
            order_id: Set(new.order_id),
            tracking_number: Set(new.tracking_number.clone()),
            provider: Set(new.provider),
            origin_name: Set(new.origin.name),
            origin_phone: Set(new.origin.phone),
            origin_address: Set(new.origin.address),
            origin_city: Set(new.origin.city),
            origin_country: Set(new.origin.country),
            destination_name: Set(new.destination.name),
            destination_phone: Set(new.destination.phone),
            destination_address: Set(new.destination.address),
            destination_city: Set(new.destination.city),
            destination_country: Set(new.destination.country),
            weight_kg: Set(new.package.weight),
            length_cm: Set(new.package.length),
            width_cm: Set(new.package.width),
            height_cm: Set(new.package.height),
            description: Set(new.package.description),
            status: Set(ShipmentStatus::Pending),
            estimated_delivery: Set(new.estimated_delivery),
            actual_delivery: Set(None),
            shipping_cost: Set(new.shipping_cost),
            currency: Set(new.currency),
            provider_response: Set(new.provider_response),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await;

        let shipment = match inserted {
            Ok(model) => model,
            Err(e) if is_unique_violation(&e) => {
                // Lost a race with a concurrent delivery of the same order
                txn.rollback().await?;
                return match self.find_by_order_id(new.order_id).await? {
                    Some(existing) => Ok((existing, false)),
                    None => Err(ServiceError::Conflict(format!(
                        "Tracking number {} is already in use",
                        new.tracking_number
                    ))),
                };
            }
            Err(e) => return Err(ServiceError::db_error(e)),
        };

        let pending = timeline::milestone_event(
            &ShipmentSnapshot::from(&shipment),
            ShipmentStatus::Pending,
            shipment.created_at,
        );
        delivery_tracking_update::ActiveModel {
            id: Set(Uuid::new_v4()),
            shipment_id: Set(shipment_id),
            tracking_number: Set(new.tracking_number),
            status: Set(pending.status),
            location: Set(pending.location.clone()),
            description: Set(pending.description.clone()),
            timestamp: Set(pending.timestamp),
            provider_data: Set(Some(serde_json::to_value(&pending)?)),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok((shipment, true))
    }

    /// Persisted history, newest first
    pub async fn tracking_updates(
        &self,
        shipment_id: Uuid,
    ) -> Result<Vec<delivery_tracking_update::Model>, ServiceError> {
        TrackingUpdate::find()
            .filter(delivery_tracking_update::Column::ShipmentId.eq(shipment_id))
            .order_by_desc(delivery_tracking_update::Column::Timestamp)
            .order_by_desc(delivery_tracking_update::Column::CreatedAt)
            .all(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Appends events whose status has no persisted row yet and applies
    /// `advance` to the cached shipment status, in one transaction.
    /// Returns the number of rows appended.
    #[instrument(skip(self, shipment, events), fields(tracking_number = %shipment.tracking_number))]
    pub async fn record_progress(
        &self,
        shipment: &delivery_shipment::Model,
        events: &[TrackingEvent],
        advance: Option<StatusAdvance>,
    ) -> Result<usize, ServiceError> {
        let txn = self.base.get_db().begin().await?;

        let persisted: HashSet<ShipmentStatus> = TrackingUpdate::find()
            .filter(delivery_tracking_update::Column::ShipmentId.eq(shipment.id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|update| update.status)
            .collect();

        let now = Utc::now();
        let mut appended = 0;
        let mut seen = persisted;
        for event in events {
            if !seen.insert(event.status) {
                continue;
            }
            delivery_tracking_update::ActiveModel {
                id: Set(Uuid::new_v4()),
                shipment_id: Set(shipment.id),
                tracking_number: Set(shipment.tracking_number.clone()),
                status: Set(event.status),
                location: Set(event.location.clone()),
                description: Set(event.description.clone()),
                timestamp: Set(event.timestamp),
                provider_data: Set(Some(serde_json::to_value(event)?)),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
            appended += 1;
        }

        if let Some(advance) = advance {
            let mut active: delivery_shipment::ActiveModel = shipment.clone().into();
            active.status = Set(advance.status);
            if advance.actual_delivery.is_some() {
                active.actual_delivery = Set(advance.actual_delivery);
            }
            active.updated_at = Set(now);
            active.update(&txn).await?;
        }

        txn.commit().await?;
        Ok(appended)
    }

    /// Conditionally flips a pending shipment to cancelled and appends the
    /// `cancelled` update. No-op for any other status.
    #[instrument(skip(self))]
    pub async fn mark_cancelled(
        &self,
        tracking_number: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let txn = self.base.get_db().begin().await?;

        let result = DeliveryShipment::update_many()
            .col_expr(
                delivery_shipment::Column::Status,
                Expr::value(ShipmentStatus::Cancelled.as_str()),
            )
            .col_expr(delivery_shipment::Column::UpdatedAt, Expr::value(at))
            .filter(delivery_shipment::Column::TrackingNumber.eq(tracking_number))
            .filter(delivery_shipment::Column::Status.eq(ShipmentStatus::Pending))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        let shipment = DeliveryShipment::find()
            .filter(delivery_shipment::Column::TrackingNumber.eq(tracking_number))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Shipment {}", tracking_number)))?;

        delivery_tracking_update::ActiveModel {
            id: Set(Uuid::new_v4()),
            shipment_id: Set(shipment.id),
            tracking_number: Set(tracking_number.to_string()),
            status: Set(ShipmentStatus::Cancelled),
            location: Set(None),
            description: Set("Shipment cancelled".to_string()),
            timestamp: Set(at),
            provider_data: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(true)
    }

    /// Unexpired quotes for exactly this route and package, cheapest first
    pub async fn get_cached_rates(
        &self,
        request: &RateRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<delivery_rate::Model>, ServiceError> {
        DeliveryRate::find()
            .filter(delivery_rate::Column::OriginCity.eq(request.origin.city.as_str()))
            .filter(delivery_rate::Column::OriginCountry.eq(request.origin.country.as_str()))
            .filter(delivery_rate::Column::DestinationCity.eq(request.destination.city.as_str()))
            .filter(
                delivery_rate::Column::DestinationCountry
                    .eq(request.destination.country.as_str()),
            )
            .filter(delivery_rate::Column::WeightKg.eq(request.package.weight))
            .filter(delivery_rate::Column::LengthCm.eq(request.package.length))
            .filter(delivery_rate::Column::WidthCm.eq(request.package.width))
            .filter(delivery_rate::Column::HeightCm.eq(request.package.height))
            .filter(delivery_rate::Column::ExpiresAt.gt(now))
            .order_by_asc(delivery_rate::Column::Cost)
            .all(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Caches quotes for this route and package until `expires_at`.
    #[instrument(skip(self, request, rates), fields(count = rates.len()))]
    pub async fn store_rates(
        &self,
        request: &RateRequest,
        rates: &[ShippingRate],
        expires_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        if rates.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let rows = rates.iter().map(|rate| delivery_rate::ActiveModel {
            id: Set(Uuid::new_v4()),
            origin_city: Set(request.origin.city.clone()),
            origin_country: Set(request.origin.country.clone()),
            destination_city: Set(request.destination.city.clone()),
            destination_country: Set(request.destination.country.clone()),
            weight_kg: Set(request.package.weight),
            length_cm: Set(request.package.length),
            width_cm: Set(request.package.width),
            height_cm: Set(request.package.height),
            provider: Set(rate.provider.clone()),
            service_name: Set(rate.service_name.clone()),
            cost: Set(rate.cost),
            currency: Set(rate.currency.clone()),
            estimated_days_min: Set(rate.estimated_days_min),
            estimated_days_max: Set(rate.estimated_days_max),
            description: Set(rate.description.clone()),
            expires_at: Set(expires_at),
            created_at: Set(now),
        });

        // One row per quote key: a concurrent miss or an expired row is refreshed in place
        DeliveryRate::insert_many(rows)
            .on_conflict(
                OnConflict::columns([
                    delivery_rate::Column::OriginCity,
                    delivery_rate::Column::OriginCountry,
                    delivery_rate::Column::DestinationCity,
                    delivery_rate::Column::DestinationCountry,
                    delivery_rate::Column::WeightKg,
                    delivery_rate::Column::LengthCm,
                    delivery_rate::Column::WidthCm,
                    delivery_rate::Column::HeightCm,
                    delivery_rate::Column::Provider,
                    delivery_rate::Column::ServiceName,
                ])
                .update_columns([
                    delivery_rate::Column::Cost,
                    delivery_rate::Column::Currency,
                    delivery_rate::Column::EstimatedDaysMin,
                    delivery_rate::Column::EstimatedDaysMax,
                    delivery_rate::Column::Description,
                    delivery_rate::Column::ExpiresAt,
                    delivery_rate::Column::CreatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)?;
        Ok(())
    }

    /// Deletes quotes whose expiry is not in the future. Returns the count removed.
    #[instrument(skip(self))]
    pub async fn cleanup_expired_rates(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let result = DeliveryRate::delete_many()
            .filter(delivery_rate::Column::ExpiresAt.lte(now))
            .exec(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl ShipmentLedger for DeliveryRepository {
    async fn find_shipment(
        &self,
        tracking_number: &str,
    ) -> Result<Option<ShipmentSnapshot>, ServiceError> {
        Ok(self
            .find_by_tracking_number(tracking_number)
            .await?
            .as_ref()
            .map(ShipmentSnapshot::from))
    }

    async fn mark_cancelled(
        &self,
        tracking_number: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        DeliveryRepository::mark_cancelled(self, tracking_number, at).await
    }
}

impl From<&delivery_rate::Model> for ShippingRate {
    fn from(row: &delivery_rate::Model) -> Self {
        ShippingRate {
            provider: row.provider.clone(),
            service_name: row.service_name.clone(),
            cost: row.cost,
            currency: row.currency.clone(),
            estimated_days_min: row.estimated_days_min,
            estimated_days_max: row.estimated_days_max,
            description: row.description.clone(),
        }
    }
}
