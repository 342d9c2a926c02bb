use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::order::{self, Column, Entity as Order, Model as OrderModel};
use crate::entities::order_item::{self, Entity as OrderItem, Model as OrderItemModel};
use crate::errors::ServiceError;

use super::{BaseRepository, Repository};

/// Repository for order operations
#[derive(Debug)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find an order by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderModel>, ServiceError> {
        Order::find_by_id(id)
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Find the order created for a checkout session
    pub async fn find_by_payment_session(
        &self,
        session_id: &str,
    ) -> Result<Option<OrderModel>, ServiceError> {
        Order::find()
            .filter(Column::PaymentSessionId.eq(session_id))
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Line items of an order, in insertion order
    pub async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItemModel>, ServiceError> {
        OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Stores the denormalized shipment reference on the order
    pub async fn set_tracking(
        &self,
        order: OrderModel,
        tracking_number: &str,
        provider: &str,
        estimated_delivery: Option<DateTime<Utc>>,
    ) -> Result<OrderModel, ServiceError> {
        let mut active: order::ActiveModel = order.into();
        active.tracking_number = Set(Some(tracking_number.to_string()));
        active.delivery_provider = Set(Some(provider.to_string()));
        active.estimated_delivery = Set(estimated_delivery);
        active.updated_at = Set(Utc::now());
        active
            .update(self.base.get_db())
            .await
            .map_err(ServiceError::db_error)
    }
}
