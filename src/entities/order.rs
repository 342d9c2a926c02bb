use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const STATUS_CONFIRMED: &str = "confirmed";
pub const PAYMENT_STATUS_PAID: &str = "paid";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    #[validate(length(
        min = 1,
        max = 50,
        message = "Order number must be between 1 and 50 characters"
    ))]
    pub order_number: String,

    pub user_id: String,

    /// Checkout session that paid for this order; one order per session.
    #[sea_orm(unique)]
    pub payment_session_id: String,

    pub status: String,
    pub payment_status: String,
    pub total_amount: Decimal,
    pub currency: String,

    // Denormalized copy of the shipment reference for join-free reads
    pub tracking_number: Option<String>,
    pub delivery_provider: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_one = "super::delivery_shipment::Entity")]
    Shipment,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::delivery_shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Hex digits of the order id kept in its order number
pub const ORDER_NUMBER_DIGITS: usize = 12;

/// Human-facing order number derived from the order id, e.g. `ORD-1A2B3C4D5E6F`.
pub fn order_number_for(id: Uuid) -> String {
    let simple = id.simple().to_string().to_uppercase();
    format!("ORD-{}", &simple[..ORDER_NUMBER_DIGITS])
}
