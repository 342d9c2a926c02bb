use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::delivery_shipment::ShipmentStatus;

/// Append-only tracking event; `tracking_number` is denormalized for lookup.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_tracking_updates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub shipment_id: Uuid,

    pub tracking_number: String,

    pub status: ShipmentStatus,

    pub location: Option<String>,

    pub description: String,

    pub timestamp: DateTime<Utc>,

    pub provider_data: Option<Json>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::delivery_shipment::Entity",
        from = "Column::ShipmentId",
        to = "super::delivery_shipment::Column::Id",
        on_delete = "Cascade"
    )]
    Shipment,
}

impl Related<super::delivery_shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
