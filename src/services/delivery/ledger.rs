use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::entities::{delivery_shipment, ShipmentStatus};
use crate::errors::ServiceError;

/// The slice of a persisted shipment a courier needs to answer
/// tracking and cancellation calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentSnapshot {
    pub tracking_number: String,
    pub origin_city: String,
    pub destination_city: String,
    pub destination_address: String,
    pub status: ShipmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&delivery_shipment::Model> for ShipmentSnapshot {
    fn from(model: &delivery_shipment::Model) -> Self {
        Self {
            tracking_number: model.tracking_number.clone(),
            origin_city: model.origin_city.clone(),
            destination_city: model.destination_city.clone(),
            destination_address: model.destination_address.clone(),
            status: model.status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Source of truth for shipments a provider has issued. Providers hold no
/// shipment state of their own and read through this.
#[async_trait]
pub trait ShipmentLedger: Send + Sync {
    async fn find_shipment(
        &self,
        tracking_number: &str,
    ) -> Result<Option<ShipmentSnapshot>, ServiceError>;

    /// Flips a pending shipment to cancelled. Returns `false` if the
    /// shipment is unknown or no longer pending.
    async fn mark_cancelled(
        &self,
        tracking_number: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, ServiceError>;
}

/// Process-local ledger for tests and demos
#[derive(Debug, Default)]
pub struct InMemoryShipmentLedger {
    shipments: DashMap<String, ShipmentSnapshot>,
}

impl InMemoryShipmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, snapshot: ShipmentSnapshot) {
        self.shipments
            .insert(snapshot.tracking_number.clone(), snapshot);
    }

    pub fn len(&self) -> usize {
        self.shipments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shipments.is_empty()
    }
}

#[async_trait]
impl ShipmentLedger for InMemoryShipmentLedger {
    async fn find_shipment(
        &self,
        tracking_number: &str,
    ) -> Result<Option<ShipmentSnapshot>, ServiceError> {
        Ok(self
            .shipments
            .get(tracking_number)
            .map(|entry| entry.value().clone()))
    }

    async fn mark_cancelled(
        &self,
        tracking_number: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        match self.shipments.get_mut(tracking_number) {
            Some(mut entry) if entry.status == ShipmentStatus::Pending => {
                entry.status = ShipmentStatus::Cancelled;
                entry.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
