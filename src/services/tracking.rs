use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{delivery_shipment, delivery_tracking_update, ShipmentStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::repositories::{DeliveryRepository, OrderRepository, StatusAdvance};
use crate::services::delivery::{DeliveryService, TrackingEvent};

pub const NO_TRACKING_INFO: &str = "No tracking information available";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackingUpdateView {
    pub status: ShipmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl From<delivery_tracking_update::Model> for TrackingUpdateView {
    fn from(update: delivery_tracking_update::Model) -> Self {
        Self {
            status: update.status,
            location: update.location,
            description: update.description,
            timestamp: update.timestamp,
        }
    }
}

/// Tracking page payload; `updates` are newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub tracking_number: String,
    pub order_id: Uuid,
    pub order_number: Option<String>,
    pub provider: String,
    pub status: ShipmentStatus,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub updates: Vec<TrackingUpdateView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CancellationResult {
    pub tracking_number: String,
    pub cancelled: bool,
    pub status: ShipmentStatus,
}

/// Walks the cached status forward through every legal step the history
/// allows. `None` when nothing changes.
pub fn advance_status(current: ShipmentStatus, events: &[TrackingEvent]) -> Option<StatusAdvance> {
    let mut status = current;
    let mut actual_delivery = None;
    for event in events {
        if status.can_transition_to(event.status) {
            status = event.status;
            if status == ShipmentStatus::Delivered {
                actual_delivery = Some(event.timestamp);
            }
        }
    }
    (status != current).then_some(StatusAdvance {
        status,
        actual_delivery,
    })
}

pub struct TrackingService {
    deliveries: Arc<DeliveryRepository>,
    orders: OrderRepository,
    delivery: Arc<DeliveryService>,
    event_sender: Arc<EventSender>,
}

impl TrackingService {
    pub fn new(
        deliveries: Arc<DeliveryRepository>,
        orders: OrderRepository,
        delivery: Arc<DeliveryService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            deliveries,
            orders,
            delivery,
            event_sender,
        }
    }

    /// Persists milestones the provider reports that are not stored yet and
    /// moves the cached status forward. Returns the resulting status and
    /// delivery time.
    async fn sync_progress(
        &self,
        shipment: &delivery_shipment::Model,
    ) -> Result<(ShipmentStatus, Option<DateTime<Utc>>), ServiceError> {
        let events = self
            .delivery
            .track_shipment(&shipment.tracking_number, Some(shipment.provider.as_str()))
            .await;

        let advance = advance_status(shipment.status, &events);
        let appended = if events.is_empty() && advance.is_none() {
            0
        } else {
            self.deliveries
                .record_progress(shipment, &events, advance)
                .await?
        };

        let Some(advance) = advance else {
            return Ok((shipment.status, shipment.actual_delivery));
        };

        counter!("storefront_delivery.shipments.status_changed", 1, "status" => advance.status.as_str());
        info!(from = %shipment.status, to = %advance.status, appended, "Shipment progressed");
        self.event_sender
            .send_or_log(Event::ShipmentStatusChanged {
                shipment_id: shipment.id,
                tracking_number: shipment.tracking_number.clone(),
                from: shipment.status,
                to: advance.status,
                at: Utc::now(),
            })
            .await;
        Ok((
            advance.status,
            advance.actual_delivery.or(shipment.actual_delivery),
        ))
    }

    /// Asks the shipment's provider for its history, persists milestones not
    /// seen before and returns the stored timeline.
    #[instrument(skip(self))]
    pub async fn track(&self, tracking_number: &str) -> Result<TrackingView, ServiceError> {
        let shipment = self
            .deliveries
            .find_by_tracking_number(tracking_number)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NO_TRACKING_INFO.to_string()))?;

        let (status, actual_delivery) = self.sync_progress(&shipment).await?;

        let updates = self
            .deliveries
            .tracking_updates(shipment.id)
            .await?
            .into_iter()
            .map(TrackingUpdateView::from)
            .collect();

        let order_number = self
            .orders
            .find_by_id(shipment.order_id)
            .await?
            .map(|order| order.order_number);

        Ok(TrackingView {
            tracking_number: shipment.tracking_number,
            order_id: shipment.order_id,
            order_number,
            provider: shipment.provider,
            status,
            estimated_delivery: shipment.estimated_delivery,
            actual_delivery,
            updates,
        })
    }

    /// Cancels through the shipment's provider and records the outcome.
    #[instrument(skip(self))]
    pub async fn cancel(&self, tracking_number: &str) -> Result<CancellationResult, ServiceError> {
        let shipment = self
            .deliveries
            .find_by_tracking_number(tracking_number)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NO_TRACKING_INFO.to_string()))?;

        let cancelled = self
            .delivery
            .cancel_shipment(tracking_number, Some(shipment.provider.as_str()))
            .await;

        if !cancelled {
            // Answer with the status tracking readers would see right now
            let (status, _) = self.sync_progress(&shipment).await?;
            info!(%status, "Cancellation declined");
            return Ok(CancellationResult {
                tracking_number: shipment.tracking_number,
                cancelled: false,
                status,
            });
        }

        let now = Utc::now();
        // Providers that keep their own state leave the row pending
        let flipped = self.deliveries.mark_cancelled(tracking_number, now).await?;
        let stored = self
            .deliveries
            .find_by_tracking_number(tracking_number)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NO_TRACKING_INFO.to_string()))?;

        let newly_cancelled = shipment.status != ShipmentStatus::Cancelled
            && stored.status == ShipmentStatus::Cancelled;
        if !newly_cancelled {
            if stored.status != ShipmentStatus::Cancelled {
                warn!(
                    status = %stored.status,
                    "Provider accepted cancellation but the shipment is no longer pending"
                );
            }
            return Ok(CancellationResult {
                tracking_number: stored.tracking_number,
                cancelled: false,
                status: stored.status,
            });
        }

        debug!(flipped, "Shipment cancelled");
        self.event_sender
            .send_or_log(Event::ShipmentCancelled {
                tracking_number: tracking_number.to_string(),
                at: stored.updated_at,
            })
            .await;

        Ok(CancellationResult {
            tracking_number: stored.tracking_number,
            cancelled: true,
            status: stored.status,
        })
    }
}
