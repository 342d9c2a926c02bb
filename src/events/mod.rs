use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::ShipmentStatus;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends without surfacing a closed channel to the caller
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropping domain event");
        }
    }
}

/// Domain events raised by checkout fulfillment and shipment tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        payment_session_id: String,
    },
    ShipmentCreated {
        order_id: Uuid,
        shipment_id: Uuid,
        tracking_number: String,
        provider: String,
    },
    DeliveryInitializationFailed {
        order_id: Uuid,
        reason: String,
    },
    ShipmentStatusChanged {
        shipment_id: Uuid,
        tracking_number: String,
        from: ShipmentStatus,
        to: ShipmentStatus,
        at: DateTime<Utc>,
    },
    ShipmentCancelled {
        tracking_number: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "order_created",
            Event::ShipmentCreated { .. } => "shipment_created",
            Event::DeliveryInitializationFailed { .. } => "delivery_initialization_failed",
            Event::ShipmentStatusChanged { .. } => "shipment_status_changed",
            Event::ShipmentCancelled { .. } => "shipment_cancelled",
        }
    }
}

/// Drains the event channel, logging each event until every sender is gone.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::DeliveryInitializationFailed { order_id, reason } => {
                warn!(%order_id, %reason, "Order has no shipment");
            }
            Event::ShipmentStatusChanged {
                tracking_number,
                from,
                to,
                ..
            } => {
                info!(%tracking_number, %from, %to, "Shipment status changed");
            }
            other => {
                info!(event = other.name(), payload = ?other, "Domain event");
            }
        }
    }

    info!("Event channel closed");
}
