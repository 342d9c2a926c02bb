//! Time-gated tracking history.
//!
//! A shipment's history is derived from its creation time and the current
//! clock. Each milestone unlocks once its threshold has elapsed and is
//! stamped at `created_at + threshold`, so the output for a given `now` is
//! stable and only ever grows as `now` advances.

use chrono::{DateTime, Duration, Utc};

use super::ledger::ShipmentSnapshot;
use super::provider::TrackingEvent;
use crate::entities::ShipmentStatus;

/// Hours after creation at which each milestone is reached
pub const MILESTONES: [(ShipmentStatus, i64); 6] = [
    (ShipmentStatus::Pending, 0),
    (ShipmentStatus::Confirmed, 2),
    (ShipmentStatus::PickedUp, 6),
    (ShipmentStatus::InTransit, 24),
    (ShipmentStatus::OutForDelivery, 48),
    (ShipmentStatus::Delivered, 72),
];

/// Delivery promise for a new shipment
pub fn estimated_delivery(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::hours(72)
}

fn cancel_window() -> Duration {
    Duration::hours(2)
}

/// Whether a cancel issued at `now` lands before the first post-pending milestone.
pub fn is_cancellable(shipment: &ShipmentSnapshot, now: DateTime<Utc>) -> bool {
    shipment.status == ShipmentStatus::Pending && now - shipment.created_at < cancel_window()
}

/// The canonical event for `status`, shared by the synthesized history
/// and the row persisted when a shipment is created.
pub fn milestone_event(
    shipment: &ShipmentSnapshot,
    status: ShipmentStatus,
    timestamp: DateTime<Utc>,
) -> TrackingEvent {
    let (location, description) = match status {
        ShipmentStatus::Pending => (None, "Shipment information received".to_string()),
        ShipmentStatus::Confirmed => (
            Some(format!("{} Fulfillment Center", shipment.origin_city)),
            "Shipment confirmed and ready for pickup".to_string(),
        ),
        ShipmentStatus::PickedUp => (
            Some(format!("{} Fulfillment Center", shipment.origin_city)),
            "Package picked up by courier".to_string(),
        ),
        ShipmentStatus::InTransit => (
            Some(format!("{} Sorting Hub", shipment.destination_city)),
            format!("In transit to {} hub", shipment.destination_city),
        ),
        ShipmentStatus::OutForDelivery => (
            Some(shipment.destination_city.clone()),
            "Out for delivery".to_string(),
        ),
        ShipmentStatus::Delivered => (
            Some(shipment.destination_address.clone()),
            "Delivered".to_string(),
        ),
        ShipmentStatus::Cancelled => (None, "Shipment cancelled".to_string()),
        ShipmentStatus::Failed => (None, "Delivery attempt failed".to_string()),
    };

    TrackingEvent {
        status,
        location,
        description,
        timestamp,
    }
}

/// History oldest to newest as of `now`.
pub fn synthesize(shipment: &ShipmentSnapshot, now: DateTime<Utc>) -> Vec<TrackingEvent> {
    if shipment.status == ShipmentStatus::Cancelled {
        return vec![
            milestone_event(shipment, ShipmentStatus::Pending, shipment.created_at),
            milestone_event(shipment, ShipmentStatus::Cancelled, shipment.updated_at),
        ];
    }

    let elapsed = now - shipment.created_at;
    MILESTONES
        .iter()
        .filter(|(_, hours)| *hours == 0 || elapsed >= Duration::hours(*hours))
        .map(|(status, hours)| {
            milestone_event(
                shipment,
                *status,
                shipment.created_at + Duration::hours(*hours),
            )
        })
        .collect()
}
