pub mod cart_item;
pub mod delivery_rate;
pub mod delivery_shipment;
pub mod delivery_tracking_update;
pub mod order;
pub mod order_item;
pub mod product;

pub use delivery_shipment::ShipmentStatus;
