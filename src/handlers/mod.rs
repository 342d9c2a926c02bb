pub mod delivery;
pub mod health;
pub mod payment_webhooks;

pub use crate::AppState;
