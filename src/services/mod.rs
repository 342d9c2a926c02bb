pub mod checkout_fulfillment;
pub mod delivery;
pub mod rate_quotes;
pub mod tracking;
