//! Shipping cost heuristics shared by the mock courier.
//!
//! Costs are quoted in AED. The distance factor is a coarse city lookup:
//! destination cities are matched by case-insensitive substring against
//! fixed alias lists, Dubai first.

use super::provider::{PackageDetails, ShippingRate};

pub const CURRENCY: &str = "AED";

const BASE_FEE: f64 = 25.0;
const PER_KG: f64 = 2.0;
/// Charged per litre of package volume
const PER_LITRE: f64 = 0.5;

pub const EXPRESS_MULTIPLIER: f64 = 1.5;
pub const SAME_DAY_MULTIPLIER: f64 = 2.5;

const DUBAI_ALIASES: &[&str] = &["dubai", "dxb"];
const NEAR_EMIRATES: &[&str] = &["sharjah", "ajman", "umm al quwain", "uaq"];
const FAR_EMIRATES: &[&str] = &[
    "abu dhabi",
    "al ain",
    "ras al khaimah",
    "rak",
    "fujairah",
];

pub const FACTOR_DUBAI: f64 = 1.0;
pub const FACTOR_NEAR: f64 = 1.3;
pub const FACTOR_FAR: f64 = 1.6;
pub const FACTOR_DOMESTIC: f64 = 1.2;
pub const FACTOR_INTERNATIONAL: f64 = 3.0;

/// Multiplier applied to the base cost for a destination.
pub fn distance_factor(city: &str, country: &str) -> f64 {
    if !country.trim().eq_ignore_ascii_case("AE") {
        return FACTOR_INTERNATIONAL;
    }

    let city = city.to_lowercase();
    let matches = |aliases: &[&str]| aliases.iter().any(|alias| city.contains(alias));

    if matches(DUBAI_ALIASES) {
        FACTOR_DUBAI
    } else if matches(NEAR_EMIRATES) {
        FACTOR_NEAR
    } else if matches(FAR_EMIRATES) {
        FACTOR_FAR
    } else {
        FACTOR_DOMESTIC
    }
}

/// `round((25 + 2w + 0.5 * V/1000) * factor)`
pub fn base_cost(package: &PackageDetails, factor: f64) -> f64 {
    let litres = package.volume() / 1000.0;
    ((BASE_FEE + PER_KG * package.weight + PER_LITRE * litres) * factor).round()
}

/// The fixed Standard / Express / Same-Day menu for one base cost.
pub fn service_tiers(provider: &str, base: f64) -> Vec<ShippingRate> {
    vec![
        ShippingRate {
            provider: provider.to_string(),
            service_name: "Standard Delivery".to_string(),
            cost: base,
            currency: CURRENCY.to_string(),
            estimated_days_min: 2,
            estimated_days_max: 3,
            description: Some("Delivery within 2-3 business days".to_string()),
        },
        ShippingRate {
            provider: provider.to_string(),
            service_name: "Express Delivery".to_string(),
            cost: base * EXPRESS_MULTIPLIER,
            currency: CURRENCY.to_string(),
            estimated_days_min: 1,
            estimated_days_max: 1,
            description: Some("Next business day delivery".to_string()),
        },
        ShippingRate {
            provider: provider.to_string(),
            service_name: "Same Day Delivery".to_string(),
            cost: base * SAME_DAY_MULTIPLIER,
            currency: CURRENCY.to_string(),
            estimated_days_min: 0,
            estimated_days_max: 0,
            description: Some("Same day delivery within Dubai only".to_string()),
        },
    ]
}
