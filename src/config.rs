use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_PROVIDER: &str = "mock";
const DEFAULT_RATE_CACHE_TTL_SECS: u64 = 3600;

const FALLBACK_STORE_NAME: &str = "Storefront Warehouse";
const FALLBACK_STORE_PHONE: &str = "+971 4 000 0000";
const FALLBACK_STORE_ADDRESS: &str = "Warehouse 12, Al Quoz Industrial Area 3";
const FALLBACK_STORE_CITY: &str = "Dubai";
const FALLBACK_STORE_COUNTRY: &str = "AE";

/// Store (shipment origin) details.
#[derive(Clone, Debug, Deserialize, Validate, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[validate(length(min = 1))]
    #[serde(default = "default_store_name")]
    pub name: String,
    #[serde(default = "default_store_phone")]
    pub phone: String,
    #[validate(length(min = 1))]
    #[serde(default = "default_store_address")]
    pub address: String,
    #[validate(length(min = 1))]
    #[serde(default = "default_store_city")]
    pub city: String,
    #[validate(length(equal = 2))]
    #[serde(default = "default_store_country")]
    pub country: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: default_store_name(),
            phone: default_store_phone(),
            address: default_store_address(),
            city: default_store_city(),
            country: default_store_country(),
        }
    }
}

/// Delivery pipeline configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Provider used when a checkout completes
    #[serde(default = "default_provider")]
    #[validate(length(min = 1))]
    pub provider: String,

    /// Lifetime of a cached rate quote in seconds
    #[serde(default = "default_rate_cache_ttl_secs")]
    #[validate(custom = "validate_rate_cache_ttl")]
    pub rate_cache_ttl_secs: u64,

    /// Display name of the built-in mock courier
    #[serde(default = "default_mock_display_name")]
    pub mock_display_name: String,

    #[serde(default)]
    #[validate]
    pub store: StoreConfig,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            rate_cache_ttl_secs: default_rate_cache_ttl_secs(),
            mock_display_name: default_mock_display_name(),
            store: StoreConfig::default(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Webhook secret for verifying payment processor callbacks
    #[serde(default)]
    pub payment_webhook_secret: Option<String>,

    /// Webhook timestamp tolerance (seconds)
    #[serde(default)]
    pub payment_webhook_tolerance_secs: Option<u64>,

    /// Currency used for orders and shipping quotes
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub default_currency: String,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    #[serde(default)]
    #[validate]
    pub delivery: DeliveryConfig,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the essentials
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            cors_allowed_origins: None,
            payment_webhook_secret: None,
            payment_webhook_tolerance_secs: None,
            default_currency: default_currency(),
            event_channel_capacity: default_event_channel_capacity(),
            delivery: DeliveryConfig::default(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Webhook tolerance, defaulting to five minutes
    pub fn webhook_tolerance_secs(&self) -> u64 {
        self.payment_webhook_tolerance_secs.unwrap_or(300)
    }

    /// Rate cache TTL as a chrono duration
    pub fn rate_cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.delivery.rate_cache_ttl_secs as i64)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_currency() -> String {
    "AED".to_string()
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_rate_cache_ttl_secs() -> u64 {
    DEFAULT_RATE_CACHE_TTL_SECS
}

fn default_mock_display_name() -> String {
    "Mock Express".to_string()
}

/// Store fields fall back to the legacy `STORE_*` variables, then to hardcoded values.
fn env_or(key: &str, fallback: &str) -> String {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn default_store_name() -> String {
    env_or("STORE_NAME", FALLBACK_STORE_NAME)
}
fn default_store_phone() -> String {
    env_or("STORE_PHONE", FALLBACK_STORE_PHONE)
}
fn default_store_address() -> String {
    env_or("STORE_ADDRESS", FALLBACK_STORE_ADDRESS)
}
fn default_store_city() -> String {
    env_or("STORE_CITY", FALLBACK_STORE_CITY)
}
fn default_store_country() -> String {
    env_or("STORE_COUNTRY", FALLBACK_STORE_COUNTRY)
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

fn validate_rate_cache_ttl(ttl: u64) -> Result<(), ValidationError> {
    if ttl == 0 || ttl > 7 * 24 * 3600 {
        let mut err = ValidationError::new("rate_cache_ttl_secs");
        err.message = Some("rate_cache_ttl_secs must be between 1 second and 7 days".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_delivery={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads configuration: built-in defaults, then `config/default`,
/// `config/{RUN_ENV}`, and finally `APP__*` environment variables.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        )
    }

    #[test]
    fn defaults_validate() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.default_currency, "AED");
        assert_eq!(cfg.delivery.provider, "mock");
        assert_eq!(cfg.rate_cache_ttl(), chrono::Duration::hours(1));
    }

    #[test]
    fn rejects_zero_rate_cache_ttl() {
        let mut cfg = base_config();
        cfg.delivery.rate_cache_ttl_secs = 0;
        let errors = cfg.validate().unwrap_err();
        assert!(errors.to_string().contains("rate_cache_ttl_secs"));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut cfg = base_config();
        cfg.log_level = "loud".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_long_country_code_for_store() {
        let mut cfg = base_config();
        cfg.delivery.store.country = "UAE".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn webhook_tolerance_defaults_to_five_minutes() {
        let mut cfg = base_config();
        assert_eq!(cfg.webhook_tolerance_secs(), 300);
        cfg.payment_webhook_tolerance_secs = Some(60);
        assert_eq!(cfg.webhook_tolerance_secs(), 60);
    }
}
