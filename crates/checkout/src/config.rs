//! Checkout engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `COMMERCE_GATEWAY_URL` - Base URL of the commerce gateway (coupons,
//!   shipping rates, order submission)
//! - `COMMERCE_GATEWAY_API_KEY` - API key for the gateway
//!
//! ## Optional
//! - `CHECKOUT_TAX_RATE` - Tax rate applied to the taxable base (default: 0.085)
//! - `CHECKOUT_GIFT_WRAP_FEE` - Flat gift-wrap fee (default: 4.99)
//! - `CHECKOUT_RECOVERY_MODAL_DELAY_MINUTES` - Cart inactivity threshold
//!   before the recovery modal (default: 5)
//! - `CHECKOUT_CART_STORE_PATH` - File path for durable cart state; carts
//!   are kept in memory only when unset

use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::abandonment::AbandonmentSettings;
use crate::pricing::PricingConfig;

const DEFAULT_TAX_RATE: &str = "0.085";
const DEFAULT_GIFT_WRAP_FEE: &str = "4.99";
const DEFAULT_MODAL_DELAY_MINUTES: &str = "5";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Commerce gateway connection settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway.
    pub base_url: String,
    /// API key sent as `X-Api-Key` (server-side only).
    pub api_key: SecretString,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Checkout engine configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Pricing parameters (tax rate, gift-wrap fee).
    pub pricing: PricingConfig,
    /// Abandonment monitor tuning.
    pub abandonment: AbandonmentSettings,
    /// Commerce gateway connection settings.
    pub gateway: GatewayConfig,
    /// File path for durable cart state; `None` keeps carts in memory.
    pub cart_store_path: Option<PathBuf>,
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or any
    /// variable fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let tax_rate = parse_tax_rate(
            "CHECKOUT_TAX_RATE",
            &get_env_or_default("CHECKOUT_TAX_RATE", DEFAULT_TAX_RATE),
        )?;
        let gift_wrap_fee = parse_fee(
            "CHECKOUT_GIFT_WRAP_FEE",
            &get_env_or_default("CHECKOUT_GIFT_WRAP_FEE", DEFAULT_GIFT_WRAP_FEE),
        )?;
        let modal_delay = parse_minutes(
            "CHECKOUT_RECOVERY_MODAL_DELAY_MINUTES",
            &get_env_or_default(
                "CHECKOUT_RECOVERY_MODAL_DELAY_MINUTES",
                DEFAULT_MODAL_DELAY_MINUTES,
            ),
        )?;

        let base_url = get_required_env("COMMERCE_GATEWAY_URL")?;
        validate_gateway_url("COMMERCE_GATEWAY_URL", &base_url)?;
        let api_key = SecretString::from(get_required_env("COMMERCE_GATEWAY_API_KEY")?);

        let cart_store_path = get_optional_env("CHECKOUT_CART_STORE_PATH").map(PathBuf::from);

        Ok(Self {
            pricing: PricingConfig {
                tax_rate,
                gift_wrap_fee,
            },
            abandonment: AbandonmentSettings { modal_delay },
            gateway: GatewayConfig { base_url, api_key },
            cart_store_path,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse and validate a tax rate: a decimal in `[0, 1)`.
fn parse_tax_rate(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    let rate = value
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if rate < Decimal::ZERO || rate >= Decimal::ONE {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("tax rate must be in [0, 1), got {rate}"),
        ));
    }
    Ok(rate)
}

/// Parse and validate a non-negative currency fee.
fn parse_fee(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    let fee = value
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if fee < Decimal::ZERO {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("fee must not be negative, got {fee}"),
        ));
    }
    Ok(fee)
}

/// Parse a positive whole number of minutes into a `Duration`.
fn parse_minutes(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let minutes = value
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if minutes == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "delay must be at least 1 minute".to_string(),
        ));
    }
    Ok(Duration::from_secs(minutes * 60))
}

/// Validate that the gateway URL parses and uses http(s).
fn validate_gateway_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(())
}
