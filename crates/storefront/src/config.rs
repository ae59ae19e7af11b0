//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `CART_DATA_DIR` - Directory the cart is persisted in (default: .flixfuel)
//! - `CHECKOUT_SHIPPING_COST` - Flat shipping charge (default: 5.00)
//! - `CHECKOUT_TAX_RATE` - Tax rate on the subtotal (default: 0.08)
//! - `CHECKOUT_CURRENCY` - ISO 4217 currency code (default: USD)
//! - `ORDER_API_BASE_URL` - Order service base URL (default: <https://flixfuel-server.vercel.app>)
//! - `ORDER_API_TOKEN` - Bearer token for the order service
//! - `ORDER_API_TIMEOUT_SECS` - Order request timeout (default: 10)
//! - `LOG_FORMAT` - `pretty` or `json` (default: pretty)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use flixfuel_core::{CurrencyCode, PricingPolicy};
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_ORDER_API_BASE_URL: &str = "https://flixfuel-server.vercel.app";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Directory holding the persisted cart
    pub data_dir: PathBuf,
    /// Shipping and tax rules for checkout
    pub pricing: PricingPolicy,
    /// Remote order service
    pub order_api: OrderApiConfig,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "production", "staging")
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// How log lines are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Order service configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct OrderApiConfig {
    /// Base URL; orders are posted to `<base_url>/orders`
    pub base_url: Url,
    /// Bearer token, if the service requires one
    pub token: Option<SecretString>,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for OrderApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unparseable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let pricing = PricingPolicy {
            shipping: env.parse_or("CHECKOUT_SHIPPING_COST", Decimal::new(500, 2))?,
            tax_rate: env.parse_or("CHECKOUT_TAX_RATE", Decimal::new(8, 2))?,
            currency: env.parse_or("CHECKOUT_CURRENCY", CurrencyCode::USD)?,
        };
        if pricing.shipping.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "CHECKOUT_SHIPPING_COST".to_string(),
                "must not be negative".to_string(),
            ));
        }
        if pricing.tax_rate.is_sign_negative() || pricing.tax_rate > Decimal::ONE {
            return Err(ConfigError::InvalidEnvVar(
                "CHECKOUT_TAX_RATE".to_string(),
                "must be between 0 and 1".to_string(),
            ));
        }

        Ok(Self {
            host: env.parse_or("STOREFRONT_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: env.parse_or("STOREFRONT_PORT", 3000)?,
            data_dir: PathBuf::from(env.get_or_default("CART_DATA_DIR", ".flixfuel")),
            pricing,
            order_api: OrderApiConfig::from_env(&env)?,
            log_format: env.parse_or("LOG_FORMAT", LogFormat::Pretty)?,
            sentry_dsn: env.get_optional("SENTRY_DSN"),
            sentry_environment: env.get_optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env.parse_or("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: env.parse_or("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl OrderApiConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let base_url = env.get_or_default("ORDER_API_BASE_URL", DEFAULT_ORDER_API_BASE_URL);
        let base_url = Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("ORDER_API_BASE_URL".to_string(), e.to_string())
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "ORDER_API_BASE_URL".to_string(),
                "must be an http(s) URL".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            token: env
                .get_optional("ORDER_API_TOKEN")
                .map(SecretString::from),
            timeout: Duration::from_secs(env.parse_or("ORDER_API_TIMEOUT_SECS", 10)?),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable, treating blank values as unset.
    fn get_optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn get_or_default(&self, key: &str, default: &str) -> String {
        self.get_optional(key)
            .unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get_optional(key).map_or(Ok(default), |value| {
            value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}
