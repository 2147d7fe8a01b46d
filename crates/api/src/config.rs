//! Application configuration loaded from environment variables.

use std::str::FromStr;

use checkout::{CheckoutSettings, DEFAULT_SEAT_LOCK_TTL_SECS, WebpayCredentials, WebpayEnvironment};
use domain::{CommissionPolicy, Money};

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be set when WEBPAY_ENVIRONMENT=production")]
    Missing(&'static str),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Which payment gateway backs checkouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatewayMode {
    /// In-process gateway that approves everything. Local development only.
    #[default]
    Mock,
    Webpay(WebpayEnvironment),
}

impl GatewayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayMode::Mock => "mock",
            GatewayMode::Webpay(WebpayEnvironment::Integration) => "integration",
            GatewayMode::Webpay(WebpayEnvironment::Production) => "production",
        }
    }
}

impl FromStr for GatewayMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(GatewayMode::Mock),
            "integration" => Ok(GatewayMode::Webpay(WebpayEnvironment::Integration)),
            "production" => Ok(GatewayMode::Webpay(WebpayEnvironment::Production)),
            _ => Err(()),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `LOG_FORMAT`: `text` or `json`
/// - `DATABASE_URL`: PostgreSQL URL; in-memory stores when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default 10)
/// - `SEAT_LOCK_TTL_SECS`: seat hold lifetime (default 600)
/// - `COMMISSION_RATE_BPS`, `COMMISSION_FIXED`: service fee (default none)
/// - `PUBLIC_BASE_URL`: where the gateway sends buyers back to us
/// - `FRONTEND_URL`: where payment results are shown
/// - `WEBPAY_ENVIRONMENT`: `mock`, `integration` or `production`
/// - `WEBPAY_COMMERCE_CODE`, `WEBPAY_API_KEY`: gateway credentials
/// - `ABANDONED_ORDER_SWEEP_SECS`: sweeper period; disabled when unset
/// - `ABANDONED_ORDER_AGE_SECS`: pending age at which orders are swept
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub seat_lock_ttl_secs: i64,
    pub commission_rate_bps: u32,
    pub commission_fixed: i64,
    pub public_base_url: String,
    pub frontend_url: String,
    pub gateway: GatewayMode,
    pub webpay_commerce_code: Option<String>,
    pub webpay_api_key: Option<String>,
    pub sweep_interval_secs: Option<u64>,
    pub abandoned_order_age_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which returns the raw value of
    /// a variable if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let text = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let config = Self {
            host: text("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT")?.unwrap_or(defaults.port),
            log_level: text("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse(&lookup, "LOG_FORMAT")?.unwrap_or(defaults.log_format),
            database_url: text("DATABASE_URL"),
            database_max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.database_max_connections),
            seat_lock_ttl_secs: parse(&lookup, "SEAT_LOCK_TTL_SECS")?
                .unwrap_or(defaults.seat_lock_ttl_secs),
            commission_rate_bps: parse(&lookup, "COMMISSION_RATE_BPS")?
                .unwrap_or(defaults.commission_rate_bps),
            commission_fixed: parse(&lookup, "COMMISSION_FIXED")?
                .unwrap_or(defaults.commission_fixed),
            public_base_url: text("PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
            frontend_url: text("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            gateway: parse(&lookup, "WEBPAY_ENVIRONMENT")?.unwrap_or(defaults.gateway),
            webpay_commerce_code: text("WEBPAY_COMMERCE_CODE"),
            webpay_api_key: text("WEBPAY_API_KEY"),
            sweep_interval_secs: parse(&lookup, "ABANDONED_ORDER_SWEEP_SECS")?,
            abandoned_order_age_secs: parse(&lookup, "ABANDONED_ORDER_AGE_SECS")?
                .unwrap_or(defaults.abandoned_order_age_secs),
        };

        if config.seat_lock_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                name: "SEAT_LOCK_TTL_SECS",
                value: config.seat_lock_ttl_secs.to_string(),
            });
        }
        if config.commission_fixed < 0 {
            return Err(ConfigError::Invalid {
                name: "COMMISSION_FIXED",
                value: config.commission_fixed.to_string(),
            });
        }
        if config.gateway == GatewayMode::Webpay(WebpayEnvironment::Production) {
            if config.webpay_commerce_code.is_none() {
                return Err(ConfigError::Missing("WEBPAY_COMMERCE_CODE"));
            }
            if config.webpay_api_key.is_none() {
                return Err(ConfigError::Missing("WEBPAY_API_KEY"));
            }
        }

        Ok(config)
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Absolute URL of the payment return endpoint handed to the gateway.
    pub fn return_url(&self) -> String {
        format!("{}/payment/return", self.public_base_url.trim_end_matches('/'))
    }

    pub fn seat_lock_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.seat_lock_ttl_secs)
    }

    pub fn commission(&self) -> CommissionPolicy {
        CommissionPolicy::new(self.commission_rate_bps, Money::new(self.commission_fixed))
    }

    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            return_url: self.return_url(),
            commission: self.commission(),
            ..CheckoutSettings::default()
        }
    }

    /// Gateway credentials. The integration environment falls back to the
    /// public test commerce when none are configured.
    pub fn webpay_credentials(&self) -> WebpayCredentials {
        match (&self.webpay_commerce_code, &self.webpay_api_key) {
            (Some(commerce_code), Some(api_key)) => WebpayCredentials {
                commerce_code: commerce_code.clone(),
                api_key: api_key.clone(),
            },
            _ => WebpayCredentials::integration(),
        }
    }

    /// Period of the abandoned order sweeper, if enabled.
    pub fn sweep_interval(&self) -> Option<std::time::Duration> {
        self.sweep_interval_secs
            .filter(|secs| *secs > 0)
            .map(std::time::Duration::from_secs)
    }

    pub fn abandoned_order_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.abandoned_order_age_secs as i64)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            seat_lock_ttl_secs: DEFAULT_SEAT_LOCK_TTL_SECS,
            commission_rate_bps: 0,
            commission_fixed: 0,
            public_base_url: "http://localhost:3000".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gateway: GatewayMode::Mock,
            webpay_commerce_code: None,
            webpay_api_key: None,
            sweep_interval_secs: None,
            abandoned_order_age_secs: 3600,
        }
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
