//! # Core Configuration
//!
//! Settings for the order/payment core and the credential issuer.
//! Secrets are loaded from environment variables.

use crate::error::ShopError;
use crate::product::Currency;
use std::env;
use std::time::Duration;

/// Order and payment settings
#[derive(Debug, Clone)]
pub struct ShopSettings {
    /// Currency orders are priced in
    pub currency: Currency,
    /// Upper bound on any single gateway call
    pub gateway_timeout: Duration,
}

impl ShopSettings {
    /// Load settings from environment variables.
    ///
    /// Optional env vars:
    /// - `SHOP_CURRENCY` (default `USD`)
    /// - `GATEWAY_TIMEOUT_SECS` (default `30`)
    pub fn from_env() -> Result<Self, ShopError> {
        dotenvy::dotenv().ok();

        let currency = match env::var("SHOP_CURRENCY") {
            Ok(code) => code.parse()?,
            Err(_) => Currency::USD,
        };

        let gateway_timeout = parse_secs("GATEWAY_TIMEOUT_SECS", 30)?;

        Ok(Self {
            currency,
            gateway_timeout,
        })
    }

    /// Builder: set gateway timeout
    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }
}

impl Default for ShopSettings {
    fn default() -> Self {
        Self {
            currency: Currency::USD,
            gateway_timeout: Duration::from_secs(30),
        }
    }
}

/// Access/refresh credential settings
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl IdentityConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `ACCESS_TOKEN_SECRET`
    /// - `REFRESH_TOKEN_SECRET`
    ///
    /// Optional: `ACCESS_TOKEN_EXPIRY_SECS` (900), `REFRESH_TOKEN_EXPIRY_SECS` (864000)
    pub fn from_env() -> Result<Self, ShopError> {
        dotenvy::dotenv().ok();

        let access_secret = env::var("ACCESS_TOKEN_SECRET")
            .map_err(|_| ShopError::Configuration("ACCESS_TOKEN_SECRET not set".to_string()))?;
        let refresh_secret = env::var("REFRESH_TOKEN_SECRET")
            .map_err(|_| ShopError::Configuration("REFRESH_TOKEN_SECRET not set".to_string()))?;

        if access_secret == refresh_secret {
            return Err(ShopError::Configuration(
                "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ".to_string(),
            ));
        }

        Ok(Self {
            access_secret,
            refresh_secret,
            access_ttl: parse_secs("ACCESS_TOKEN_EXPIRY_SECS", 15 * 60)?,
            refresh_ttl: parse_secs("REFRESH_TOKEN_EXPIRY_SECS", 10 * 24 * 60 * 60)?,
        })
    }

    /// Create config with explicit secrets and default lifetimes (for testing)
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(10 * 24 * 60 * 60),
        }
    }
}

/// Longest accepted duration: ten years
const MAX_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn parse_secs(var: &str, default: u64) -> Result<Duration, ShopError> {
    match env::var(var) {
        Ok(raw) => secs_from_str(var, &raw),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

fn secs_from_str(var: &str, raw: &str) -> Result<Duration, ShopError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if (1..=MAX_SECS).contains(&secs) => Ok(Duration::from_secs(secs)),
        _ => Err(ShopError::Configuration(format!(
            "{var} must be a whole number of seconds between 1 and {MAX_SECS}"
        ))),
    }
}
