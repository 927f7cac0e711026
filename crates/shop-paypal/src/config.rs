//! # PayPal Configuration
//!
//! Configuration for the PayPal REST API.
//! Credentials are loaded from environment variables.

use shop_core::ShopError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const SANDBOX_API: &str = "https://api-m.sandbox.paypal.com";
const LIVE_API: &str = "https://api-m.paypal.com";

/// Which PayPal environment to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayPalMode {
    Sandbox,
    Live,
}

impl PayPalMode {
    pub fn api_base_url(&self) -> &'static str {
        match self {
            PayPalMode::Sandbox => SANDBOX_API,
            PayPalMode::Live => LIVE_API,
        }
    }
}

impl FromStr for PayPalMode {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(PayPalMode::Sandbox),
            "live" => Ok(PayPalMode::Live),
            other => Err(ShopError::Configuration(format!(
                "PAYPAL_MODE must be sandbox or live, got {other}"
            ))),
        }
    }
}

/// PayPal API configuration
#[derive(Debug, Clone)]
pub struct PayPalConfig {
    /// REST app client id
    pub client_id: String,

    /// REST app secret
    pub client_secret: String,

    pub mode: PayPalMode,

    /// API base URL (overridable for testing)
    pub api_base_url: String,

    /// Shown to the buyer on the approval page
    pub brand_name: String,

    /// Where PayPal sends the buyer after approving
    pub return_url: String,

    /// Where PayPal sends the buyer after cancelling
    pub cancel_url: String,

    /// Per-request timeout for the HTTP client
    pub timeout: Duration,
}

impl PayPalConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `PAYPAL_CLIENT_ID`
    /// - `PAYPAL_CLIENT_SECRET`
    ///
    /// Optional: `PAYPAL_MODE` (sandbox), `PAYPAL_BRAND_NAME`,
    /// `FRONTEND_URL`, `PAYPAL_TIMEOUT_SECS` (30).
    pub fn from_env() -> Result<Self, ShopError> {
        dotenvy::dotenv().ok();

        let client_id = required("PAYPAL_CLIENT_ID")?;
        let client_secret = required("PAYPAL_CLIENT_SECRET")?;

        let mode = match env::var("PAYPAL_MODE") {
            Ok(raw) => raw.parse()?,
            Err(_) => PayPalMode::Sandbox,
        };

        let timeout = match env::var("PAYPAL_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    ShopError::Configuration(
                        "PAYPAL_TIMEOUT_SECS must be a positive number of seconds".to_string(),
                    )
                })?,
            Err(_) => Duration::from_secs(30),
        };

        let mut config = Self::new(client_id, client_secret);
        config.mode = mode;
        config.api_base_url = mode.api_base_url().to_string();
        config.timeout = timeout;
        if let Ok(brand) = env::var("PAYPAL_BRAND_NAME") {
            config.brand_name = brand;
        }
        if let Ok(frontend) = env::var("FRONTEND_URL") {
            config = config.with_frontend_url(&frontend);
        }
        Ok(config)
    }

    /// Create sandbox config with explicit credentials (for testing)
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            mode: PayPalMode::Sandbox,
            api_base_url: SANDBOX_API.to_string(),
            brand_name: "E-Commerce Store".to_string(),
            return_url: String::new(),
            cancel_url: String::new(),
            timeout: Duration::from_secs(30),
        }
        .with_frontend_url("http://localhost:3000")
    }

    pub fn is_live_mode(&self) -> bool {
        self.mode == PayPalMode::Live
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Builder: derive return and cancel URLs from the storefront origin
    pub fn with_frontend_url(mut self, frontend_url: &str) -> Self {
        let base = frontend_url.trim_end_matches('/');
        self.return_url = format!("{base}/payment/success");
        self.cancel_url = format!("{base}/payment/cancel");
        self
    }
}

fn required(name: &str) -> Result<String, ShopError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ShopError::Configuration(format!("{name} not set")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("sandbox".parse::<PayPalMode>().unwrap(), PayPalMode::Sandbox);
        assert_eq!(" LIVE ".parse::<PayPalMode>().unwrap(), PayPalMode::Live);
        assert!(matches!(
            "production".parse::<PayPalMode>(),
            Err(ShopError::Configuration(_))
        ));
    }

    #[test]
    fn test_defaults_are_sandbox() {
        let config = PayPalConfig::new("id", "secret");
        assert!(!config.is_live_mode());
        assert_eq!(config.api_base_url, "https://api-m.sandbox.paypal.com");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_frontend_urls() {
        let config = PayPalConfig::new("id", "secret").with_frontend_url("https://shop.test/");
        assert_eq!(config.return_url, "https://shop.test/payment/success");
        assert_eq!(config.cancel_url, "https://shop.test/payment/cancel");
    }
}
