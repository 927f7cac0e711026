//! # PayPal Orders v2
//!
//! `PaymentGateway` over the PayPal REST API: a remote order is created
//! with intent `CAPTURE`, the buyer approves it on PayPal, and we capture it.

use crate::config::PayPalConfig;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shop_core::{PaymentGateway, PaymentIntent, Price, RemoteStatus, ShopError, ShopResult};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "paypal";

/// Refresh the access token this long before PayPal says it expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// PayPal Orders v2 gateway
pub struct PayPalGateway {
    config: PayPalConfig,
    client: Client,
    token: Mutex<Option<CachedToken>>,
}

impl PayPalGateway {
    pub fn new(config: PayPalConfig) -> ShopResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ShopError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            token: Mutex::new(None),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> ShopResult<Self> {
        Self::new(PayPalConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    /// OAuth2 client-credentials token, reused until shortly before expiry.
    async fn access_token(&self) -> ShopResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        debug!("requesting PayPal access token");
        let request = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")]);
        let token: TokenResponse = self.send(request).await?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }

    /// Send an authorized API call and decode the JSON response.
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> ShopResult<T> {
        let token = self.access_token().await?;
        let result = self.send(request.bearer_auth(token)).await;
        if let Err(ShopError::Upstream { message, .. }) = &result {
            if message.starts_with("HTTP 401") {
                self.forget_token().await;
            }
        }
        result
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ShopResult<T> {
        let response = request.send().await.map_err(|e| upstream(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| upstream(e.to_string()))?;

        if !status.is_success() {
            error!("PayPal API error: status={}, body={}", status, body);
            return Err(api_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| upstream(format!("Failed to parse PayPal response: {e}")))
    }
}

#[async_trait]
impl PaymentGateway for PayPalGateway {
    #[instrument(skip(self, amount), fields(amount = %amount.display()))]
    async fn create_intent(
        &self,
        amount: &Price,
        order_ref: &str,
        idempotency_key: &str,
    ) -> ShopResult<PaymentIntent> {
        let body = CreateOrderRequest {
            intent: "CAPTURE",
            purchase_units: vec![PurchaseUnit {
                reference_id: order_ref.to_string(),
                amount: Amount {
                    currency_code: amount.currency.as_str().to_string(),
                    value: amount.decimal_string(),
                },
            }],
            application_context: ApplicationContext {
                brand_name: self.config.brand_name.clone(),
                landing_page: "BILLING",
                user_action: "PAY_NOW",
                return_url: self.config.return_url.clone(),
                cancel_url: self.config.cancel_url.clone(),
            },
        };

        let request = self
            .client
            .post(self.url("/v2/checkout/orders"))
            .header("PayPal-Request-Id", idempotency_key)
            .header("Prefer", "return=representation")
            .json(&body);
        let order: OrderResponse = self.call(request).await?;

        let approval_url = order
            .links
            .iter()
            .find(|link| link.rel == "approve")
            .map(|link| link.href.clone())
            .ok_or_else(|| upstream(format!("order {} has no approve link", order.id)))?;

        info!(transaction_id = %order.id, status = %order.status, "created PayPal order");

        Ok(PaymentIntent {
            transaction_id: order.id,
            approval_url,
        })
    }

    #[instrument(skip(self))]
    async fn get_status(&self, transaction_id: &str) -> ShopResult<RemoteStatus> {
        let request = self
            .client
            .get(self.url(&format!("/v2/checkout/orders/{transaction_id}")));
        let order: OrderResponse = self.call(request).await?;
        debug!(status = %order.status, "fetched PayPal order");
        Ok(RemoteStatus::new(order.status))
    }

    #[instrument(skip(self))]
    async fn capture(&self, transaction_id: &str) -> ShopResult<RemoteStatus> {
        let request = self
            .client
            .post(self.url(&format!("/v2/checkout/orders/{transaction_id}/capture")))
            .header("PayPal-Request-Id", transaction_id)
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({}));
        let order: OrderResponse = self.call(request).await?;
        info!(status = %order.status, "captured PayPal order");
        Ok(RemoteStatus::new(order.status))
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

fn upstream(message: impl Into<String>) -> ShopError {
    ShopError::Upstream {
        provider: PROVIDER.to_string(),
        message: message.into(),
    }
}

/// Summarize a PayPal error response without passing the raw body on
fn api_error(status: StatusCode, body: &str) -> ShopError {
    let detail = serde_json::from_str::<PayPalErrorResponse>(body)
        .ok()
        .and_then(|e| e.name.or(e.error));
    match detail {
        Some(name) => upstream(format!("HTTP {}: {}", status.as_u16(), name)),
        None => upstream(format!("HTTP {}", status.as_u16())),
    }
}

// =============================================================================
// PayPal API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest {
    intent: &'static str,
    purchase_units: Vec<PurchaseUnit>,
    application_context: ApplicationContext,
}

#[derive(Debug, Serialize)]
struct PurchaseUnit {
    reference_id: String,
    amount: Amount,
}

#[derive(Debug, Serialize)]
struct Amount {
    currency_code: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct ApplicationContext {
    brand_name: String,
    landing_page: &'static str,
    user_action: &'static str,
    return_url: String,
    cancel_url: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

/// Orders API errors carry `name`; OAuth errors carry `error`
#[derive(Debug, Deserialize)]
struct PayPalErrorResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}
