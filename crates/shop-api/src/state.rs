//! # Application State
//!
//! Shared state for the Axum application: the core services wired to one
//! store and one payment gateway, plus server configuration.

use anyhow::Context;
use serde::Deserialize;
use shop_core::{
    CartService, IdentityConfig, MemoryStore, OrderService, PaymentReconciler, ProductCatalog,
    SharedGateway, ShopSettings, TokenIssuer, UserRecord,
};
use shop_paypal::PayPalGateway;
use std::net::SocketAddr;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: MemoryStore,
    pub carts: CartService,
    pub orders: OrderService,
    pub payments: PaymentReconciler,
    pub identity: TokenIssuer,
}

impl AppState {
    /// Wire the services around a store and gateway
    pub fn new(
        config: AppConfig,
        settings: ShopSettings,
        identity: IdentityConfig,
        store: MemoryStore,
        gateway: SharedGateway,
    ) -> Self {
        let carts = CartService::new(store.clone(), settings.currency);
        let orders = OrderService::new(store.clone(), carts.clone(), settings.currency);
        let payments = PaymentReconciler::new(store.clone(), gateway, settings.gateway_timeout);
        let identity = TokenIssuer::new(store.clone(), identity);

        Self {
            config,
            store,
            carts,
            orders,
            payments,
            identity,
        }
    }

    /// Build everything from the environment and seed files, with PayPal
    /// as the gateway.
    pub async fn from_env() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();
        let settings = ShopSettings::from_env().context("Invalid shop settings")?;
        let identity = IdentityConfig::from_env().context("Invalid identity settings")?;

        let gateway = PayPalGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize PayPal: {}", e))?;

        let store = MemoryStore::new();

        let catalog = load_product_catalog()?;
        if let Some(product) = catalog
            .products
            .iter()
            .find(|p| p.price.currency != settings.currency)
        {
            anyhow::bail!(
                "Product {} is priced in {} but the shop sells in {}",
                product.id,
                product.price.currency.as_str(),
                settings.currency.as_str()
            );
        }
        store.seed_products(catalog.products).await;

        for user in load_seed_users()? {
            store.insert_user(user).await;
        }

        Ok(Self::new(config, settings, identity, store, Arc::new(gateway)))
    }
}

/// Candidate locations for seed files, relative to the working directory
const CONFIG_DIRS: [&str; 3] = ["config", "../config", "../../config"];

fn read_seed_file(name: &str) -> Option<(String, String)> {
    CONFIG_DIRS.iter().find_map(|dir| {
        let path = format!("{dir}/{name}");
        std::fs::read_to_string(&path).ok().map(|content| (path, content))
    })
}

/// Load product catalog from config file
fn load_product_catalog() -> anyhow::Result<ProductCatalog> {
    match read_seed_file("products.toml") {
        Some((path, content)) => {
            let catalog = ProductCatalog::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            tracing::info!("Loaded {} products from {}", catalog.products.len(), path);
            Ok(catalog)
        }
        None => {
            tracing::warn!("No product catalog found, starting with empty stock");
            Ok(ProductCatalog::default())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct UserSeed {
    #[serde(default)]
    users: Vec<UserRecord>,
}

/// Users are registered elsewhere; this file stands them up for local runs.
fn load_seed_users() -> anyhow::Result<Vec<UserRecord>> {
    match read_seed_file("users.toml") {
        Some((path, content)) => {
            let seed: UserSeed = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            tracing::info!("Loaded {} users from {}", seed.users.len(), path);
            Ok(seed.users)
        }
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_core::Role;

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "test".to_string(),
        };

        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_bad_socket_addr() {
        let config = AppConfig {
            host: "not a host".to_string(),
            port: 3000,
            environment: "test".to_string(),
        };
        assert!(config.socket_addr().is_err());
    }

    #[test]
    fn test_user_seed_parsing() {
        let seed: UserSeed = toml::from_str(
            r#"
            [[users]]
            id = "5f0c6b1e-8a0e-4c7e-9a53-3f2b1c9d7e11"
            name = "Admin"
            role = "admin"
            "#,
        )
        .unwrap();
        assert_eq!(seed.users.len(), 1);
        assert_eq!(seed.users[0].role, Role::Admin);
        assert!(seed.users[0].refresh_token.is_none());
    }
}
