//! # Product Types
//!
//! Catalog types and fixed-point money.
//! Catalog CRUD lives elsewhere; products here are seeded from
//! `config/products.toml` and their stock is mutated only by the
//! inventory ledger.

use crate::error::{ShopError, ShopResult};
use serde::{Deserialize, Serialize};

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::JPY => "JPY",
            Currency::CAD => "CAD",
            Currency::AUD => "AUD",
        }
    }

    /// Number of decimal places (JPY has 0, the rest have 2)
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::USD
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Currency {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "JPY" => Ok(Currency::JPY),
            "CAD" => Ok(Currency::CAD),
            "AUD" => Ok(Currency::AUD),
            other => Err(ShopError::Validation(format!(
                "Unsupported currency: {}",
                other
            ))),
        }
    }
}

/// Price with amount in smallest currency unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in smallest currency unit (cents for USD)
    pub amount: i64,
    /// Currency
    pub currency: Currency,
}

impl Price {
    /// Create a price from smallest unit (cents)
    pub fn from_cents(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::from_cents(0, currency)
    }

    /// Multiply by a quantity, failing on overflow
    pub fn times(&self, quantity: u32) -> ShopResult<Price> {
        self.amount
            .checked_mul(i64::from(quantity))
            .map(|amount| Price::from_cents(amount, self.currency))
            .ok_or_else(|| ShopError::Validation("Line total overflows".to_string()))
    }

    /// Add another price of the same currency, failing on mismatch or overflow
    pub fn checked_add(&self, other: &Price) -> ShopResult<Price> {
        if self.currency != other.currency {
            return Err(ShopError::Validation(format!(
                "Currency mismatch: {} vs {}",
                self.currency, other.currency
            )));
        }
        self.amount
            .checked_add(other.amount)
            .map(|amount| Price::from_cents(amount, self.currency))
            .ok_or_else(|| ShopError::Validation("Order total overflows".to_string()))
    }

    /// Decimal string without symbol (e.g., "20.00"), as payment APIs expect
    pub fn decimal_string(&self) -> String {
        let places = self.currency.decimal_places();
        if places == 0 {
            return self.amount.to_string();
        }
        let divisor = 10_i64.pow(places);
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        format!(
            "{}{}.{:0width$}",
            sign,
            abs / divisor as u64,
            abs % divisor as u64,
            width = places as usize
        )
    }

    /// Format for display (e.g., "$10.00")
    pub fn display(&self) -> String {
        let symbol = match self.currency {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::JPY => "¥",
            Currency::CAD => "C$",
            Currency::AUD => "A$",
        };
        format!("{}{}", symbol, self.decimal_string())
    }
}

/// A product in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier (e.g., "ceramic-mug")
    pub id: String,

    /// Display name
    pub name: String,

    /// Current catalog unit price
    pub price: Price,

    /// Units available for sale
    #[serde(default)]
    pub stock: u32,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Price, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock,
        }
    }
}

/// Product seed list (loaded from config)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    #[serde(default)]
    pub products: Vec<Product>,
}

impl ProductCatalog {
    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_string() {
        assert_eq!(Price::from_cents(2000, Currency::USD).decimal_string(), "20.00");
        assert_eq!(Price::from_cents(1099, Currency::EUR).decimal_string(), "10.99");
        assert_eq!(Price::from_cents(5, Currency::USD).decimal_string(), "0.05");
        assert_eq!(Price::from_cents(1000, Currency::JPY).decimal_string(), "1000");
    }

    #[test]
    fn test_price_display() {
        assert_eq!(Price::from_cents(2999, Currency::USD).display(), "$29.99");
        assert_eq!(Price::from_cents(1999, Currency::EUR).display(), "€19.99");
    }

    #[test]
    fn test_price_arithmetic() {
        let unit = Price::from_cents(1000, Currency::USD);
        assert_eq!(unit.times(2).unwrap().amount, 2000);
        assert!(Price::from_cents(i64::MAX, Currency::USD).times(2).is_err());

        let eur = Price::from_cents(100, Currency::EUR);
        assert!(unit.checked_add(&eur).is_err());
        assert_eq!(unit.checked_add(&unit).unwrap().amount, 2000);
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::USD);
        assert!("xyz".parse::<Currency>().is_err());
    }

    #[test]
    fn test_catalog_from_toml() {
        let catalog = ProductCatalog::from_toml(
            r#"
            [[products]]
            id = "ceramic-mug"
            name = "Ceramic Mug"
            stock = 12
            price = { amount = 1250, currency = "usd" }
            "#,
        )
        .unwrap();

        assert_eq!(catalog.products.len(), 1);
        assert_eq!(catalog.products[0].stock, 12);
        assert_eq!(catalog.products[0].price.amount, 1250);
    }
}
