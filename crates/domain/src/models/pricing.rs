//! Multi-currency pricing models.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FieldViolation;

/// ISO 4217 codes accepted by both this service and the remote store.
pub const SUPPORTED_CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "INR", "AED", "SAR", "SGD", "AUD", "CAD", "JPY", "CHF", "CNY", "NZD",
    "ZAR",
];

/// How a price is quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    Fixed,
    UnitPrice,
    Hourly,
    Daily,
}

impl PriceType {
    pub const ALL: [PriceType; 4] = [
        PriceType::Fixed,
        PriceType::UnitPrice,
        PriceType::Hourly,
        PriceType::Daily,
    ];
}

impl Default for PriceType {
    fn default() -> Self {
        PriceType::Fixed
    }
}

impl FromStr for PriceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(PriceType::Fixed),
            "unit_price" => Ok(PriceType::UnitPrice),
            "hourly" => Ok(PriceType::Hourly),
            "daily" => Ok(PriceType::Daily),
            _ => Err(format!("Unknown price type: {}", s)),
        }
    }
}

impl std::fmt::Display for PriceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceType::Fixed => write!(f, "fixed"),
            PriceType::UnitPrice => write!(f, "unit_price"),
            PriceType::Hourly => write!(f, "hourly"),
            PriceType::Daily => write!(f, "daily"),
        }
    }
}

fn default_true() -> bool {
    true
}

/// One stored price quotation for one currency and price type of a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingEntry {
    pub id: Uuid,
    pub owner_version_id: Uuid,
    pub currency: String,
    pub price: Decimal,
    pub price_type: PriceType,
    pub tax_included: bool,
    pub tax_rate_id: Option<Uuid>,
    pub is_base_currency: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PricingEntry {
    /// Materializes a caller-supplied entry for `owner_version_id`.
    pub fn from_input(owner_version_id: Uuid, input: &PricingInput, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_version_id,
            currency: input.currency.clone(),
            price: input.price,
            price_type: input.price_type,
            tax_included: input.tax_included,
            tax_rate_id: input.tax_rate_id,
            is_base_currency: input.is_base_currency,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy of this entry re-owned by another version (used when a new version is cut).
    pub fn carried_to(&self, owner_version_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_version_id,
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }

    pub fn matches(&self, currency: &str, price_type: PriceType) -> bool {
        self.currency == currency && self.price_type == price_type
    }
}

/// Caller-supplied price entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingInput {
    pub currency: String,
    pub price: Decimal,
    #[serde(default)]
    pub price_type: PriceType,
    #[serde(default)]
    pub tax_included: bool,
    #[serde(default)]
    pub tax_rate_id: Option<Uuid>,
    #[serde(default)]
    pub is_base_currency: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl PricingInput {
    pub fn new(currency: impl Into<String>, price: Decimal) -> Self {
        Self {
            currency: currency.into(),
            price,
            price_type: PriceType::Fixed,
            tax_included: false,
            tax_rate_id: None,
            is_base_currency: false,
            is_active: true,
        }
    }

    pub fn base(mut self) -> Self {
        self.is_base_currency = true;
        self
    }

    pub fn with_price_type(mut self, price_type: PriceType) -> Self {
        self.price_type = price_type;
        self
    }
}

/// One currency row of an upsert request; the price type is shared by the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyPriceInput {
    pub currency: String,
    pub price: Decimal,
    #[serde(default)]
    pub tax_included: bool,
    #[serde(default)]
    pub tax_rate_id: Option<Uuid>,
    #[serde(default)]
    pub is_base_currency: bool,
}

/// Request payload for `upsertPricing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertPricingRequest {
    #[serde(default)]
    pub price_type: PriceType,
    pub currencies: Vec<CurrencyPriceInput>,
}

impl UpsertPricingRequest {
    pub fn to_inputs(&self) -> Vec<PricingInput> {
        self.currencies
            .iter()
            .map(|c| PricingInput {
                currency: c.currency.clone(),
                price: c.price,
                price_type: self.price_type,
                tax_included: c.tax_included,
                tax_rate_id: c.tax_rate_id,
                is_base_currency: c.is_base_currency,
                is_active: true,
            })
            .collect()
    }
}

/// Partial update for one (currency, price_type) entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyPricingUpdate {
    #[serde(default)]
    pub price_type: PriceType,
    pub price: Option<Decimal>,
    pub tax_included: Option<bool>,
    pub tax_rate_id: Option<Uuid>,
    pub is_base_currency: Option<bool>,
    pub is_active: Option<bool>,
}

impl CurrencyPricingUpdate {
    /// True when no field besides the entry selector is set.
    pub fn is_empty(&self) -> bool {
        self.price.is_none()
            && self.tax_included.is_none()
            && self.tax_rate_id.is_none()
            && self.is_base_currency.is_none()
            && self.is_active.is_none()
    }

    /// Applies the set fields over `entry`, producing the replacement entry.
    pub fn apply(&self, entry: &PricingEntry, now: DateTime<Utc>) -> PricingEntry {
        PricingEntry {
            price: self.price.unwrap_or(entry.price),
            tax_included: self.tax_included.unwrap_or(entry.tax_included),
            tax_rate_id: self.tax_rate_id.or(entry.tax_rate_id),
            is_base_currency: self.is_base_currency.unwrap_or(entry.is_base_currency),
            is_active: self.is_active.unwrap_or(entry.is_active),
            updated_at: now,
            ..entry.clone()
        }
    }
}

/// Result of `upsertPricing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingUpsertResult {
    pub updated_currencies: Vec<String>,
    pub pricing: Vec<PricingEntry>,
}

/// Aggregate view over a pricing set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSummary {
    pub currencies: Vec<String>,
    pub base_currency: Option<String>,
    pub count: usize,
}

/// Outcome of validating a pricing set without side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<FieldViolation>,
}

impl ValidationResult {
    pub fn from_violations(errors: Vec<FieldViolation>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Usage of one currency across a tenant's current catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyUsage {
    /// Number of items quoting this currency.
    pub items: usize,
    /// Number of items whose base currency this is.
    pub base_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyStatistics {
    pub total_entries: usize,
    pub items_with_pricing: usize,
    pub per_currency: BTreeMap<String, CurrencyUsage>,
}

/// Response for `listTenantCurrencies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantCurrencies {
    pub currencies: Vec<String>,
    pub statistics: CurrencyStatistics,
}
