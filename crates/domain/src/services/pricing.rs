//! Multi-currency pricing manager.
//!
//! Pure rules (validation, merge, summary) are free functions so the
//! validation layer and the versioning engine can share them; the
//! [`PricingManager`] adds the store round-trips for the pricing contracts.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use shared::validation::{validate_currency_code, validate_price};

use super::store::CatalogStore;
use crate::error::{DomainError, FieldViolation};
use crate::models::{
    Ack, CatalogItemVersion, CurrencyPricingUpdate, CurrencyStatistics, CurrencyUsage, PriceType,
    PricingEntry, PricingInput, PricingSummary, PricingUpsertResult, RequestContext,
    TenantCurrencies, UpsertPricingRequest, ValidationResult, SUPPORTED_CURRENCIES,
};

pub const BASE_CURRENCY_MULTIPLE: &str = "Only one base currency is allowed.";

/// Collects every violation in a pricing set. `path` prefixes field names, e.g. `pricing`.
///
/// Within one submitted batch a currency may appear only once, whatever its
/// price type; stored sets are keyed by (currency, price_type).
pub fn pricing_violations(entries: &[PricingInput], path: &str) -> Vec<FieldViolation> {
    let mut violations = Vec::new();

    if entries.is_empty() {
        violations.push(FieldViolation::new(
            path,
            "pricing_empty",
            "At least one pricing entry is required",
        ));
        return violations;
    }

    let mut seen = HashSet::new();
    for (index, entry) in entries.iter().enumerate() {
        let field = |name: &str| format!("{}[{}].{}", path, index, name);

        if let Err(e) = validate_currency_code(&entry.currency, SUPPORTED_CURRENCIES) {
            violations.push(FieldViolation::from_validator(field("currency"), &e));
        } else if !seen.insert(entry.currency.as_str()) {
            violations.push(FieldViolation::new(
                field("currency"),
                "currency_duplicate",
                format!("Duplicate currency: {}", entry.currency),
            ));
        }

        if let Err(e) = validate_price(&entry.price) {
            violations.push(FieldViolation::from_validator(field("price"), &e));
        }
    }

    if entries.iter().filter(|e| e.is_base_currency).count() > 1 {
        violations.push(FieldViolation::new(
            path,
            "base_currency_multiple",
            BASE_CURRENCY_MULTIPLE,
        ));
    }

    violations
}

/// Validates a pricing set without side effects.
pub fn validate(entries: &[PricingInput]) -> ValidationResult {
    ValidationResult::from_violations(pricing_violations(entries, "pricing"))
}

/// Aggregates a pricing set. Falls back to the first entry's currency when none is flagged base.
pub fn summarize(entries: &[PricingEntry]) -> PricingSummary {
    let mut currencies: Vec<String> = Vec::new();
    for entry in entries {
        if !currencies.contains(&entry.currency) {
            currencies.push(entry.currency.clone());
        }
    }

    let base_currency = entries
        .iter()
        .find(|e| e.is_base_currency)
        .or_else(|| entries.first())
        .map(|e| e.currency.clone());

    PricingSummary {
        currencies,
        base_currency,
        count: entries.len(),
    }
}

/// Checks a stored pricing set: (currency, price_type) pairs are unique and at
/// most one entry is base. A set that fails was merged from a stale snapshot,
/// so the error is a retryable conflict.
pub fn check_pricing_set(entries: &[PricingEntry]) -> Result<(), DomainError> {
    let mut keys = HashSet::new();
    let unique = entries
        .iter()
        .all(|e| keys.insert((e.currency.as_str(), e.price_type)));
    let bases = entries.iter().filter(|e| e.is_base_currency).count();

    if unique && bases <= 1 {
        Ok(())
    } else {
        Err(DomainError::retryable_conflict(
            "Pricing changed concurrently; reload the item and retry",
        ))
    }
}

/// Outcome of merging incoming entries over an existing set.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingMerge {
    /// Full resulting set.
    pub merged: Vec<PricingEntry>,
    /// Entries that are new or differ from what was stored.
    pub changed: Vec<PricingEntry>,
    pub updated_currencies: Vec<String>,
}

fn same_values(a: &PricingEntry, b: &PricingEntry) -> bool {
    a.price == b.price
        && a.tax_included == b.tax_included
        && a.tax_rate_id == b.tax_rate_id
        && a.is_base_currency == b.is_base_currency
        && a.is_active == b.is_active
}

/// Merges `incoming` over `existing` by (currency, price_type). Entries not named are untouched.
pub fn merge(
    existing: &[PricingEntry],
    owner_version_id: Uuid,
    incoming: &[PricingInput],
    now: DateTime<Utc>,
) -> Result<PricingMerge, DomainError> {
    if incoming.iter().any(|i| i.is_base_currency) {
        let untouched_base = existing.iter().find(|e| {
            e.is_base_currency
                && !incoming
                    .iter()
                    .any(|i| e.matches(&i.currency, i.price_type))
        });
        if let Some(base) = untouched_base {
            return Err(DomainError::conflict(format!(
                "Item already has base currency {}",
                base.currency
            )));
        }
    }

    let mut merged = existing.to_vec();
    let mut changed = Vec::new();
    let mut updated_currencies: Vec<String> = Vec::new();

    for input in incoming {
        let candidate = match merged
            .iter_mut()
            .find(|e| e.matches(&input.currency, input.price_type))
        {
            Some(slot) => {
                let mut replacement = PricingEntry::from_input(owner_version_id, input, now);
                replacement.id = slot.id;
                replacement.created_at = slot.created_at;
                if same_values(slot, &replacement) {
                    continue;
                }
                *slot = replacement.clone();
                replacement
            }
            None => {
                let entry = PricingEntry::from_input(owner_version_id, input, now);
                merged.push(entry.clone());
                entry
            }
        };

        if !updated_currencies.contains(&candidate.currency) {
            updated_currencies.push(candidate.currency.clone());
        }
        changed.push(candidate);
    }

    Ok(PricingMerge {
        merged,
        changed,
        updated_currencies,
    })
}

/// Builds tenant-wide currency usage from the pricing of current versions.
pub fn currency_statistics<'a, I>(sets: I) -> TenantCurrencies
where
    I: IntoIterator<Item = &'a [PricingEntry]>,
{
    let mut statistics = CurrencyStatistics::default();
    let mut per_currency: BTreeMap<String, CurrencyUsage> = BTreeMap::new();

    for entries in sets {
        let active: Vec<&PricingEntry> = entries.iter().filter(|e| e.is_active).collect();
        if active.is_empty() {
            continue;
        }
        statistics.items_with_pricing += 1;
        statistics.total_entries += active.len();

        let mut counted = HashSet::new();
        for entry in active {
            let usage = per_currency.entry(entry.currency.clone()).or_default();
            if counted.insert(entry.currency.as_str()) {
                usage.items += 1;
            }
            if entry.is_base_currency {
                usage.base_count += 1;
            }
        }
    }

    statistics.per_currency = per_currency;
    TenantCurrencies {
        currencies: statistics.per_currency.keys().cloned().collect(),
        statistics,
    }
}

/// Store-backed pricing operations on a lineage's current version.
#[derive(Clone)]
pub struct PricingManager {
    store: Arc<dyn CatalogStore>,
}

impl PricingManager {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    async fn load_current(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
    ) -> Result<CatalogItemVersion, DomainError> {
        self.store
            .current_version(ctx, lineage_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Catalog item {} not found", lineage_id)))
    }

    /// Inserts or replaces the named (currency, price_type) entries on the current version.
    pub async fn upsert(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        request: &UpsertPricingRequest,
    ) -> Result<PricingUpsertResult, DomainError> {
        let inputs = request.to_inputs();
        let violations = pricing_violations(&inputs, "currencies");
        if !violations.is_empty() {
            return Err(DomainError::Validation(violations));
        }

        let current = self.load_current(ctx, lineage_id).await?;
        let merge = merge(&current.pricing, current.version_id, &inputs, Utc::now())?;

        if merge.changed.is_empty() {
            debug!(lineage_id = %lineage_id, "Pricing upsert changed nothing");
            return Ok(PricingUpsertResult {
                updated_currencies: Vec::new(),
                pricing: merge.merged,
            });
        }

        let pricing = self
            .store
            .upsert_pricing(ctx, lineage_id, current.version_id, merge.changed)
            .await?;

        info!(
            tenant_id = %ctx.tenant_id,
            lineage_id = %lineage_id,
            currencies = ?merge.updated_currencies,
            "Pricing upserted"
        );

        Ok(PricingUpsertResult {
            updated_currencies: merge.updated_currencies,
            pricing,
        })
    }

    /// Partially updates one existing (currency, price_type) entry.
    pub async fn update_one(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        currency: &str,
        update: &CurrencyPricingUpdate,
    ) -> Result<PricingEntry, DomainError> {
        let mut violations = Vec::new();
        if let Err(e) = validate_currency_code(currency, SUPPORTED_CURRENCIES) {
            violations.push(FieldViolation::from_validator("currency", &e));
        }
        if update.is_empty() {
            violations.push(FieldViolation::new(
                "fields",
                "update_empty",
                "At least one field must be updated",
            ));
        }
        if let Some(Err(e)) = update.price.as_ref().map(validate_price) {
            violations.push(FieldViolation::from_validator("price", &e));
        }
        if !violations.is_empty() {
            return Err(DomainError::Validation(violations));
        }

        let current = self.load_current(ctx, lineage_id).await?;
        let entry = current
            .pricing
            .iter()
            .find(|e| e.matches(currency, update.price_type))
            .ok_or_else(|| {
                DomainError::NotFound(format!(
                    "Pricing for {} ({}) not found",
                    currency, update.price_type
                ))
            })?;

        if update.is_base_currency == Some(true) {
            if let Some(base) = current
                .pricing
                .iter()
                .find(|e| e.is_base_currency && e.id != entry.id)
            {
                return Err(DomainError::conflict(format!(
                    "Item already has base currency {}",
                    base.currency
                )));
            }
        }

        let replacement = update.apply(entry, Utc::now());
        self.store
            .replace_pricing_entry(ctx, lineage_id, replacement)
            .await
    }

    /// Removes one entry. Deleting an absent entry succeeds.
    pub async fn delete_one(
        &self,
        ctx: &RequestContext,
        lineage_id: Uuid,
        currency: &str,
        price_type: PriceType,
    ) -> Result<Ack, DomainError> {
        let current = self.load_current(ctx, lineage_id).await?;
        let removed = self
            .store
            .delete_pricing_entry(ctx, lineage_id, current.version_id, currency, price_type)
            .await?;

        if removed {
            info!(
                tenant_id = %ctx.tenant_id,
                lineage_id = %lineage_id,
                currency = %currency,
                price_type = %price_type,
                "Pricing entry deleted"
            );
            Ok(Ack::ok(format!("Pricing for {} deleted", currency)))
        } else {
            debug!(lineage_id = %lineage_id, currency = %currency, "Pricing entry already absent");
            Ok(Ack::ok(format!("Pricing for {} already absent", currency)))
        }
    }

    /// Currencies in use across the tenant's active items.
    pub async fn tenant_currencies(
        &self,
        ctx: &RequestContext,
    ) -> Result<TenantCurrencies, DomainError> {
        let sets = self.store.current_pricing(ctx).await?;
        Ok(currency_statistics(sets.iter().map(|s| s.entries.as_slice())))
    }
}
