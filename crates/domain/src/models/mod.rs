//! Domain models for the catalog.

pub mod catalog_item;
pub mod context;
pub mod idempotency;
pub mod pricing;

pub use catalog_item::{
    Ack, CatalogItemDraft, CatalogItemPatch, CatalogItemVersion, ContentFormat, FormattedText,
    ItemPage, ItemStatus, ItemType, ListItemsQuery, SortField, SortOrder, UpdateItemRequest,
    VersionHistory,
};
pub use context::RequestContext;
pub use idempotency::{
    ClaimOutcome, IdempotencyRecord, Mutation, OperationKind, ScopedKey, StoredOutcome,
};
pub use pricing::{
    CurrencyPriceInput, CurrencyPricingUpdate, CurrencyStatistics, CurrencyUsage, PriceType,
    PricingEntry, PricingInput, PricingSummary, PricingUpsertResult, TenantCurrencies,
    UpsertPricingRequest, ValidationResult, SUPPORTED_CURRENCIES,
};
