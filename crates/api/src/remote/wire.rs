//! Remote store wire formats.
//!
//! The remote store speaks its own field names and enum labels; everything
//! crossing the boundary goes through these DTOs and [`super::mapping`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use domain::models::{CatalogItemVersion, FormattedText, ItemType, PricingEntry};
use domain::FieldViolation;
use shared::pagination::{PageRequest, Pagination};

use super::mapping;

/// Response envelope used by every remote endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<JsonValue>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Vec<WireViolation>,
    #[serde(default)]
    pub pagination: Option<WirePagination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireViolation {
    pub field: String,
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

impl From<WireViolation> for FieldViolation {
    fn from(v: WireViolation) -> Self {
        FieldViolation::new(v.field, v.code.unwrap_or_else(|| "invalid".to_string()), v.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WirePagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl From<WirePagination> for Pagination {
    fn from(p: WirePagination) -> Self {
        Pagination::new(PageRequest::new(Some(p.page), Some(p.limit)), p.total)
    }
}

/// Catalog item version as the remote store stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCatalogItem {
    pub id: Uuid,
    pub original_item_id: Uuid,
    #[serde(default)]
    pub parent_version_id: Option<Uuid>,
    pub tenant_id: Uuid,
    pub version_number: i32,
    pub is_current_version: bool,
    #[serde(default)]
    pub replaced_by_id: Option<Uuid>,
    pub resource_type_id: i32,
    pub name: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub description_content: Option<String>,
    #[serde(default)]
    pub description_format: Option<String>,
    #[serde(default)]
    pub terms_content: Option<String>,
    #[serde(default)]
    pub terms_format: Option<String>,
    #[serde(default)]
    pub service_parent_id: Option<Uuid>,
    #[serde(default)]
    pub is_variant: bool,
    #[serde(default)]
    pub variant_attributes: Option<Map<String, JsonValue>>,
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
    #[serde(default)]
    pub specifications: Map<String, JsonValue>,
    pub status: String,
    pub is_active: bool,
    pub is_live: bool,
    #[serde(default)]
    pub version_reason: Option<String>,
    #[serde(default)]
    pub pricing: Vec<WirePricing>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub updated_by: Option<Uuid>,
}

fn split_text(text: &Option<FormattedText>) -> (Option<String>, Option<String>) {
    match text {
        Some(t) => (
            Some(t.content.clone()),
            Some(mapping::format_to_wire(t.format).to_string()),
        ),
        None => (None, None),
    }
}

fn join_text(content: Option<String>, format: Option<&str>) -> Option<FormattedText> {
    content.map(|content| FormattedText {
        content,
        format: mapping::format_from_wire(format),
    })
}

impl WireCatalogItem {
    pub fn from_domain(v: &CatalogItemVersion) -> Self {
        let (description_content, description_format) = split_text(&v.description);
        let (terms_content, terms_format) = split_text(&v.terms);
        Self {
            id: v.version_id,
            original_item_id: v.lineage_id,
            parent_version_id: v.parent_version_id,
            tenant_id: v.tenant_id,
            version_number: v.version_number,
            is_current_version: v.is_current_version,
            replaced_by_id: v.replaced_by_id,
            resource_type_id: mapping::item_type_to_wire(v.item_type),
            name: v.name.clone(),
            short_description: v.short_description.clone(),
            description_content,
            description_format,
            terms_content,
            terms_format,
            service_parent_id: v.service_parent_id,
            is_variant: v.is_variant,
            variant_attributes: v.variant_attributes.clone(),
            metadata: v.metadata.clone(),
            specifications: v.specifications.clone(),
            status: mapping::status_to_wire(v.status).to_string(),
            is_active: v.is_active,
            is_live: v.is_live,
            version_reason: v.version_reason.clone(),
            pricing: v.pricing.iter().map(WirePricing::from_domain).collect(),
            created_at: v.created_at,
            updated_at: v.updated_at,
            created_by: v.created_by,
            updated_by: v.updated_by,
        }
    }

    pub fn into_domain(self) -> CatalogItemVersion {
        CatalogItemVersion {
            version_id: self.id,
            lineage_id: self.original_item_id,
            parent_version_id: self.parent_version_id,
            tenant_id: self.tenant_id,
            version_number: self.version_number,
            is_current_version: self.is_current_version,
            replaced_by_id: self.replaced_by_id,
            item_type: mapping::item_type_from_wire(self.resource_type_id),
            name: self.name,
            short_description: self.short_description,
            description: join_text(self.description_content, self.description_format.as_deref()),
            terms: join_text(self.terms_content, self.terms_format.as_deref()),
            service_parent_id: self.service_parent_id,
            is_variant: self.is_variant,
            variant_attributes: self.variant_attributes,
            metadata: self.metadata,
            specifications: self.specifications,
            status: mapping::status_from_wire(&self.status),
            is_active: self.is_active,
            is_live: self.is_live,
            version_reason: self.version_reason,
            pricing: self.pricing.into_iter().map(WirePricing::into_domain).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            created_by: self.created_by,
            updated_by: self.updated_by,
        }
    }
}

/// Pricing row as the remote store stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePricing {
    pub id: Uuid,
    pub catalog_item_id: Uuid,
    pub currency: String,
    pub price: Decimal,
    pub price_type: String,
    #[serde(default)]
    pub tax_included: bool,
    #[serde(default)]
    pub tax_rate_id: Option<Uuid>,
    #[serde(default)]
    pub is_base_currency: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl WirePricing {
    pub fn from_domain(e: &PricingEntry) -> Self {
        Self {
            id: e.id,
            catalog_item_id: e.owner_version_id,
            currency: e.currency.clone(),
            price: e.price,
            price_type: mapping::price_type_to_wire(e.price_type).to_string(),
            tax_included: e.tax_included,
            tax_rate_id: e.tax_rate_id,
            is_base_currency: e.is_base_currency,
            is_active: e.is_active,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }

    pub fn into_domain(self) -> PricingEntry {
        PricingEntry {
            id: self.id,
            owner_version_id: self.catalog_item_id,
            currency: self.currency,
            price: self.price,
            price_type: mapping::price_type_from_wire(&self.price_type),
            tax_included: self.tax_included,
            tax_rate_id: self.tax_rate_id,
            is_base_currency: self.is_base_currency,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Body of `PUT /items/{id}`: the successor version plus the optimistic-concurrency guard.
#[derive(Debug, Clone, Serialize)]
pub struct CommitVersionRequest {
    pub expected_current_version_id: Uuid,
    pub version: WireCatalogItem,
}

/// Body of `POST /items/{id}/pricing`.
#[derive(Debug, Clone, Serialize)]
pub struct PricingUpsertBody {
    pub catalog_item_id: Uuid,
    pub pricing: Vec<WirePricing>,
}

/// Body of the delete/restore status calls.
#[derive(Debug, Clone, Serialize)]
pub struct StatusChangeBody {
    pub version_id: Uuid,
    pub is_active: bool,
}

/// Pricing of one current version, as returned by `GET /pricing`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireLineagePricing {
    pub original_item_id: Uuid,
    pub catalog_item_id: Uuid,
    #[serde(default)]
    pub pricing: Vec<WirePricing>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireResourceType {
    pub id: i32,
    #[serde(default)]
    pub name: Option<String>,
}

impl WireResourceType {
    pub fn item_type(&self) -> Option<ItemType> {
        mapping::try_item_type_from_wire(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{ContentFormat, ItemStatus, PriceType};

    fn wire_item_json() -> JsonValue {
        serde_json::json!({
            "id": "6f1c2b1e-0000-4000-8000-000000000002",
            "original_item_id": "6f1c2b1e-0000-4000-8000-000000000001",
            "parent_version_id": "6f1c2b1e-0000-4000-8000-000000000001",
            "tenant_id": "6f1c2b1e-0000-4000-8000-0000000000aa",
            "version_number": 2,
            "is_current_version": true,
            "resource_type_id": 3,
            "name": "Brake Pad",
            "description_content": "# Fits most sedans",
            "description_format": "markdown",
            "status": "Archived",
            "is_active": true,
            "is_live": false,
            "pricing": [{
                "id": "6f1c2b1e-0000-4000-8000-0000000000b1",
                "catalog_item_id": "6f1c2b1e-0000-4000-8000-000000000002",
                "currency": "EUR",
                "price": "12.50",
                "price_type": "Unit Price",
                "is_base_currency": true,
                "created_at": "2025-01-01T00:00:00Z",
                "updated_at": "2025-01-01T00:00:00Z"
            }],
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-02T00:00:00Z"
        })
    }

    #[test]
    fn test_wire_item_into_domain() {
        let wire: WireCatalogItem = serde_json::from_value(wire_item_json()).unwrap();
        let version = wire.into_domain();

        assert_eq!(version.item_type, ItemType::SparePart);
        assert_eq!(version.lineage_id.to_string(), "6f1c2b1e-0000-4000-8000-000000000001");
        assert_eq!(version.status, ItemStatus::Draft);
        assert_eq!(
            version.description.as_ref().map(|d| d.format),
            Some(ContentFormat::Markdown)
        );
        assert!(version.terms.is_none());
        assert_eq!(version.pricing[0].price_type, PriceType::UnitPrice);
        assert_eq!(version.pricing[0].price, Decimal::new(1250, 2));
        assert!(version.pricing[0].is_active);
    }

    #[test]
    fn test_domain_to_wire_uses_remote_names() {
        let wire: WireCatalogItem = serde_json::from_value(wire_item_json()).unwrap();
        let version = wire.clone().into_domain();
        let back = WireCatalogItem::from_domain(&version);

        assert_eq!(back.resource_type_id, 3);
        assert_eq!(back.status, "Draft");
        assert_eq!(back.description_format.as_deref(), Some("markdown"));
        assert_eq!(back.pricing[0].price_type, "Unit Price");

        let json = serde_json::to_value(&back).unwrap();
        assert!(json.get("original_item_id").is_some());
        assert!(json.get("lineage_id").is_none());
    }

    #[test]
    fn test_envelope_defaults() {
        let env: Envelope = serde_json::from_str(r#"{"success": true, "data": [1, 2]}"#).unwrap();
        assert!(env.success);
        assert!(env.details.is_empty());
        assert!(env.pagination.is_none());

        let env: Envelope = serde_json::from_str(
            r#"{"success": false, "error": "VALIDATION_ERROR", "details": [{"field": "name", "message": "Name is required"}]}"#,
        )
        .unwrap();
        let violation: FieldViolation = env.details[0].clone().into();
        assert_eq!(violation.code, "invalid");
        assert_eq!(violation.field, "name");
    }

    #[test]
    fn test_wire_pagination_recomputes_flags() {
        let pagination: Pagination = WirePagination {
            page: 2,
            limit: 10,
            total: 25,
        }
        .into();
        assert_eq!(pagination.total_pages, 3);
        assert!(pagination.has_next);
        assert!(pagination.has_previous);
    }
}
