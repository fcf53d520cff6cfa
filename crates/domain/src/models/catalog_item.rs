//! Catalog item version models.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;
use validator::Validate;

use shared::pagination::Pagination;

use super::pricing::{PricingEntry, PricingInput};

/// Closed set of sellable item kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Service,
    Equipment,
    SparePart,
    Asset,
}

impl ItemType {
    pub const ALL: [ItemType; 4] = [
        ItemType::Service,
        ItemType::Equipment,
        ItemType::SparePart,
        ItemType::Asset,
    ];

    /// Services default to being sold without stock; physical kinds are tracked assets.
    pub fn is_physical(&self) -> bool {
        !matches!(self, ItemType::Service)
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "service" => Ok(ItemType::Service),
            "equipment" => Ok(ItemType::Equipment),
            "spare_part" => Ok(ItemType::SparePart),
            "asset" => Ok(ItemType::Asset),
            _ => Err(format!("Unknown item type: {}", s)),
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemType::Service => write!(f, "service"),
            ItemType::Equipment => write!(f, "equipment"),
            ItemType::SparePart => write!(f, "spare_part"),
            ItemType::Asset => write!(f, "asset"),
        }
    }
}

/// Publication status, independent of the soft-delete flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Active,
    Inactive,
    Draft,
}

impl Default for ItemStatus {
    fn default() -> Self {
        ItemStatus::Active
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Active => write!(f, "active"),
            ItemStatus::Inactive => write!(f, "inactive"),
            ItemStatus::Draft => write!(f, "draft"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    Plain,
    Markdown,
    Html,
}

impl Default for ContentFormat {
    fn default() -> Self {
        ContentFormat::Plain
    }
}

/// Long-form text together with its markup format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct FormattedText {
    #[validate(length(max = 10000, message = "Content must be at most 10000 characters"))]
    pub content: String,
    #[serde(default)]
    pub format: ContentFormat,
}

impl FormattedText {
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            format: ContentFormat::Plain,
        }
    }
}

/// One immutable snapshot of a catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItemVersion {
    pub version_id: Uuid,
    /// Stable id of the logical item across all of its versions.
    pub lineage_id: Uuid,
    pub parent_version_id: Option<Uuid>,
    pub tenant_id: Uuid,
    pub version_number: i32,
    pub is_current_version: bool,
    pub replaced_by_id: Option<Uuid>,

    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub name: String,
    pub short_description: Option<String>,
    pub description: Option<FormattedText>,
    pub terms: Option<FormattedText>,
    pub service_parent_id: Option<Uuid>,
    pub is_variant: bool,
    pub variant_attributes: Option<Map<String, JsonValue>>,
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
    #[serde(default)]
    pub specifications: Map<String, JsonValue>,

    pub status: ItemStatus,
    /// Soft-delete flag.
    pub is_active: bool,
    pub is_live: bool,
    pub version_reason: Option<String>,

    #[serde(default)]
    pub pricing: Vec<PricingEntry>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl CatalogItemVersion {
    /// True when this snapshot has been superseded by a later version.
    pub fn is_superseded(&self) -> bool {
        self.replaced_by_id.is_some()
    }
}

/// Request payload for creating a catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CatalogItemDraft {
    #[serde(rename = "type")]
    pub item_type: ItemType,

    #[validate(custom(function = "validate_name"))]
    pub name: String,

    #[validate(length(max = 500, message = "Short description must be at most 500 characters"))]
    pub short_description: Option<String>,

    #[validate(nested)]
    pub description: Option<FormattedText>,

    #[validate(nested)]
    pub terms: Option<FormattedText>,

    pub service_parent_id: Option<Uuid>,

    #[serde(default)]
    pub is_variant: bool,

    pub variant_attributes: Option<Map<String, JsonValue>>,

    #[serde(default)]
    pub metadata: Map<String, JsonValue>,

    #[serde(default)]
    pub specifications: Map<String, JsonValue>,

    #[serde(default)]
    pub status: ItemStatus,

    #[serde(default)]
    pub pricing: Vec<PricingInput>,
}

impl CatalogItemDraft {
    pub fn new(item_type: ItemType, name: impl Into<String>) -> Self {
        Self {
            item_type,
            name: name.into(),
            short_description: None,
            description: None,
            terms: None,
            service_parent_id: None,
            is_variant: false,
            variant_attributes: None,
            metadata: Map::new(),
            specifications: Map::new(),
            status: ItemStatus::Active,
            pricing: Vec::new(),
        }
    }

    pub fn with_pricing(mut self, pricing: Vec<PricingInput>) -> Self {
        self.pricing = pricing;
        self
    }
}

/// Custom validator for item names (1-255 characters after trimming).
fn validate_name(name: &str) -> Result<(), validator::ValidationError> {
    shared::validation::validate_not_blank(name).map_err(|mut e| {
        e.message = Some("Name is required".into());
        e
    })?;
    shared::validation::validate_trimmed_length(name, 1, 255).map_err(|mut e| {
        e.message = Some("Name must be 1-255 characters".into());
        e
    })
}

/// Partial content update; every set field replaces the current version's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct CatalogItemPatch {
    #[validate(custom(function = "validate_name"))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Short description must be at most 500 characters"))]
    pub short_description: Option<String>,

    #[validate(nested)]
    pub description: Option<FormattedText>,

    #[validate(nested)]
    pub terms: Option<FormattedText>,

    pub service_parent_id: Option<Uuid>,
    pub is_variant: Option<bool>,
    pub variant_attributes: Option<Map<String, JsonValue>>,
    pub metadata: Option<Map<String, JsonValue>>,
    pub specifications: Option<Map<String, JsonValue>>,
    pub status: Option<ItemStatus>,
    pub pricing: Option<Vec<PricingInput>>,
}

impl CatalogItemPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.short_description.is_none()
            && self.description.is_none()
            && self.terms.is_none()
            && self.service_parent_id.is_none()
            && self.is_variant.is_none()
            && self.variant_attributes.is_none()
            && self.metadata.is_none()
            && self.specifications.is_none()
            && self.status.is_none()
            && self.pricing.is_none()
    }
}

/// Request payload for `updateItem`: the patch plus the required narrative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateItemRequest {
    pub version_reason: Option<String>,
    #[serde(flatten)]
    pub patch: CatalogItemPatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    CreatedAt,
    UpdatedAt,
    VersionNumber,
}

impl Default for SortField {
    fn default() -> Self {
        SortField::CreatedAt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}

/// Filters for `listItems`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItemsQuery {
    #[serde(rename = "type")]
    pub item_type: Option<ItemType>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub sort_by: SortField,
    #[serde(default)]
    pub sort_order: SortOrder,
}

/// One page of current item versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPage {
    pub items: Vec<CatalogItemVersion>,
    pub pagination: Pagination,
}

/// Response for `getHistory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionHistory {
    pub lineage_id: Uuid,
    pub current_version_id: Option<Uuid>,
    pub versions: Vec<CatalogItemVersion>,
}

/// Plain acknowledgement for operations without a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_item_type_parse_and_display() {
        for t in ItemType::ALL {
            assert_eq!(t.to_string().parse::<ItemType>().unwrap(), t);
        }
        assert!("vehicle".parse::<ItemType>().is_err());
        assert!(!ItemType::Service.is_physical());
        assert!(ItemType::SparePart.is_physical());
    }

    #[test]
    fn test_draft_deserialization_uses_type_key() {
        let json = r#"{
            "type": "service",
            "name": "Laptop Repair",
            "pricing": [{"currency": "USD", "price": 49.99, "is_base_currency": true}]
        }"#;
        let draft: CatalogItemDraft = serde_json::from_str(json).unwrap();
        assert_eq!(draft.item_type, ItemType::Service);
        assert_eq!(draft.status, ItemStatus::Active);
        assert_eq!(draft.pricing.len(), 1);
        assert_eq!(draft.pricing[0].price, Decimal::new(4999, 2));
        assert!(draft.pricing[0].is_base_currency);
    }

    #[test]
    fn test_draft_name_validation() {
        let draft = CatalogItemDraft::new(ItemType::Asset, "   ");
        let errors = draft.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));

        let long = CatalogItemDraft::new(ItemType::Asset, "x".repeat(256));
        assert!(long.validate().is_err());

        assert!(CatalogItemDraft::new(ItemType::Asset, "Forklift").validate().is_ok());
    }

    #[test]
    fn test_draft_nested_description_validation() {
        let mut draft = CatalogItemDraft::new(ItemType::Service, "Cleaning");
        draft.description = Some(FormattedText::plain("x".repeat(10001)));
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(CatalogItemPatch::default().is_empty());
        let patch = CatalogItemPatch {
            status: Some(ItemStatus::Draft),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_update_request_flattens_patch() {
        let json = r#"{"version_reason": "price change", "name": "Laptop Repair Pro"}"#;
        let req: UpdateItemRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.version_reason.as_deref(), Some("price change"));
        assert_eq!(req.patch.name.as_deref(), Some("Laptop Repair Pro"));
    }

    #[test]
    fn test_list_query_defaults() {
        let q: ListItemsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.sort_by, SortField::CreatedAt);
        assert_eq!(q.sort_order, SortOrder::Desc);
        assert!(!q.include_inactive);
    }
}
