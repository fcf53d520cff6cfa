//! Domain enum <-> remote wire value mapping.
//!
//! Unknown wire values decode to a fixed default so newer remote values do
//! not break older clients:
//!
//! | Kind | Default |
//! |---|---|
//! | item type | `Service` |
//! | price type | `Fixed` |
//! | status | `Draft` |
//! | text format | `Plain` |

use domain::models::{ContentFormat, ItemStatus, ItemType, PriceType, SortField, SortOrder};

pub fn item_type_to_wire(item_type: ItemType) -> i32 {
    match item_type {
        ItemType::Service => 1,
        ItemType::Equipment => 2,
        ItemType::SparePart => 3,
        ItemType::Asset => 4,
    }
}

/// Strict decode, for places where an unknown id must be skipped rather than defaulted.
pub fn try_item_type_from_wire(id: i32) -> Option<ItemType> {
    match id {
        1 => Some(ItemType::Service),
        2 => Some(ItemType::Equipment),
        3 => Some(ItemType::SparePart),
        4 => Some(ItemType::Asset),
        _ => None,
    }
}

pub fn item_type_from_wire(id: i32) -> ItemType {
    try_item_type_from_wire(id).unwrap_or(ItemType::Service)
}

pub fn price_type_to_wire(price_type: PriceType) -> &'static str {
    match price_type {
        PriceType::Fixed => "Fixed",
        PriceType::UnitPrice => "Unit Price",
        PriceType::Hourly => "Hourly",
        PriceType::Daily => "Daily",
    }
}

pub fn price_type_from_wire(value: &str) -> PriceType {
    match value.trim().to_lowercase().as_str() {
        "unit price" | "unit_price" => PriceType::UnitPrice,
        "hourly" => PriceType::Hourly,
        "daily" => PriceType::Daily,
        _ => PriceType::Fixed,
    }
}

pub fn status_to_wire(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Active => "Active",
        ItemStatus::Inactive => "Inactive",
        ItemStatus::Draft => "Draft",
    }
}

pub fn status_from_wire(value: &str) -> ItemStatus {
    match value.trim().to_lowercase().as_str() {
        "active" => ItemStatus::Active,
        "inactive" => ItemStatus::Inactive,
        _ => ItemStatus::Draft,
    }
}

pub fn format_to_wire(format: ContentFormat) -> &'static str {
    match format {
        ContentFormat::Plain => "plain",
        ContentFormat::Markdown => "markdown",
        ContentFormat::Html => "html",
    }
}

pub fn format_from_wire(value: Option<&str>) -> ContentFormat {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        Some("markdown") => ContentFormat::Markdown,
        Some("html") => ContentFormat::Html,
        _ => ContentFormat::Plain,
    }
}

pub fn sort_field_to_wire(field: SortField) -> &'static str {
    match field {
        SortField::Name => "name",
        SortField::CreatedAt => "created_at",
        SortField::UpdatedAt => "updated_at",
        SortField::VersionNumber => "version_number",
    }
}

pub fn sort_order_to_wire(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "asc",
        SortOrder::Desc => "desc",
    }
}

pub fn environment_to_wire(is_live: bool) -> &'static str {
    if is_live {
        "live"
    } else {
        "test"
    }
}
