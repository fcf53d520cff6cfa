//! Validation layer run before any store call.
//!
//! Each entry point collects every violation it can find and returns them
//! together as one [`DomainError::Validation`].

use validator::Validate;

use shared::validation::validate_trimmed_length;

use super::pricing::pricing_violations;
use crate::error::{flatten_validation_errors, DomainError, FieldViolation};
use crate::models::{CatalogItemDraft, CatalogItemPatch, ItemType, UpdateItemRequest};

fn finish(violations: Vec<FieldViolation>) -> Result<(), DomainError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation(violations))
    }
}

fn derive_violations<T: Validate>(value: &T) -> Vec<FieldViolation> {
    match value.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => flatten_validation_errors("", &errors),
    }
}

fn variant_violation(is_variant: bool, has_parent: bool) -> Option<FieldViolation> {
    (is_variant && !has_parent).then(|| {
        FieldViolation::new(
            "service_parent_id",
            "required",
            "Variants must reference a parent item",
        )
    })
}

/// Validates a creation draft against field rules, the tenant's allowed types and pricing rules.
pub fn validate_draft(
    draft: &CatalogItemDraft,
    allowed_types: &[ItemType],
) -> Result<(), DomainError> {
    let mut violations = derive_violations(draft);

    if !allowed_types.contains(&draft.item_type) {
        violations.push(FieldViolation::new(
            "type",
            "type_not_allowed",
            format!("Item type {} is not enabled for this tenant", draft.item_type),
        ));
    }

    violations.extend(variant_violation(
        draft.is_variant,
        draft.service_parent_id.is_some(),
    ));
    violations.extend(pricing_violations(&draft.pricing, "pricing"));

    finish(violations)
}

/// The narrative every update after version 1 must carry.
pub fn version_reason_violation(reason: Option<&str>) -> Option<FieldViolation> {
    match reason {
        None => Some(FieldViolation::new(
            "version_reason",
            "required",
            "Version reason is required",
        )),
        Some(reason) => validate_trimmed_length(reason, 1, 500).err().map(|_| {
            FieldViolation::new(
                "version_reason",
                "length",
                "Version reason must be 1-500 characters",
            )
        }),
    }
}

fn patch_violations(patch: &CatalogItemPatch) -> Vec<FieldViolation> {
    if patch.is_empty() {
        return vec![FieldViolation::new(
            "patch",
            "patch_empty",
            "At least one field must be updated",
        )];
    }

    let mut violations = derive_violations(patch);
    if let Some(pricing) = &patch.pricing {
        violations.extend(pricing_violations(pricing, "pricing"));
    }
    violations
}

/// Validates an update request. Cross-field rules that need the current version
/// are checked by [`validate_merged_variant`] once it is loaded.
pub fn validate_update(request: &UpdateItemRequest) -> Result<(), DomainError> {
    let mut violations = Vec::new();
    violations.extend(version_reason_violation(request.version_reason.as_deref()));
    violations.extend(patch_violations(&request.patch));
    finish(violations)
}

/// Checks the variant/parent rule on the content an update would produce.
pub fn validate_merged_variant(is_variant: bool, has_parent: bool) -> Result<(), DomainError> {
    finish(variant_violation(is_variant, has_parent).into_iter().collect())
}
