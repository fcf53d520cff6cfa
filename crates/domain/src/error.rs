//! Domain error taxonomy.
//!
//! Every service in the workspace reports failures through [`DomainError`].
//! Each variant maps to a stable machine-readable code that the HTTP layer
//! and the idempotency cache both rely on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Path to the offending field, e.g. `pricing[1].currency`.
    pub field: String,
    pub code: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Builds a violation from a `validator` error, prefixing the field path.
    pub fn from_validator(field: impl Into<String>, err: &validator::ValidationError) -> Self {
        Self {
            field: field.into(),
            code: err.code.to_string(),
            message: err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| err.code.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomainError {
    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<FieldViolation>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {message}")]
    Conflict { message: String, retryable: bool },

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        reset_at: Option<DateTime<Utc>>,
    },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn summarize(violations: &[FieldViolation]) -> String {
    match violations {
        [] => "no details".to_string(),
        [one] => one.message.clone(),
        many => format!("{} validation errors", many.len()),
    }
}

impl DomainError {
    /// Single-violation validation error.
    pub fn invalid(
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        DomainError::Validation(vec![FieldViolation::new(field, code, message)])
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        DomainError::Conflict {
            message: message.into(),
            retryable: false,
        }
    }

    /// A conflict the caller may resolve by retrying, e.g. the current version moved.
    pub fn retryable_conflict(message: impl Into<String>) -> Self {
        DomainError::Conflict {
            message: message.into(),
            retryable: true,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::NotFound(_) => "not_found",
            DomainError::Conflict { .. } => "conflict",
            DomainError::RateLimited { .. } => "rate_limited",
            DomainError::ServiceUnavailable(_) => "service_unavailable",
            DomainError::Unauthorized(_) => "unauthorized",
            DomainError::Internal(_) => "internal_error",
        }
    }

    /// Human-readable message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            DomainError::Validation(v) => summarize(v),
            DomainError::NotFound(m)
            | DomainError::ServiceUnavailable(m)
            | DomainError::Unauthorized(m)
            | DomainError::Internal(m) => m.clone(),
            DomainError::Conflict { message, .. } | DomainError::RateLimited { message, .. } => {
                message.clone()
            }
        }
    }

    /// Violations carried by a validation error; empty for every other kind.
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            DomainError::Validation(v) => v,
            _ => &[],
        }
    }

    /// Terminal failures are safe to cache against an idempotency key.
    /// Transient ones must let a retry re-execute the operation.
    pub fn is_terminal(&self) -> bool {
        match self {
            DomainError::Validation(_)
            | DomainError::NotFound(_)
            | DomainError::Unauthorized(_) => true,
            DomainError::Conflict { retryable, .. } => !retryable,
            DomainError::RateLimited { .. }
            | DomainError::ServiceUnavailable(_)
            | DomainError::Internal(_) => false,
        }
    }

    /// Serializable snapshot used by the idempotency cache.
    pub fn to_snapshot(&self) -> ErrorSnapshot {
        ErrorSnapshot {
            code: self.code().to_string(),
            message: self.message(),
            details: self.violations().to_vec(),
            retryable: matches!(self, DomainError::Conflict { retryable: true, .. }),
        }
    }
}

/// Persisted form of a [`DomainError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSnapshot {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldViolation>,
    #[serde(default)]
    pub retryable: bool,
}

impl From<ErrorSnapshot> for DomainError {
    fn from(s: ErrorSnapshot) -> Self {
        match s.code.as_str() {
            "validation_error" => DomainError::Validation(s.details),
            "not_found" => DomainError::NotFound(s.message),
            "conflict" => DomainError::Conflict {
                message: s.message,
                retryable: s.retryable,
            },
            "rate_limited" => DomainError::RateLimited {
                message: s.message,
                reset_at: None,
            },
            "service_unavailable" => DomainError::ServiceUnavailable(s.message),
            "unauthorized" => DomainError::Unauthorized(s.message),
            _ => DomainError::Internal(s.message),
        }
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DomainError::Validation(flatten_validation_errors("", &errors))
    }
}

/// Flattens nested `validator` errors into path-addressed violations.
pub fn flatten_validation_errors(
    prefix: &str,
    errors: &validator::ValidationErrors,
) -> Vec<FieldViolation> {
    use validator::ValidationErrorsKind;

    let mut out = Vec::new();
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by_key(|(name, _)| name.to_string());

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                out.extend(errs.iter().map(|e| FieldViolation::from_validator(&path, e)));
            }
            ValidationErrorsKind::Struct(nested) => {
                out.extend(flatten_validation_errors(&path, nested));
            }
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    out.extend(flatten_validation_errors(
                        &format!("{}[{}]", path, index),
                        nested,
                    ));
                }
            }
        }
    }
    out
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Internal(format!("Serialization error: {}", err))
    }
}
