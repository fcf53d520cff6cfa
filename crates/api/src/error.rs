use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use domain::{DomainError, FieldViolation};
use serde::Serialize;
use thiserror::Error;

/// Error surface handed to whichever router embeds the catalog service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Malformed request metadata (headers) detected before the service is called.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
}

#[derive(Debug, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl From<&FieldViolation> for ValidationDetail {
    fn from(v: &FieldViolation) -> Self {
        Self {
            field: v.field.clone(),
            code: v.code.clone(),
            message: v.message.clone(),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(err) => match err {
                DomainError::Validation(_) => StatusCode::BAD_REQUEST,
                DomainError::NotFound(_) => StatusCode::NOT_FOUND,
                DomainError::Conflict { .. } => StatusCode::CONFLICT,
                DomainError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                DomainError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Seconds until a rate-limited caller may retry, rounded up.
    fn retry_after_secs(&self) -> Option<i64> {
        match self {
            ApiError::Domain(DomainError::RateLimited {
                reset_at: Some(reset_at),
                ..
            }) => {
                let millis = (*reset_at - Utc::now()).num_milliseconds().max(0);
                Some((millis + 999) / 1000)
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = self.retry_after_secs();

        let body = match &self {
            ApiError::BadRequest(msg) => ErrorBody {
                error: "bad_request".into(),
                message: msg.clone(),
                details: None,
            },
            ApiError::Domain(DomainError::Internal(msg)) => {
                tracing::error!("Internal error: {}", msg);
                ErrorBody {
                    error: "internal_error".into(),
                    message: "An internal error occurred".into(),
                    details: None,
                }
            }
            ApiError::Domain(err) => {
                let violations = err.violations();
                ErrorBody {
                    error: err.code().into(),
                    message: err.message(),
                    details: (!violations.is_empty())
                        .then(|| violations.iter().map(ValidationDetail::from).collect()),
                }
            }
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
