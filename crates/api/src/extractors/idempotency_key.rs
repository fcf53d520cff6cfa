//! Idempotency key header extractor.

use axum::{
    extract::FromRequestParts,
    http::{header::HeaderName, request::Parts, HeaderMap},
};
use domain::services::idempotency::MAX_KEY_LENGTH;

use crate::error::ApiError;

/// The header name for idempotency keys.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Alternate spelling accepted from callers that mirror the remote store's header.
pub const ALT_IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

/// Optional idempotency key extracted from request headers.
/// Returns `None` if neither header is present or the value is blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalIdempotencyKey(pub Option<String>);

impl OptionalIdempotencyKey {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let value = [IDEMPOTENCY_KEY_HEADER, ALT_IDEMPOTENCY_KEY_HEADER]
            .into_iter()
            .find_map(|name| headers.get(HeaderName::from_static(name)));

        let Some(value) = value else {
            return Ok(Self(None));
        };

        let key = value
            .to_str()
            .map_err(|_| ApiError::BadRequest("Idempotency key must be visible ASCII".into()))?
            .trim();

        if key.is_empty() {
            return Ok(Self(None));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(ApiError::BadRequest(format!(
                "Idempotency key must be at most {} characters",
                MAX_KEY_LENGTH
            )));
        }
        if !key.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(ApiError::BadRequest(
                "Idempotency key must be visible ASCII".into(),
            ));
        }

        Ok(Self(Some(key.to_string())))
    }

    pub fn into_inner(self) -> Option<String> {
        self.0
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalIdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_missing_header_is_none() {
        let key = OptionalIdempotencyKey::from_headers(&HeaderMap::new()).unwrap();
        assert!(key.0.is_none());
    }

    #[test]
    fn test_primary_header_wins() {
        let key = OptionalIdempotencyKey::from_headers(&headers(&[
            ("idempotency-key", "primary"),
            ("x-idempotency-key", "alternate"),
        ]))
        .unwrap();
        assert_eq!(key.into_inner().as_deref(), Some("primary"));
    }

    #[test]
    fn test_alternate_header_and_trim() {
        let key =
            OptionalIdempotencyKey::from_headers(&headers(&[("x-idempotency-key", "  abc-1  ")]))
                .unwrap();
        assert_eq!(key.0.as_deref(), Some("abc-1"));
    }

    #[test]
    fn test_blank_is_none() {
        let key = OptionalIdempotencyKey::from_headers(&headers(&[("idempotency-key", "   ")]))
            .unwrap();
        assert!(key.0.is_none());
    }

    #[test]
    fn test_too_long_is_rejected() {
        let long = "k".repeat(MAX_KEY_LENGTH + 1);
        let err =
            OptionalIdempotencyKey::from_headers(&headers(&[("idempotency-key", &long)]))
                .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_inner_whitespace_is_rejected() {
        let err = OptionalIdempotencyKey::from_headers(&headers(&[("idempotency-key", "a b")]))
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_extracts_from_request_parts() {
        let request = Request::builder()
            .header("idempotency-key", "create_item-1")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let key = OptionalIdempotencyKey::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(key.0.as_deref(), Some("create_item-1"));
    }
}
