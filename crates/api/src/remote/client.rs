//! Signed client for the remote catalog store.
//!
//! Every call carries the caller's bearer token, tenant and environment.
//! Writes additionally carry `x-internal-signature`, the HMAC-SHA256 of the
//! exact body bytes, and the idempotency key of the mutation in flight.
//! Only rate limiting is retried; every other failure surfaces at once as a
//! typed [`DomainError`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use metrics::{counter, histogram};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use domain::models::RequestContext;
use domain::{DomainError, FieldViolation};
use shared::crypto::hmac_sha256_hex;

use super::mapping;
use super::wire::Envelope;
use crate::config::RemoteConfig;

pub const SIGNATURE_HEADER: &str = "x-internal-signature";
pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ENVIRONMENT_HEADER: &str = "x-environment";
pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Envelope error code the remote store uses when the current version moved.
const VERSION_CONFLICT: &str = "VERSION_CONFLICT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Method::Get)
    }
}

/// One fully built HTTP request, ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl TransportRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Other(String),
}

/// Byte-level HTTP seam so the retry and signing logic can run without a network.
#[async_trait::async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Production transport over `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

#[async_trait::async_trait]
impl RemoteTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url).query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Connection and retry settings for [`SignedClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub base_path: String,
    pub api_key: String,
    pub signing_secret: String,
    /// Retries after the first rate-limited attempt.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
}

impl From<&RemoteConfig> for ClientSettings {
    fn from(cfg: &RemoteConfig) -> Self {
        Self {
            base_url: cfg.base_url.clone(),
            base_path: cfg.base_path.clone(),
            api_key: cfg.api_key.clone(),
            signing_secret: cfg.signing_secret.clone(),
            max_retries: cfg.max_retries,
            backoff_base: Duration::from_millis(cfg.backoff_base_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
        }
    }
}

#[derive(Clone)]
pub struct SignedClient {
    transport: Arc<dyn RemoteTransport>,
    settings: ClientSettings,
}

impl SignedClient {
    pub fn new(transport: Arc<dyn RemoteTransport>, settings: ClientSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// GET `path` and return the decoded `data` payload.
    pub async fn get<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, DomainError> {
        let envelope = self.call(ctx, Method::Get, path, query, None).await?;
        decode_data(envelope)
    }

    /// Sends `body` with a write method and returns the decoded `data` payload.
    pub async fn send<B, T>(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, DomainError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = body.map(serde_json::to_vec).transpose()?;
        let envelope = self.call(ctx, method, path, Vec::new(), body).await?;
        decode_data(envelope)
    }

    /// Delivers one logical request and returns the success envelope.
    pub async fn call(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Vec<u8>>,
    ) -> Result<Envelope, DomainError> {
        let request = self.build_request(ctx, method, path, query, body)?;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(method = method.as_str(), path = path, attempt = attempt, "Calling remote store");

            let started = Instant::now();
            let result = self.transport.send(request.clone()).await;
            histogram!("remote_request_duration_seconds", "method" => method.as_str())
                .record(started.elapsed().as_secs_f64());

            let response = match result {
                Ok(response) => response,
                Err(err) => {
                    record_outcome(method, "transport_error");
                    warn!(method = method.as_str(), path = path, error = %err, "Remote store unreachable");
                    return Err(DomainError::ServiceUnavailable(match err {
                        TransportError::Timeout => "Remote store timed out".to_string(),
                        _ => "Remote store is unavailable".to_string(),
                    }));
                }
            };

            if response.status == 429 {
                counter!("remote_rate_limited_total").increment(1);
                let now = Utc::now();
                let hint = reset_hint(&response.headers, now);

                if attempt > self.settings.max_retries {
                    record_outcome(method, "rate_limited");
                    let reset_at = hint.unwrap_or_else(|| {
                        chrono::Duration::from_std(self.fallback_delay(attempt))
                            .ok()
                            .and_then(|delay| now.checked_add_signed(delay))
                            .unwrap_or(now)
                    });
                    warn!(
                        method = method.as_str(),
                        path = path,
                        attempts = attempt,
                        reset_at = %reset_at,
                        "Remote store rate limit persisted; giving up"
                    );
                    return Err(DomainError::RateLimited {
                        message: "Remote store rate limit exceeded".to_string(),
                        reset_at: Some(reset_at),
                    });
                }

                let delay = self.backoff_delay(attempt, hint, now);
                warn!(
                    method = method.as_str(),
                    path = path,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Remote store rate limited; backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let outcome = interpret(response);
            record_outcome(method, if outcome.is_ok() { "success" } else { "error" });
            return outcome;
        }
    }

    fn build_request(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Vec<u8>>,
    ) -> Result<TransportRequest, DomainError> {
        let url = format!(
            "{}{}{}",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.base_path,
            path
        );

        let mut headers = vec![
            (
                "authorization".to_string(),
                format!("Bearer {}", ctx.access_token),
            ),
            (TENANT_HEADER.to_string(), ctx.tenant_id.to_string()),
            ("apikey".to_string(), self.settings.api_key.clone()),
            (
                ENVIRONMENT_HEADER.to_string(),
                mapping::environment_to_wire(ctx.is_live).to_string(),
            ),
            ("accept".to_string(), "application/json".to_string()),
        ];

        if !method.is_read() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
            if let Some(key) = &ctx.idempotency_key {
                headers.push((IDEMPOTENCY_HEADER.to_string(), key.clone()));
            }
            if !self.settings.signing_secret.is_empty() {
                let payload = body.as_deref().unwrap_or_default();
                let signature = hmac_sha256_hex(&self.settings.signing_secret, payload)
                    .map_err(|e| DomainError::Internal(e.to_string()))?;
                headers.push((SIGNATURE_HEADER.to_string(), signature));
            }
        }

        Ok(TransportRequest {
            method,
            url,
            query,
            headers,
            body,
        })
    }

    /// `backoff_base × attempt`, capped at `max_backoff`.
    fn fallback_delay(&self, attempt: u32) -> Duration {
        self.settings
            .backoff_base
            .saturating_mul(attempt)
            .min(self.settings.max_backoff)
    }

    fn backoff_delay(&self, attempt: u32, hint: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
        match hint {
            Some(reset_at) => (reset_at - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(self.settings.max_backoff),
            None => self.fallback_delay(attempt),
        }
    }
}

fn record_outcome(method: Method, outcome: &'static str) {
    counter!(
        "remote_requests_total",
        "method" => method.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Reset time advertised by a 429 response.
///
/// `x-ratelimit-reset` may be epoch milliseconds, epoch seconds, or a small
/// number of seconds from now; `retry-after` is seconds or an HTTP date.
pub fn reset_hint(headers: &HashMap<String, String>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(value) = headers.get(RATE_LIMIT_RESET_HEADER) {
        if let Ok(n) = value.trim().parse::<i64>() {
            return if n >= 1_000_000_000_000 {
                Utc.timestamp_millis_opt(n).single()
            } else if n >= 1_000_000_000 {
                Utc.timestamp_opt(n, 0).single()
            } else {
                seconds_after(now, n)
            };
        }
    }

    let value = headers.get("retry-after")?.trim();
    if let Ok(secs) = value.parse::<i64>() {
        return seconds_after(now, secs);
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// `None` when the offset is outside what `DateTime<Utc>` can hold.
fn seconds_after(now: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    chrono::Duration::try_seconds(secs.max(0)).and_then(|offset| now.checked_add_signed(offset))
}

/// Decodes the `data` payload of a success envelope; a missing payload decodes as `null`.
pub fn decode_data<T: DeserializeOwned>(envelope: Envelope) -> Result<T, DomainError> {
    serde_json::from_value(envelope.data.unwrap_or(JsonValue::Null)).map_err(|e| {
        DomainError::Internal(format!("Unexpected remote store payload: {}", e))
    })
}

/// Turns a non-429 response into the success envelope or a typed error.
fn interpret(response: TransportResponse) -> Result<Envelope, DomainError> {
    let is_success = (200..300).contains(&response.status);

    if is_success && response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Envelope {
            success: true,
            ..Default::default()
        });
    }

    let envelope: Option<Envelope> = serde_json::from_slice(&response.body).ok();

    match envelope {
        Some(envelope) if is_success && envelope.success => Ok(envelope),
        Some(envelope) if is_success => {
            let status = envelope
                .error
                .as_deref()
                .map(status_for_code)
                .unwrap_or(500);
            Err(classify(status, Some(envelope)))
        }
        None if is_success => Err(DomainError::ServiceUnavailable(
            "Remote store returned a malformed response".to_string(),
        )),
        envelope => Err(classify(response.status, envelope)),
    }
}

/// HTTP status equivalent of an envelope error code.
fn status_for_code(code: &str) -> u16 {
    match code.to_uppercase().as_str() {
        "VALIDATION_ERROR" | "INVALID_REQUEST" | "BAD_REQUEST" => 400,
        "UNAUTHORIZED" => 401,
        "FORBIDDEN" => 403,
        "NOT_FOUND" => 404,
        "CONFLICT" | "VERSION_CONFLICT" | "DUPLICATE" => 409,
        "RATE_LIMITED" => 429,
        _ => 500,
    }
}

fn classify(status: u16, envelope: Option<Envelope>) -> DomainError {
    let envelope = envelope.unwrap_or_default();
    let message = envelope
        .message
        .clone()
        .or_else(|| envelope.error.clone())
        .unwrap_or_else(|| format!("Remote store returned status {}", status));

    match status {
        400 | 422 => {
            let mut details: Vec<FieldViolation> =
                envelope.details.into_iter().map(Into::into).collect();
            if details.is_empty() {
                let code = envelope
                    .error
                    .map(|c| c.to_lowercase())
                    .unwrap_or_else(|| "invalid".to_string());
                details.push(FieldViolation::new("request", code, message));
            }
            DomainError::Validation(details)
        }
        401 | 403 => DomainError::Unauthorized(message),
        404 => DomainError::NotFound(message),
        409 => DomainError::Conflict {
            retryable: envelope.error.as_deref() == Some(VERSION_CONFLICT),
            message,
        },
        429 => DomainError::RateLimited {
            message,
            reset_at: None,
        },
        _ => DomainError::ServiceUnavailable(message),
    }
}
