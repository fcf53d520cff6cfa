//! Integration tests for the signed remote-store client.
//!
//! Requests go to a scripted in-process transport. Rate-limit tests run on
//! paused tokio time, so backoff sleeps complete instantly while the
//! virtual clock still records how long the client waited.
//!
//! Run with: cargo test --test remote_client_integration

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use catalog_api::remote::client::{
    ENVIRONMENT_HEADER, IDEMPOTENCY_HEADER, RATE_LIMIT_RESET_HEADER, SIGNATURE_HEADER,
    TENANT_HEADER,
};
use catalog_api::remote::{Method, RemoteCatalogStore, TransportError};
use catalog_api::services::CatalogService;
use common::{
    failure, idempotency_key, json_response, rate_limited, signed_client, success,
    tenant_context, test_config, MockTransport, SIGNING_SECRET,
};
use domain::models::{CatalogItemDraft, ItemType, PriceType, PricingInput};
use domain::services::{
    CatalogStore, IdempotencyCoordinator, InMemoryIdempotencyStore,
};
use domain::DomainError;
use shared::crypto::{hmac_sha256_hex, verify_hmac_sha256_hex};

fn body_json(body: &Option<Vec<u8>>) -> JsonValue {
    serde_json::from_slice(body.as_deref().unwrap_or(b"null")).unwrap()
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_waits_until_advertised_reset_then_succeeds() {
    let reset = Utc::now() + chrono::Duration::milliseconds(2000);
    let transport = MockTransport::scripted(vec![
        rate_limited(&[(RATE_LIMIT_RESET_HEADER, reset.timestamp_millis().to_string())]),
        success(json!({ "ok": true })),
    ]);
    let client = signed_client(transport.clone());

    let data: JsonValue = client
        .get(&tenant_context(), "/items", Vec::new())
        .await
        .unwrap();
    assert_eq!(data["ok"], true);

    let times = transport.request_times();
    assert_eq!(times.len(), 2);
    let waited = times[1] - times[0];
    assert!(waited >= Duration::from_millis(1900), "waited {:?}", waited);
    assert!(waited <= Duration::from_millis(2000), "waited {:?}", waited);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_seconds_is_honored() {
    let transport = MockTransport::scripted(vec![
        rate_limited(&[("retry-after", "3".to_string())]),
        success(json!([])),
    ]);
    let client = signed_client(transport.clone());

    let data: Vec<JsonValue> = client
        .get(&tenant_context(), "/pricing", Vec::new())
        .await
        .unwrap();
    assert!(data.is_empty());

    let times = transport.request_times();
    let waited = times[1] - times[0];
    assert!(waited > Duration::from_millis(2900), "waited {:?}", waited);
    assert!(waited <= Duration::from_millis(3000), "waited {:?}", waited);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_rate_limit_gives_up_after_retries() {
    let transport = MockTransport::new(|_| Ok(rate_limited(&[])));
    let client = signed_client(transport.clone());
    let before = Utc::now();

    let err = client
        .get::<JsonValue>(&tenant_context(), "/items", Vec::new())
        .await
        .unwrap_err();

    match err {
        DomainError::RateLimited { reset_at, .. } => {
            let reset_at = reset_at.expect("reset time is always reported");
            assert!(reset_at > before);
        }
        other => panic!("expected rate limited, got {:?}", other),
    }

    // One attempt plus three retries, backing off 1s, 2s, 3s.
    let times = transport.request_times();
    assert_eq!(times.len(), 4);
    assert_eq!(times[1] - times[0], Duration::from_millis(1000));
    assert_eq!(times[2] - times[1], Duration::from_millis(2000));
    assert_eq!(times[3] - times[2], Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn test_backoff_is_capped() {
    let far = Utc::now() + chrono::Duration::minutes(5);
    let transport = MockTransport::scripted(vec![
        rate_limited(&[(RATE_LIMIT_RESET_HEADER, far.timestamp().to_string())]),
        success(JsonValue::Null),
    ]);
    let client = signed_client(transport.clone());

    client
        .call(&tenant_context(), Method::Get, "/items", Vec::new(), None)
        .await
        .unwrap();

    let times = transport.request_times();
    assert_eq!(times[1] - times[0], Duration::from_millis(10_000));
}

#[tokio::test(start_paused = true)]
async fn test_unrepresentable_retry_after_uses_fallback_backoff() {
    let transport = MockTransport::scripted(vec![
        rate_limited(&[("retry-after", "99999999999999999".to_string())]),
        success(json!({ "ok": true })),
    ]);
    let client = signed_client(transport.clone());

    let data: JsonValue = client
        .get(&tenant_context(), "/items", Vec::new())
        .await
        .unwrap();
    assert_eq!(data["ok"], true);

    let times = transport.request_times();
    assert_eq!(times[1] - times[0], Duration::from_millis(1000));
}

// ============================================================================
// Headers and signing
// ============================================================================

#[tokio::test]
async fn test_writes_are_signed_over_exact_body() {
    let transport = MockTransport::scripted(vec![success(json!({ "id": 1 }))]);
    let client = signed_client(transport.clone());
    let key = idempotency_key();
    let ctx = tenant_context().with_environment(false).with_idempotency_key(key.clone());

    let payload = json!({ "name": "Laptop Repair", "price": "49.99" });
    let _: JsonValue = client
        .send(&ctx, Method::Post, "/items", Some(&payload))
        .await
        .unwrap();

    let requests = transport.requests();
    let request = &requests[0];
    let body = request.body.as_deref().unwrap();

    let signature = request.header(SIGNATURE_HEADER).unwrap();
    assert_eq!(signature, hmac_sha256_hex(SIGNING_SECRET, body).unwrap());
    assert!(verify_hmac_sha256_hex(SIGNING_SECRET, body, signature));

    assert_eq!(
        request.url,
        "http://localhost:54321/functions/v1/catalog/items"
    );
    assert_eq!(
        request.header("authorization").unwrap(),
        format!("Bearer {}", ctx.access_token)
    );
    assert_eq!(
        request.header(TENANT_HEADER).unwrap(),
        ctx.tenant_id.to_string()
    );
    assert_eq!(request.header("apikey"), Some("test-api-key"));
    assert_eq!(request.header(ENVIRONMENT_HEADER), Some("test"));
    assert_eq!(request.header(IDEMPOTENCY_HEADER), Some(key.as_str()));
    assert_eq!(request.header("content-type"), Some("application/json"));
}

#[tokio::test]
async fn test_bodyless_write_signs_empty_payload() {
    let transport = MockTransport::scripted(vec![success(json!({ "deleted": true }))]);
    let client = signed_client(transport.clone());

    client
        .call(&tenant_context(), Method::Delete, "/items/x", Vec::new(), None)
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert_eq!(
        request.header(SIGNATURE_HEADER).unwrap(),
        hmac_sha256_hex(SIGNING_SECRET, b"").unwrap()
    );
}

#[tokio::test]
async fn test_reads_are_not_signed() {
    let transport = MockTransport::scripted(vec![success(json!([]))]);
    let client = signed_client(transport.clone());
    let ctx = tenant_context().with_idempotency_key(idempotency_key());

    let _: Vec<JsonValue> = client.get(&ctx, "/pricing", Vec::new()).await.unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::Get);
    assert!(request.header(SIGNATURE_HEADER).is_none());
    assert!(request.header(IDEMPOTENCY_HEADER).is_none());
    assert_eq!(request.header(ENVIRONMENT_HEADER), Some("live"));
}

// ============================================================================
// Error classification
// ============================================================================

#[tokio::test]
async fn test_error_statuses_map_to_domain_errors() {
    let transport = MockTransport::scripted(vec![
        failure(404, "NOT_FOUND", "Catalog item not found"),
        failure(409, "VERSION_CONFLICT", "Current version changed"),
        failure(403, "FORBIDDEN", "Not allowed"),
        json_response(
            422,
            json!({
                "success": false,
                "error": "VALIDATION_ERROR",
                "details": [{ "field": "name", "message": "Name is required" }]
            }),
        ),
        failure(500, "INTERNAL", "boom"),
    ]);
    let client = signed_client(transport.clone());
    let ctx = tenant_context();

    let mut errors = Vec::new();
    for _ in 0..5 {
        errors.push(
            client
                .get::<JsonValue>(&ctx, "/items", Vec::new())
                .await
                .unwrap_err(),
        );
    }

    assert!(matches!(errors[0], DomainError::NotFound(_)));
    assert!(matches!(errors[1], DomainError::Conflict { retryable: true, .. }));
    assert!(matches!(errors[2], DomainError::Unauthorized(_)));
    assert_eq!(errors[3].violations()[0].field, "name");
    assert_eq!(errors[3].violations()[0].code, "invalid");
    assert!(matches!(errors[4], DomainError::ServiceUnavailable(_)));

    // None of them were retried.
    assert_eq!(transport.requests().len(), 5);
}

#[tokio::test]
async fn test_transport_failures_are_unavailable() {
    let transport = MockTransport::new(|_| Err(TransportError::Connect("refused".into())));
    let client = signed_client(transport.clone());

    let err = client
        .get::<JsonValue>(&tenant_context(), "/items", Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::ServiceUnavailable(_)));
    assert_eq!(transport.requests().len(), 1);

    let timeout = MockTransport::new(|_| Err(TransportError::Timeout));
    let err = signed_client(timeout)
        .get::<JsonValue>(&tenant_context(), "/items", Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Remote store timed out");
}

// ============================================================================
// Remote catalog store
// ============================================================================

fn wire_item(lineage_id: Uuid, tenant_id: Uuid) -> JsonValue {
    json!({
        "id": lineage_id,
        "original_item_id": lineage_id,
        "tenant_id": tenant_id,
        "version_number": 1,
        "is_current_version": true,
        "resource_type_id": 3,
        "name": "Brake Pad",
        "status": "Active",
        "is_active": true,
        "is_live": true,
        "pricing": [{
            "id": Uuid::new_v4(),
            "catalog_item_id": lineage_id,
            "currency": "EUR",
            "price": "12.50",
            "price_type": "Unit Price",
            "is_base_currency": true,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }],
        "created_at": "2025-01-01T00:00:00Z",
        "updated_at": "2025-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn test_store_maps_remote_item() {
    let ctx = tenant_context();
    let lineage_id = Uuid::new_v4();
    let transport = MockTransport::scripted(vec![
        success(wire_item(lineage_id, ctx.tenant_id)),
        failure(404, "NOT_FOUND", "Catalog item not found"),
    ]);
    let store = RemoteCatalogStore::new(signed_client(transport.clone()));

    let item = store
        .current_version(&ctx, lineage_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.lineage_id, lineage_id);
    assert_eq!(item.item_type, ItemType::SparePart);
    assert_eq!(item.pricing[0].price_type, PriceType::UnitPrice);
    assert_eq!(item.pricing[0].price, Decimal::new(1250, 2));

    let missing = store.current_version(&ctx, Uuid::new_v4()).await.unwrap();
    assert!(missing.is_none());

    let requests = transport.requests();
    assert!(requests[0]
        .url
        .ends_with(&format!("/items/{}", lineage_id)));
}

#[tokio::test]
async fn test_service_over_remote_store_creates_signed_item() {
    let transport = MockTransport::new(|request| {
        if request.url.ends_with("/resource-types") {
            return Ok(success(json!([
                { "id": 1, "name": "Service" },
                { "id": 3, "name": "Spare Part" },
                { "id": 99, "name": "Vehicle" }
            ])));
        }
        // Echo the item back as stored.
        Ok(success(body_json(&request.body)))
    });
    let store = Arc::new(RemoteCatalogStore::new(signed_client(transport.clone())));
    let coordinator = IdempotencyCoordinator::new(
        Arc::new(InMemoryIdempotencyStore::new()),
        test_config().idempotency.policy(),
    );
    let service = CatalogService::new(store, coordinator, Duration::from_secs(300));

    let key = idempotency_key();
    let ctx = tenant_context().with_idempotency_key(key.clone());
    let draft = CatalogItemDraft::new(ItemType::SparePart, "Brake Pad").with_pricing(vec![
        PricingInput::new("EUR", Decimal::new(1250, 2))
            .with_price_type(PriceType::UnitPrice)
            .base(),
    ]);

    let created = service.create_item(&ctx, &draft).await.unwrap();
    assert_eq!(created.idempotency_key, key);
    assert_eq!(created.data.item_type, ItemType::SparePart);
    assert_eq!(created.data.pricing[0].price_type, PriceType::UnitPrice);

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    let post = &requests[1];
    assert_eq!(post.method, Method::Post);
    assert_eq!(post.header(IDEMPOTENCY_HEADER), Some(key.as_str()));

    let body = body_json(&post.body);
    assert_eq!(body["resource_type_id"], 3);
    assert_eq!(body["original_item_id"], body["id"]);
    assert_eq!(body["pricing"][0]["price_type"], "Unit Price");
    assert_eq!(body["pricing"][0]["catalog_item_id"], body["id"]);

    // A disallowed type never reaches the remote store.
    let equipment = CatalogItemDraft::new(ItemType::Equipment, "Forklift").with_pricing(vec![
        PricingInput::new("EUR", Decimal::new(90000, 2)).base(),
    ]);
    let err = service
        .create_item(&ctx.with_idempotency_key(idempotency_key()), &equipment)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
    assert_eq!(transport.requests().len(), 2);
}
