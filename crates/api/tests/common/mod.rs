//! Common test utilities for integration tests.
//!
//! Everything here runs in-process: the catalog store and idempotency store
//! are the in-memory implementations, and the remote client talks to a
//! [`MockTransport`] instead of the network.

// Helpers are shared by several test binaries; not every binary uses all of them.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use fake::faker::lorem::en::Word;
use fake::Fake;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tokio::time::Instant;
use uuid::Uuid;

use catalog_api::app::{assemble, CatalogApp};
use catalog_api::config::Config;
use catalog_api::remote::{
    ClientSettings, RemoteTransport, SignedClient, TransportError, TransportRequest,
    TransportResponse,
};
use domain::models::{CatalogItemDraft, ItemType, PricingInput, RequestContext};
use domain::services::{InMemoryCatalogStore, InMemoryIdempotencyStore};
use shared::crypto::random_token;

pub const SIGNING_SECRET: &str = "test-signing-secret";

/// Test configuration with an in-memory idempotency backend.
pub fn test_config() -> Config {
    Config::load_for_test(&[]).expect("Failed to load test config")
}

pub struct TestCatalog {
    pub app: CatalogApp,
    pub store: Arc<InMemoryCatalogStore>,
    pub idempotency: Arc<InMemoryIdempotencyStore>,
}

/// Catalog service over in-memory stores.
pub fn memory_catalog() -> TestCatalog {
    memory_catalog_with(&test_config())
}

pub fn memory_catalog_with(config: &Config) -> TestCatalog {
    let store = Arc::new(InMemoryCatalogStore::new());
    let idempotency = Arc::new(InMemoryIdempotencyStore::new());
    let app = assemble(config, store.clone(), idempotency.clone());
    TestCatalog {
        app,
        store,
        idempotency,
    }
}

/// A fresh tenant with an authenticated actor.
pub fn tenant_context() -> RequestContext {
    RequestContext::new(Uuid::new_v4(), random_token(32)).with_actor(Uuid::new_v4())
}

/// A client-supplied idempotency key.
pub fn idempotency_key() -> String {
    format!("it-{}", random_token(24))
}

pub fn usd(cents: i64) -> PricingInput {
    PricingInput::new("USD", Decimal::new(cents, 2))
}

pub fn laptop_repair() -> CatalogItemDraft {
    CatalogItemDraft::new(ItemType::Service, "Laptop Repair").with_pricing(vec![usd(4999).base()])
}

/// A service draft with a generated name and a single base price.
pub fn random_service() -> CatalogItemDraft {
    let word: String = Word().fake();
    CatalogItemDraft::new(ItemType::Service, format!("{} service", word))
        .with_pricing(vec![usd(1000).base()])
}

// ---- Mock transport ----

type Responder =
    Box<dyn Fn(&TransportRequest) -> Result<TransportResponse, TransportError> + Send + Sync>;

/// Records every request and answers through a responder function.
pub struct MockTransport {
    responder: Responder,
    requests: Mutex<Vec<(TransportRequest, Instant)>>,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&TransportRequest) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Answers with `responses` in order; panics when the script runs out.
    pub fn scripted(responses: Vec<TransportResponse>) -> Arc<Self> {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_| {
            Ok(queue
                .lock()
                .unwrap()
                .pop_front()
                .expect("mock transport script exhausted"))
        })
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.clone())
            .collect()
    }

    pub fn request_times(&self) -> Vec<Instant> {
        self.requests.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait::async_trait]
impl RemoteTransport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let response = (self.responder)(&request);
        self.requests
            .lock()
            .unwrap()
            .push((request, Instant::now()));
        response
    }
}

pub fn client_settings() -> ClientSettings {
    ClientSettings::from(&test_config().remote)
}

pub fn signed_client(transport: Arc<MockTransport>) -> SignedClient {
    SignedClient::new(transport, client_settings())
}

pub fn json_response(status: u16, body: JsonValue) -> TransportResponse {
    TransportResponse {
        status,
        headers: HashMap::new(),
        body: serde_json::to_vec(&body).unwrap(),
    }
}

pub fn success(data: JsonValue) -> TransportResponse {
    json_response(200, serde_json::json!({ "success": true, "data": data }))
}

pub fn failure(status: u16, error: &str, message: &str) -> TransportResponse {
    json_response(
        status,
        serde_json::json!({ "success": false, "error": error, "message": message }),
    )
}

pub fn rate_limited(headers: &[(&str, String)]) -> TransportResponse {
    TransportResponse {
        status: 429,
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
        body: br#"{"success": false, "error": "RATE_LIMITED"}"#.to_vec(),
    }
}
