//! Remote catalog store integration.

pub mod client;
pub mod mapping;
pub mod store;
pub mod wire;

pub use client::{
    ClientSettings, Method, RemoteTransport, ReqwestTransport, SignedClient, TransportError,
    TransportRequest, TransportResponse,
};
pub use store::RemoteCatalogStore;
