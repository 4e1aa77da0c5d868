//! Snapshot synchronization for the air-traffic simulation engine: a client
//! for the reset/step/state calls, a uniform error boundary, and a reactive
//! cache holding the latest snapshot.

mod cache;
mod client;
mod config;
mod error;
mod session;
mod transport;

pub use atc_contracts as contracts;
pub use cache::{CacheView, CacheWrite, RequestToken, SnapshotCache, SnapshotSubscription};
pub use client::{normalize_response, SimulationClient};
pub use config::{
    ClientConfig, Routes, DEFAULT_ENGINE_URL, DEFAULT_TIMEOUT_MS, ENGINE_ROUTES_ENV,
    ENGINE_TIMEOUT_ENV, ENGINE_URL_ENV,
};
pub use error::{ConfigError, ErrorKind, RemoteError, SyncError, TransportError};
pub use session::{PendingSync, SimulationSession, SyncRequest};
pub use transport::{EngineRequest, HttpTransport, Method, RawResponse, Transport};

#[cfg(test)]
mod tests;
