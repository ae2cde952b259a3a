//! # HTTP Gateway
//!
//! axum transport for the comparison engine. Exposes
//! `POST /api/v1/items/compare` behind the idempotency middleware and
//! `GET /api/health-check`.

mod envelope;
mod handlers;
mod idempotency;
mod server;

pub use envelope::{CACHE_STATUS, CompareEnvelope, IDEMPOTENT_REPLAYED, error_response};
pub use server::{router, serve, shutdown_signal, spawn_cache_janitor};

use crate::cache::ResponseCache;
use crate::catalog::CatalogLookup;
use crate::config::AppConfig;
use crate::engine::CompareEngine;
use crate::idempotency::IdempotencyCache;
use std::sync::Arc;
use std::time::Duration;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<CompareEngine>,
    /// `None` when the response cache is disabled.
    pub response_cache: Option<Arc<ResponseCache>>,
    /// `None` when idempotency handling is disabled.
    pub idempotency: Option<Arc<IdempotencyCache>>,
    pub key_includes_fields: bool,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

impl AppState {
    /// Build the engine and caches described by `config` over `catalog`.
    pub fn new(catalog: Arc<dyn CatalogLookup>, config: &AppConfig) -> Self {
        let response_cache = config
            .cache
            .enabled
            .then(|| Arc::new(ResponseCache::new(config.cache.max_entries, config.cache.ttl())));
        let idempotency = config.idempotency.enabled.then(|| {
            Arc::new(IdempotencyCache::new(
                config.idempotency.max_entries,
                config.idempotency.ttl(),
            ))
        });
        Self {
            engine: Arc::new(CompareEngine::new(catalog)),
            response_cache,
            idempotency,
            key_includes_fields: config.cache.key_includes_fields,
            max_body_bytes: config.server.max_body_bytes,
            request_timeout: config.server.request_timeout(),
        }
    }
}
