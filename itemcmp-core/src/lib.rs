//! # itemcmp Core
//!
//! Core library for itemcmp, a field-by-field comparison service for catalog items.
//! Provides the comparison engine, field resolver and diff computer, the response
//! and idempotency caches, configuration, and the axum HTTP gateway.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod idempotency;
pub mod mode;
pub mod resolver;
pub mod types;

// Re-export commonly used types at the crate root.
pub use cache::{CacheStats, CachedComparison, ResponseCache};
pub use catalog::{CatalogLookup, CatalogLookupResult, CatalogSnapshot, FileCatalog};
pub use config::{AppConfig, load_config};
pub use engine::{CompareEngine, fingerprint, generate_cache_key};
pub use error::{CompareError, ErrorCode, ErrorResponse, ItemcmpError, Result};
pub use gateway::{AppState, router, serve};
pub use idempotency::{IdempotencyCache, IdempotencyCheck, StoredResponse};
pub use mode::CompareMode;
pub use types::{
    CompareRequest, CompareResult, ComparePolicy, DiffField, Item, Metadata, Metric, SpecValue,
};
