//! Idempotency cache keyed by client-supplied `Idempotency-Key` tokens.
//!
//! The first successful response stored under a token is canonical. Later
//! requests with the same token either replay it (same body fingerprint) or
//! are rejected as conflicts (different fingerprint); they never overwrite it.
//!
//! Requests bearing the same token are serialized through an
//! [`IdempotencyLease`], so concurrent first-time requests execute the
//! underlying operation once and the others replay its response.

use crate::cache::{CacheStats, TtlStore};
use crate::error::CacheError;
use bytes::Bytes;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Request header carrying the idempotency token.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// SHA-256 hex fingerprint of a raw request body.
pub fn body_fingerprint(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

/// A fully rendered response, replayed verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResponse {
    pub status: u16,
    pub content_type: String,
    /// `Cache-Status` of the recorded response, if it carried one.
    pub cache_status: Option<String>,
    pub body: Bytes,
}

#[derive(Debug)]
struct IdempotentEntry {
    body_fingerprint: String,
    response: StoredResponse,
}

/// Result of checking a token against the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyCheck {
    /// Nothing stored; the request should execute.
    Vacant,
    /// Same token and body; replay the stored response.
    Replay(StoredResponse),
    /// Same token, different body.
    Conflict,
}

type LeaseTable = DashMap<String, Arc<Mutex<()>>>;

/// Exclusive right to execute a request for one token.
///
/// Released on drop; the lease table entry is removed once no other request
/// is waiting on it.
pub struct IdempotencyLease {
    token: String,
    guard: Option<OwnedMutexGuard<()>>,
    leases: Arc<LeaseTable>,
}

impl std::fmt::Debug for IdempotencyLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyLease")
            .field("token", &self.token)
            .finish()
    }
}

impl Drop for IdempotencyLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the table itself still references the mutex: nobody is waiting.
        self.leases
            .remove_if(&self.token, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Token → (body fingerprint, rendered response) cache with TTL and capacity bound.
#[derive(Debug)]
pub struct IdempotencyCache {
    store: TtlStore<IdempotentEntry>,
    leases: Arc<LeaseTable>,
}

impl IdempotencyCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        debug!(max_entries, ttl_secs = ttl.as_secs(), "idempotency cache initialized");
        Self {
            store: TtlStore::new(max_entries, ttl),
            leases: Arc::new(DashMap::new()),
        }
    }

    /// Wait for exclusive use of `token`.
    pub async fn acquire(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<IdempotencyLease, CacheError> {
        let lock = self
            .leases
            .entry(token.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            guard = lock.lock_owned() => Some(guard),
        };
        let lease = IdempotencyLease {
            token: token.to_string(),
            guard,
            leases: Arc::clone(&self.leases),
        };
        if lease.guard.is_none() {
            // Dropping the lease cleans up the table entry.
            return Err(CacheError::Cancelled);
        }
        Ok(lease)
    }

    /// Compare `fingerprint` against whatever is stored under `token`.
    pub async fn check(
        &self,
        token: &str,
        fingerprint: &str,
        cancel: &CancellationToken,
    ) -> Result<IdempotencyCheck, CacheError> {
        let Some(entry) = self.store.get(token, cancel).await? else {
            debug!(key = token, "idempotency miss");
            return Ok(IdempotencyCheck::Vacant);
        };
        if entry.body_fingerprint == fingerprint {
            debug!(key = token, "idempotency hit");
            Ok(IdempotencyCheck::Replay(entry.response.clone()))
        } else {
            Ok(IdempotencyCheck::Conflict)
        }
    }

    /// Store the response for `token` unless one is already stored.
    ///
    /// Returns whether this call's response became the canonical one.
    pub async fn store(
        &self,
        token: &str,
        fingerprint: &str,
        response: StoredResponse,
        cancel: &CancellationToken,
    ) -> Result<bool, CacheError> {
        let stored = self
            .store
            .insert_if_vacant(
                token.to_string(),
                IdempotentEntry {
                    body_fingerprint: fingerprint.to_string(),
                    response,
                },
                cancel,
            )
            .await?;
        debug!(key = token, stored, "idempotency set");
        Ok(stored)
    }

    /// Number of tokens currently holding or waiting on a lease.
    pub fn active_leases(&self) -> usize {
        self.leases.len()
    }

    pub async fn purge_expired(&self) -> usize {
        self.store.purge_expired().await
    }

    pub async fn len(&self) -> usize {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.store.is_empty().await
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.stats().await
    }
}
