//! The comparison engine.
//!
//! Validates identifiers, resolves items through the catalog, resolves
//! comparable fields, computes per-field winners, and assembles the result
//! with its metadata. The engine holds no mutable state; caching is the
//! caller's concern.

use crate::catalog::CatalogLookup;
use crate::error::CompareError;
use crate::mode::CompareMode;
use crate::types::{
    ComparePolicy, CompareRequest, CompareResult, Metadata, CURRENCY, RESPONSE_VERSION,
};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delimiter between identifiers in cache-key material.
const KEY_DELIMITER: &str = ",";

/// Separates the identifier part from the field part of a response fingerprint.
const FIELDS_DELIMITER: &str = "|";

/// Deduplicate `ids` keeping first-occurrence order and dropping empty strings.
pub fn unique_ids(ids: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(ids.len());
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if !id.is_empty() && seen.insert(id.as_str()) {
            unique.push(id.clone());
        }
    }
    unique
}

/// Stable fingerprint of the identifier *set*.
///
/// Invariant under permutation, duplication, and empty-string removal.
pub fn generate_cache_key(ids: &[String]) -> String {
    let mut unique = unique_ids(ids);
    unique.sort();
    hex_sha256(unique.join(KEY_DELIMITER).as_bytes())
}

/// Response-cache fingerprint for a request.
///
/// With `include_fields` off this is exactly [`generate_cache_key`]. With it
/// on, the requested field list is folded in (in request order, absent and
/// empty kept distinct) so different field filters never share an entry.
pub fn fingerprint(request: &CompareRequest, include_fields: bool) -> String {
    if !include_fields {
        return generate_cache_key(&request.ids);
    }
    let mut unique = unique_ids(&request.ids);
    unique.sort();
    let mut material = unique.join(KEY_DELIMITER);
    if let Some(fields) = &request.fields {
        material.push_str(FIELDS_DELIMITER);
        material.push_str(&fields.join(KEY_DELIMITER));
    }
    hex_sha256(material.as_bytes())
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Orchestrates a single comparison.
#[derive(Clone)]
pub struct CompareEngine {
    catalog: Arc<dyn CatalogLookup>,
    mode: CompareMode,
}

impl std::fmt::Debug for CompareEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompareEngine")
            .field("catalog_items", &self.catalog.len())
            .field("mode", &self.mode)
            .finish()
    }
}

impl CompareEngine {
    pub fn new(catalog: Arc<dyn CatalogLookup>) -> Self {
        Self {
            catalog,
            mode: CompareMode::default(),
        }
    }

    /// Run a comparison.
    ///
    /// Fails fast on the first business error. When `cancel` fires, the
    /// comparison stops at the next step boundary with
    /// [`CompareError::Cancelled`].
    pub async fn compare(
        &self,
        request: &CompareRequest,
        cancel: &CancellationToken,
    ) -> Result<(CompareResult, Metadata), CompareError> {
        let order = unique_ids(&request.ids);
        if order.len() < 2 {
            return Err(CompareError::AtLeastTwoIds);
        }
        debug!(unique_count = order.len(), "validated ids");
        check_cancelled(cancel)?;

        let lookup = self.catalog.get_by_ids(&order).await;
        if !lookup.missing.is_empty() {
            warn!(missing = ?lookup.missing, "some ids not found");
            return Err(CompareError::IdNotFound {
                missing_ids: lookup.missing,
            });
        }
        let items = lookup.found;
        debug!(count = items.len(), "items resolved");
        check_cancelled(cancel)?;

        let requested = request.field_filter();
        let resolved = self.mode.resolve_fields(&items, requested);
        debug!(resolved = ?resolved, "fields resolved");

        if resolved.is_empty() {
            return Err(CompareError::UnknownField {
                unknown_fields: requested.map(<[String]>::to_vec),
            });
        }

        let diff = self.mode.compute_diff(&items, &resolved).map_err(|e| {
            error!(error = %e, "failed to compute diff");
            CompareError::InvalidRequest {
                message: "Failed to compute differences.".into(),
            }
        })?;
        check_cancelled(cancel)?;

        let distinct_requested = requested.map(distinct_fields);
        let baseline = distinct_requested
            .as_ref()
            .map_or(resolved.len(), Vec::len);
        let comparability_score = if baseline == 0 {
            0.0
        } else {
            resolved.len() as f64 / baseline as f64
        };
        debug!(
            score = comparability_score,
            base_count = baseline,
            "comparability calculated"
        );

        let warnings = distinct_requested
            .unwrap_or_default()
            .into_iter()
            .filter(|field| !resolved.contains(*field))
            .map(|field| format!("field '{field}' is not comparable across at least two items"))
            .collect();

        info!(
            items = items.len(),
            fields = resolved.len(),
            "comparison completed"
        );

        let metadata = Metadata {
            order,
            requested_fields: request.fields.clone(),
            resolved_fields: resolved.clone(),
            compare_policy: ComparePolicy {
                effective_mode: self.mode.name().to_string(),
                comparability_score,
                warnings,
            },
            currency: CURRENCY.to_string(),
            version: RESPONSE_VERSION.to_string(),
        };
        let result = CompareResult {
            items,
            shared_fields: resolved,
            diff,
        };
        Ok((result, metadata))
    }
}

/// Requested field names without repeats, in first-occurrence order.
fn distinct_fields(fields: &[String]) -> Vec<&String> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(fields.len());
    let mut distinct = Vec::with_capacity(fields.len());
    for field in fields {
        if seen.insert(field.as_str()) {
            distinct.push(field);
        }
    }
    distinct
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), CompareError> {
    if cancel.is_cancelled() {
        Err(CompareError::Cancelled)
    } else {
        Ok(())
    }
}
