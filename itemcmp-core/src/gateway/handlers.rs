//! Route handlers.

use super::AppState;
use super::envelope::{error_response, success_response, with_cache_status};
use crate::cache::CachedComparison;
use crate::engine::fingerprint;
use crate::error::CompareError;
use crate::types::CompareRequest;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Request body as sent by clients; `ids` presence is validated by hand so
/// that a missing list maps to `MissingField` rather than a parse error.
#[derive(Debug, Deserialize)]
struct CompareBody {
    #[serde(default)]
    ids: Option<Vec<String>>,
    #[serde(default)]
    fields: Option<Vec<String>>,
}

pub(crate) fn parse_request(body: &[u8]) -> Result<CompareRequest, CompareError> {
    let parsed: CompareBody =
        serde_json::from_slice(body).map_err(|err| CompareError::InvalidRequest {
            message: format!("Malformed request body: {err}"),
        })?;
    match parsed.ids {
        Some(ids) if !ids.is_empty() => Ok(CompareRequest {
            ids,
            fields: parsed.fields,
        }),
        _ => Err(CompareError::MissingField {
            field: "ids".to_string(),
        }),
    }
}

/// `POST /api/v1/items/compare`
pub(crate) async fn compare(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "invalid request body");
            return error_response(&err);
        }
    };

    info!(
        ids_count = request.ids.len(),
        has_fields = request.fields.is_some(),
        "compare request received"
    );

    // Dropping the handler future (client gone, timeout) cancels in-flight work.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let cache_key = fingerprint(&request, state.key_includes_fields);

    if let Some(cache) = &state.response_cache {
        match cache.get(&cache_key, &cancel).await {
            Ok(Some(hit)) => {
                info!(cache_key = %cache_key, "returning cached response");
                return with_cache_status(success_response(&hit.result, &hit.metadata), "hit");
            }
            Ok(None) => {}
            Err(err) => {
                debug!(error = %err, "response cache lookup abandoned");
                return error_response(&CompareError::Cancelled);
            }
        }
    }

    let (result, metadata) = match state.engine.compare(&request, &cancel).await {
        Ok(outcome) => outcome,
        Err(err) => {
            info!(
                error_code = %err.code(),
                status = err.http_status(),
                "comparison failed"
            );
            return with_cache_status(error_response(&err), "miss");
        }
    };

    let response = with_cache_status(success_response(&result, &metadata), "miss");

    if let Some(cache) = &state.response_cache {
        if let Err(err) = cache
            .set(&cache_key, CachedComparison { result, metadata }, &cancel)
            .await
        {
            debug!(error = %err, cache_key = %cache_key, "response not cached");
        }
    }

    response
}

/// `GET /api/health-check`
pub(crate) async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "OK" }))
}
