//! Response envelope `{data, metadata, error}`.

use crate::error::{CompareError, ErrorResponse};
use crate::types::{CompareResult, Metadata};
use axum::Json;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Reports whether the response cache served the payload (`hit` / `miss`).
pub const CACHE_STATUS: HeaderName = HeaderName::from_static("cache-status");

/// Set on responses replayed from the idempotency cache.
pub const IDEMPOTENT_REPLAYED: HeaderName = HeaderName::from_static("idempotent-replayed");

/// Wire envelope. Absent parts serialize as `null`.
#[derive(Debug, Serialize)]
pub struct CompareEnvelope<'a> {
    pub data: Option<&'a CompareResult>,
    pub metadata: Option<&'a Metadata>,
    pub error: Option<ErrorResponse>,
}

impl<'a> CompareEnvelope<'a> {
    pub fn success(result: &'a CompareResult, metadata: &'a Metadata) -> Self {
        Self {
            data: Some(result),
            metadata: Some(metadata),
            error: None,
        }
    }

    pub fn failure(err: &CompareError) -> Self {
        Self {
            data: None,
            metadata: None,
            error: Some(ErrorResponse::from(err)),
        }
    }
}

pub(crate) fn success_response(result: &CompareResult, metadata: &Metadata) -> Response {
    Json(CompareEnvelope::success(result, metadata)).into_response()
}

/// Render `err` with the status its code maps to.
pub fn error_response(err: &CompareError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(CompareEnvelope::failure(err))).into_response()
}

pub(crate) fn with_cache_status(mut response: Response, status: &'static str) -> Response {
    response
        .headers_mut()
        .insert(CACHE_STATUS, HeaderValue::from_static(status));
    response
}
