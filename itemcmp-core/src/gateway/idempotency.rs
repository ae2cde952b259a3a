//! `Idempotency-Key` middleware for the items routes.

use super::AppState;
use super::envelope::{CACHE_STATUS, IDEMPOTENT_REPLAYED, error_response};
use crate::error::CompareError;
use crate::idempotency::{
    IDEMPOTENCY_KEY_HEADER, IdempotencyCheck, StoredResponse, body_fingerprint,
};
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Replay, reject, or execute-and-record a request bearing `Idempotency-Key`.
///
/// Requests without the header, or with idempotency disabled, pass through.
pub(crate) async fn idempotency_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(cache) = state.idempotency.clone() else {
        return next.run(request).await;
    };
    let token = match request
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => return next.run(request).await,
    };

    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(err) => {
            warn!(error = %err, "failed to read request body");
            return error_response(&CompareError::InvalidRequest {
                message: "Failed to read request body.".to_string(),
            });
        }
    };
    let fingerprint = body_fingerprint(&body);

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    // Held until the response is stored so same-token requests run one at a time.
    let _lease = match cache.acquire(&token, &cancel).await {
        Ok(lease) => lease,
        Err(_) => return error_response(&CompareError::Cancelled),
    };

    match cache.check(&token, &fingerprint, &cancel).await {
        Ok(IdempotencyCheck::Vacant) => {}
        Ok(IdempotencyCheck::Replay(stored)) => {
            info!(key = %token, "returning cached idempotent response");
            return replay(stored);
        }
        Ok(IdempotencyCheck::Conflict) => {
            warn!(key = %token, received_hash = %fingerprint, "idempotency conflict");
            return error_response(&CompareError::Conflict);
        }
        Err(_) => return error_response(&CompareError::Cancelled),
    }

    let response = next
        .run(Request::from_parts(parts, Body::from(body)))
        .await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let body = match to_bytes(body, usize::MAX).await {
        Ok(body) => body,
        Err(err) => {
            error!(error = %err, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let stored = StoredResponse {
        status: parts.status.as_u16(),
        content_type: parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/json")
            .to_string(),
        cache_status: parts
            .headers
            .get(CACHE_STATUS)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    };
    match cache.store(&token, &fingerprint, stored, &cancel).await {
        Ok(true) => debug!(key = %token, "saved idempotent response"),
        Ok(false) => debug!(key = %token, "idempotent response already stored"),
        Err(err) => debug!(key = %token, error = %err, "idempotent response not stored"),
    }

    Response::from_parts(parts, Body::from(body))
}

fn replay(stored: StoredResponse) -> Response {
    let status = StatusCode::from_u16(stored.status).unwrap_or(StatusCode::OK);
    let mut response = (status, stored.body).into_response();
    let headers = response.headers_mut();
    if let Ok(content_type) = HeaderValue::from_str(&stored.content_type) {
        headers.insert(CONTENT_TYPE, content_type);
    }
    if let Some(cache_status) = stored
        .cache_status
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
    {
        headers.insert(CACHE_STATUS, cache_status);
    }
    headers.insert(IDEMPOTENT_REPLAYED, HeaderValue::from_static("true"));
    response
}
