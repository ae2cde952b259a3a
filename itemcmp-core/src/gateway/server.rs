//! Router assembly and the HTTP server loop.

use super::AppState;
use super::handlers::{compare, health};
use super::idempotency::idempotency_guard;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Build the axum Router with the compare and health-check routes.
pub fn router(state: AppState) -> Router {
    let items = Router::new()
        .route("/compare", post(compare))
        .route_layer(from_fn_with_state(state.clone(), idempotency_guard));

    Router::new()
        .route("/api/health-check", get(health))
        .nest("/api/v1/items", items)
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on `listener` until `shutdown` is cancelled, then drain in-flight requests.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    info!(address = %addr, "Listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("Server stopped");
    Ok(())
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
pub async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => return,
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}

/// Periodically drop expired cache entries until `shutdown` is cancelled.
pub fn spawn_cache_janitor(
    state: &AppState,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let response_cache = state.response_cache.clone();
    let idempotency = state.idempotency.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let mut purged = 0;
            if let Some(cache) = &response_cache {
                purged += cache.purge_expired().await;
            }
            if let Some(cache) = &idempotency {
                purged += cache.purge_expired().await;
            }
            if purged > 0 {
                debug!(purged, "expired cache entries removed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachedComparison;
    use crate::catalog::{CatalogLookup, FileCatalog};
    use crate::config::AppConfig;
    use crate::types::{CompareResult, ComparePolicy, Metadata};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn state() -> AppState {
        let catalog: Arc<dyn CatalogLookup> = Arc::new(FileCatalog::from_items(Vec::new()).unwrap());
        let mut config = AppConfig::default();
        config.cache.ttl_secs = 1;
        AppState::new(catalog, &config)
    }

    #[test]
    fn test_router_builds() {
        let _app = router(state());
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(serve(listener, state(), shutdown.clone()));
        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_signal_returns_when_already_cancelled() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        shutdown_signal(shutdown).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_purges_expired_entries() {
        let state = state();
        let cache = state.response_cache.clone().unwrap();
        let cancel = CancellationToken::new();
        let entry = CachedComparison {
            result: CompareResult {
                items: Vec::new(),
                shared_fields: Vec::new(),
                diff: BTreeMap::new(),
            },
            metadata: Metadata {
                order: Vec::new(),
                requested_fields: None,
                resolved_fields: Vec::new(),
                compare_policy: ComparePolicy {
                    effective_mode: "at_least_two".into(),
                    comparability_score: 0.0,
                    warnings: Vec::new(),
                },
                currency: "USD".into(),
                version: "1.0".into(),
            },
        };
        cache.set("k", entry, &cancel).await.unwrap();

        let shutdown = CancellationToken::new();
        let janitor = spawn_cache_janitor(&state, Duration::from_secs(5), shutdown.clone());
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(cache.is_empty().await);

        shutdown.cancel();
        janitor.await.unwrap();
    }
}
