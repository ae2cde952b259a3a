//! Subcommand handlers.

use crate::{Commands, ConfigAction, ServeArgs};
use itemcmp_core::catalog::{CatalogLookup, FileCatalog};
use itemcmp_core::config::{AppConfig, LOCAL_CONFIG_FILE, load_config};
use itemcmp_core::engine::CompareEngine;
use itemcmp_core::gateway::{self, AppState, CompareEnvelope};
use itemcmp_core::types::CompareRequest;
use itemcmp_core::{ItemcmpError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Dispatch a subcommand.
pub async fn handle_command(command: Commands, config_file: Option<&Path>) -> anyhow::Result<()> {
    match command {
        Commands::Serve(args) => {
            let config = resolve_config(config_file)?;
            Ok(handle_serve(args, config).await?)
        }
        Commands::Compare {
            ids,
            fields,
            data_file,
            pretty,
        } => {
            let config = resolve_config(config_file)?;
            Ok(handle_compare(ids, fields, data_file, pretty, config).await?)
        }
        Commands::Config { action } => handle_config(action, config_file, Path::new(".")),
    }
}

fn resolve_config(config_file: Option<&Path>) -> Result<AppConfig> {
    let config = load_config(config_file, None)?;
    config.validate()?;
    Ok(config)
}

fn apply_serve_overrides(config: &mut AppConfig, args: ServeArgs) {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(data_file) = args.data_file {
        config.catalog.data_file = data_file;
    }
}

async fn handle_serve(args: ServeArgs, mut config: AppConfig) -> Result<()> {
    apply_serve_overrides(&mut config, args);

    let catalog = Arc::new(FileCatalog::load(&config.catalog.data_file)?);
    let state = AppState::new(catalog.clone(), &config);

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr()).await?;
    let shutdown = CancellationToken::new();
    tokio::spawn(gateway::shutdown_signal(shutdown.clone()));
    spawn_reload_on_hangup(catalog.clone(), shutdown.clone());

    let janitor_every = config
        .cache
        .ttl()
        .min(config.idempotency.ttl())
        .max(Duration::from_secs(1));
    let janitor = gateway::spawn_cache_janitor(&state, janitor_every, shutdown.clone());

    gateway::serve(listener, state.clone(), shutdown.clone()).await?;
    shutdown.cancel();
    let _ = janitor.await;

    if let Some(cache) = &state.response_cache {
        let stats = cache.stats().await;
        info!(
            hits = stats.hits,
            misses = stats.misses,
            entries = stats.entries,
            capacity = stats.capacity,
            hit_rate = stats.hit_rate(),
            "Response cache stats"
        );
    }
    Ok(())
}

/// Re-read the catalog file on SIGHUP.
#[cfg(unix)]
fn spawn_reload_on_hangup(catalog: Arc<FileCatalog>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut signal =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
                Ok(signal) => signal,
                Err(err) => {
                    error!(error = %err, "Failed to install SIGHUP handler");
                    return;
                }
            };
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = signal.recv() => {
                    if received.is_none() {
                        break;
                    }
                    info!("SIGHUP received: reloading catalog");
                    if let Err(err) = catalog.reload() {
                        error!(error = %err, "Catalog reload failed");
                    }
                }
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_catalog: Arc<FileCatalog>, _shutdown: CancellationToken) {}

async fn handle_compare(
    ids: Vec<String>,
    fields: Vec<String>,
    data_file: Option<PathBuf>,
    pretty: bool,
    config: AppConfig,
) -> Result<()> {
    let data_file = data_file.unwrap_or(config.catalog.data_file);
    let catalog: Arc<dyn CatalogLookup> = Arc::new(FileCatalog::load(&data_file)?);
    let engine = CompareEngine::new(catalog);

    let mut request = CompareRequest::new(ids);
    if !fields.is_empty() {
        request = request.with_fields(fields);
    }

    let outcome = engine.compare(&request, &CancellationToken::new()).await;
    let envelope = match &outcome {
        Ok((result, metadata)) => CompareEnvelope::success(result, metadata),
        Err(err) => CompareEnvelope::failure(err),
    };
    let json = if pretty {
        serde_json::to_string_pretty(&envelope)?
    } else {
        serde_json::to_string(&envelope)?
    };
    println!("{json}");

    match outcome {
        Ok(_) => Ok(()),
        Err(err) => {
            error!(code = %err.code(), "comparison failed");
            Err(ItemcmpError::Compare(err))
        }
    }
}

fn handle_config(
    action: ConfigAction,
    config_file: Option<&Path>,
    dir: &Path,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = dir.join(LOCAL_CONFIG_FILE);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&AppConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(config_file, None)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}
