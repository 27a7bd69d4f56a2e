//! Kiro token broker
//!
//! Single-binary service that:
//! 1. Loads Kiro credentials from `KIRO_AUTH_TOKEN` and the accounts CSV
//! 2. Builds the token pool and warms it up
//! 3. Serves usable access tokens, pool health and Prometheus metrics over HTTP
//! 4. Accepts CSV hot-adds and serves pool detail on a separate admin listener

mod admin;
mod config;
mod metrics;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kiro_auth::KiroClient;
use kiro_pool::{AuthService, CredentialSources, PoolOptions};

use crate::config::{Config, DEFAULT_CONFIG_PATH};

/// Upper bound on in-flight request draining after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    auth: Arc<AuthService>,
    prometheus: PrometheusHandle,
}

/// Build the public axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
/// Admin routes are not mounted here; they get their own listener.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/token", get(token_handler))
        .with_state(state)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs; LOG_LEVEL wins over RUST_LOG
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting kiro-token-broker");

    // Install before the pool emits anything
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config = match Config::resolve_path(cli_config_path) {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            Config::load(&path)
                .with_context(|| format!("failed to load config from {}", path.display()))?
        }
        None => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            info!(path = %path.display(), "loading configuration (defaults if absent)");
            Config::load_or_default(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?
        }
    };

    info!(
        listen_addr = %config.server.listen_addr,
        admin_listen_addr = %config.server.admin_listen_addr,
        region = %config.pool.region,
        cache_ttl_secs = config.pool.cache_ttl_secs,
        csv_path = %config.pool.csv_path.display(),
        "configuration loaded"
    );

    let client = KiroClient::for_region(&config.pool.region, config.pool.request_timeout())
        .context("failed to build upstream HTTP client")?;
    let client = Arc::new(client);

    let sources = CredentialSources::from_env(config.pool.csv_path.clone());
    let options = PoolOptions {
        cache_ttl: config.pool.cache_ttl(),
    };
    let auth = AuthService::new(&sources, options, client.clone(), client)
        .await
        .context("failed to initialize token pool")?;

    let pool = auth
        .pool()
        .cloned()
        .context("token pool missing after initialization")?;
    let state = AppState {
        auth: Arc::new(auth),
        prometheus: prometheus_handle,
    };
    let app = build_router(state, config.server.max_connections);
    let admin_app = admin::build_admin_router(pool);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    let admin_addr = config.server.admin_listen_addr;
    let admin_listener = TcpListener::bind(admin_addr)
        .await
        .with_context(|| format!("failed to bind admin listener to {admin_addr}"))?;
    info!(addr = %listen_addr, admin_addr = %admin_addr, "accepting requests");

    // The drain timer starts at signal receipt, not at server start
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let server_handle = tokio::spawn(serve(listener, app, shutdown_rx.clone()));
    let admin_handle = tokio::spawn(serve(admin_listener, admin_app, shutdown_rx));

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        tokio::join!(server_handle, admin_handle)
    })
    .await;
    match drained {
        Ok((server, admin)) => {
            log_server_exit("public", server);
            log_server_exit("admin", admin);
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Serve `app` until the shutdown flag flips.
async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}

fn log_server_exit(
    listener: &'static str,
    outcome: std::result::Result<std::io::Result<()>, tokio::task::JoinError>,
) {
    match outcome {
        Ok(Ok(())) => info!(listener, "all in-flight requests drained"),
        Ok(Err(e)) => error!(listener, error = %e, "server error during shutdown"),
        Err(e) => error!(listener, error = %e, "server task panicked"),
    }
}

/// Pool health: 200 when healthy or degraded, 503 when no cached token is usable.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let Some(pool) = state.auth.pool() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "unhealthy", "error": "not_initialized" })),
        );
    };

    let stats = pool.stats().await;
    let status_code = if stats.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": stats.status,
            "credentials": stats.credentials,
            "rotation_len": stats.rotation_len,
            "cursor": stats.cursor,
            "cached": stats.cached,
            "usable": stats.usable,
            "exhausted": stats.exhausted,
            "last_full_refresh_secs_ago": stats.last_full_refresh_secs_ago,
        })),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Hand out the best currently usable access token.
async fn token_handler(State(state): State<AppState>) -> impl IntoResponse {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());

    match state.auth.get_token().await {
        Ok(token) => {
            metrics::record_token_request("ok");
            debug!(request_id, "token issued");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "access_token": token.access_token,
                    "expires_in_secs": token.expires_in().as_secs(),
                    "profile_arn": token.profile_arn,
                })),
            )
        }
        Err(e) => {
            let error_type = match &e {
                kiro_pool::Error::NoUsableToken(_) => "no_usable_token",
                kiro_pool::Error::NotInitialized => "not_initialized",
                _ => "token_error",
            };
            metrics::record_token_request(error_type);
            warn!(request_id, error = %e, error_type, "no token issued");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "error": { "type": error_type, "message": e.to_string() },
                    "request_id": request_id,
                })),
            )
        }
    }
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
