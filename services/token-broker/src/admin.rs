//! Admin API for account management
//!
//! Endpoints:
//! - POST /admin/accounts/import: hot-add IdC accounts from a CSV file on the broker host
//! - GET  /admin/pool: pool status summary

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, warn};

use kiro_pool::TokenPool;

/// Build the admin router over the running pool.
pub fn build_admin_router(pool: Arc<TokenPool>) -> Router {
    Router::new()
        .route("/admin/accounts/import", post(import_accounts))
        .route("/admin/pool", get(pool_status))
        .with_state(pool)
}

/// Request body for the import endpoint.
#[derive(Deserialize)]
struct ImportRequest {
    path: PathBuf,
}

/// POST /admin/accounts/import: load an accounts CSV and add its enabled
/// rows to the pool. The whole pool is refreshed before this returns.
async fn import_accounts(
    State(pool): State<Arc<TokenPool>>,
    Json(body): Json<ImportRequest>,
) -> impl IntoResponse {
    match pool.add_credentials_from_csv(&body.path).await {
        Ok(added) => {
            let total = pool.len().await;
            info!(path = %body.path.display(), added, total, "accounts imported");
            (
                StatusCode::OK,
                Json(serde_json::json!({ "added": added, "total": total })),
            )
        }
        Err(e) => {
            warn!(path = %body.path.display(), error = %e, "account import failed");
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": { "type": "import_failed", "message": e.to_string() }
                })),
            )
        }
    }
}

/// GET /admin/pool: full pool stats, including per-entry detail.
async fn pool_status(State(pool): State<Arc<TokenPool>>) -> impl IntoResponse {
    (StatusCode::OK, Json(pool.stats().await))
}
