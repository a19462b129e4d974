use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};
use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    routing::get,
    Json, Router,
};
use leaderboard_core::leaderboard::RefreshSummary;

fn check_bearer(headers: &HeaderMap, secret: Option<&str>) -> ApiResult<()> {
    let Some(secret) = secret else {
        return Ok(());
    };
    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match provided {
        Some(token) if token == secret => Ok(()),
        Some(_) => Err(ApiError::Unauthorized("Invalid cron token".to_string())),
        None => Err(ApiError::Unauthorized("Missing cron token".to_string())),
    }
}

/// Refresh the cached standings. Skipped while the market is closed.
async fn refresh_cache(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<RefreshSummary>> {
    check_bearer(&headers, state.cron_secret.as_deref())?;
    let summary = state.leaderboard_service.refresh_current().await;
    tracing::info!("Cron refresh: {:?}", summary);
    Ok(Json(summary))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/cron/refresh-cache", get(refresh_cache))
}
