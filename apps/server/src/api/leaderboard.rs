use std::{collections::BTreeMap, sync::Arc};

use crate::{error::ApiResult, main_lib::AppState};
use axum::{extract::State, routing::get, Json, Router};
use leaderboard_core::leaderboard::{
    BenchmarkRecord, ChartSeries, ManagerAnalysis, PerformanceRecord,
};

/// Managers ranked by year-to-date performance.
async fn get_current_standings(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<PerformanceRecord>>> {
    let records = state.leaderboard_service.current_standings().await?;
    Ok(Json(records))
}

/// Year-to-date chart series.
async fn get_performance_series(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ChartSeries>> {
    let series = state.leaderboard_service.performance_series().await?;
    Ok(Json(series))
}

async fn get_benchmarks(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<BenchmarkRecord>>> {
    let records = state.leaderboard_service.benchmarks().await?;
    Ok(Json(records))
}

async fn get_analyses(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<BTreeMap<String, ManagerAnalysis>>> {
    let analyses = state.leaderboard_service.analyses().await?;
    Ok(Json(analyses))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stocks/current", get(get_current_standings))
        .route("/stocks/monthly", get(get_performance_series))
        .route("/indexes", get(get_benchmarks))
        .route("/analyses", get(get_analyses))
}
