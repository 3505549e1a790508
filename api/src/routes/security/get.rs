use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use services::security_log::SecurityStatistics;

use crate::response::{ApiError, ApiResponse};
use crate::state::AppState;

const DEFAULT_LOOKBACK_HOURS: i64 = 24;
const MAX_LOOKBACK_HOURS: i64 = 24 * 30;

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    pub hours: Option<i64>,
}

/// GET /api/security/statistics?hours=N
///
/// Counts by severity, event type and hour of day, the ten busiest client
/// addresses and every actor with a high or critical event. `hours` defaults
/// to 24 and is clamped to 1..=720.
pub async fn get_statistics(
    State(state): State<AppState>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<ApiResponse<SecurityStatistics>>, ApiError> {
    let hours = query
        .hours
        .unwrap_or(DEFAULT_LOOKBACK_HOURS)
        .clamp(1, MAX_LOOKBACK_HOURS);

    let stats = state
        .events()
        .statistics(Duration::hours(hours), Utc::now())
        .await?;

    Ok(Json(ApiResponse::success(
        stats,
        "Security statistics retrieved",
    )))
}
