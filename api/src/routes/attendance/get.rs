use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use db::models::class;
use services::AttendanceError;
use services::attendance_session::AttendanceSessionService;

use super::common::SessionResponse;
use crate::response::{ApiError, ApiResponse};
use crate::state::AppState;

/// GET /api/classes/{class_id}/attendance/sessions/active
///
/// Returns the class's open session with a fresh descriptor, or
/// `404` (`session_not_found`) when no window is open.
pub async fn get_active_session(
    State(state): State<AppState>,
    Path(class_id): Path<i64>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let db = state.db();
    let now = Utc::now();

    let class = class::Model::find(db, class_id)
        .await?
        .ok_or(AttendanceError::ClassNotFound)?;
    let session = AttendanceSessionService::active_for_class(db, class_id, now)
        .await?
        .ok_or(AttendanceError::SessionNotFound)?;

    Ok(Json(ApiResponse::success(
        SessionResponse::build(&session, &class, now)?,
        "Active attendance session retrieved",
    )))
}
