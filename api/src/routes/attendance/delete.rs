use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use db::models::security_event::Severity;
use serde_json::json;
use services::attendance_session::AttendanceSessionService;
use services::security_log::{NewSecurityEvent, SecurityEventType};

use super::common::EndedSessionResponse;
use crate::auth::AuthUser;
use crate::response::{ApiError, ApiResponse};
use crate::state::AppState;

/// DELETE /api/attendance/sessions/{token}
///
/// Ends the session early. The row is kept until the retention purge.
/// A second call answers `409` (`already_inactive`).
pub async fn end_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<EndedSessionResponse>>, ApiError> {
    let db = state.db();
    let now = Utc::now();

    let session = AttendanceSessionService::find_by_token(db, &token).await?;
    let ended = AttendanceSessionService::deactivate(db, &session, now).await?;

    state
        .events()
        .log(
            NewSecurityEvent::new(SecurityEventType::SessionEnded, Severity::Low)
                .actor(user.id())
                .details(json!({ "session_id": ended.id })),
            now,
        )
        .await;

    Ok(Json(ApiResponse::success(
        EndedSessionResponse {
            id: ended.id,
            active: ended.active,
            ended_at: ended.updated_at,
        },
        "Attendance session ended",
    )))
}
