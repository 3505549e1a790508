use axum::{
    Extension, Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use db::models::{class, security_event::Severity};
use serde_json::json;
use services::AttendanceError;
use services::attendance_session::AttendanceSessionService;
use services::security_log::{NewSecurityEvent, SecurityEventType};

use super::common::{ExtendSessionReq, SessionResponse};
use crate::auth::AuthUser;
use crate::response::{ApiError, ApiResponse};
use crate::state::AppState;

/// PUT /api/attendance/sessions/{token}/extend
///
/// Body: `{ "additionalMinutes": 10 }`. Only a still-valid session can be
/// extended: `410` with `session_expired` or `session_ended` otherwise.
pub async fn extend_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(body), _): WithRejection<Json<ExtendSessionReq>, ApiError>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let db = state.db();
    let now = Utc::now();

    let session = AttendanceSessionService::find_by_token(db, &token).await?;
    let updated = AttendanceSessionService::extend(
        db,
        state.session_policy(),
        &session,
        body.additional_minutes,
        now,
    )
    .await?;
    let class = class::Model::find(db, updated.class_id)
        .await?
        .ok_or(AttendanceError::ClassNotFound)?;

    state
        .events()
        .log(
            NewSecurityEvent::new(SecurityEventType::SessionExtended, Severity::Low)
                .actor(user.id())
                .details(json!({
                    "session_id": updated.id,
                    "additional_minutes": body.additional_minutes,
                    "expires_at": updated.expires_at.to_rfc3339(),
                })),
            now,
        )
        .await;

    Ok(Json(ApiResponse::success(
        SessionResponse::build(&updated, &class, now)?,
        "Attendance session extended",
    )))
}
