use axum::{
    Extension, Json,
    extract::{ConnectInfo, Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use db::models::{class, security_event::Severity};
use serde_json::json;
use services::AttendanceError;
use services::attendance_record::MarkRequest;
use services::attendance_session::AttendanceSessionService;
use services::eligibility::{self, Eligibility};
use services::security_log::{NewSecurityEvent, SecurityEventType};
use services::token_codec;
use std::net::SocketAddr;

use super::common::{
    CreateSessionReq, MarkAttendanceReq, MarkResponse, ScanReq, ScanResponse, SessionResponse,
};
use crate::auth::AuthUser;
use crate::response::{ApiError, ApiResponse};
use crate::state::AppState;

/// POST /api/classes/{class_id}/attendance/sessions
///
/// Opens a new attendance window for the class, ending any window that was
/// still open. Body: `{ "durationMinutes": 30 }`.
///
/// ### Responses
/// - `201 Created` with the session and its descriptor
/// - `400 Bad Request` (`invalid_duration`)
/// - `403 Forbidden` / `404 Not Found` from the instructor guard
pub async fn create_session(
    State(state): State<AppState>,
    Path(class_id): Path<i64>,
    Extension(user): Extension<AuthUser>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    WithRejection(Json(body), _): WithRejection<Json<CreateSessionReq>, ApiError>,
) -> Result<(StatusCode, Json<ApiResponse<SessionResponse>>), ApiError> {
    let db = state.db();
    let now = Utc::now();

    let session = AttendanceSessionService::create(
        db,
        state.session_policy(),
        class_id,
        user.id(),
        body.duration_minutes,
        now,
    )
    .await?;
    let class = class::Model::find(db, class_id)
        .await?
        .ok_or(AttendanceError::ClassNotFound)?;

    state
        .events()
        .log(
            NewSecurityEvent::new(SecurityEventType::SessionCreated, Severity::Low)
                .actor(user.id())
                .client(Some(&addr.ip().to_string()))
                .details(json!({
                    "session_id": session.id,
                    "class_id": class_id,
                    "duration_minutes": body.duration_minutes,
                })),
            now,
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            SessionResponse::build(&session, &class, now)?,
            "Attendance session created",
        )),
    ))
}

/// POST /api/attendance/mark
///
/// Body: `{ "sessionToken": "...", "location": { "lat": 40.7, "lng": -74.0 } }`.
///
/// ### Responses
/// - `200 OK` with the record id, measured distance and session metadata
/// - `422 Unprocessable Entity` (`too_far`) with `distance` and `toleranceMeters`
/// - `409 Conflict` (`already_marked`), `410 Gone` (`session_expired`, `session_ended`)
/// - `403 Forbidden` (`not_enrolled`), `404 Not Found` (`session_not_found`)
/// - `400 Bad Request` (`invalid_request`) for an unreadable body, which is
///   also recorded as a rejected attempt
pub async fn mark_attendance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    payload: Result<Json<MarkAttendanceReq>, JsonRejection>,
) -> Result<Json<ApiResponse<MarkResponse>>, ApiError> {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            let err = ApiError::from(rejection);
            state
                .events()
                .log(
                    NewSecurityEvent::new(SecurityEventType::AttendanceRejected, Severity::Low)
                        .actor(user.id())
                        .client(Some(&addr.ip().to_string()))
                        .details(json!({ "reason": err.0.kind(), "error": err.0.to_string() })),
                    Utc::now(),
                )
                .await;
            return Err(err);
        }
    };

    let success = state
        .attendance()
        .mark(MarkRequest {
            session_token: body.session_token,
            attendee_id: user.id(),
            location: body.location,
            tolerance_meters: state.proximity_tolerance_meters(),
            client_id: Some(addr.ip().to_string()),
            now: Utc::now(),
        })
        .await?;

    Ok(Json(ApiResponse::success(
        MarkResponse::from(success),
        "Attendance recorded",
    )))
}

/// POST /api/attendance/scan
///
/// Decodes a scanned descriptor and checks it against the stored session.
/// The returned descriptor comes from the store, not from the client.
pub async fn scan_descriptor(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    WithRejection(Json(body), _): WithRejection<Json<ScanReq>, ApiError>,
) -> Result<Json<ApiResponse<ScanResponse>>, ApiError> {
    let now = Utc::now();
    let scanned = token_codec::decode(&body.descriptor)?;

    let eligible = match eligibility::check(state.db(), &scanned.session_token, user.id(), now).await? {
        Eligibility::Eligible(e) => e,
        Eligibility::Ineligible(reason) => return Err(AttendanceError::from(reason).into()),
    };

    if eligible.class.id != scanned.class_id {
        return Err(AttendanceError::MalformedDescriptor(
            "descriptor does not match its session".into(),
        )
        .into());
    }

    let descriptor = token_codec::encode(&eligible.session, &eligible.class, now)?;
    Ok(Json(ApiResponse::success(
        ScanResponse {
            descriptor,
            remaining_seconds: eligible.session.remaining(now).num_seconds(),
            tolerance_meters: state.proximity_tolerance_meters(),
        },
        "Session is open for attendance",
    )))
}
