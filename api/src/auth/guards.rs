use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, FromRequestParts, Path, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use db::models::{attendance_session::Model as AttendanceSession, class, enrollment};
use sea_orm::DbErr;
use serde_json::json;
use services::activity::{ActivityMetadata, ActivityType};
use services::security_log::{NewSecurityEvent, SecurityEventType, suspicious_activity_event};
use std::{collections::HashMap, net::SocketAddr};

use crate::auth::claims::AuthUser;
use crate::auth::extractors::AuthRejection;
use crate::response::{ApiResponse, Empty};
use crate::state::AppState;
use db::models::security_event::Severity;

fn deny(status: StatusCode, message: &str) -> Response {
    (status, Json(ApiResponse::<Empty>::error(message))).into_response()
}

fn storage_failure(e: DbErr) -> Response {
    tracing::warn!(error = %e, "DB error while checking access; denying");
    deny(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong, please try again")
}

/// Authenticates the request and inserts the `AuthUser` back into it.
///
/// Bad tokens count as failed logins for the client address; accepted ones
/// count as a login for the user from that address.
async fn authenticate(
    state: &AppState,
    addr: SocketAddr,
    req: Request<Body>,
) -> Result<(Request<Body>, AuthUser), Response> {
    let (mut parts, body) = req.into_parts();
    let extracted = AuthUser::from_request_parts(&mut parts, state).await;
    let path = parts.uri.path().to_owned();
    let mut req = Request::from_parts(parts, body);

    let ip = addr.ip().to_string();
    let now = Utc::now();

    let user = match extracted {
        Ok(user) => user,
        Err(rejection) => {
            if rejection == AuthRejection::InvalidToken {
                let patterns = state
                    .detector()
                    .record(&ip, ActivityType::FailedLogin, ActivityMetadata::client(&ip), now)
                    .await;
                state
                    .events()
                    .log(
                        NewSecurityEvent::new(SecurityEventType::AuthenticationFailed, Severity::Medium)
                            .client(Some(&ip))
                            .details(json!({ "path": path })),
                        now,
                    )
                    .await;
                if let Some(event) = suspicious_activity_event(&ip, &patterns, Some(&ip)) {
                    state.events().log(event, now).await;
                }
            }
            return Err(rejection.into_response());
        }
    };

    let actor = user.id().to_string();
    let patterns = state
        .detector()
        .record(&actor, ActivityType::Login, ActivityMetadata::client(&ip), now)
        .await;
    if let Some(event) = suspicious_activity_event(&actor, &patterns, Some(&ip)) {
        state.events().log(event, now).await;
    }

    req.extensions_mut().insert(user.clone());
    Ok((req, user))
}

/// Basic guard to ensure the request is authenticated.
pub async fn allow_authenticated(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let (req, _user) = authenticate(&state, addr, req).await?;
    Ok(next.run(req).await)
}

/// Admin-only guard.
pub async fn allow_admin(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let (req, user) = authenticate(&state, addr, req).await?;

    if !user.is_admin() {
        return Err(deny(StatusCode::FORBIDDEN, "Admin access required"));
    }
    Ok(next.run(req).await)
}

async fn teaches(state: &AppState, user: &AuthUser, class: &class::Model) -> Result<bool, DbErr> {
    if user.is_admin() || class.instructor_id == user.id() {
        return Ok(true);
    }
    enrollment::Model::is_instructor(state.db(), user.id(), class.id).await
}

/// Guard for routes under `/classes/{class_id}`: admins and the class's instructors only.
pub async fn allow_class_instructor(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(params): Path<HashMap<String, String>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let (req, user) = authenticate(&state, addr, req).await?;

    let class_id = params
        .get("class_id")
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| deny(StatusCode::BAD_REQUEST, "Missing or invalid class_id"))?;

    let class = class::Model::find(state.db(), class_id)
        .await
        .map_err(storage_failure)?
        .ok_or_else(|| deny(StatusCode::NOT_FOUND, "Class not found"))?;

    if teaches(&state, &user, &class).await.map_err(storage_failure)? {
        Ok(next.run(req).await)
    } else {
        Err(deny(StatusCode::FORBIDDEN, "Instructor access required for this class"))
    }
}

/// Guard for routes under `/attendance/sessions/{token}`: the session's
/// creator, an instructor of its class, or an admin.
pub async fn allow_session_owner(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(params): Path<HashMap<String, String>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let (req, user) = authenticate(&state, addr, req).await?;

    let token = params
        .get("token")
        .ok_or_else(|| deny(StatusCode::BAD_REQUEST, "Missing session token"))?;

    let session = AttendanceSession::find_by_token(state.db(), token)
        .await
        .map_err(storage_failure)?
        .ok_or_else(|| deny(StatusCode::NOT_FOUND, "Attendance session not found"))?;

    if user.is_admin() || session.created_by == user.id() {
        return Ok(next.run(req).await);
    }

    let owns = match class::Model::find(state.db(), session.class_id)
        .await
        .map_err(storage_failure)?
    {
        Some(class) => teaches(&state, &user, &class).await.map_err(storage_failure)?,
        None => false,
    };

    if owns {
        Ok(next.run(req).await)
    } else {
        Err(deny(StatusCode::FORBIDDEN, "Only the session owner may change this session"))
    }
}
