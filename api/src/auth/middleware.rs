use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{HeaderName, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::TypedHeader;
use chrono::Utc;
use db::models::security_event::Severity;
use headers::UserAgent;
use serde_json::json;
use services::AttendanceError;
use services::activity::{ActivityMetadata, ActivityType};
use services::rate_limiter::EndpointClass;
use services::security_log::{NewSecurityEvent, SecurityEventType, suspicious_activity_event};
use std::net::SocketAddr;
use tracing::info;

use crate::auth::claims::AuthUser;
use crate::response::ApiError;
use crate::state::AppState;

pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Logs method, path, IP address, user ID (if authenticated) and user-agent
/// for each incoming HTTP request. Skips CORS preflight `OPTIONS` requests.
///
/// ```ignore
/// let app = Router::new().layer(from_fn_with_state(state.clone(), log_request));
/// ```
pub async fn log_request(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();

    if parts.method == Method::OPTIONS {
        return next.run(Request::from_parts(parts, body)).await;
    }

    let user_id = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .ok()
        .map(|u| u.id());

    let user_agent = TypedHeader::<UserAgent>::from_request_parts(&mut parts, &state)
        .await
        .ok()
        .map(|TypedHeader(ua)| ua.to_string());

    info!(
        method = ?parts.method,
        path = %parts.uri.path(),
        ip = %addr.ip(),
        user = user_id.unwrap_or(0),
        user_agent = user_agent.unwrap_or_else(|| "unknown".into()),
        "Incoming request"
    );

    next.run(Request::from_parts(parts, body)).await
}

/// Counts the request against `endpoint`'s limit for the client address.
///
/// A limited request is answered with 429 here and never reaches the handler.
/// Limited attendance requests still count as attendance attempts for the
/// client address, so hammering past the limit shows up in the detector.
async fn enforce(
    state: &AppState,
    addr: SocketAddr,
    endpoint: EndpointClass,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = addr.ip().to_string();
    let now = Utc::now();
    let decision = state.rate_limiter().check_endpoint(&ip, endpoint, now).await;

    if decision.limited {
        state
            .events()
            .log(
                NewSecurityEvent::new(SecurityEventType::RateLimitExceeded, Severity::Medium)
                    .client(Some(&ip))
                    .details(json!({
                        "endpoint": endpoint.as_str(),
                        "path": req.uri().path(),
                    })),
                now,
            )
            .await;

        if matches!(endpoint, EndpointClass::Attendance) {
            let patterns = state
                .detector()
                .record(&ip, ActivityType::AttendanceAttempt, ActivityMetadata::client(&ip), now)
                .await;
            if let Some(event) = suspicious_activity_event(&ip, &patterns, Some(&ip)) {
                state.events().log(event, now).await;
            }
        }

        let mut response = ApiError(AttendanceError::RateLimited {
            retry_after_secs: decision.retry_after_secs(now),
        })
        .into_response();
        response
            .headers_mut()
            .insert(X_RATELIMIT_REMAINING, HeaderValue::from(0u64));
        return response;
    }

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    response
}

pub async fn limit_attendance(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Response {
    enforce(&state, addr, EndpointClass::Attendance, req, next).await
}

pub async fn limit_token_issuance(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Response {
    enforce(&state, addr, EndpointClass::TokenIssuance, req, next).await
}

pub async fn limit_general(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Response {
    enforce(&state, addr, EndpointClass::General, req, next).await
}
