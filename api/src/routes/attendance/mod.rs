use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};

use crate::auth::guards::{allow_authenticated, allow_class_instructor, allow_session_owner};
use crate::auth::middleware::{limit_attendance, limit_general, limit_token_issuance};
use crate::state::AppState;

mod common;
mod delete;
mod get;
mod post;
mod put;

pub use common::{MarkResponse, ScanResponse, SessionResponse};
pub use delete::end_session;
pub use get::get_active_session;
pub use post::{create_session, mark_attendance, scan_descriptor};
pub use put::extend_session;

/// Attendance routes. Each route is rate limited first, then guarded.
///
/// - `POST /classes/{class_id}/attendance/sessions` → open a session (instructor, token issuance limit)
/// - `GET /classes/{class_id}/attendance/sessions/active` → current session (instructor)
/// - `PUT /attendance/sessions/{token}/extend` → extend (session owner)
/// - `DELETE /attendance/sessions/{token}` → end (session owner)
/// - `POST /attendance/scan` → validate a scanned descriptor (authenticated)
/// - `POST /attendance/mark` → mark attendance (authenticated, attendance limit)
pub fn attendance_routes(app_state: AppState) -> Router<AppState> {
    let s = app_state;
    Router::new()
        .route(
            "/classes/{class_id}/attendance/sessions",
            post(create_session)
                .route_layer(from_fn_with_state(s.clone(), allow_class_instructor))
                .route_layer(from_fn_with_state(s.clone(), limit_token_issuance)),
        )
        .route(
            "/classes/{class_id}/attendance/sessions/active",
            get(get_active_session)
                .route_layer(from_fn_with_state(s.clone(), allow_class_instructor))
                .route_layer(from_fn_with_state(s.clone(), limit_general)),
        )
        .route(
            "/attendance/sessions/{token}/extend",
            put(extend_session)
                .route_layer(from_fn_with_state(s.clone(), allow_session_owner))
                .route_layer(from_fn_with_state(s.clone(), limit_general)),
        )
        .route(
            "/attendance/sessions/{token}",
            delete(end_session)
                .route_layer(from_fn_with_state(s.clone(), allow_session_owner))
                .route_layer(from_fn_with_state(s.clone(), limit_general)),
        )
        .route(
            "/attendance/scan",
            post(scan_descriptor)
                .route_layer(from_fn_with_state(s.clone(), allow_authenticated))
                .route_layer(from_fn_with_state(s.clone(), limit_general)),
        )
        .route(
            "/attendance/mark",
            post(mark_attendance)
                .route_layer(from_fn_with_state(s.clone(), allow_authenticated))
                .route_layer(from_fn_with_state(s.clone(), limit_attendance)),
        )
        .with_state(s)
}
