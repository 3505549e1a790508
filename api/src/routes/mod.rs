//! HTTP route entry point for `/api/...`.
//!
//! - `/health` → health check (public)
//! - `/classes/...`, `/attendance/...` → session lifecycle and attendance marking
//! - `/security` → security event statistics (admin only)

use axum::Router;

use crate::state::AppState;

pub mod attendance;
pub mod health;
pub mod security;

use attendance::attendance_routes;
use health::health_routes;
use security::security_routes;

/// Builds the router for every HTTP endpoint, to be nested under `/api`.
pub fn routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/health", health_routes(app_state.clone()))
        .nest("/security", security_routes(app_state.clone()))
        .merge(attendance_routes(app_state.clone()))
        .with_state(app_state)
}
