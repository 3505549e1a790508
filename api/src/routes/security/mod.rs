use axum::{Router, middleware::from_fn_with_state, routing::get};

use crate::auth::guards::allow_admin;
use crate::auth::middleware::limit_general;
use crate::state::AppState;

mod get;

pub use get::{StatisticsQuery, get_statistics};

/// `GET /security/statistics?hours=N` → aggregated security events (admin only).
pub fn security_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/statistics",
            get(get_statistics)
                .route_layer(from_fn_with_state(app_state.clone(), allow_admin))
                .route_layer(from_fn_with_state(app_state.clone(), limit_general)),
        )
        .with_state(app_state)
}
