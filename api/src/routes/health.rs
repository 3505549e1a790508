use axum::{Json, Router, middleware::from_fn_with_state, response::IntoResponse, routing::get};

use crate::auth::middleware::limit_general;
use crate::response::ApiResponse;
use crate::state::AppState;

/// `GET /health` → liveness probe for uptime checks and load balancers.
pub fn health_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(health_check).route_layer(from_fn_with_state(app_state.clone(), limit_general)),
        )
        .with_state(app_state)
}

/// GET /health
///
/// ```json
/// { "success": true, "data": "OK", "message": "Health check passed" }
/// ```
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::success("OK", "Health check passed"))
}
