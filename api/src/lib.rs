pub mod auth;
pub mod response;
pub mod routes;
pub mod state;

use axum::{Router, middleware::from_fn_with_state};

use crate::auth::middleware::log_request;
use crate::state::AppState;

/// The complete application: every route under `/api`, with request logging.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`; the
/// guards and rate limiters key on the peer address.
pub fn app(app_state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::routes(app_state.clone()))
        .layer(from_fn_with_state(app_state.clone(), log_request))
        .with_state(app_state)
}
