use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use jsonwebtoken::{Algorithm, Validation, decode};

use crate::auth::claims::{AuthUser, Claims};
use crate::response::{ApiResponse, Empty};
use crate::state::AppState;

/// Why a bearer token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingToken,
    InvalidToken,
}

impl AuthRejection {
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingToken => "Missing or invalid Authorization header",
            Self::InvalidToken => "Invalid or expired token",
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::<Empty>::error(self.message())),
        )
            .into_response()
    }
}

/// Extracts `AuthUser` from a `Bearer` token signed with the configured secret.
///
/// Prefer the `allow_*` guards for protected routes: they also feed
/// failures to the activity detector.
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AuthRejection::MissingToken)?;

        let token_data = decode::<Claims>(
            bearer.token(),
            state.decoding_key(),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|_| AuthRejection::InvalidToken)?;

        Ok(AuthUser(token_data.claims))
    }
}
