use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use services::AttendanceError;

/// Standardized API response wrapper for all outgoing JSON responses.
///
/// ```json
/// {
///   "success": true,
///   "data": { ... },
///   "message": "Attendance recorded"
/// }
/// ```
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,
    pub data: T,
    pub message: String,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }

    /// Error response with default `data`.
    pub fn error(message: impl Into<String>) -> Self
    where
        T: Default,
    {
        Self {
            success: false,
            data: T::default(),
            message: message.into(),
        }
    }
}

/// Empty `data` payload.
#[derive(Serialize, Default)]
pub struct Empty {}

/// `data` of a failed attendance operation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorData {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance_meters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// An [`AttendanceError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub AttendanceError);

impl From<AttendanceError> for ApiError {
    fn from(err: AttendanceError) -> Self {
        Self(err)
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self(AttendanceError::Database(err))
    }
}

/// Body extraction failures keep the envelope instead of axum's plain text.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(AttendanceError::InvalidRequest(rejection.body_text()))
    }
}

pub fn status_for(err: &AttendanceError) -> StatusCode {
    use AttendanceError::*;
    match err {
        InvalidDuration { .. }
        | InvalidCoordinates { .. }
        | MalformedDescriptor(_)
        | InvalidRequest(_) => StatusCode::BAD_REQUEST,
        SessionNotFound | ClassNotFound => StatusCode::NOT_FOUND,
        AlreadyMarked | AlreadyInactive | InvalidSessionState => StatusCode::CONFLICT,
        SessionExpired | SessionEnded => StatusCode::GONE,
        NotEnrolled { .. } => StatusCode::FORBIDDEN,
        TooFar { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        if err.is_system() {
            tracing::error!(error = %err, "Request failed");
        }

        let (distance, tolerance_meters) = match &err {
            AttendanceError::TooFar { distance, tolerance } => (Some(*distance), Some(*tolerance)),
            _ => (None, None),
        };
        let retry_after_secs = match &err {
            AttendanceError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };

        let body = ApiResponse {
            success: false,
            data: ErrorData {
                kind: err.kind(),
                distance,
                tolerance_meters,
                retry_after_secs,
            },
            message: err.public_message(),
        };

        let mut response = (status_for(&err), Json(body)).into_response();
        if let Some(secs) = retry_after_secs {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
