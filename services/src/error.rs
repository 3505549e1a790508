use sea_orm::DbErr;
use thiserror::Error;

/// Every outcome a caller of the attendance core can observe besides success.
///
/// Input, state and policy kinds are expected business outcomes. Only
/// `Database` represents a fault of the system itself.
#[derive(Debug, Error)]
pub enum AttendanceError {
    // --- input ---
    #[error("Session duration must be between {min} and {max} minutes (got {got})")]
    InvalidDuration { got: i64, min: i64, max: i64 },

    #[error("Coordinates out of range (lat {lat}, lng {lng})")]
    InvalidCoordinates { lat: f64, lng: f64 },

    #[error("Malformed session descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    // --- state ---
    #[error("Attendance session not found")]
    SessionNotFound,

    #[error("Attendance session has expired")]
    SessionExpired,

    #[error("Attendance session was ended by the instructor")]
    SessionEnded,

    #[error("Attendance session is already inactive")]
    AlreadyInactive,

    #[error("Attendance already recorded for this session")]
    AlreadyMarked,

    #[error("You are not enrolled in {class_name}")]
    NotEnrolled { class_name: String },

    #[error("Attendance session is not currently valid")]
    InvalidSessionState,

    #[error("Class not found")]
    ClassNotFound,

    // --- policy ---
    #[error("You are {distance:.0} m from the class location (allowed: {tolerance:.0} m)")]
    TooFar { distance: f64, tolerance: f64 },

    #[error("Too many requests, retry in {retry_after_secs} s")]
    RateLimited { retry_after_secs: u64 },

    // --- system ---
    #[error("Storage failure: {0}")]
    Database(#[from] DbErr),
}

impl AttendanceError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidDuration { .. } => "invalid_duration",
            Self::InvalidCoordinates { .. } => "invalid_coordinates",
            Self::MalformedDescriptor(_) => "malformed_descriptor",
            Self::InvalidRequest(_) => "invalid_request",
            Self::SessionNotFound => "session_not_found",
            Self::SessionExpired => "session_expired",
            Self::SessionEnded => "session_ended",
            Self::AlreadyInactive => "already_inactive",
            Self::AlreadyMarked => "already_marked",
            Self::NotEnrolled { .. } => "not_enrolled",
            Self::InvalidSessionState => "invalid_session_state",
            Self::ClassNotFound => "class_not_found",
            Self::TooFar { .. } => "too_far",
            Self::RateLimited { .. } => "rate_limited",
            Self::Database(_) => "internal_error",
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    /// Message safe to hand to a client. System errors never leak detail.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) => "Something went wrong, please try again".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_errors_hide_detail() {
        let err = AttendanceError::from(DbErr::Custom("disk I/O error at /var/db".into()));
        assert!(err.is_system());
        assert_eq!(err.kind(), "internal_error");
        assert!(!err.public_message().contains("/var/db"));
    }

    #[test]
    fn too_far_message_carries_distance_and_tolerance() {
        let err = AttendanceError::TooFar {
            distance: 123.4,
            tolerance: 50.0,
        };
        assert_eq!(err.kind(), "too_far");
        assert_eq!(
            err.public_message(),
            "You are 123 m from the class location (allowed: 50 m)"
        );
    }
}
