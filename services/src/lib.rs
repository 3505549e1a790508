pub mod activity;
pub mod attendance_record;
pub mod attendance_session;
pub mod eligibility;
pub mod error;
pub mod geo;
pub mod maintenance;
pub mod proximity;
pub mod rate_limiter;
pub mod security_log;
pub mod token_codec;

pub use error::AttendanceError;
