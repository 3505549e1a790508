use chrono::{DateTime, Utc};
use db::models::class;
use serde::{Deserialize, Serialize};
use services::attendance_record::MarkSuccess;
use services::attendance_session::AttendanceSession;
use services::error::AttendanceError;
use services::geo::Coordinates;
use services::token_codec::{self, SessionDescriptor};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionReq {
    pub duration_minutes: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendSessionReq {
    pub additional_minutes: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendanceReq {
    pub session_token: String,
    pub location: Coordinates,
}

#[derive(Debug, Deserialize)]
pub struct ScanReq {
    /// Raw descriptor as read from the QR code.
    pub descriptor: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: i64,
    pub token: String,
    pub class_id: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub remaining_seconds: i64,
    pub descriptor: SessionDescriptor,
    /// `descriptor` in its compact wire form, ready for a QR code.
    pub qr_payload: String,
}

impl SessionResponse {
    pub fn build(
        session: &AttendanceSession,
        class: &class::Model,
        now: DateTime<Utc>,
    ) -> Result<Self, AttendanceError> {
        let descriptor = token_codec::encode(session, class, now)?;
        Ok(Self {
            id: session.id,
            token: session.token.clone(),
            class_id: session.class_id,
            active: session.active,
            created_at: session.created_at,
            expires_at: session.expires_at,
            remaining_seconds: session.remaining(now).num_seconds(),
            qr_payload: descriptor.to_wire(),
            descriptor,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkResponse {
    pub record_id: i64,
    pub distance: f64,
    pub marked_at: DateTime<Utc>,
    pub session_id: i64,
    pub class_id: i64,
    pub class_name: String,
    pub expires_at: DateTime<Utc>,
}

impl From<MarkSuccess> for MarkResponse {
    fn from(m: MarkSuccess) -> Self {
        Self {
            record_id: m.record.id,
            distance: m.distance,
            marked_at: m.record.marked_at,
            session_id: m.session.session_id,
            class_id: m.session.class_id,
            class_name: m.session.class_name,
            expires_at: m.session.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub descriptor: SessionDescriptor,
    pub remaining_seconds: i64,
    pub tolerance_meters: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndedSessionResponse {
    pub id: i64,
    pub active: bool,
    pub ended_at: DateTime<Utc>,
}
