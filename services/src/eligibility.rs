use chrono::{DateTime, Utc};
use db::models::{
    attendance_record, attendance_session::Model as AttendanceSession, class, enrollment,
};
use sea_orm::{ConnectionTrait, DbErr};

use crate::error::AttendanceError;
use crate::geo::Coordinates;

/// A session that passed every eligibility gate, with its class resolved.
#[derive(Debug, Clone)]
pub struct EligibleSession {
    pub session: AttendanceSession,
    pub class: class::Model,
}

impl EligibleSession {
    pub fn class_location(&self) -> Coordinates {
        Coordinates {
            lat: self.class.latitude,
            lng: self.class.longitude,
        }
    }
}

/// Why an attendee may not mark attendance. Checked in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum Ineligible {
    SessionNotFound,
    SessionEnded,
    SessionExpired,
    NotEnrolled { class_name: String },
    AlreadyMarked,
}

impl From<Ineligible> for AttendanceError {
    fn from(reason: Ineligible) -> Self {
        match reason {
            Ineligible::SessionNotFound => AttendanceError::SessionNotFound,
            Ineligible::SessionEnded => AttendanceError::SessionEnded,
            Ineligible::SessionExpired => AttendanceError::SessionExpired,
            Ineligible::NotEnrolled { class_name } => AttendanceError::NotEnrolled { class_name },
            Ineligible::AlreadyMarked => AttendanceError::AlreadyMarked,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Eligibility {
    Eligible(EligibleSession),
    Ineligible(Ineligible),
}

/// Runs the four gates in order and stops at the first failure.
///
/// Business rejections come back as `Ok(Eligibility::Ineligible(..))`; only
/// storage faults are `Err`.
pub async fn check<C>(
    db: &C,
    session_token: &str,
    attendee_id: i64,
    now: DateTime<Utc>,
) -> Result<Eligibility, DbErr>
where
    C: ConnectionTrait,
{
    use Eligibility::Ineligible as No;

    let Some(session) = AttendanceSession::find_by_token(db, session_token).await? else {
        return Ok(No(Ineligible::SessionNotFound));
    };

    // Ended early stays ended even once its expiry has also passed.
    if !session.active {
        let reason = if session.lapsed() {
            Ineligible::SessionExpired
        } else {
            Ineligible::SessionEnded
        };
        return Ok(No(reason));
    }
    if session.is_expired(now) {
        return Ok(No(Ineligible::SessionExpired));
    }

    // FK guarantees the class exists; a miss means it was deleted mid-request.
    let Some(class) = class::Model::find(db, session.class_id).await? else {
        return Ok(No(Ineligible::SessionNotFound));
    };

    if !enrollment::Model::is_enrolled(db, attendee_id, class.id).await? {
        return Ok(No(Ineligible::NotEnrolled {
            class_name: class.name,
        }));
    }

    if attendance_record::Model::exists_for(db, session.id, attendee_id).await? {
        return Ok(No(Ineligible::AlreadyMarked));
    }

    Ok(Eligibility::Eligible(EligibleSession { session, class }))
}
