//! The attendance-marking transaction.
//!
//! At-most-once marking rests on the `(session_id, attendee_id)` UNIQUE index
//! alone. The eligibility pre-check only produces friendlier early answers; a
//! racing duplicate that slips past it is caught at insert time.

use chrono::{DateTime, Utc};
use db::models::attendance_record::{Model as AttendanceRecord, NewRecord};
use db::models::security_event::Severity;
use sea_orm::{DatabaseConnection, DbErr, SqlErr};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use crate::activity::{ActivityMetadata, ActivityType, SuspiciousActivityDetector};
use crate::eligibility::{self, Eligibility, EligibleSession};
use crate::error::AttendanceError;
use crate::geo::Coordinates;
use crate::proximity::{self, ProximityCheck};
use crate::security_log::{
    NewSecurityEvent, SecurityEventLog, SecurityEventType, suspicious_activity_event,
};

#[derive(Debug, Clone)]
pub struct MarkRequest {
    pub session_token: String,
    pub attendee_id: i64,
    pub location: Coordinates,
    pub tolerance_meters: f64,
    pub client_id: Option<String>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionMeta {
    pub session_id: i64,
    pub class_id: i64,
    pub class_name: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkSuccess {
    pub record: AttendanceRecord,
    pub distance: f64,
    pub session: SessionMeta,
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[derive(Clone)]
pub struct AttendanceRecordService {
    db: DatabaseConnection,
    events: SecurityEventLog,
    detector: SuspiciousActivityDetector,
    spoof_multiplier: f64,
}

impl AttendanceRecordService {
    pub fn new(
        db: DatabaseConnection,
        events: SecurityEventLog,
        detector: SuspiciousActivityDetector,
        spoof_multiplier: f64,
    ) -> Self {
        Self {
            db,
            events,
            detector,
            spoof_multiplier,
        }
    }

    /// Marks `req.attendee_id` present for the session behind `req.session_token`.
    ///
    /// Every outcome, success or not, is written to the security event log
    /// and fed to the activity detector before this returns.
    pub async fn mark(&self, req: MarkRequest) -> Result<MarkSuccess, AttendanceError> {
        let actor = req.attendee_id.to_string();
        let client = req.client_id.as_deref();

        let attempt = self
            .detector
            .record(
                &actor,
                ActivityType::AttendanceAttempt,
                ActivityMetadata {
                    client_id: req.client_id.clone(),
                    location: None,
                },
                req.now,
            )
            .await;
        self.flag_patterns(&actor, &attempt, client, req.now).await;

        let (outcome, proximity) = self.try_mark(&req).await;

        match &outcome {
            Ok(success) => self.report_success(&req, success).await,
            Err(err) => self.report_failure(&req, err, proximity).await,
        }
        outcome
    }

    async fn try_mark(
        &self,
        req: &MarkRequest,
    ) -> (Result<MarkSuccess, AttendanceError>, Option<ProximityCheck>) {
        if let Err(e) = req.location.validate() {
            return (Err(e), None);
        }

        let eligible = match eligibility::check(&self.db, &req.session_token, req.attendee_id, req.now).await {
            Ok(Eligibility::Eligible(e)) => e,
            Ok(Eligibility::Ineligible(reason)) => return (Err(reason.into()), None),
            Err(e) => return (Err(e.into()), None),
        };

        let check = match proximity::verify(req.location, eligible.class_location(), req.tolerance_meters) {
            Ok(c) => c,
            Err(e) => return (Err(e), None),
        };
        if !check.accepted {
            return (
                Err(AttendanceError::TooFar {
                    distance: check.distance,
                    tolerance: check.tolerance,
                }),
                Some(check),
            );
        }

        (self.insert(req, eligible, check.distance).await, Some(check))
    }

    async fn insert(
        &self,
        req: &MarkRequest,
        eligible: EligibleSession,
        distance: f64,
    ) -> Result<MarkSuccess, AttendanceError> {
        let record = AttendanceRecord::insert_new(
            &self.db,
            NewRecord {
                session_id: eligible.session.id,
                attendee_id: req.attendee_id,
                latitude: req.location.lat,
                longitude: req.location.lng,
                distance_meters: distance,
                client_ip: req.client_id.clone(),
                marked_at: req.now,
            },
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AttendanceError::AlreadyMarked
            } else {
                AttendanceError::Database(e)
            }
        })?;

        Ok(MarkSuccess {
            record,
            distance,
            session: SessionMeta {
                session_id: eligible.session.id,
                class_id: eligible.class.id,
                class_name: eligible.class.name,
                expires_at: eligible.session.expires_at,
            },
        })
    }

    async fn report_success(&self, req: &MarkRequest, success: &MarkSuccess) {
        info!(
            attendee_id = req.attendee_id,
            session_id = success.session.session_id,
            distance = success.distance,
            "Attendance marked"
        );

        self.events
            .log(
                NewSecurityEvent::new(SecurityEventType::AttendanceMarked, Severity::Low)
                    .actor(req.attendee_id)
                    .client(req.client_id.as_deref())
                    .details(json!({
                        "session_id": success.session.session_id,
                        "class_id": success.session.class_id,
                        "record_id": success.record.id,
                        "distance": success.distance,
                    })),
                req.now,
            )
            .await;

        let actor = req.attendee_id.to_string();
        let patterns = self
            .detector
            .record(
                &actor,
                ActivityType::AttendanceSuccess,
                ActivityMetadata {
                    client_id: req.client_id.clone(),
                    location: Some(req.location),
                },
                req.now,
            )
            .await;
        self.flag_patterns(&actor, &patterns, req.client_id.as_deref(), req.now)
            .await;
    }

    async fn report_failure(
        &self,
        req: &MarkRequest,
        err: &AttendanceError,
        proximity: Option<ProximityCheck>,
    ) {
        let mut details = json!({
            "reason": err.kind(),
            "session_token": req.session_token,
        });
        if let Some(check) = proximity {
            details["distance"] = json!(check.distance);
            details["tolerance"] = json!(check.tolerance);
        }

        let (event_type, severity) = match err {
            AttendanceError::Database(e) => {
                error!(error = %e, attendee_id = req.attendee_id, "Attendance marking failed");
                (SecurityEventType::SystemError, Severity::High)
            }
            AttendanceError::TooFar { .. } | AttendanceError::NotEnrolled { .. } => {
                (SecurityEventType::AttendanceRejected, Severity::Medium)
            }
            _ => (SecurityEventType::AttendanceRejected, Severity::Low),
        };

        self.events
            .log(
                NewSecurityEvent::new(event_type, severity)
                    .actor(req.attendee_id)
                    .client(req.client_id.as_deref())
                    .details(details),
                req.now,
            )
            .await;

        let Some(check) = proximity.filter(|c| c.is_implausible(self.spoof_multiplier)) else {
            return;
        };

        self.events
            .log(
                NewSecurityEvent::new(SecurityEventType::PossibleLocationSpoofing, Severity::High)
                    .actor(req.attendee_id)
                    .client(req.client_id.as_deref())
                    .details(json!({
                        "distance": check.distance,
                        "tolerance": check.tolerance,
                        "claimed": { "lat": req.location.lat, "lng": req.location.lng },
                    })),
                req.now,
            )
            .await;

        let actor = req.attendee_id.to_string();
        let patterns = self
            .detector
            .record(
                &actor,
                ActivityType::ImplausibleLocation,
                ActivityMetadata {
                    client_id: req.client_id.clone(),
                    location: Some(req.location),
                },
                req.now,
            )
            .await;
        self.flag_patterns(&actor, &patterns, req.client_id.as_deref(), req.now)
            .await;
    }

    async fn flag_patterns(
        &self,
        actor: &str,
        patterns: &std::collections::BTreeSet<crate::activity::SuspiciousPattern>,
        client_id: Option<&str>,
        now: DateTime<Utc>,
    ) {
        if let Some(event) = suspicious_activity_event(actor, patterns, client_id) {
            self.events.log(event, now).await;
        }
    }
}
