//! Application state shared across Axum route handlers and middleware.
//!
//! Every policy is resolved from `AppConfig` once at construction, so handlers
//! never read configuration directly.

use jsonwebtoken::{DecodingKey, EncodingKey};
use sea_orm::DatabaseConnection;
use services::activity::{DetectorThresholds, SuspiciousActivityDetector};
use services::attendance_record::AttendanceRecordService;
use services::attendance_session::SessionPolicy;
use services::maintenance::Maintenance;
use services::rate_limiter::{RateLimitPolicy, RateLimiter};
use services::security_log::{AlertSink, EscalationPolicy, SecurityEventLog, TracingAlertSink};
use std::sync::Arc;
use util::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    jwt_encoding_key: EncodingKey,
    jwt_decoding_key: DecodingKey,
    jwt_duration_minutes: i64,
    session_policy: SessionPolicy,
    proximity_tolerance_meters: f64,
    log_retention_days: i64,
    rate_limiter: RateLimiter,
    detector: SuspiciousActivityDetector,
    events: SecurityEventLog,
    attendance: AttendanceRecordService,
}

impl AppState {
    /// Builds the state from `cfg` with in-memory limiter and detector stores
    /// and alerts going to tracing.
    pub fn new(db: DatabaseConnection, cfg: &AppConfig) -> Self {
        Self::with_alert_sink(db, cfg, Arc::new(TracingAlertSink))
    }

    pub fn with_alert_sink(db: DatabaseConnection, cfg: &AppConfig, alerts: Arc<dyn AlertSink>) -> Self {
        let rate_limiter = RateLimiter::in_memory(RateLimitPolicy::from_config(cfg));
        let detector = SuspiciousActivityDetector::in_memory(DetectorThresholds::from_config(cfg));
        let events = SecurityEventLog::new(db.clone(), alerts, EscalationPolicy::from_config(cfg));
        let attendance = AttendanceRecordService::new(
            db.clone(),
            events.clone(),
            detector.clone(),
            cfg.spoof_distance_multiplier,
        );

        Self {
            db,
            jwt_encoding_key: EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
            jwt_decoding_key: DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
            jwt_duration_minutes: cfg.jwt_duration_minutes as i64,
            session_policy: SessionPolicy::from_config(cfg),
            proximity_tolerance_meters: cfg.proximity_tolerance_meters,
            log_retention_days: cfg.log_retention_days,
            rate_limiter,
            detector,
            events,
            attendance,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.jwt_encoding_key
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.jwt_decoding_key
    }

    pub fn jwt_duration_minutes(&self) -> i64 {
        self.jwt_duration_minutes
    }

    pub fn session_policy(&self) -> &SessionPolicy {
        &self.session_policy
    }

    pub fn proximity_tolerance_meters(&self) -> f64 {
        self.proximity_tolerance_meters
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn detector(&self) -> &SuspiciousActivityDetector {
        &self.detector
    }

    pub fn events(&self) -> &SecurityEventLog {
        &self.events
    }

    pub fn attendance(&self) -> &AttendanceRecordService {
        &self.attendance
    }

    /// Housekeeping bound to the same stores the handlers use.
    pub fn maintenance(&self) -> Maintenance {
        Maintenance {
            db: self.db.clone(),
            sessions: self.session_policy,
            events: self.events.clone(),
            log_retention_days: self.log_retention_days,
            rate_limiter: self.rate_limiter.clone(),
            detector: self.detector.clone(),
        }
    }
}
