//! Periodic housekeeping run alongside live traffic. Every step is idempotent.

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use tracing::{info, warn};

use crate::activity::SuspiciousActivityDetector;
use crate::attendance_session::{AttendanceSessionService, SessionPolicy};
use crate::rate_limiter::RateLimiter;
use crate::security_log::SecurityEventLog;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions_expired: u64,
    pub sessions_purged: u64,
    pub events_purged: u64,
    pub rate_windows_pruned: usize,
    pub activity_entries_pruned: usize,
}

pub struct Maintenance {
    pub db: DatabaseConnection,
    pub sessions: SessionPolicy,
    pub events: SecurityEventLog,
    pub log_retention_days: i64,
    pub rate_limiter: RateLimiter,
    pub detector: SuspiciousActivityDetector,
}

impl Maintenance {
    /// Runs one sweep. A failing step is logged and the remaining steps still run.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        match AttendanceSessionService::cleanup_expired(&self.db, now).await {
            Ok(n) => report.sessions_expired = n,
            Err(e) => warn!(error = %e, "Expired session sweep failed"),
        }
        match AttendanceSessionService::purge_stale(&self.db, &self.sessions, now).await {
            Ok(n) => report.sessions_purged = n,
            Err(e) => warn!(error = %e, "Stale session purge failed"),
        }
        match self.events.purge_older_than(self.log_retention_days, now).await {
            Ok(n) => report.events_purged = n,
            Err(e) => warn!(error = %e, "Security event purge failed"),
        }
        report.rate_windows_pruned = self.rate_limiter.prune(now).await;
        report.activity_entries_pruned = self.detector.prune(now).await;

        if report != SweepReport::default() {
            info!(?report, "Maintenance sweep finished");
        }
        report
    }
}
