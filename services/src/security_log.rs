//! Append-only security event log with escalation and read-side aggregation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Timelike, Utc};
use db::models::security_event::{Model as SecurityEvent, Severity};
use sea_orm::{DatabaseConnection, DbErr};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use util::config::AppConfig;

use crate::activity::SuspiciousPattern;

const TOP_CLIENTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityEventType {
    SessionCreated,
    SessionExtended,
    SessionEnded,
    AttendanceMarked,
    AttendanceRejected,
    PossibleLocationSpoofing,
    SuspiciousActivity,
    RateLimitExceeded,
    AuthenticationFailed,
    SystemError,
}

impl SecurityEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionCreated => "session_created",
            Self::SessionExtended => "session_extended",
            Self::SessionEnded => "session_ended",
            Self::AttendanceMarked => "attendance_marked",
            Self::AttendanceRejected => "attendance_rejected",
            Self::PossibleLocationSpoofing => "possible_location_spoofing",
            Self::SuspiciousActivity => "suspicious_activity",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::AuthenticationFailed => "authentication_failed",
            Self::SystemError => "system_error",
        }
    }
}

/// An event before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSecurityEvent {
    pub event_type: SecurityEventType,
    pub severity: Severity,
    pub details: Value,
    pub actor_id: Option<i64>,
    pub client_id: Option<String>,
}

impl NewSecurityEvent {
    pub fn new(event_type: SecurityEventType, severity: Severity) -> Self {
        Self {
            event_type,
            severity,
            details: json!({}),
            actor_id: None,
            client_id: None,
        }
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn actor(mut self, actor_id: i64) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn client(mut self, client_id: Option<&str>) -> Self {
        self.client_id = client_id.map(str::to_owned);
        self
    }
}

fn pattern_severity(pattern: SuspiciousPattern) -> Severity {
    match pattern {
        SuspiciousPattern::ExcessiveAttendanceAttempts
        | SuspiciousPattern::MultipleSimultaneousSessions => Severity::Medium,
        SuspiciousPattern::ExcessiveFailedLogins
        | SuspiciousPattern::RapidLocationChange
        | SuspiciousPattern::PossibleLocationSpoofing => Severity::High,
    }
}

/// Builds a `suspicious_activity` event for triggered patterns, if any.
///
/// Severity is the highest among the patterns, raised to critical when more
/// than one fires at once.
pub fn suspicious_activity_event(
    actor: &str,
    patterns: &BTreeSet<SuspiciousPattern>,
    client_id: Option<&str>,
) -> Option<NewSecurityEvent> {
    let worst = patterns.iter().copied().map(pattern_severity).max()?;
    let severity = if patterns.len() > 1 { Severity::Critical } else { worst };

    let mut event = NewSecurityEvent::new(SecurityEventType::SuspiciousActivity, severity)
        .details(json!({
            "actor": actor,
            "patterns": patterns.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
        }))
        .client(client_id);
    if let Ok(id) = actor.parse::<i64>() {
        event = event.actor(id);
    }
    Some(event)
}

/// Receives events at or above the escalation threshold.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn alert(&self, event: &NewSecurityEvent, at: DateTime<Utc>);
}

/// Emits alerts as `error!` events on the `security_alert` target.
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn alert(&self, event: &NewSecurityEvent, at: DateTime<Utc>) {
        tracing::error!(
            target: "security_alert",
            event_type = event.event_type.as_str(),
            severity = %event.severity,
            actor_id = ?event.actor_id,
            client_id = ?event.client_id,
            details = %event.details,
            at = %at.to_rfc3339(),
            "Security alert"
        );
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EscalationPolicy {
    pub min_severity: Severity,
}

impl EscalationPolicy {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let min_severity = Severity::from_str(&cfg.alert_min_severity).unwrap_or_else(|_| {
            tracing::warn!(
                value = %cfg.alert_min_severity,
                "Unknown ALERT_MIN_SEVERITY, escalating high and above"
            );
            Severity::High
        });
        Self { min_severity }
    }

    pub fn escalates(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            min_severity: Severity::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientCount {
    pub client_id: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityStatistics {
    pub lookback_hours: i64,
    pub total: u64,
    pub by_severity: BTreeMap<String, u64>,
    pub by_type: BTreeMap<String, u64>,
    /// Index is the UTC hour of day.
    pub by_hour: Vec<u64>,
    pub top_clients: Vec<ClientCount>,
    /// Actors with at least one high or critical event.
    pub flagged_actors: Vec<i64>,
}

impl SecurityStatistics {
    fn from_events(events: &[SecurityEvent], lookback: Duration) -> Self {
        let mut by_severity = BTreeMap::new();
        let mut by_type = BTreeMap::new();
        let mut by_hour = vec![0u64; 24];
        let mut clients: HashMap<&str, u64> = HashMap::new();
        let mut flagged = BTreeSet::new();

        for e in events {
            *by_severity.entry(e.severity.to_string()).or_insert(0) += 1;
            *by_type.entry(e.event_type.clone()).or_insert(0) += 1;
            by_hour[e.created_at.hour() as usize] += 1;
            if let Some(client) = e.client_id.as_deref() {
                *clients.entry(client).or_insert(0) += 1;
            }
            if e.severity >= Severity::High {
                if let Some(actor) = e.actor_id {
                    flagged.insert(actor);
                }
            }
        }

        let mut top_clients: Vec<ClientCount> = clients
            .into_iter()
            .map(|(client_id, count)| ClientCount {
                client_id: client_id.to_owned(),
                count,
            })
            .collect();
        top_clients.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.client_id.cmp(&b.client_id)));
        top_clients.truncate(TOP_CLIENTS);

        Self {
            lookback_hours: lookback.num_hours(),
            total: events.len() as u64,
            by_severity,
            by_type,
            by_hour,
            top_clients,
            flagged_actors: flagged.into_iter().collect(),
        }
    }
}

#[derive(Clone)]
pub struct SecurityEventLog {
    db: DatabaseConnection,
    alerts: Arc<dyn AlertSink>,
    escalation: EscalationPolicy,
}

impl SecurityEventLog {
    pub fn new(db: DatabaseConnection, alerts: Arc<dyn AlertSink>, escalation: EscalationPolicy) -> Self {
        Self {
            db,
            alerts,
            escalation,
        }
    }

    /// Persists the event and escalates it when severe enough.
    ///
    /// Storage failures are reported through tracing and yield `None`; they are
    /// never surfaced to the operation being logged.
    pub async fn log(&self, event: NewSecurityEvent, now: DateTime<Utc>) -> Option<SecurityEvent> {
        let stored = SecurityEvent::append(
            &self.db,
            event.event_type.as_str(),
            event.severity,
            &event.details,
            event.actor_id,
            event.client_id.as_deref(),
            now,
        )
        .await;

        if self.escalation.escalates(event.severity) {
            self.alerts.alert(&event, now).await;
        }

        match stored {
            Ok(model) => {
                tracing::debug!(
                    id = %model.id,
                    event_type = %model.event_type,
                    severity = %model.severity,
                    "Security event recorded"
                );
                Some(model)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    event_type = event.event_type.as_str(),
                    "Failed to persist security event"
                );
                None
            }
        }
    }

    pub async fn statistics(&self, lookback: Duration, now: DateTime<Utc>) -> Result<SecurityStatistics, DbErr> {
        let events = SecurityEvent::since(&self.db, now - lookback).await?;
        Ok(SecurityStatistics::from_events(&events, lookback))
    }

    pub async fn purge_older_than(&self, retention_days: i64, now: DateTime<Utc>) -> Result<u64, DbErr> {
        let removed = SecurityEvent::delete_before(&self.db, now - Duration::days(retention_days)).await?;
        if removed > 0 {
            tracing::info!(removed, retention_days, "Purged old security events");
        }
        Ok(removed)
    }
}
