//! Rolling per-actor activity history and the abuse heuristics evaluated over it.
//!
//! Detection is best-effort. A triggered pattern only feeds logging and
//! escalation; it never blocks a request on its own.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use util::config::AppConfig;

use crate::geo::{self, Coordinates};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    FailedLogin,
    Login,
    AttendanceAttempt,
    AttendanceSuccess,
    ImplausibleLocation,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailedLogin => "failed_login",
            Self::Login => "login",
            Self::AttendanceAttempt => "attendance_attempt",
            Self::AttendanceSuccess => "attendance_success",
            Self::ImplausibleLocation => "implausible_location",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityMetadata {
    pub client_id: Option<String>,
    pub location: Option<Coordinates>,
}

impl ActivityMetadata {
    pub fn client(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            location: None,
        }
    }

    pub fn with_location(mut self, location: Coordinates) -> Self {
        self.location = Some(location);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    pub metadata: ActivityMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspiciousPattern {
    ExcessiveFailedLogins,
    ExcessiveAttendanceAttempts,
    RapidLocationChange,
    MultipleSimultaneousSessions,
    PossibleLocationSpoofing,
}

impl SuspiciousPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExcessiveFailedLogins => "excessive_failed_logins",
            Self::ExcessiveAttendanceAttempts => "excessive_attendance_attempts",
            Self::RapidLocationChange => "rapid_location_change",
            Self::MultipleSimultaneousSessions => "multiple_simultaneous_sessions",
            Self::PossibleLocationSpoofing => "possible_location_spoofing",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DetectorThresholds {
    pub window: Duration,
    pub history_cap: usize,
    pub failed_logins: usize,
    pub attendance_attempts: usize,
    pub rapid_location_markings: usize,
    pub rapid_location_meters: f64,
    pub distinct_clients: usize,
}

impl DetectorThresholds {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            window: Duration::minutes(cfg.activity_window_minutes),
            history_cap: cfg.activity_history_cap.max(1),
            failed_logins: cfg.threshold_failed_logins,
            attendance_attempts: cfg.threshold_attendance_attempts,
            rapid_location_markings: cfg.threshold_rapid_location_markings,
            rapid_location_meters: cfg.threshold_rapid_location_km * 1000.0,
            distinct_clients: cfg.threshold_distinct_clients,
        }
    }
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Appends `entry` under `(actor, kind)`, evicting the oldest entries past
    /// `cap`, and returns the entries at or after `since`, oldest first.
    async fn append(
        &self,
        actor: &str,
        kind: ActivityType,
        entry: ActivityEntry,
        cap: usize,
        since: DateTime<Utc>,
    ) -> Vec<ActivityEntry>;

    /// Drops entries older than `cutoff` and forgets empty histories.
    async fn prune(&self, cutoff: DateTime<Utc>) -> usize;
}

#[derive(Default)]
pub struct InMemoryActivityStore {
    histories: Mutex<HashMap<(String, ActivityType), VecDeque<ActivityEntry>>>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityStore for InMemoryActivityStore {
    async fn append(
        &self,
        actor: &str,
        kind: ActivityType,
        entry: ActivityEntry,
        cap: usize,
        since: DateTime<Utc>,
    ) -> Vec<ActivityEntry> {
        let mut histories = self.histories.lock().await;
        let history = histories.entry((actor.to_owned(), kind)).or_default();

        history.push_back(entry);
        while history.len() > cap {
            history.pop_front();
        }

        history.iter().filter(|e| e.at >= since).cloned().collect()
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> usize {
        let mut histories = self.histories.lock().await;
        let mut dropped = 0;
        for history in histories.values_mut() {
            let before = history.len();
            history.retain(|e| e.at >= cutoff);
            dropped += before - history.len();
        }
        histories.retain(|_, h| !h.is_empty());
        dropped
    }
}

#[derive(Clone)]
pub struct SuspiciousActivityDetector {
    store: Arc<dyn ActivityStore>,
    thresholds: DetectorThresholds,
}

impl SuspiciousActivityDetector {
    pub fn new(store: Arc<dyn ActivityStore>, thresholds: DetectorThresholds) -> Self {
        Self { store, thresholds }
    }

    pub fn in_memory(thresholds: DetectorThresholds) -> Self {
        Self::new(Arc::new(InMemoryActivityStore::new()), thresholds)
    }

    /// Records one action and returns every pattern it triggers, possibly none.
    pub async fn record(
        &self,
        actor: &str,
        kind: ActivityType,
        metadata: ActivityMetadata,
        now: DateTime<Utc>,
    ) -> BTreeSet<SuspiciousPattern> {
        let t = &self.thresholds;
        let recent = self
            .store
            .append(
                actor,
                kind,
                ActivityEntry { at: now, metadata },
                t.history_cap,
                now - t.window,
            )
            .await;

        let mut patterns = BTreeSet::new();
        match kind {
            ActivityType::FailedLogin if recent.len() >= t.failed_logins => {
                patterns.insert(SuspiciousPattern::ExcessiveFailedLogins);
            }
            ActivityType::AttendanceAttempt if recent.len() >= t.attendance_attempts => {
                patterns.insert(SuspiciousPattern::ExcessiveAttendanceAttempts);
            }
            ActivityType::AttendanceSuccess if rapid_location_change(&recent, t) => {
                patterns.insert(SuspiciousPattern::RapidLocationChange);
            }
            ActivityType::Login if distinct_clients(&recent) >= t.distinct_clients => {
                patterns.insert(SuspiciousPattern::MultipleSimultaneousSessions);
            }
            ActivityType::ImplausibleLocation => {
                patterns.insert(SuspiciousPattern::PossibleLocationSpoofing);
            }
            _ => {}
        }

        if !patterns.is_empty() {
            tracing::warn!(
                actor,
                activity = kind.as_str(),
                patterns = ?patterns.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
                "Suspicious activity detected"
            );
        }
        patterns
    }

    pub async fn prune(&self, now: DateTime<Utc>) -> usize {
        self.store.prune(now - self.thresholds.window).await
    }
}

fn distinct_clients(entries: &[ActivityEntry]) -> usize {
    entries
        .iter()
        .filter_map(|e| e.metadata.client_id.as_deref())
        .collect::<HashSet<_>>()
        .len()
}

fn rapid_location_change(entries: &[ActivityEntry], t: &DetectorThresholds) -> bool {
    let locations: Vec<Coordinates> = entries.iter().filter_map(|e| e.metadata.location).collect();
    if locations.len() < t.rapid_location_markings {
        return false;
    }

    locations
        .windows(2)
        .filter_map(|pair| geo::distance(pair[0], pair[1]).ok())
        .any(|d| d > t.rapid_location_meters)
}
