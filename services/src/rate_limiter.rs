//! Fixed-window request counters keyed by client identity and endpoint class.
//!
//! Counter state lives behind [`RateLimitStore`] so a shared external store
//! can replace the in-process map without touching callers.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use util::config::{AppConfig, RateLimitSetting};

/// Counter state of one key after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub count: u64,
    pub window_start: DateTime<Utc>,
}

#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Increments the counter for `key`, first starting a fresh window when
    /// none exists or the current one has elapsed. Must be atomic per key.
    async fn hit(&self, key: &str, window: Duration, now: DateTime<Utc>) -> WindowState;

    /// Drops windows that started more than `max_window` ago. Returns how many were dropped.
    async fn prune(&self, max_window: Duration, now: DateTime<Utc>) -> usize;
}

/// Single-instance store: one mutex-guarded map.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    windows: Mutex<HashMap<String, WindowState>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(&self, key: &str, window: Duration, now: DateTime<Utc>) -> WindowState {
        let mut windows = self.windows.lock().await;
        let entry = windows.entry(key.to_owned()).or_insert(WindowState {
            count: 0,
            window_start: now,
        });

        if now - entry.window_start >= window {
            *entry = WindowState {
                count: 0,
                window_start: now,
            };
        }
        entry.count += 1;
        *entry
    }

    async fn prune(&self, max_window: Duration, now: DateTime<Utc>) -> usize {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| now - w.window_start < max_window);
        before - windows.len()
    }
}

/// Endpoint classes with independently configured limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Attendance,
    Authentication,
    Registration,
    General,
    TokenIssuance,
}

impl EndpointClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attendance => "attendance",
            Self::Authentication => "auth",
            Self::Registration => "registration",
            Self::General => "general",
            Self::TokenIssuance => "token",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub attendance: RateLimitSetting,
    pub authentication: RateLimitSetting,
    pub registration: RateLimitSetting,
    pub general: RateLimitSetting,
    pub token_issuance: RateLimitSetting,
}

impl RateLimitPolicy {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            attendance: cfg.rate_limit_attendance,
            authentication: cfg.rate_limit_auth,
            registration: cfg.rate_limit_registration,
            general: cfg.rate_limit_general,
            token_issuance: cfg.rate_limit_token,
        }
    }

    pub fn for_endpoint(&self, endpoint: EndpointClass) -> RateLimitSetting {
        match endpoint {
            EndpointClass::Attendance => self.attendance,
            EndpointClass::Authentication => self.authentication,
            EndpointClass::Registration => self.registration,
            EndpointClass::General => self.general,
            EndpointClass::TokenIssuance => self.token_issuance,
        }
    }

    fn longest_window(&self) -> Duration {
        [
            self.attendance,
            self.authentication,
            self.registration,
            self.general,
            self.token_issuance,
        ]
        .iter()
        .map(|s| window_of(*s))
        .max()
        .unwrap_or_else(Duration::zero)
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

fn window_of(setting: RateLimitSetting) -> Duration {
    Duration::milliseconds(i64::try_from(setting.window_ms).unwrap_or(i64::MAX))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateLimitDecision {
    pub limited: bool,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, at least 1 when limited.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let ms = (self.reset_at - now).num_milliseconds().max(0) as u64;
        ms.div_ceil(1000).max(1)
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, policy: RateLimitPolicy) -> Self {
        Self { store, policy }
    }

    pub fn in_memory(policy: RateLimitPolicy) -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()), policy)
    }

    /// Counts one request for `key` and decides whether it is over the ceiling.
    pub async fn check(
        &self,
        key: &str,
        window: Duration,
        max_requests: u64,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let state = self.store.hit(key, window, now).await;
        RateLimitDecision {
            limited: state.count > max_requests,
            remaining: max_requests.saturating_sub(state.count),
            reset_at: state.window_start + window,
        }
    }

    /// [`check`](Self::check) using the configured limit for `endpoint`.
    pub async fn check_endpoint(
        &self,
        client: &str,
        endpoint: EndpointClass,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let setting = self.policy.for_endpoint(endpoint);
        let key = format!("{}:{}", endpoint.as_str(), client);
        let decision = self
            .check(&key, window_of(setting), u64::from(setting.max_requests), now)
            .await;

        if decision.limited {
            tracing::warn!(
                client,
                endpoint = endpoint.as_str(),
                limit = setting.max_requests,
                "Rate limit exceeded"
            );
        }
        decision
    }

    pub async fn prune(&self, now: DateTime<Utc>) -> usize {
        self.store.prune(self.policy.longest_window(), now).await
    }
}
