//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock, RwLockReadGuard};

/// Secret used when `JWT_SECRET` is not provided. Refused in production.
pub const DEV_JWT_SECRET: &str = "insecure-dev-secret";

/// A `(window, ceiling)` pair for one endpoint class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSetting {
    pub window_ms: u64,
    pub max_requests: u32,
}

impl RateLimitSetting {
    pub const fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
        }
    }
}

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_duration_minutes: u64,

    // Attendance sessions
    pub session_min_minutes: i64,
    pub session_max_minutes: i64,
    pub session_retention_hours: i64,

    // Proximity
    pub proximity_tolerance_meters: f64,
    pub spoof_distance_multiplier: f64,

    // Rate limits per endpoint class
    pub rate_limit_attendance: RateLimitSetting,
    pub rate_limit_auth: RateLimitSetting,
    pub rate_limit_registration: RateLimitSetting,
    pub rate_limit_general: RateLimitSetting,
    pub rate_limit_token: RateLimitSetting,

    // Suspicious activity heuristics
    pub activity_window_minutes: i64,
    pub activity_history_cap: usize,
    pub threshold_failed_logins: usize,
    pub threshold_attendance_attempts: usize,
    pub threshold_rapid_location_markings: usize,
    pub threshold_rapid_location_km: f64,
    pub threshold_distinct_clients: usize,

    // Security event log
    pub log_retention_days: i64,
    pub alert_min_severity: String,

    pub maintenance_interval_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            env: "development".into(),
            project_name: "geo-attend".into(),
            log_level: "api=info".into(),
            log_file: "api.log".into(),
            log_to_stdout: false,
            database_path: "data/attendance.db".into(),
            host: "127.0.0.1".into(),
            port: 3000,
            jwt_secret: DEV_JWT_SECRET.into(),
            jwt_duration_minutes: 60,
            session_min_minutes: 5,
            session_max_minutes: 180,
            session_retention_hours: 24 * 7,
            proximity_tolerance_meters: 50.0,
            spoof_distance_multiplier: 10.0,
            rate_limit_attendance: RateLimitSetting::new(60_000, 10),
            rate_limit_auth: RateLimitSetting::new(15 * 60_000, 20),
            rate_limit_registration: RateLimitSetting::new(60 * 60_000, 5),
            rate_limit_general: RateLimitSetting::new(60_000, 300),
            rate_limit_token: RateLimitSetting::new(60_000, 30),
            activity_window_minutes: 60,
            activity_history_cap: 100,
            threshold_failed_logins: 5,
            threshold_attendance_attempts: 20,
            threshold_rapid_location_markings: 3,
            threshold_rapid_location_km: 10.0,
            threshold_distinct_clients: 3,
            log_retention_days: 90,
            alert_min_severity: "high".into(),
            maintenance_interval_seconds: 300,
        }
    }
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

/// Reads `key` and parses it, falling back to `default` when unset or unparsable.
fn var_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Unparsable configuration value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn rate_limit_var(prefix: &str, default: RateLimitSetting) -> RateLimitSetting {
    RateLimitSetting {
        window_ms: var_or(&format!("RATE_LIMIT_{prefix}_WINDOW_MS"), default.window_ms),
        max_requests: var_or(&format!("RATE_LIMIT_{prefix}_MAX"), default.max_requests),
    }
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Every option has a default, so a missing variable never aborts startup here.
    /// `api` refuses to boot in production with the development JWT secret.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let d = AppConfig::default();

        Self {
            env: var_or("APP_ENV", d.env),
            project_name: var_or("PROJECT_NAME", d.project_name),
            log_level: var_or("LOG_LEVEL", d.log_level),
            log_file: var_or("LOG_FILE", d.log_file),
            log_to_stdout: var_or("LOG_TO_STDOUT", d.log_to_stdout),
            database_path: var_or("DATABASE_PATH", d.database_path),
            host: var_or("HOST", d.host),
            port: var_or("PORT", d.port),
            jwt_secret: var_or("JWT_SECRET", d.jwt_secret),
            jwt_duration_minutes: var_or("JWT_DURATION_MINUTES", d.jwt_duration_minutes),
            session_min_minutes: var_or("SESSION_MIN_MINUTES", d.session_min_minutes),
            session_max_minutes: var_or("SESSION_MAX_MINUTES", d.session_max_minutes),
            session_retention_hours: var_or("SESSION_RETENTION_HOURS", d.session_retention_hours),
            proximity_tolerance_meters: var_or(
                "PROXIMITY_TOLERANCE_METERS",
                d.proximity_tolerance_meters,
            ),
            spoof_distance_multiplier: var_or(
                "SPOOF_DISTANCE_MULTIPLIER",
                d.spoof_distance_multiplier,
            ),
            rate_limit_attendance: rate_limit_var("ATTENDANCE", d.rate_limit_attendance),
            rate_limit_auth: rate_limit_var("AUTH", d.rate_limit_auth),
            rate_limit_registration: rate_limit_var("REGISTRATION", d.rate_limit_registration),
            rate_limit_general: rate_limit_var("GENERAL", d.rate_limit_general),
            rate_limit_token: rate_limit_var("TOKEN", d.rate_limit_token),
            activity_window_minutes: var_or("ACTIVITY_WINDOW_MINUTES", d.activity_window_minutes),
            activity_history_cap: var_or("ACTIVITY_HISTORY_CAP", d.activity_history_cap),
            threshold_failed_logins: var_or("THRESHOLD_FAILED_LOGINS", d.threshold_failed_logins),
            threshold_attendance_attempts: var_or(
                "THRESHOLD_ATTENDANCE_ATTEMPTS",
                d.threshold_attendance_attempts,
            ),
            threshold_rapid_location_markings: var_or(
                "THRESHOLD_RAPID_LOCATION_MARKINGS",
                d.threshold_rapid_location_markings,
            ),
            threshold_rapid_location_km: var_or(
                "THRESHOLD_RAPID_LOCATION_KM",
                d.threshold_rapid_location_km,
            ),
            threshold_distinct_clients: var_or(
                "THRESHOLD_DISTINCT_CLIENTS",
                d.threshold_distinct_clients,
            ),
            log_retention_days: var_or("LOG_RETENTION_DAYS", d.log_retention_days),
            alert_min_severity: var_or("ALERT_MIN_SEVERITY", d.alert_min_severity),
            maintenance_interval_seconds: var_or(
                "MAINTENANCE_INTERVAL_SECONDS",
                d.maintenance_interval_seconds,
            ),
        }
    }

    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// A poisoned lock is recovered rather than propagated; the config holds plain data.
    pub fn global() -> RwLockReadGuard<'static, AppConfig> {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        AppConfig::set_field(|cfg| *cfg = AppConfig::from_env());
    }

    /// Generic internal setter for any field in the config.
    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_jwt_secret(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.jwt_secret = value.into());
    }

    pub fn set_proximity_tolerance_meters(value: f64) {
        AppConfig::set_field(|cfg| cfg.proximity_tolerance_meters = value);
    }

    pub fn set_rate_limit_attendance(value: RateLimitSetting) {
        AppConfig::set_field(|cfg| cfg.rate_limit_attendance = value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn unparsable_values_fall_back_to_defaults() {
        unsafe {
            env::set_var("SESSION_MAX_MINUTES", "not-a-number");
            env::set_var("PROXIMITY_TOLERANCE_METERS", "75.5");
        }
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.session_max_minutes, 180);
        assert_eq!(cfg.proximity_tolerance_meters, 75.5);
        unsafe {
            env::remove_var("SESSION_MAX_MINUTES");
            env::remove_var("PROXIMITY_TOLERANCE_METERS");
        }
    }

    #[test]
    #[serial]
    fn rate_limit_pairs_read_both_halves() {
        unsafe {
            env::set_var("RATE_LIMIT_ATTENDANCE_WINDOW_MS", "1000");
            env::set_var("RATE_LIMIT_ATTENDANCE_MAX", "3");
        }
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.rate_limit_attendance, RateLimitSetting::new(1000, 3));
        unsafe {
            env::remove_var("RATE_LIMIT_ATTENDANCE_WINDOW_MS");
            env::remove_var("RATE_LIMIT_ATTENDANCE_MAX");
        }
    }

    #[test]
    #[serial]
    fn setters_override_global_values() {
        AppConfig::set_proximity_tolerance_meters(12.0);
        assert_eq!(AppConfig::global().proximity_tolerance_meters, 12.0);
        AppConfig::reset();
    }
}
