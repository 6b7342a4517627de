// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::time::Duration;

/// Engine configuration.
///
/// Every knob of the reservation lifecycle engine, loadable from
/// environment variables with production defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL.
    pub database_url: String,
    /// Time a pending reservation must age before admission debits stock.
    pub hold_interval: Duration,
    /// How often the periodic admission sweep runs.
    pub admission_poll_interval: Duration,
    /// Age cutoff after which approved reservations are auto-rejected.
    pub pickup_timeout: Duration,
    /// How often the pickup reaper runs.
    pub reaper_poll_interval: Duration,
    /// Units at or below this threshold trigger a low-stock notification.
    pub low_stock_threshold: i32,
    /// Units at or below this threshold are classified critical in the digest.
    pub critical_stock_threshold: i32,
    /// Minimum gap between low-stock emails for the same incubatee/product pair.
    pub cooldown: Duration,
    /// Notification scan cadence in minutes.
    pub outer_interval_minutes: u32,
    /// Within-interval minute offsets at which dispatch fires.
    pub sub_slot_offsets: (u32, u32),
    /// Max sends per sub-slot when demo mode is on.
    pub demo_per_batch_cap: usize,
    /// Demo mode: bounded dispatch for presentation use.
    pub demo_mode: bool,
    /// Global enable for automatic notifications.
    pub auto_notifications: bool,
    /// Email log entries older than this many days may be purged.
    pub retention_days: u32,
    /// Recipient of the low-stock admin digest.
    pub admin_email: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            hold_interval: Duration::from_secs(2 * 60),
            admission_poll_interval: Duration::from_secs(30),
            pickup_timeout: Duration::from_secs(24 * 3600),
            reaper_poll_interval: Duration::from_secs(60),
            low_stock_threshold: 10,
            critical_stock_threshold: 3,
            cooldown: Duration::from_secs(24 * 3600),
            outer_interval_minutes: 5,
            sub_slot_offsets: (1, 4),
            demo_per_batch_cap: 2,
            demo_mode: false,
            auto_notifications: true,
            retention_days: 7,
            admin_email: "admin@hatchery.local".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `HATCHERY_DATABASE_URL`: PostgreSQL or SQLite connection string
    ///
    /// Optional (with defaults):
    /// - `HATCHERY_HOLD_INTERVAL_MINUTES`: admission wait before debit (default: 2)
    /// - `HATCHERY_ADMISSION_POLL_SECS`: admission sweep cadence (default: 30)
    /// - `HATCHERY_PICKUP_TIMEOUT_SECS`: approved-to-rejected age cutoff (default: 86400)
    /// - `HATCHERY_REAPER_POLL_SECS`: reaper cadence (default: 60)
    /// - `HATCHERY_LOW_STOCK_THRESHOLD`: low-stock trigger (default: 10)
    /// - `HATCHERY_CRITICAL_STOCK_THRESHOLD`: digest critical cutoff (default: 3)
    /// - `HATCHERY_COOLDOWN_HOURS`: per-pair email gap (default: 24)
    /// - `HATCHERY_OUTER_INTERVAL_MINUTES`: notification cadence (default: 5)
    /// - `HATCHERY_SUB_SLOT_OFFSETS`: within-interval dispatch minutes (default: "1,4")
    /// - `HATCHERY_DEMO_MODE`: "true"/"1" to bound dispatch (default: false)
    /// - `HATCHERY_DEMO_PER_BATCH_CAP`: max sends per demo sub-slot (default: 2)
    /// - `HATCHERY_AUTO_NOTIFICATIONS`: global notification enable (default: true)
    /// - `HATCHERY_RETENTION_DAYS`: email log purge age (default: 7)
    /// - `HATCHERY_ADMIN_EMAIL`: digest recipient (default: admin@hatchery.local)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("HATCHERY_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("HATCHERY_DATABASE_URL"))?;

        let defaults = Self::default();

        let hold_minutes: u64 = parse_var(
            "HATCHERY_HOLD_INTERVAL_MINUTES",
            defaults.hold_interval.as_secs() / 60,
        )?;
        let admission_poll_secs: u64 = parse_var(
            "HATCHERY_ADMISSION_POLL_SECS",
            defaults.admission_poll_interval.as_secs(),
        )?;
        let pickup_timeout_secs: u64 = parse_var(
            "HATCHERY_PICKUP_TIMEOUT_SECS",
            defaults.pickup_timeout.as_secs(),
        )?;
        let reaper_poll_secs: u64 = parse_var(
            "HATCHERY_REAPER_POLL_SECS",
            defaults.reaper_poll_interval.as_secs(),
        )?;
        let low_stock_threshold: i32 =
            parse_var("HATCHERY_LOW_STOCK_THRESHOLD", defaults.low_stock_threshold)?;
        let critical_stock_threshold: i32 = parse_var(
            "HATCHERY_CRITICAL_STOCK_THRESHOLD",
            defaults.critical_stock_threshold,
        )?;
        let cooldown_hours: u64 =
            parse_var("HATCHERY_COOLDOWN_HOURS", defaults.cooldown.as_secs() / 3600)?;
        let outer_interval_minutes: u32 = parse_var(
            "HATCHERY_OUTER_INTERVAL_MINUTES",
            defaults.outer_interval_minutes,
        )?;
        let demo_per_batch_cap: usize =
            parse_var("HATCHERY_DEMO_PER_BATCH_CAP", defaults.demo_per_batch_cap)?;
        let retention_days: u32 = parse_var("HATCHERY_RETENTION_DAYS", defaults.retention_days)?;

        let sub_slot_offsets = match std::env::var("HATCHERY_SUB_SLOT_OFFSETS") {
            Ok(raw) => parse_offsets(&raw, outer_interval_minutes)?,
            Err(_) => defaults.sub_slot_offsets,
        };

        let demo_mode = bool_var("HATCHERY_DEMO_MODE", defaults.demo_mode);
        let auto_notifications =
            bool_var("HATCHERY_AUTO_NOTIFICATIONS", defaults.auto_notifications);

        let admin_email =
            std::env::var("HATCHERY_ADMIN_EMAIL").unwrap_or_else(|_| defaults.admin_email.clone());

        Ok(Self {
            database_url,
            hold_interval: Duration::from_secs(hold_minutes * 60),
            admission_poll_interval: Duration::from_secs(admission_poll_secs),
            pickup_timeout: Duration::from_secs(pickup_timeout_secs),
            reaper_poll_interval: Duration::from_secs(reaper_poll_secs),
            low_stock_threshold,
            critical_stock_threshold,
            cooldown: Duration::from_secs(cooldown_hours * 3600),
            outer_interval_minutes,
            sub_slot_offsets,
            demo_per_batch_cap,
            demo_mode,
            auto_notifications,
            retention_days,
            admin_email,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid(key, "must be a valid number")),
        Err(_) => Ok(default),
    }
}

fn bool_var(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

fn parse_offsets(raw: &str, outer_interval: u32) -> Result<(u32, u32), ConfigError> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(ConfigError::Invalid(
            "HATCHERY_SUB_SLOT_OFFSETS",
            "must be two comma-separated minute offsets",
        ));
    }
    let first: u32 = parts[0].parse().map_err(|_| {
        ConfigError::Invalid("HATCHERY_SUB_SLOT_OFFSETS", "must be a valid number")
    })?;
    let second: u32 = parts[1].parse().map_err(|_| {
        ConfigError::Invalid("HATCHERY_SUB_SLOT_OFFSETS", "must be a valid number")
    })?;
    if first >= second || second >= outer_interval {
        return Err(ConfigError::Invalid(
            "HATCHERY_SUB_SLOT_OFFSETS",
            "offsets must be increasing and inside the outer interval",
        ));
    }
    Ok((first, second))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to set env vars for a test and restore them after
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    fn clear_all(guard: &mut EnvGuard) {
        for key in [
            "HATCHERY_DATABASE_URL",
            "HATCHERY_HOLD_INTERVAL_MINUTES",
            "HATCHERY_ADMISSION_POLL_SECS",
            "HATCHERY_PICKUP_TIMEOUT_SECS",
            "HATCHERY_REAPER_POLL_SECS",
            "HATCHERY_LOW_STOCK_THRESHOLD",
            "HATCHERY_CRITICAL_STOCK_THRESHOLD",
            "HATCHERY_COOLDOWN_HOURS",
            "HATCHERY_OUTER_INTERVAL_MINUTES",
            "HATCHERY_SUB_SLOT_OFFSETS",
            "HATCHERY_DEMO_MODE",
            "HATCHERY_DEMO_PER_BATCH_CAP",
            "HATCHERY_AUTO_NOTIFICATIONS",
            "HATCHERY_RETENTION_DAYS",
            "HATCHERY_ADMIN_EMAIL",
        ] {
            guard.remove(key);
        }
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        clear_all(&mut guard);
        guard.set("HATCHERY_DATABASE_URL", "postgres://localhost/hatchery");

        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "postgres://localhost/hatchery");
        assert_eq!(config.hold_interval, Duration::from_secs(120));
        assert_eq!(config.pickup_timeout, Duration::from_secs(86400));
        assert_eq!(config.low_stock_threshold, 10);
        assert_eq!(config.cooldown, Duration::from_secs(86400));
        assert_eq!(config.outer_interval_minutes, 5);
        assert_eq!(config.sub_slot_offsets, (1, 4));
        assert_eq!(config.demo_per_batch_cap, 2);
        assert!(!config.demo_mode);
        assert!(config.auto_notifications);
        assert_eq!(config.retention_days, 7);
    }

    #[test]
    fn test_config_from_env_custom_values() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        clear_all(&mut guard);
        guard.set("HATCHERY_DATABASE_URL", "sqlite:hatchery.db");
        guard.set("HATCHERY_HOLD_INTERVAL_MINUTES", "5");
        guard.set("HATCHERY_PICKUP_TIMEOUT_SECS", "60");
        guard.set("HATCHERY_COOLDOWN_HOURS", "12");
        guard.set("HATCHERY_SUB_SLOT_OFFSETS", "0,3");
        guard.set("HATCHERY_DEMO_MODE", "1");
        guard.set("HATCHERY_AUTO_NOTIFICATIONS", "false");

        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "sqlite:hatchery.db");
        assert_eq!(config.hold_interval, Duration::from_secs(300));
        assert_eq!(config.pickup_timeout, Duration::from_secs(60));
        assert_eq!(config.cooldown, Duration::from_secs(12 * 3600));
        assert_eq!(config.sub_slot_offsets, (0, 3));
        assert!(config.demo_mode);
        assert!(!config.auto_notifications);
    }

    #[test]
    fn test_config_missing_database_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        clear_all(&mut guard);

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::Missing("HATCHERY_DATABASE_URL")
        ));
    }

    #[test]
    fn test_config_invalid_number() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        clear_all(&mut guard);
        guard.set("HATCHERY_DATABASE_URL", "postgres://localhost/hatchery");
        guard.set("HATCHERY_LOW_STOCK_THRESHOLD", "lots");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::Invalid("HATCHERY_LOW_STOCK_THRESHOLD", _)
        ));
    }

    #[test]
    fn test_config_rejects_bad_offsets() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();
        clear_all(&mut guard);
        guard.set("HATCHERY_DATABASE_URL", "postgres://localhost/hatchery");

        // Second offset outside the outer interval
        guard.set("HATCHERY_SUB_SLOT_OFFSETS", "1,7");
        assert!(Config::from_env().is_err());

        // Offsets not increasing
        guard.set("HATCHERY_SUB_SLOT_OFFSETS", "4,1");
        assert!(Config::from_env().is_err());

        // Not a pair
        guard.set("HATCHERY_SUB_SLOT_OFFSETS", "2");
        assert!(Config::from_env().is_err());
    }

    #[test]
    fn test_config_error_display() {
        let missing = ConfigError::Missing("MY_VAR");
        assert_eq!(
            missing.to_string(),
            "missing required environment variable: MY_VAR"
        );

        let invalid = ConfigError::Invalid("MY_VAR", "must be a valid number");
        assert_eq!(
            invalid.to_string(),
            "invalid value for MY_VAR: must be a valid number"
        );
    }
}
