//! Application-level configuration loading for booking policy knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use time::Duration;
use tracing::{info, warn};

use crate::dao::booking_store::CancellationRules;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "STUDIO_SCHED_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Minutes before class start at which booking reminders fire.
    pub reminder_intervals_minutes: Vec<u32>,
    /// How long a promoted waitlist user may claim their seat.
    pub waitlist_hold_minutes: u32,
    /// Cancellations inside this many hours of class start count as late.
    pub late_cancel_window_hours: u32,
    /// Late cancellations at which a user is blacklisted.
    pub strike_limit: u8,
    /// Batch size for bulk user updates during the strike amnesty sweep.
    pub write_batch_size: u32,
    /// How many waitlist positions the promoter may look past a dead head.
    pub promotion_lookahead: u32,
    /// Random delay bounds, in minutes after class end, for the aggregator
    /// validation reminder.
    pub aggregator_jitter_minutes: (u32, u32),
    /// Class length assumed when a session does not carry one.
    pub default_class_duration_minutes: u32,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in policy defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded booking policy from config");
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Claim window for a waitlist seat offer.
    pub fn hold_window(&self) -> Duration {
        Duration::minutes(i64::from(self.waitlist_hold_minutes))
    }

    /// Lateness window for cancellations.
    pub fn late_window(&self) -> Duration {
        Duration::hours(i64::from(self.late_cancel_window_hours))
    }

    /// Policy bundle handed to the cancellation transaction.
    pub fn cancellation_rules(&self) -> CancellationRules {
        CancellationRules {
            late_window: self.late_window(),
            strike_limit: self.strike_limit,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reminder_intervals_minutes: vec![60, 30, 15],
            waitlist_hold_minutes: 5,
            late_cancel_window_hours: 2,
            strike_limit: 3,
            write_batch_size: 400,
            promotion_lookahead: 10,
            aggregator_jitter_minutes: (5, 10),
            default_class_duration_minutes: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    reminder_intervals_minutes: Option<Vec<u32>>,
    waitlist_hold_minutes: Option<u32>,
    late_cancel_window_hours: Option<u32>,
    strike_limit: Option<u8>,
    write_batch_size: Option<u32>,
    promotion_lookahead: Option<u32>,
    aggregator_jitter_minutes: Option<(u32, u32)>,
    default_class_duration_minutes: Option<u32>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            reminder_intervals_minutes: value
                .reminder_intervals_minutes
                .unwrap_or(defaults.reminder_intervals_minutes),
            waitlist_hold_minutes: value
                .waitlist_hold_minutes
                .unwrap_or(defaults.waitlist_hold_minutes),
            late_cancel_window_hours: value
                .late_cancel_window_hours
                .unwrap_or(defaults.late_cancel_window_hours),
            strike_limit: value.strike_limit.unwrap_or(defaults.strike_limit),
            write_batch_size: value.write_batch_size.unwrap_or(defaults.write_batch_size),
            promotion_lookahead: value
                .promotion_lookahead
                .unwrap_or(defaults.promotion_lookahead),
            aggregator_jitter_minutes: value
                .aggregator_jitter_minutes
                .unwrap_or(defaults.aggregator_jitter_minutes),
            default_class_duration_minutes: value
                .default_class_duration_minutes
                .unwrap_or(defaults.default_class_duration_minutes),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
