use std::{collections::BTreeMap, time::Duration};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Default list of document viewers that are tracked.
pub const DEFAULT_TARGET_APPS: [&str; 5] = ["evince", "atril", "okular", "xreader", "document-viewer"];

pub const DEFAULT_CHECK_INTERVAL_SECONDS: f64 = 10.;
/// Longest accepted polling interval, one day.
pub const MAX_CHECK_INTERVAL_SECONDS: f64 = 86_400.;

/// Settings of the tracker. Created with defaults on first run and read once per daemon start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Identifiers matched against running process names.
    pub target_apps: Vec<String>,
    pub min_time_minutes: f64,
    pub target_time_minutes: f64,
    pub max_time_minutes: f64,
    pub check_interval_seconds: f64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            target_apps: DEFAULT_TARGET_APPS.iter().map(|v| v.to_string()).collect(),
            min_time_minutes: 30.,
            target_time_minutes: 60.,
            max_time_minutes: 180.,
            check_interval_seconds: DEFAULT_CHECK_INTERVAL_SECONDS,
        }
    }
}

impl Configuration {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            min: self.min_time_minutes,
            target: self.target_time_minutes,
            max: self.max_time_minutes,
        }
    }

    /// Polling interval. Values outside of what [Configuration::check] accepts are clamped
    /// into range, `NaN` falls back to the default.
    pub fn check_interval(&self) -> Duration {
        Duration::try_from_secs_f64(
            self.check_interval_seconds
                .clamp(f64::MIN_POSITIVE, MAX_CHECK_INTERVAL_SECONDS),
        )
        .unwrap_or(Duration::from_secs_f64(DEFAULT_CHECK_INTERVAL_SECONDS))
    }

    pub fn check(&self) -> Result<(), String> {
        self.thresholds().check()?;
        let interval = self.check_interval_seconds;
        if !(interval > 0. && interval <= MAX_CHECK_INTERVAL_SECONDS) {
            return Err(format!(
                "checkIntervalSeconds must be in (0, {MAX_CHECK_INTERVAL_SECONDS}], got {interval}"
            ));
        }
        Ok(())
    }
}

/// Ascending minute thresholds of a day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub min: f64,
    pub target: f64,
    pub max: f64,
}

impl Thresholds {
    pub fn check(&self) -> Result<(), String> {
        if 0. < self.min && self.min < self.target && self.target < self.max && self.max.is_finite()
        {
            Ok(())
        } else {
            Err(format!(
                "thresholds must satisfy 0 < min < target < max, got {} / {} / {}",
                self.min, self.target, self.max
            ))
        }
    }
}

/// The session that is currently open. An empty `start` means there is no session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntity {
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub document_hint: Option<String>,
    #[serde(default)]
    pub accumulated_seconds: f64,
}

impl SessionEntity {
    pub fn is_active(&self) -> bool {
        self.start.is_some()
    }

    pub fn open(start: DateTime<Utc>, document_hint: Option<String>) -> Self {
        Self {
            start: Some(start),
            document_hint,
            accumulated_seconds: 0.,
        }
    }
}

/// The whole persisted tracking state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    /// Accumulated minutes per local calendar day.
    #[serde(default)]
    pub days: BTreeMap<NaiveDate, f64>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_check: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_session: SessionEntity,
}

impl TrackerSnapshot {
    pub fn minutes_on(&self, date: NaiveDate) -> f64 {
        self.days.get(&date).copied().unwrap_or(0.)
    }

    pub fn check(&self) -> Result<(), String> {
        if let Some((date, minutes)) = self
            .days
            .iter()
            .find(|(_, minutes)| !minutes.is_finite() || **minutes < 0.)
        {
            return Err(format!("day {date} has an invalid amount of minutes {minutes}"));
        }
        let accumulated = self.current_session.accumulated_seconds;
        if !accumulated.is_finite() || accumulated < 0. {
            return Err(format!("session has invalid accumulated seconds {accumulated}"));
        }
        Ok(())
    }
}
