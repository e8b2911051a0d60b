//! Derived, read-only views over the persisted state. Used both by the daemon for logging and by
//! any presentation process reading the same documents.

use std::{collections::BTreeMap, path::Path};

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    daemon::storage::{
        document::JsonDocument,
        entities::{Configuration, Thresholds, TrackerSnapshot},
        CONFIG_FILE, HISTORY_FILE,
    },
    utils::{
        percentage::{minutes_percentage, Percentage},
        time::days_ending_at,
    },
};

pub const DEFAULT_HISTORY_DAYS: u32 = 365;

/// Ordinal classification of a day against the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(into = "u8")]
pub enum Level {
    None = 0,
    Minimum = 1,
    Target = 2,
    Maximum = 3,
}

impl From<Level> for u8 {
    fn from(value: Level) -> Self {
        value as u8
    }
}

impl Thresholds {
    /// Reaching a threshold exactly counts as reaching it.
    pub fn level(&self, minutes: f64) -> Level {
        if minutes >= self.max {
            Level::Maximum
        } else if minutes >= self.target {
            Level::Target
        } else if minutes >= self.min {
            Level::Minimum
        } else {
            Level::None
        }
    }

    /// Note that this checks the minimum threshold, not the target one.
    pub fn target_reached(&self, minutes: f64) -> bool {
        minutes >= self.min
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub date: NaiveDate,
    pub minutes: f64,
    pub level: Level,
    pub target_reached: bool,
    pub min_minutes: f64,
    pub target_minutes: f64,
    pub max_minutes: f64,
    pub active_session: bool,
    pub current_document: Option<String>,
}

impl StatusView {
    /// Minutes left until the target threshold, zero once it is reached.
    pub fn remaining_to_target(&self) -> f64 {
        (self.target_minutes - self.minutes).max(0.)
    }

    pub fn progress_to_target(&self) -> Percentage {
        minutes_percentage(self.minutes, self.target_minutes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayView {
    pub minutes: f64,
    pub level: Level,
    pub target_reached: bool,
}

/// Computes [StatusView] and history from a configuration and a snapshot.
pub struct StatusReporter<'a> {
    config: &'a Configuration,
    snapshot: &'a TrackerSnapshot,
}

impl<'a> StatusReporter<'a> {
    pub fn new(config: &'a Configuration, snapshot: &'a TrackerSnapshot) -> Self {
        Self { config, snapshot }
    }

    fn day(&self, date: NaiveDate) -> DayView {
        let thresholds = self.config.thresholds();
        let minutes = self.snapshot.minutes_on(date);
        DayView {
            minutes,
            level: thresholds.level(minutes),
            target_reached: thresholds.target_reached(minutes),
        }
    }

    pub fn status(&self, today: NaiveDate) -> StatusView {
        let day = self.day(today);
        let session = &self.snapshot.current_session;
        StatusView {
            date: today,
            minutes: day.minutes,
            level: day.level,
            target_reached: day.target_reached,
            min_minutes: self.config.min_time_minutes,
            target_minutes: self.config.target_time_minutes,
            max_minutes: self.config.max_time_minutes,
            active_session: session.is_active(),
            current_document: session.document_hint.clone(),
        }
    }

    /// Returns a view for each of the last `window_days` days including `today`. Days without
    /// records are reported as zero.
    pub fn history(&self, today: NaiveDate, window_days: u32) -> BTreeMap<NaiveDate, DayView> {
        days_ending_at(today, window_days)
            .map(|date| (date, self.day(date)))
            .collect()
    }
}

/// Reads both documents from the application directory the way a presentation process should:
/// without writing, and with defaults for anything missing or unreadable.
pub async fn read_persisted(dir: &Path) -> (Configuration, TrackerSnapshot) {
    let config = JsonDocument::<Configuration>::new(dir.join(CONFIG_FILE))
        .read_or_default()
        .await;
    let snapshot = JsonDocument::<TrackerSnapshot>::new(dir.join(HISTORY_FILE))
        .read_or_default()
        .await;
    (config, snapshot)
}
