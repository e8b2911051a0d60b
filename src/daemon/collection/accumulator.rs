use std::time::Duration;

use chrono::{DateTime, Local, Utc};

use crate::{
    daemon::storage::entities::{SessionEntity, TrackerSnapshot},
    utils::time::seconds_between,
};

use super::detector::Detection;

/// Upper bound for a single tick gap expressed in check intervals. Anything longer (suspend,
/// stopped daemon) is cut down to this.
pub const MAX_TICK_GAP_FACTOR: u32 = 3;

/// What a tick did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Nothing was running before and nothing is running now.
    Idle,
    Started,
    Continued {
        credited_seconds: f64,
        /// Gap that was measured before clamping, if clamping took place.
        clamped_from: Option<f64>,
    },
    Stopped,
}

/// Turns detections into accumulated minutes. Holds no state of its own, everything lives in
/// the [TrackerSnapshot] passed in.
#[derive(Debug, Clone, Copy)]
pub struct Accumulator {
    max_gap_seconds: f64,
}

impl Accumulator {
    pub fn new(check_interval: Duration) -> Self {
        Self {
            max_gap_seconds: check_interval
                .saturating_mul(MAX_TICK_GAP_FACTOR)
                .as_secs_f64(),
        }
    }

    /// Applies one tick observed at `now`. Elapsed time is measured from the previous tick,
    /// not from the session start, and is always credited to the day of `now`.
    pub fn advance(
        &self,
        snapshot: &mut TrackerSnapshot,
        detection: &Detection,
        now: DateTime<Local>,
    ) -> Transition {
        let now_utc = now.with_timezone(&Utc);
        let previous_check = snapshot.last_check.replace(now_utc);
        let session = &mut snapshot.current_session;

        match (detection.active, session.is_active()) {
            (false, false) => Transition::Idle,
            (false, true) => {
                *session = SessionEntity::default();
                Transition::Stopped
            }
            (true, false) => {
                *session = SessionEntity::open(now_utc, detection.document_hint.clone());
                Transition::Started
            }
            (true, true) => {
                if detection.document_hint.is_some() {
                    session.document_hint = detection.document_hint.clone();
                }

                let measured = previous_check
                    .map(|previous| seconds_between(previous, now_utc))
                    .unwrap_or(0.);
                let credited_seconds = measured.clamp(0., self.max_gap_seconds);
                let clamped_from = (credited_seconds != measured).then_some(measured);

                session.accumulated_seconds += credited_seconds;
                *snapshot.days.entry(now.date_naive()).or_insert(0.) += credited_seconds / 60.;

                Transition::Continued {
                    credited_seconds,
                    clamped_from,
                }
            }
        }
    }
}
