//! Timer state derivation.
//!
//! Everything here is a pure function of a stored [`Annotator`] and a caller
//! supplied `now`. Nothing is cached between calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Annotator, TimerStatus},
    protocol::{AnnotatorTimer, TimerSummary},
};

/// Length of the deadline window measured from `start_time`.
pub const DEADLINE_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

const MS_PER_SECOND: i64 = 1000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

pub const LATE_REMAINING: &str = "00:00:00";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub status: TimerStatus,
    pub remaining_time: String,
}

/// Derives the display status and remaining time of `annotator` at `now`.
///
/// A start time later than `now` counts as zero elapsed time, so the
/// countdown never shows more than the full window. Exactly zero remaining
/// milliseconds is already late.
pub fn derive(annotator: &Annotator, now: DateTime<Utc>) -> TimerState {
    let Some(start_time) = annotator.start_time else {
        return TimerState {
            status: TimerStatus::Available,
            remaining_time: String::new(),
        };
    };

    let elapsed_ms = (now - start_time).num_milliseconds().max(0);
    let remaining_ms = DEADLINE_WINDOW_MS - elapsed_ms;

    if remaining_ms <= 0 {
        return TimerState {
            status: TimerStatus::Late,
            remaining_time: LATE_REMAINING.to_string(),
        };
    }

    TimerState {
        status: TimerStatus::OnTime,
        remaining_time: format_remaining(remaining_ms),
    }
}

/// Formats a positive millisecond count as zero-padded `HH:MM:SS`,
/// truncating partial seconds.
pub fn format_remaining(remaining_ms: i64) -> String {
    let remaining_ms = remaining_ms.max(0);
    let hours = remaining_ms / MS_PER_HOUR;
    let minutes = (remaining_ms % MS_PER_HOUR) / MS_PER_MINUTE;
    let seconds = (remaining_ms % MS_PER_MINUTE) / MS_PER_SECOND;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

pub fn annotator_timer(annotator: Annotator, now: DateTime<Utc>) -> AnnotatorTimer {
    let TimerState {
        status,
        remaining_time,
    } = derive(&annotator, now);
    AnnotatorTimer {
        annotator,
        status,
        remaining_time,
    }
}

/// Immutable snapshot of annotators used by refresh loops.
///
/// The board is replaced wholesale when the store is re-read; between
/// reloads every tick is a fresh recompute over the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct TimerBoard {
    annotators: Vec<Annotator>,
}

impl TimerBoard {
    pub fn new(annotators: Vec<Annotator>) -> Self {
        Self { annotators }
    }

    pub fn is_empty(&self) -> bool {
        self.annotators.is_empty()
    }

    pub fn view_at(&self, now: DateTime<Utc>) -> Vec<AnnotatorTimer> {
        self.annotators
            .iter()
            .cloned()
            .map(|annotator| annotator_timer(annotator, now))
            .collect()
    }

    pub fn summary_at(&self, now: DateTime<Utc>) -> TimerSummary {
        let mut summary = TimerSummary::default();
        for annotator in &self.annotators {
            summary.record(derive(annotator, now).status);
        }
        summary
    }
}

#[cfg(test)]
#[path = "tests/timer_tests.rs"]
mod tests;
