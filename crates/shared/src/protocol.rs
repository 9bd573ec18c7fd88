use serde::{Deserialize, Serialize};

use crate::domain::{Annotator, AnnotatorId, TimerStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAnnotatorRequest {
    pub name: String,
}

/// Body of the start and reset commands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimerCommandRequest {
    pub id: AnnotatorId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAnnotatorResponse {
    pub success: bool,
}

/// An annotator together with the timer state derived for one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatorTimer {
    #[serde(flatten)]
    pub annotator: Annotator,
    pub status: TimerStatus,
    #[serde(rename = "remainingTime")]
    pub remaining_time: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSummary {
    pub available: usize,
    pub on_time: usize,
    pub late: usize,
}

impl TimerSummary {
    pub fn record(&mut self, status: TimerStatus) {
        match status {
            TimerStatus::Available => self.available += 1,
            TimerStatus::OnTime => self.on_time += 1,
            TimerStatus::Late => self.late += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.available + self.on_time + self.late
    }
}
