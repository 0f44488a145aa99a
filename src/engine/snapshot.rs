use serde::Serialize;

use crate::schedule::events::EventKind;
use crate::schedule::lookup::PeriodStatus;
use crate::schedule::model::{DayKey, Period};

#[derive(Debug, Clone, Serialize)]
pub struct PeriodView {
    pub name: String,
    pub start: String,
    pub end: String,
    pub start_12h: String,
    pub end_12h: String,
}

impl From<&Period> for PeriodView {
    fn from(period: &Period) -> Self {
        Self {
            name: period.name.clone(),
            start: period.start.to_string(),
            end: period.end.to_string(),
            start_12h: period.start.format_12h(),
            end_12h: period.end.format_12h(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleRow {
    #[serde(flatten)]
    pub period: PeriodView,
    pub status: PeriodStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArmedEventView {
    pub at_iso_local: String,
    pub kind: EventKind,
    pub period: String,
    pub period_start_12h: String,
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct StatusSnapshot {
    pub iso_local: String,
    pub clock_label: String,
    pub actual_day: Option<DayKey>,
    pub effective_day: Option<DayKey>,
    pub override_day: Option<DayKey>,
    pub is_active: bool,
    pub current: Option<PeriodView>,
    pub next: Option<PeriodView>,
    pub minutes_remaining: u16,
    pub remaining_label: String,
    pub armed: Option<ArmedEventView>,
    pub arm_count: u64,
    pub sound_enabled: bool,
    pub periods: Vec<ScheduleRow>,
    pub updated_unix_ms: i64,
}
