use serde::Serialize;

use crate::schedule::model::{DaySchedule, Period};
use crate::schedule::time::MinuteOfDay;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PeriodInfo<'a> {
    pub current: Option<&'a Period>,
    pub next: Option<&'a Period>,
    pub minutes_remaining: u16,
    pub is_active: bool,
}

impl PeriodInfo<'_> {
    fn idle() -> Self {
        Self {
            current: None,
            next: None,
            minutes_remaining: 0,
            is_active: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    Completed,
    Current,
    Upcoming,
}

/// Periods are half-open: the minute equal to a period's end already
/// belongs to the following gap.
pub fn lookup(day: &DaySchedule, now: MinuteOfDay) -> PeriodInfo<'_> {
    let periods = day.periods();
    for (index, period) in periods.iter().enumerate() {
        if period.contains(now) {
            return PeriodInfo {
                current: Some(period),
                next: periods.get(index + 1),
                minutes_remaining: period.end.get() - now.get(),
                is_active: true,
            };
        }
    }

    for pair in periods.windows(2) {
        let (previous, next) = (&pair[0], &pair[1]);
        if previous.end <= now && now < next.start {
            return PeriodInfo {
                current: None,
                next: Some(next),
                minutes_remaining: next.start.get() - now.get(),
                is_active: false,
            };
        }
    }

    PeriodInfo::idle()
}

pub fn period_status(period: &Period, now: MinuteOfDay) -> PeriodStatus {
    if period.contains(now) {
        PeriodStatus::Current
    } else if period.end <= now {
        PeriodStatus::Completed
    } else {
        PeriodStatus::Upcoming
    }
}
