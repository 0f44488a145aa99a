use chrono::{DateTime, Days, Local, LocalResult, NaiveDateTime, TimeZone};
use serde::Serialize;

use crate::schedule::model::DaySchedule;
use crate::schedule::time::MinuteOfDay;

pub const DEFAULT_PREBELL_MINUTES: u16 = 5;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PreBell,
    Start,
}

#[derive(Debug, Clone)]
pub struct ScheduledEvent<Tz: TimeZone = Local> {
    pub at: DateTime<Tz>,
    pub kind: EventKind,
    pub period_name: String,
    pub period_start: MinuteOfDay,
}

// Field-wise equality like `#[derive(PartialEq)]`, minus the `Tz: PartialEq`
// bound the derive adds (which `chrono::Local` does not satisfy).
impl<Tz: TimeZone> PartialEq for ScheduledEvent<Tz> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at
            && self.kind == other.kind
            && self.period_name == other.period_name
            && self.period_start == other.period_start
    }
}

/// Start and pre-bell events for the calendar day `day_offset` days after
/// `now`. Pre-bells that would cross midnight and starts inside a DST gap
/// are dropped.
pub fn build_day_events<Tz>(
    day: &DaySchedule,
    now: &DateTime<Tz>,
    day_offset: u64,
    prebell_minutes: u16,
) -> Vec<ScheduledEvent<Tz>>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    let timezone = now.timezone();
    let Some(date) = now.date_naive().checked_add_days(Days::new(day_offset)) else {
        return Vec::new();
    };
    let lead = chrono::Duration::minutes(i64::from(prebell_minutes));

    let mut events = Vec::with_capacity(day.len() * 2);
    for period in day.periods() {
        let naive = date.and_time(period.start.to_naive_time());
        let Some(start_at) = resolve_local_datetime(&timezone, naive) else {
            continue;
        };

        let prebell_at = start_at - lead;
        let keep_prebell = prebell_at.date_naive() == start_at.date_naive();

        events.push(ScheduledEvent {
            at: start_at,
            kind: EventKind::Start,
            period_name: period.name.clone(),
            period_start: period.start,
        });
        if keep_prebell {
            events.push(ScheduledEvent {
                at: prebell_at,
                kind: EventKind::PreBell,
                period_name: period.name.clone(),
                period_start: period.start,
            });
        }
    }
    events.sort_by(|a, b| a.at.cmp(&b.at));
    events
}

/// First event strictly after `now`, rolling over to the next calendar day
/// (with the same period list) once today's events are exhausted.
pub fn next_event<Tz>(
    day: &DaySchedule,
    now: &DateTime<Tz>,
    prebell_minutes: u16,
) -> Option<ScheduledEvent<Tz>>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    if let Some(event) = build_day_events(day, now, 0, prebell_minutes)
        .into_iter()
        .find(|event| event.at > *now)
    {
        return Some(event);
    }
    build_day_events(day, now, 1, prebell_minutes)
        .into_iter()
        .next()
}

/// Event that follows `fired` in the chain. Events sharing `fired`'s instant
/// come next in build order; anything else already at or before `now` was
/// missed and is skipped.
pub fn next_event_after<Tz>(
    day: &DaySchedule,
    fired: &ScheduledEvent<Tz>,
    now: &DateTime<Tz>,
    prebell_minutes: u16,
) -> Option<ScheduledEvent<Tz>>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    let events = build_day_events(day, &fired.at, 0, prebell_minutes);
    let resume = events
        .iter()
        .position(|event| event == fired)
        .map_or(0, |index| index + 1);
    if let Some(event) = events
        .into_iter()
        .skip(resume)
        .find(|event| event.at == fired.at || event.at > *now)
    {
        return Some(event);
    }
    next_event(day, now, prebell_minutes)
}

fn resolve_local_datetime<Tz>(timezone: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(first, _second) => Some(first),
        LocalResult::None => None,
    }
}
