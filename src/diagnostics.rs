use std::fmt::Write as _;

use anyhow::Result;
use chrono::{DateTime, Local};

use crate::clock::SelectedClock;
use crate::schedule::events::{EventKind, next_event};
use crate::schedule::lookup::{PeriodStatus, lookup, period_status};
use crate::schedule::model::{DayKey, ScheduleSettings};
use crate::schedule::selector::ScheduleSelector;
use crate::schedule::time::{MinuteOfDay, format_remaining};

pub fn run_diagnostics(
    selected: &SelectedClock,
    selector: &ScheduleSelector,
    settings: &ScheduleSettings,
) -> Result<()> {
    let report = render_report(selected.clock.now(), selected, selector, settings)?;
    print!("{report}");
    Ok(())
}

fn render_report(
    now: DateTime<Local>,
    selected: &SelectedClock,
    selector: &ScheduleSelector,
    settings: &ScheduleSettings,
) -> Result<String> {
    let mut out = String::new();
    let date = now.date_naive();
    let minute = MinuteOfDay::of_time(&now);
    let day = selector.effective_day(date);

    writeln!(out, "BellSchedule diagnostics")?;
    writeln!(out, "Clock source: {}", selected.label)?;
    if let Some(note) = selected.note.as_deref() {
        writeln!(out, "Clock note: {note}")?;
    }
    writeln!(out, "Now: {}", now.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "Actual day: {}", day_name(ScheduleSelector::actual_key(date)))?;
    writeln!(out, "Override: {}", day_name(selector.override_day()))?;
    writeln!(
        out,
        "Effective schedule: {} ({} periods)",
        day_name(selector.effective_key(date)),
        day.len()
    )?;
    writeln!(out, "Sound enabled: {}", settings.sound_enabled)?;
    if day.is_empty() {
        writeln!(out, "  no periods scheduled")?;
    }

    for period in day.periods() {
        let marker = match period_status(period, minute) {
            PeriodStatus::Completed => "done",
            PeriodStatus::Current => "now",
            PeriodStatus::Upcoming => "next",
        };
        writeln!(
            out,
            "  [{marker:>4}] {:<12} {} - {}",
            period.name,
            period.start.format_12h(),
            period.end.format_12h()
        )?;
    }

    let info = lookup(day, minute);
    match info.current {
        Some(current) => writeln!(
            out,
            "Current period: {} ({} remaining)",
            current.name,
            format_remaining(info.minutes_remaining)
        )?,
        None => writeln!(out, "Current period: none")?,
    }
    match info.next {
        Some(next) => writeln!(
            out,
            "Next period: {} at {}",
            next.name,
            next.start.format_12h()
        )?,
        None => writeln!(out, "Next period: none")?,
    }

    match next_event(day, &now, settings.prebell_minutes) {
        Some(event) => {
            let kind = match event.kind {
                EventKind::PreBell => "pre-bell",
                EventKind::Start => "start",
            };
            let delay = (event.at - now).num_seconds().max(0);
            writeln!(
                out,
                "Next event: {kind} for {} at {} (in {}s)",
                event.period_name,
                event.at.format("%Y-%m-%d %H:%M"),
                delay
            )?;
        }
        None => writeln!(out, "Next event: none scheduled")?,
    }
    Ok(out)
}

fn day_name(day: Option<DayKey>) -> &'static str {
    day.map(DayKey::label).unwrap_or("none")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::clock::SystemClock;
    use crate::schedule::model::builtin_schedule_config;

    fn report(at: DateTime<Local>, override_day: Option<DayKey>) -> String {
        let config = builtin_schedule_config().expect("built-in");
        let mut selector = ScheduleSelector::new(config.catalog);
        selector.set_override(override_day);
        let selected = SelectedClock {
            clock: Arc::new(SystemClock),
            label: "SYSTEM",
            note: None,
        };
        render_report(at, &selected, &selector, &config.settings).expect("report")
    }

    fn monday(hour: u32, minute: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 10, 19, hour, minute, 0)
            .earliest()
            .expect("valid")
    }

    #[test]
    fn report_shows_current_period_and_next_event() {
        let text = report(monday(8, 30), None);
        assert!(text.contains("Effective schedule: Monday (8 periods)"), "{text}");
        assert!(text.contains("Current period: Period 1 (0h 20m remaining)"), "{text}");
        assert!(text.contains("[ now] Period 1"), "{text}");
        assert!(text.contains("Next event: pre-bell for MM/SOAR"), "{text}");
    }

    #[test]
    fn report_uses_override_schedule() {
        let text = report(monday(8, 52), Some(DayKey::Friday));
        assert!(text.contains("Override: Friday"), "{text}");
        assert!(text.contains("Effective schedule: Friday (5 periods)"), "{text}");
        assert!(text.contains("Current period: none"), "{text}");
    }

    #[test]
    fn weekend_reports_no_periods() {
        let saturday = Local
            .with_ymd_and_hms(2026, 10, 24, 10, 0, 0)
            .earliest()
            .expect("valid");
        let text = report(saturday, None);
        assert!(text.contains("Actual day: none"), "{text}");
        assert!(text.contains("Effective schedule: none (0 periods)"), "{text}");
        assert!(text.contains("Next event: none scheduled"), "{text}");
    }
}
