pub mod chime;

use std::io::Write;

use chrono::Local;
use log::info;
use serde::Serialize;

use crate::schedule::events::{EventKind, ScheduledEvent};
use crate::schedule::model::DayKey;

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Notice {
    pub title: String,
    pub body: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn for_event<Tz: chrono::TimeZone>(event: &ScheduledEvent<Tz>) -> Self {
        let start = event.period_start.format_12h();
        match event.kind {
            EventKind::PreBell => Self::new(
                "5-Minute Warning",
                format!("{} starts at {start}", event.period_name),
            ),
            EventKind::Start => Self::new(
                "Period Start",
                format!("{} begins now ({start})", event.period_name),
            ),
        }
    }

    pub fn minutes_remaining(period: &str, minutes: u16) -> Self {
        Self::new(
            format!("{minutes} Minutes Remaining"),
            format!("{period} ends in {minutes} minutes"),
        )
    }

    pub fn period_ended(period: &str) -> Self {
        Self::new("Period Ended", format!("{period} has ended"))
    }

    pub fn override_changed(day: Option<DayKey>) -> Self {
        match day {
            Some(day) => Self::new(
                "Schedule Override Set",
                format!("Now using {} schedule", day.label()),
            ),
            None => Self::new("Schedule Reset", "Using default daily schedule"),
        }
    }
}

pub trait Notifier: Send {
    fn notify(&self, notice: &Notice);
}

pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: &Notice) {
        info!("notice: {} - {}", notice.title, notice.body);
        let stamp = Local::now().format("%H:%M:%S");
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "[{stamp}] {} - {}", notice.title, notice.body);
        let _ = stdout.flush();
    }
}
