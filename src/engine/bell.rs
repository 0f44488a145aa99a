use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Timelike};
use log::{debug, info};

use crate::engine::live_alerts::{LiveAlert, LiveAlertState};
use crate::engine::scheduler::NotificationScheduler;
use crate::engine::snapshot::{ArmedEventView, PeriodView, ScheduleRow, StatusSnapshot};
use crate::notify::chime::{ChimePlayer, ring};
use crate::notify::{Notice, Notifier};
use crate::schedule::events::{EventKind, ScheduledEvent};
use crate::schedule::lookup::{lookup, period_status};
use crate::schedule::model::{DayKey, ScheduleSettings};
use crate::schedule::selector::ScheduleSelector;
use crate::schedule::time::{MinuteOfDay, format_remaining};

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TickOutcome {
    pub fired: Vec<EventKind>,
    pub rearmed: bool,
    pub live_alerts: usize,
}

/// Selector, bell chain and sampled alerts behind one owner.
pub struct BellEngine {
    selector: ScheduleSelector,
    scheduler: NotificationScheduler,
    live: LiveAlertState,
    settings: ScheduleSettings,
    notifier: Box<dyn Notifier>,
    chime: Box<dyn ChimePlayer>,
    armed_for: Option<NaiveDate>,
    last_chime_minute: Option<NaiveDateTime>,
}

impl BellEngine {
    pub fn new(
        selector: ScheduleSelector,
        settings: ScheduleSettings,
        notifier: Box<dyn Notifier>,
        chime: Box<dyn ChimePlayer>,
    ) -> Self {
        Self {
            selector,
            scheduler: NotificationScheduler::new(settings.prebell_minutes),
            live: LiveAlertState::default(),
            settings,
            notifier,
            chime,
            armed_for: None,
            last_chime_minute: None,
        }
    }

    pub fn armed(&self) -> Option<&ScheduledEvent> {
        self.scheduler.armed()
    }

    pub fn start(&mut self, now: DateTime<Local>) {
        info!(
            "bell engine starting, effective day {}",
            describe_day(self.selector.effective_key(now.date_naive()))
        );
        self.rearm(now);
    }

    pub fn tick(&mut self, now: DateTime<Local>) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        while let Some(event) = self.scheduler.take_due(&now) {
            info!("bell event {:?} for {}", event.kind, event.period_name);
            self.notifier.notify(&Notice::for_event(&event));
            self.chime_once(now);
            outcome.fired.push(event.kind);
            let day = self.selector.effective_day(now.date_naive());
            self.scheduler.arm_after(day, &event, &now);
            self.armed_for = Some(now.date_naive());
            outcome.rearmed = true;
        }
        if outcome.fired.is_empty() && self.armed_for != Some(now.date_naive()) {
            debug!("calendar day changed, re-arming");
            self.rearm(now);
            outcome.rearmed = true;
        }

        let minute = MinuteOfDay::of_time(&now);
        let day = self.selector.effective_day(now.date_naive());
        let info = lookup(day, minute);
        let alerts = self
            .live
            .observe(&info, minute, self.settings.warning_minutes);
        outcome.live_alerts = alerts.len();
        for alert in alerts {
            let notice = match &alert {
                LiveAlert::MinutesRemaining { period, minutes } => {
                    Notice::minutes_remaining(period, *minutes)
                }
                LiveAlert::PeriodEnded { period } => Notice::period_ended(period),
            };
            self.notifier.notify(&notice);
            self.chime_once(now);
        }
        outcome
    }

    // false when the selection did not change; the chain is left alone.
    pub fn set_override(&mut self, day: Option<DayKey>, now: DateTime<Local>) -> bool {
        if !self.selector.set_override(day) {
            return false;
        }
        info!("schedule override now {}", describe_day(day));
        self.notifier.notify(&Notice::override_changed(day));
        self.rearm(now);
        true
    }

    pub fn set_sound(&mut self, enabled: bool) -> bool {
        if self.settings.sound_enabled == enabled {
            return false;
        }
        self.settings.sound_enabled = enabled;
        info!("bell sound {}", if enabled { "enabled" } else { "disabled" });
        true
    }

    // Operator-requested, so it rings even while sound is off and does not
    // count toward the per-minute coalescing.
    pub fn test_bell(&mut self) {
        info!("test bell requested");
        ring(self.chime.as_ref());
    }

    pub fn next_wake(&self, now: DateTime<Local>, tick: Duration) -> Duration {
        match self.scheduler.delay(&now) {
            Some(delay) => delay.min(tick),
            None => tick,
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(event) = self.scheduler.cancel() {
            debug!(
                "shutdown cancelled pending {:?} for {}",
                event.kind, event.period_name
            );
        }
        self.armed_for = None;
    }

    pub fn snapshot(&self, now: DateTime<Local>, clock_label: &str) -> StatusSnapshot {
        let date = now.date_naive();
        let minute = MinuteOfDay::of_time(&now);
        let day = self.selector.effective_day(date);
        let info = lookup(day, minute);
        let armed = self.armed().map(|event| ArmedEventView {
            at_iso_local: event.at.to_rfc3339(),
            kind: event.kind,
            period: event.period_name.clone(),
            period_start_12h: event.period_start.format_12h(),
            delay_ms: self
                .scheduler
                .delay(&now)
                .map(|delay| u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
                .unwrap_or(0),
        });

        StatusSnapshot {
            iso_local: now.to_rfc3339(),
            clock_label: clock_label.to_string(),
            actual_day: ScheduleSelector::actual_key(date),
            effective_day: self.selector.effective_key(date),
            override_day: self.selector.override_day(),
            is_active: info.is_active,
            current: info.current.map(PeriodView::from),
            next: info.next.map(PeriodView::from),
            minutes_remaining: info.minutes_remaining,
            remaining_label: format_remaining(info.minutes_remaining),
            armed,
            arm_count: self.scheduler.arm_count(),
            sound_enabled: self.settings.sound_enabled,
            periods: day
                .periods()
                .iter()
                .map(|period| ScheduleRow {
                    period: PeriodView::from(period),
                    status: period_status(period, minute),
                })
                .collect(),
            updated_unix_ms: now.timestamp_millis(),
        }
    }

    fn rearm(&mut self, now: DateTime<Local>) {
        let day = self.selector.effective_day(now.date_naive());
        self.scheduler.arm(day, &now);
        self.armed_for = Some(now.date_naive());
    }

    // The chain and the sampled alerts can both land in the same minute
    // (a period end and the next pre-bell); ring the bell once for both.
    fn chime_once(&mut self, now: DateTime<Local>) {
        if !self.settings.sound_enabled {
            return;
        }
        let minute = now
            .naive_local()
            .with_second(0)
            .and_then(|dt| dt.with_nanosecond(0));
        if minute.is_some() && self.last_chime_minute == minute {
            return;
        }
        self.last_chime_minute = minute;
        ring(self.chime.as_ref());
    }
}

fn describe_day(day: Option<DayKey>) -> &'static str {
    day.map(DayKey::as_str).unwrap_or("none")
}
