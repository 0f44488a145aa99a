use std::mem;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use log::debug;

use crate::schedule::events::{ScheduledEvent, next_event, next_event_after};
use crate::schedule::model::DaySchedule;

#[derive(Debug, Clone)]
pub enum SchedulerState<Tz: TimeZone = Local> {
    Idle,
    Armed(ScheduledEvent<Tz>),
}

/// Single-shot bell timer. Arming always discards the previous event first.
#[derive(Debug)]
pub struct NotificationScheduler<Tz: TimeZone = Local> {
    state: SchedulerState<Tz>,
    prebell_minutes: u16,
    arm_count: u64,
}

impl<Tz> NotificationScheduler<Tz>
where
    Tz: TimeZone,
    Tz::Offset: Copy,
{
    pub fn new(prebell_minutes: u16) -> Self {
        Self {
            state: SchedulerState::Idle,
            prebell_minutes,
            arm_count: 0,
        }
    }

    pub fn arm(&mut self, day: &DaySchedule, now: &DateTime<Tz>) -> Option<&ScheduledEvent<Tz>> {
        let next = next_event(day, now, self.prebell_minutes);
        self.install(next)
    }

    /// Continues the chain behind an event that just fired, so a second event
    /// at the same instant is not skipped.
    pub fn arm_after(
        &mut self,
        day: &DaySchedule,
        fired: &ScheduledEvent<Tz>,
        now: &DateTime<Tz>,
    ) -> Option<&ScheduledEvent<Tz>> {
        let next = next_event_after(day, fired, now, self.prebell_minutes);
        self.install(next)
    }

    fn install(&mut self, next: Option<ScheduledEvent<Tz>>) -> Option<&ScheduledEvent<Tz>> {
        if let Some(previous) = self.cancel() {
            debug!(
                "cancelled pending {:?} for {}",
                previous.kind, previous.period_name
            );
        }
        self.arm_count += 1;
        match next {
            Some(event) => {
                debug!(
                    "armed {:?} for {} at {:?}",
                    event.kind, event.period_name, event.at
                );
                self.state = SchedulerState::Armed(event);
            }
            None => debug!("no upcoming bell events, scheduler idle"),
        }
        self.armed()
    }

    pub fn cancel(&mut self) -> Option<ScheduledEvent<Tz>> {
        match mem::replace(&mut self.state, SchedulerState::Idle) {
            SchedulerState::Armed(event) => Some(event),
            SchedulerState::Idle => None,
        }
    }

    pub fn armed(&self) -> Option<&ScheduledEvent<Tz>> {
        match &self.state {
            SchedulerState::Armed(event) => Some(event),
            SchedulerState::Idle => None,
        }
    }

    pub fn arm_count(&self) -> u64 {
        self.arm_count
    }

    pub fn delay(&self, now: &DateTime<Tz>) -> Option<Duration> {
        self.armed()
            .map(|event| (event.at - *now).to_std().unwrap_or(Duration::ZERO))
    }

    pub fn take_due(&mut self, now: &DateTime<Tz>) -> Option<ScheduledEvent<Tz>> {
        let due = self.armed().is_some_and(|event| event.at <= *now);
        if due { self.cancel() } else { None }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, FixedOffset, Timelike};

    use super::*;
    use crate::schedule::events::EventKind;
    use crate::schedule::model::{DayKey, Period, builtin_schedule_config};

    fn at(day: u32, hour: u32, minute: u32, second: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .expect("offset")
            .with_ymd_and_hms(2026, 10, day, hour, minute, second)
            .single()
            .expect("valid")
    }

    fn day(key: DayKey) -> DaySchedule {
        builtin_schedule_config()
            .expect("built-in")
            .catalog
            .day(key)
            .clone()
    }

    #[test]
    fn arm_holds_the_next_event_and_reports_delay() {
        let monday = day(DayKey::Monday);
        let mut scheduler = NotificationScheduler::new(5);
        let now = at(19, 7, 50, 0);
        let event = scheduler.arm(&monday, &now).expect("armed").clone();
        assert_eq!(event.kind, EventKind::PreBell);
        assert_eq!(scheduler.delay(&now), Some(Duration::from_secs(300)));
        assert!(scheduler.take_due(&at(19, 7, 54, 59)).is_none());
        assert!(matches!(&scheduler.state, SchedulerState::Armed(_)));
    }

    #[test]
    fn due_event_is_taken_once_and_rearm_moves_forward() {
        let monday = day(DayKey::Monday);
        let mut scheduler = NotificationScheduler::new(5);
        scheduler.arm(&monday, &at(19, 7, 50, 0));

        let fire_time = at(19, 7, 55, 0);
        let fired = scheduler.take_due(&fire_time).expect("due");
        assert_eq!(fired.kind, EventKind::PreBell);
        assert!(scheduler.take_due(&fire_time).is_none());
        assert!(matches!(&scheduler.state, SchedulerState::Idle));

        let next = scheduler.arm(&monday, &fire_time).expect("re-armed");
        assert_eq!(next.kind, EventKind::Start);
        assert_eq!((next.at.hour(), next.at.minute()), (8, 0));
    }

    #[test]
    fn overdue_event_fires_with_zero_delay() {
        let monday = day(DayKey::Monday);
        let mut scheduler = NotificationScheduler::new(5);
        scheduler.arm(&monday, &at(19, 7, 50, 0));
        let late = at(19, 9, 0, 0);
        assert_eq!(scheduler.delay(&late), Some(Duration::ZERO));
        assert!(scheduler.take_due(&late).is_some());
    }

    #[test]
    fn rearming_replaces_instead_of_stacking() {
        let mut scheduler = NotificationScheduler::new(5);
        let now = at(19, 8, 52, 0);
        scheduler.arm(&day(DayKey::Monday), &now);
        assert_eq!(
            scheduler.armed().map(|e| e.period_name.as_str()),
            Some("MM/SOAR")
        );

        scheduler.arm(&day(DayKey::Friday), &now);
        let armed = scheduler.armed().expect("armed");
        assert_eq!(armed.period_name, "Period 2");
        assert_eq!(armed.kind, EventKind::Start);
        assert_eq!(scheduler.arm_count(), 2);

        scheduler.arm(&day(DayKey::Monday), &now);
        assert_eq!(
            scheduler.armed().map(|e| e.period_name.as_str()),
            Some("MM/SOAR")
        );
    }

    #[test]
    fn empty_day_leaves_scheduler_idle() {
        let mut scheduler = NotificationScheduler::new(5);
        scheduler.arm(&day(DayKey::Monday), &at(19, 7, 0, 0));
        assert!(scheduler.arm(&DaySchedule::empty(), &at(19, 7, 0, 0)).is_none());
        assert!(matches!(&scheduler.state, SchedulerState::Idle));
        assert_eq!(scheduler.delay(&at(19, 7, 0, 0)), None);
    }

    fn run_chain(day: &DaySchedule, prebell_minutes: u16) -> Vec<(EventKind, String)> {
        let mut scheduler = NotificationScheduler::new(prebell_minutes);
        scheduler.arm(day, &at(19, 6, 0, 0));

        let mut fired = Vec::new();
        while let Some(event) = scheduler.armed().cloned() {
            if event.at.day() != 19 {
                break;
            }
            let now = event.at;
            let taken = scheduler.take_due(&now).expect("due at its own instant");
            scheduler.arm_after(day, &taken, &now);
            fired.push((taken.kind, taken.period_name));
        }
        fired
    }

    #[test]
    fn chain_visits_every_event_of_the_day_in_order() {
        let fired = run_chain(&day(DayKey::Monday), 5);
        assert_eq!(fired.len(), 16);
        assert_eq!(fired[0], (EventKind::PreBell, "Period 1".to_string()));
        assert_eq!(fired[15], (EventKind::Start, "Period 7".to_string()));
    }

    #[test]
    fn chain_fires_both_events_sharing_an_instant() {
        let monday = day(DayKey::Monday);
        let at_0600 = at(19, 6, 0, 0);
        let built = crate::schedule::events::build_day_events(&monday, &at_0600, 0, 20);
        let fired = run_chain(&monday, 20);
        assert_eq!(fired.len(), built.len());
        let soar_start = (EventKind::Start, "MM/SOAR".to_string());
        let period2_prebell = (EventKind::PreBell, "Period 2".to_string());
        let soar_index = fired.iter().position(|e| *e == soar_start).expect("soar start");
        assert_eq!(fired[soar_index + 1], period2_prebell);
    }

    #[test]
    fn chain_survives_a_period_shorter_than_the_lead() {
        let short = DaySchedule::new(vec![
            Period::new("A", "09:00", "09:03").expect("period"),
            Period::new("B", "09:05", "09:30").expect("period"),
        ])
        .expect("day");
        let fired = run_chain(&short, 5);
        assert_eq!(
            fired,
            vec![
                (EventKind::PreBell, "A".to_string()),
                (EventKind::Start, "A".to_string()),
                (EventKind::PreBell, "B".to_string()),
                (EventKind::Start, "B".to_string()),
            ]
        );
    }

    #[test]
    fn late_firing_skips_events_that_were_missed() {
        let monday = day(DayKey::Monday);
        let mut scheduler = NotificationScheduler::new(5);
        scheduler.arm(&monday, &at(19, 7, 50, 0));
        let late = at(19, 9, 0, 0);
        let taken = scheduler.take_due(&late).expect("overdue");
        let next = scheduler.arm_after(&monday, &taken, &late).expect("armed");
        assert_eq!(next.period_name, "Period 2");
        assert_eq!(next.kind, EventKind::PreBell);
    }
}
