use crate::schedule::lookup::PeriodInfo;
use crate::schedule::time::MinuteOfDay;

/// What the clock sampler last saw: a named period or the gap between them.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PeriodIdentity {
    Break,
    Named(String),
}

impl PeriodIdentity {
    fn of(info: &PeriodInfo<'_>) -> Self {
        match info.current {
            Some(period) => PeriodIdentity::Named(period.name.clone()),
            None => PeriodIdentity::Break,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LiveAlert {
    MinutesRemaining { period: String, minutes: u16 },
    PeriodEnded { period: String },
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct LiveAlertState {
    last_period: Option<PeriodIdentity>,
    last_period_end: Option<MinuteOfDay>,
    notified_warning: bool,
    notified_end: bool,
}

impl LiveAlertState {
    pub fn entering(identity: PeriodIdentity, period_end: Option<MinuteOfDay>) -> Self {
        Self {
            last_period: Some(identity),
            last_period_end: period_end,
            notified_warning: false,
            notified_end: false,
        }
    }

    pub fn observe(
        &mut self,
        info: &PeriodInfo<'_>,
        now: MinuteOfDay,
        warning_minutes: u16,
    ) -> Vec<LiveAlert> {
        let mut alerts = Vec::new();
        let identity = PeriodIdentity::of(info);

        if self.last_period.as_ref() != Some(&identity) {
            if let Some(period) = self.ended_period(now) {
                self.notified_end = true;
                alerts.push(LiveAlert::PeriodEnded { period });
            }
            *self = Self::entering(identity, info.current.map(|period| period.end));
        }

        if let Some(current) = info.current
            && info.is_active
            && info.minutes_remaining == warning_minutes
            && !self.notified_warning
        {
            self.notified_warning = true;
            alerts.push(LiveAlert::MinutesRemaining {
                period: current.name.clone(),
                minutes: warning_minutes,
            });
        }
        alerts
    }

    // A period counts as ended only when the clock has reached its end,
    // not when an override swapped it out from under us.
    fn ended_period(&self, now: MinuteOfDay) -> Option<String> {
        let Some(PeriodIdentity::Named(name)) = &self.last_period else {
            return None;
        };
        let end = self.last_period_end?;
        (!self.notified_end && now >= end).then(|| name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::lookup::lookup;
    use crate::schedule::model::{DayKey, DaySchedule, builtin_schedule_config};

    fn day(key: DayKey) -> DaySchedule {
        builtin_schedule_config()
            .expect("built-in")
            .catalog
            .day(key)
            .clone()
    }

    fn at(hhmm: &str) -> MinuteOfDay {
        MinuteOfDay::parse(hhmm).expect("valid")
    }

    fn sample(state: &mut LiveAlertState, day: &DaySchedule, hhmm: &str) -> Vec<LiveAlert> {
        let now = at(hhmm);
        state.observe(&lookup(day, now), now, 5)
    }

    #[test]
    fn warning_fires_once_across_repeated_samples() {
        let monday = day(DayKey::Monday);
        let mut state = LiveAlertState::default();
        assert!(sample(&mut state, &monday, "08:44").is_empty());
        let alerts = sample(&mut state, &monday, "08:45");
        assert_eq!(
            alerts,
            vec![LiveAlert::MinutesRemaining {
                period: "Period 1".to_string(),
                minutes: 5
            }]
        );
        for _ in 0..59 {
            assert!(sample(&mut state, &monday, "08:45").is_empty());
        }
        assert!(sample(&mut state, &monday, "08:46").is_empty());
    }

    #[test]
    fn end_fires_on_transition_into_the_gap() {
        let monday = day(DayKey::Monday);
        let mut state = LiveAlertState::default();
        sample(&mut state, &monday, "08:49");
        let alerts = sample(&mut state, &monday, "08:50");
        assert_eq!(
            alerts,
            vec![LiveAlert::PeriodEnded {
                period: "Period 1".to_string()
            }]
        );
        assert_eq!(state.last_period.as_ref(), Some(&PeriodIdentity::Break));
        assert!(sample(&mut state, &monday, "08:50").is_empty());
        assert!(sample(&mut state, &monday, "08:54").is_empty());
    }

    #[test]
    fn flags_reset_when_the_period_changes() {
        let monday = day(DayKey::Monday);
        let mut state = LiveAlertState::default();
        sample(&mut state, &monday, "09:05");
        assert_eq!(
            state.last_period.as_ref(),
            Some(&PeriodIdentity::Named("MM/SOAR".to_string()))
        );
        assert_eq!(sample(&mut state, &monday, "09:05"), vec![]);
        assert_eq!(sample(&mut state, &monday, "09:10").len(), 1);
        let alerts = sample(&mut state, &monday, "10:00");
        assert_eq!(
            alerts,
            vec![LiveAlert::MinutesRemaining {
                period: "Period 2".to_string(),
                minutes: 5
            }]
        );
    }

    #[test]
    fn first_observation_never_reports_an_end() {
        let monday = day(DayKey::Monday);
        let mut state = LiveAlertState::default();
        assert!(sample(&mut state, &monday, "12:00").is_empty());
        let mut state = LiveAlertState::default();
        assert!(sample(&mut state, &monday, "16:00").is_empty());
    }

    #[test]
    fn override_swap_mid_period_does_not_report_an_end() {
        let monday = day(DayKey::Monday);
        let tuesday = day(DayKey::Tuesday);
        let mut state = LiveAlertState::default();
        sample(&mut state, &monday, "08:30");
        sample(&mut state, &monday, "08:52");
        let alerts = sample(&mut state, &tuesday, "08:52");
        assert!(alerts.is_empty(), "{alerts:?}");
        assert_eq!(
            state.last_period.as_ref(),
            Some(&PeriodIdentity::Named("Period 1".to_string()))
        );
    }

    #[test]
    fn back_to_back_periods_report_end_then_warning_independently() {
        let day = DaySchedule::new(vec![
            crate::schedule::model::Period::new("A", "09:00", "09:30").expect("A"),
            crate::schedule::model::Period::new("B", "09:30", "09:35").expect("B"),
        ])
        .expect("day");
        let mut state = LiveAlertState::default();
        sample(&mut state, &day, "09:29");
        let alerts = sample(&mut state, &day, "09:30");
        assert_eq!(
            alerts,
            vec![
                LiveAlert::PeriodEnded {
                    period: "A".to_string()
                },
                LiveAlert::MinutesRemaining {
                    period: "B".to_string(),
                    minutes: 5
                },
            ]
        );
    }
}
