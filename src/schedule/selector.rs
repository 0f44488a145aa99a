use chrono::{Datelike, NaiveDate};

use crate::schedule::model::{DayKey, DaySchedule, ScheduleCatalog};

#[derive(Debug, Clone)]
pub struct ScheduleSelector {
    catalog: ScheduleCatalog,
    override_day: Option<DayKey>,
    empty: DaySchedule,
}

impl ScheduleSelector {
    pub fn new(catalog: ScheduleCatalog) -> Self {
        Self {
            catalog,
            override_day: None,
            empty: DaySchedule::empty(),
        }
    }

    pub fn override_day(&self) -> Option<DayKey> {
        self.override_day
    }

    pub fn set_override(&mut self, day: Option<DayKey>) -> bool {
        let changed = self.override_day != day;
        self.override_day = day;
        changed
    }

    pub fn actual_key(date: NaiveDate) -> Option<DayKey> {
        DayKey::from_weekday(date.weekday())
    }

    pub fn effective_key(&self, date: NaiveDate) -> Option<DayKey> {
        self.override_day.or_else(|| Self::actual_key(date))
    }

    pub fn effective_day(&self, date: NaiveDate) -> &DaySchedule {
        match self.effective_key(date) {
            Some(key) => self.catalog.day(key),
            None => &self.empty,
        }
    }
}
