use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schedule::events::DEFAULT_PREBELL_MINUTES;
use crate::schedule::time::{MinuteOfDay, TimeParseError};

pub const BUILTIN_SCHEDULE_JSON: &str = include_str!("../../schedule.json");

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ScheduleError {
    #[error("period '{name}': {source}")]
    InvalidTime {
        name: String,
        #[source]
        source: TimeParseError,
    },
    #[error("period '{name}' must start before it ends ({start} >= {end})")]
    EmptyPeriod {
        name: String,
        start: MinuteOfDay,
        end: MinuteOfDay,
    },
    #[error("period '{name}' starts at {start}, before '{previous}' ends at {previous_end}")]
    Overlap {
        name: String,
        start: MinuteOfDay,
        previous: String,
        previous_end: MinuteOfDay,
    },
    #[error("duplicate period name '{0}'")]
    DuplicateName(String),
    #[error("unknown day '{0}', expected monday..friday")]
    UnknownDay(String),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DayKey {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl DayKey {
    pub const ALL: [DayKey; 5] = [
        DayKey::Monday,
        DayKey::Tuesday,
        DayKey::Wednesday,
        DayKey::Thursday,
        DayKey::Friday,
    ];

    pub fn from_weekday(day: Weekday) -> Option<Self> {
        match day {
            Weekday::Mon => Some(DayKey::Monday),
            Weekday::Tue => Some(DayKey::Tuesday),
            Weekday::Wed => Some(DayKey::Wednesday),
            Weekday::Thu => Some(DayKey::Thursday),
            Weekday::Fri => Some(DayKey::Friday),
            Weekday::Sat | Weekday::Sun => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DayKey::Monday => "monday",
            DayKey::Tuesday => "tuesday",
            DayKey::Wednesday => "wednesday",
            DayKey::Thursday => "thursday",
            DayKey::Friday => "friday",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DayKey::Monday => "Monday",
            DayKey::Tuesday => "Tuesday",
            DayKey::Wednesday => "Wednesday",
            DayKey::Thursday => "Thursday",
            DayKey::Friday => "Friday",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayKey {
    type Err = ScheduleError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_ascii_lowercase();
        DayKey::ALL
            .into_iter()
            .find(|day| day.as_str() == normalized)
            .ok_or_else(|| ScheduleError::UnknownDay(input.to_string()))
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Period {
    pub name: String,
    pub start: MinuteOfDay,
    pub end: MinuteOfDay,
}

impl Period {
    pub fn new(name: &str, start: &str, end: &str) -> Result<Self, ScheduleError> {
        let parse = |raw: &str| {
            MinuteOfDay::parse(raw).map_err(|source| ScheduleError::InvalidTime {
                name: name.to_string(),
                source,
            })
        };
        let start = parse(start)?;
        let end = parse(end)?;
        if start >= end {
            return Err(ScheduleError::EmptyPeriod {
                name: name.to_string(),
                start,
                end,
            });
        }
        Ok(Self {
            name: name.to_string(),
            start,
            end,
        })
    }

    pub fn contains(&self, minute: MinuteOfDay) -> bool {
        self.start <= minute && minute < self.end
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct DaySchedule {
    periods: Vec<Period>,
}

impl DaySchedule {
    pub fn new(periods: Vec<Period>) -> Result<Self, ScheduleError> {
        for (index, period) in periods.iter().enumerate() {
            if periods[..index].iter().any(|other| other.name == period.name) {
                return Err(ScheduleError::DuplicateName(period.name.clone()));
            }
            if index == 0 {
                continue;
            }
            let previous = &periods[index - 1];
            if period.start < previous.end {
                return Err(ScheduleError::Overlap {
                    name: period.name.clone(),
                    start: period.start,
                    previous: previous.name.clone(),
                    previous_end: previous.end,
                });
            }
        }
        Ok(Self { periods })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleCatalog {
    days: [DaySchedule; 5],
}

impl ScheduleCatalog {
    pub fn new(days: [DaySchedule; 5]) -> Self {
        Self { days }
    }

    pub fn day(&self, key: DayKey) -> &DaySchedule {
        &self.days[key.index()]
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DepartmentTable {
    pub columns: Vec<String>,
    pub rows: Vec<DepartmentRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentRow {
    pub period: String,
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub sound_enabled: bool,
    pub prebell_minutes: u16,
    pub warning_minutes: u16,
    pub tick_ms: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            prebell_minutes: default_lead_minutes(),
            warning_minutes: default_lead_minutes(),
            tick_ms: default_tick_ms(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub version: u32,
    pub settings: ScheduleSettings,
    pub catalog: ScheduleCatalog,
    pub departments: DepartmentTable,
}

pub fn load_schedule_config(path: &Path) -> Result<ScheduleConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read schedule file {}", path.display()))?;
    parse_schedule_config_text(&content)
}

pub fn builtin_schedule_config() -> Result<ScheduleConfig> {
    parse_schedule_config_text(BUILTIN_SCHEDULE_JSON).context("built-in schedule is invalid")
}

pub fn parse_schedule_config_text(content: &str) -> Result<ScheduleConfig> {
    let raw = serde_json::from_str::<ScheduleConfigFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    if raw.version != 1 {
        bail!(
            "unsupported schedule config version {}; expected version 1",
            raw.version
        );
    }
    for (label, value) in [
        ("prebell_minutes", raw.settings.prebell_minutes),
        ("warning_minutes", raw.settings.warning_minutes),
    ] {
        if !(1..=60).contains(&value) {
            bail!("{label} must be between 1 and 60, got {value}");
        }
    }
    if raw.settings.tick_ms == 0 {
        bail!("tick_ms must be greater than zero");
    }

    let mut days: [DaySchedule; 5] = Default::default();
    for (key, periods) in raw.days {
        let day = key.parse::<DayKey>()?;
        let periods = periods
            .into_iter()
            .map(|period| Period::new(&period.name, &period.start, &period.end))
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("invalid schedule for {key}"))?;
        days[day.index()] =
            DaySchedule::new(periods).with_context(|| format!("invalid schedule for {key}"))?;
    }

    let departments = match raw.departments {
        Some(table) => {
            for row in &table.rows {
                if row.subjects.len() != table.columns.len() {
                    bail!(
                        "department row '{}' has {} subjects for {} columns",
                        row.period,
                        row.subjects.len(),
                        table.columns.len()
                    );
                }
            }
            DepartmentTable {
                columns: table.columns,
                rows: table
                    .rows
                    .into_iter()
                    .map(|row| DepartmentRow {
                        period: row.period,
                        subjects: row.subjects,
                    })
                    .collect(),
            }
        }
        None => DepartmentTable::default(),
    };

    Ok(ScheduleConfig {
        version: raw.version,
        settings: ScheduleSettings {
            sound_enabled: raw.settings.sound_enabled,
            prebell_minutes: raw.settings.prebell_minutes,
            warning_minutes: raw.settings.warning_minutes,
            tick_ms: raw.settings.tick_ms,
        },
        catalog: ScheduleCatalog::new(days),
        departments,
    })
}

#[derive(Debug, Deserialize)]
struct ScheduleConfigFile {
    version: u32,
    #[serde(default)]
    settings: ScheduleSettingsFile,
    days: BTreeMap<String, Vec<PeriodFile>>,
    #[serde(default)]
    departments: Option<DepartmentTableFile>,
}

#[derive(Debug, Deserialize)]
struct ScheduleSettingsFile {
    #[serde(default = "default_sound_enabled")]
    sound_enabled: bool,
    #[serde(default = "default_lead_minutes")]
    prebell_minutes: u16,
    #[serde(default = "default_lead_minutes")]
    warning_minutes: u16,
    #[serde(default = "default_tick_ms")]
    tick_ms: u64,
}

impl Default for ScheduleSettingsFile {
    fn default() -> Self {
        Self {
            sound_enabled: default_sound_enabled(),
            prebell_minutes: default_lead_minutes(),
            warning_minutes: default_lead_minutes(),
            tick_ms: default_tick_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PeriodFile {
    name: String,
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
struct DepartmentTableFile {
    columns: Vec<String>,
    rows: Vec<DepartmentRowFile>,
}

#[derive(Debug, Deserialize)]
struct DepartmentRowFile {
    period: String,
    subjects: Vec<String>,
}

fn default_sound_enabled() -> bool {
    true
}

fn default_lead_minutes() -> u16 {
    DEFAULT_PREBELL_MINUTES
}

fn default_tick_ms() -> u64 {
    1_000
}
