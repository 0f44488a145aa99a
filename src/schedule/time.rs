use std::fmt;

use chrono::{NaiveTime, Timelike};
use thiserror::Error;

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum TimeParseError {
    #[error("invalid time '{0}', expected HH:MM")]
    Malformed(String),
    #[error("time '{0}' is out of range, expected 00:00..23:59")]
    OutOfRange(String),
}

/// Wall-clock minute within a single day, `0..=1439`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MinuteOfDay(u16);

impl MinuteOfDay {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self((hour * 60 + minute) as u16))
    }

    pub fn parse(input: &str) -> Result<Self, TimeParseError> {
        time_to_minutes(input).map(Self)
    }

    pub fn of_time<T: Timelike>(time: &T) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn get(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u32 {
        u32::from(self.0 / 60)
    }

    pub fn minute(self) -> u32 {
        u32::from(self.0 % 60)
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn format_12h(self) -> String {
        let hour12 = (self.hour() + 11) % 12 + 1;
        let meridiem = if self.hour() >= 12 { "PM" } else { "AM" };
        format!("{hour12}:{:02} {meridiem}", self.minute())
    }
}

impl fmt::Display for MinuteOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

pub fn time_to_minutes(input: &str) -> Result<u16, TimeParseError> {
    let malformed = || TimeParseError::Malformed(input.to_string());
    let (hours, minutes) = input.split_once(':').ok_or_else(malformed)?;
    let hours = parse_component(hours).ok_or_else(malformed)?;
    let minutes = parse_component(minutes).ok_or_else(malformed)?;
    MinuteOfDay::from_hm(u32::from(hours), u32::from(minutes))
        .map(MinuteOfDay::get)
        .ok_or_else(|| TimeParseError::OutOfRange(input.to_string()))
}

#[cfg(test)]
pub fn format_hm12(input: &str) -> Result<String, TimeParseError> {
    MinuteOfDay::parse(input).map(MinuteOfDay::format_12h)
}

pub fn format_remaining(minutes: u16) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

fn parse_component(raw: &str) -> Option<u16> {
    if raw.is_empty() || raw.len() > 2 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}
