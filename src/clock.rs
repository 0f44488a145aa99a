use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
    fn label(&self) -> &'static str;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn label(&self) -> &'static str {
        "SYSTEM"
    }
}

/// Wall clock shifted so that it read `start` when it was created, then
/// advances in real time.
pub struct OffsetClock {
    offset: chrono::Duration,
}

impl OffsetClock {
    pub fn starting_at(start: DateTime<Local>) -> Self {
        Self {
            offset: start - Local::now(),
        }
    }
}

impl Clock for OffsetClock {
    fn now(&self) -> DateTime<Local> {
        Local::now() + self.offset
    }

    fn label(&self) -> &'static str {
        "SIMULATED"
    }
}

pub struct SelectedClock {
    pub clock: Arc<dyn Clock>,
    pub label: &'static str,
    pub note: Option<String>,
}

pub fn select_clock(simulate_at: Option<&str>) -> Result<SelectedClock> {
    let Some(raw) = simulate_at else {
        return Ok(SelectedClock {
            clock: Arc::new(SystemClock),
            label: SystemClock.label(),
            note: None,
        });
    };

    let naive = parse_simulated_start(raw)?;
    let start = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| anyhow!("simulated time {naive} does not exist in the local timezone"))?;
    let clock = OffsetClock::starting_at(start);
    let label = clock.label();
    Ok(SelectedClock {
        clock: Arc::new(clock),
        label,
        note: Some(format!("clock simulated from {}", start.to_rfc3339())),
    })
}

fn parse_simulated_start(input: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M"))
        .with_context(|| {
            format!("invalid --simulate-at '{input}', expected YYYY-MM-DDTHH:MM[:SS]")
        })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use chrono::{DateTime, Local};

    use super::Clock;

    pub struct ManualClock {
        now: Mutex<DateTime<Local>>,
    }

    impl ManualClock {
        pub fn new(now: DateTime<Local>) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        pub fn set(&self, now: DateTime<Local>) {
            *self.now.lock().expect("clock lock") = now;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Local> {
            *self.now.lock().expect("clock lock")
        }

        fn label(&self) -> &'static str {
            "MANUAL"
        }
    }
}
