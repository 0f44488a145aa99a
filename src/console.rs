use std::io::BufRead;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::warn;

use crate::engine::runtime::RuntimeHandle;
use crate::engine::snapshot::StatusSnapshot;
use crate::schedule::model::DayKey;

const HELP: &str =
    "commands: override <monday..friday> | clear | sound on|off | test | status | help | quit";

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ConsoleCommand {
    Override(DayKey),
    Clear,
    Sound(bool),
    TestBell,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ConsoleExit {
    Quit,
    EndOfInput,
}

pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let command = match verb.to_ascii_lowercase().as_str() {
        "override" => {
            let day = words.next().ok_or("usage: override <monday..friday>")?;
            ConsoleCommand::Override(DayKey::from_str(day).map_err(|err| err.to_string())?)
        }
        "clear" | "reset" => ConsoleCommand::Clear,
        "sound" => match words.next().map(str::to_ascii_lowercase).as_deref() {
            Some("on") => ConsoleCommand::Sound(true),
            Some("off") => ConsoleCommand::Sound(false),
            _ => return Err("usage: sound on|off".to_string()),
        },
        "test" | "bell" => ConsoleCommand::TestBell,
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{other}' ({HELP})")),
    };
    Ok(Some(command))
}

pub fn run_console(
    input: impl BufRead,
    runtime: &RuntimeHandle,
    snapshot: &Arc<Mutex<StatusSnapshot>>,
) -> Result<ConsoleExit> {
    println!("{HELP}");
    for line in input.lines() {
        let line = line.context("failed to read console input")?;
        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Override(day))) => runtime.set_override(Some(day))?,
            Ok(Some(ConsoleCommand::Clear)) => runtime.set_override(None)?,
            Ok(Some(ConsoleCommand::Sound(enabled))) => runtime.set_sound(enabled)?,
            Ok(Some(ConsoleCommand::TestBell)) => runtime.test_bell()?,
            Ok(Some(ConsoleCommand::Status)) => match snapshot.lock() {
                Ok(guard) => println!("{}", status_line(&guard)),
                Err(_) => warn!("status snapshot lock poisoned"),
            },
            Ok(Some(ConsoleCommand::Help)) => println!("{HELP}"),
            Ok(Some(ConsoleCommand::Quit)) => return Ok(ConsoleExit::Quit),
            Err(message) => println!("{message}"),
        }
    }
    Ok(ConsoleExit::EndOfInput)
}

pub fn status_line(snapshot: &StatusSnapshot) -> String {
    let day = snapshot
        .effective_day
        .map(DayKey::label)
        .unwrap_or("no school");
    let override_note = if snapshot.override_day.is_some() {
        " (override)"
    } else {
        ""
    };
    let position = match (&snapshot.current, &snapshot.next) {
        (Some(current), _) => format!(
            "{} until {} ({} left)",
            current.name, current.end_12h, snapshot.remaining_label
        ),
        (None, Some(next)) => format!("break, {} at {}", next.name, next.start_12h),
        (None, None) => "no more periods today".to_string(),
    };
    format!("{day}{override_note}: {position}")
}
