mod api;
mod clock;
mod console;
mod diagnostics;
mod engine;
mod notify;
mod schedule;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::{info, warn};

use crate::api::{ApiServer, ApiServerConfig};
use crate::clock::select_clock;
use crate::console::ConsoleExit;
use crate::engine::bell::BellEngine;
use crate::engine::runtime::BellRuntime;
use crate::notify::ConsoleNotifier;
use crate::notify::chime::{ChimePlayer, TerminalBell};
use crate::schedule::model::{DayKey, builtin_schedule_config, load_schedule_config};
use crate::schedule::selector::ScheduleSelector;

#[derive(Parser, Debug)]
#[command(
    name = "bellschedule",
    version,
    about = "School bell schedule engine with pre-bell notifications"
)]
struct Cli {
    #[arg(long)]
    schedule: Option<PathBuf>,

    #[arg(long = "override", value_name = "DAY")]
    override_day: Option<DayKey>,

    #[arg(long, value_name = "DATETIME")]
    simulate_at: Option<String>,

    #[arg(long)]
    no_chime: bool,

    #[arg(long, value_name = "PATH")]
    chime_file: Option<PathBuf>,

    #[arg(long)]
    diagnostics: bool,

    #[arg(long, default_value = "0.0.0.0")]
    api_bind: String,

    #[arg(long, default_value_t = 8099)]
    api_port: u16,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    api_enabled: bool,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    mdns_enabled: bool,

    #[arg(long, default_value = "bellschedule")]
    mdns_instance: String,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match cli.schedule.as_deref() {
        Some(path) => load_schedule_config(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => builtin_schedule_config()?,
    };
    info!(
        "schedule config v{} loaded from {}",
        config.version,
        cli.schedule
            .as_deref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "built-in catalog".to_string())
    );

    let mut settings = config.settings;
    if cli.no_chime {
        settings.sound_enabled = false;
    }
    let selected = select_clock(cli.simulate_at.as_deref())?;
    if let Some(note) = selected.note.as_deref() {
        info!("{note}");
    }
    let mut selector = ScheduleSelector::new(config.catalog);
    selector.set_override(cli.override_day);

    if cli.diagnostics {
        diagnostics::run_diagnostics(&selected, &selector, &settings)?;
        return Ok(());
    }

    let chime = build_chime(&cli);
    let tick = Duration::from_millis(settings.tick_ms);
    let engine = BellEngine::new(selector, settings, Box::new(ConsoleNotifier), chime);
    let runtime = BellRuntime::start(engine, Arc::clone(&selected.clock), tick)?;

    let api_server = if cli.api_enabled {
        let server = ApiServer::start(
            ApiServerConfig {
                bind_addr: cli.api_bind.clone(),
                port: cli.api_port,
                mdns_enabled: cli.mdns_enabled,
                mdns_instance: cli.mdns_instance.clone(),
            },
            Arc::clone(&runtime.snapshot),
            runtime.handle(),
            config.departments,
        )
        .with_context(|| {
            format!(
                "failed to start local API at {}:{}",
                cli.api_bind, cli.api_port
            )
        })?;
        Some(server)
    } else {
        None
    };

    let exit = console::run_console(std::io::stdin().lock(), &runtime.handle(), &runtime.snapshot)?;
    if exit == ConsoleExit::EndOfInput {
        info!("console input closed; running until the process is stopped");
        runtime.wait();
    } else {
        drop(runtime);
    }
    drop(api_server);
    Ok(())
}

// Built even when sound starts disabled; it can be switched on at runtime.
fn build_chime(cli: &Cli) -> Box<dyn ChimePlayer> {
    #[cfg(feature = "audio")]
    {
        match crate::notify::chime::RodioChime::new(cli.chime_file.clone()) {
            Ok(player) => return Box::new(player),
            Err(err) => warn!("audio chime unavailable, using terminal bell: {err}"),
        }
    }

    #[cfg(not(feature = "audio"))]
    {
        if let Some(path) = cli.chime_file.as_deref() {
            warn!(
                "ignoring --chime-file {}: built without the `audio` feature",
                path.display()
            );
        }
    }

    Box::new(TerminalBell)
}
