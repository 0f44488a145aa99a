use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{debug, warn};

use crate::clock::Clock;
use crate::engine::bell::BellEngine;
use crate::engine::snapshot::StatusSnapshot;
use crate::schedule::model::DayKey;

#[derive(Debug)]
enum RuntimeCommand {
    SetOverride(Option<DayKey>),
    SetSound(bool),
    TestBell,
    Shutdown,
}

#[derive(Clone)]
pub struct RuntimeHandle {
    tx: Sender<RuntimeCommand>,
}

impl RuntimeHandle {
    pub fn set_override(&self, day: Option<DayKey>) -> Result<()> {
        self.send(RuntimeCommand::SetOverride(day))
    }

    pub fn set_sound(&self, enabled: bool) -> Result<()> {
        self.send(RuntimeCommand::SetSound(enabled))
    }

    pub fn test_bell(&self) -> Result<()> {
        self.send(RuntimeCommand::TestBell)
    }

    fn send(&self, command: RuntimeCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| anyhow!("bell runtime is not running"))
    }
}

pub struct BellRuntime {
    pub snapshot: Arc<Mutex<StatusSnapshot>>,
    handle: RuntimeHandle,
    join: Option<JoinHandle<()>>,
}

impl BellRuntime {
    pub fn start(engine: BellEngine, clock: Arc<dyn Clock>, tick: Duration) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let snapshot = Arc::new(Mutex::new(StatusSnapshot::default()));
        let snapshot_for_thread = Arc::clone(&snapshot);
        let join = thread::Builder::new()
            .name("bell-runtime".to_string())
            .spawn(move || run_loop(engine, clock, tick, rx, snapshot_for_thread))
            .map_err(|err| anyhow!("failed to spawn bell runtime: {err}"))?;
        Ok(Self {
            snapshot,
            handle: RuntimeHandle { tx },
            join: Some(join),
        })
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn wait(mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for BellRuntime {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(RuntimeCommand::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn run_loop(
    mut engine: BellEngine,
    clock: Arc<dyn Clock>,
    tick: Duration,
    rx: Receiver<RuntimeCommand>,
    snapshot: Arc<Mutex<StatusSnapshot>>,
) {
    let now = clock.now();
    engine.start(now);
    engine.tick(now);
    publish(&engine, clock.as_ref(), &snapshot);

    loop {
        let wait = engine.next_wake(clock.now(), tick);
        match rx.recv_timeout(wait) {
            Ok(RuntimeCommand::SetOverride(day)) => {
                engine.set_override(day, clock.now());
            }
            Ok(RuntimeCommand::SetSound(enabled)) => {
                engine.set_sound(enabled);
            }
            Ok(RuntimeCommand::TestBell) => engine.test_bell(),
            Ok(RuntimeCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        let outcome = engine.tick(clock.now());
        if !outcome.fired.is_empty() || outcome.live_alerts > 0 {
            debug!(
                "tick fired {:?}, {} live alerts, rearmed {}",
                outcome.fired, outcome.live_alerts, outcome.rearmed
            );
        }
        publish(&engine, clock.as_ref(), &snapshot);
    }

    engine.shutdown();
    debug!("bell runtime stopped");
}

fn publish(engine: &BellEngine, clock: &dyn Clock, snapshot: &Arc<Mutex<StatusSnapshot>>) {
    let next = engine.snapshot(clock.now(), clock.label());
    match snapshot.lock() {
        Ok(mut guard) => *guard = next,
        Err(_) => warn!("status snapshot lock poisoned, skipping publish"),
    }
}
