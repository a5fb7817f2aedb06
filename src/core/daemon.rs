//! Emulation control daemon.
//!
//! Owns at most one machine, the pending-input queue and the lifecycle
//! state. Everything here is synchronous: the caller (the `padlinkd` tick
//! task, or a test) decides when to call [`Daemon::tick`], and is the only
//! code that touches the machine, so no locking is needed.
//!
//! Lifecycle:
//! - `NotRunning --load--> Running`
//! - `Running --quit|exit|engine halt|engine fault--> NotRunning`
//!
//! Precondition violations (`load` while running, `quit` while stopped, ...)
//! are no-ops, since commands arrive from untrusted chat input.

use crate::input::{DrainPolicy, InputEvent, InputPair, InputQueue};
use crate::machine::{Boot, Machine, MachineError, Step};
use crate::state_store::{self, StoreError};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Target frame rate of the tick loop.
pub const FPS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DaemonState {
    #[default]
    NotRunning,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A machine is already running; nothing changed.
    AlreadyRunning,
    Started { restored: bool },
}

#[derive(Debug)]
pub enum Stopped {
    /// Nothing was running.
    NotRunning,
    Saved(PathBuf),
    /// The save failed; the machine was stopped anyway.
    SaveFailed(StoreError),
    /// Stopped without saving.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running; nothing happened.
    Idle,
    /// One frame advanced, with the input injected before it (if any).
    Advanced { injected: Option<InputEvent> },
    /// The engine asked to shut down; the daemon is now `NotRunning`.
    Halted,
}

struct Session<M> {
    machine: M,
    program: PathBuf,
    frames: u64,
}

pub struct Daemon<B: Boot> {
    boot: B,
    session: Option<Session<B::Machine>>,
    queue: InputQueue,
}

impl<B: Boot> Daemon<B> {
    pub fn new(boot: B, policy: DrainPolicy) -> Self {
        Self {
            boot,
            session: None,
            queue: InputQueue::new(policy),
        }
    }

    pub fn state(&self) -> DaemonState {
        if self.session.is_some() {
            DaemonState::Running
        } else {
            DaemonState::NotRunning
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn program_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.program.as_path())
    }

    /// Frames advanced since the current session was loaded.
    pub fn frames(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.frames)
    }

    pub fn machine(&self) -> Option<&B::Machine> {
        self.session.as_ref().map(|s| &s.machine)
    }

    pub fn queue(&self) -> &InputQueue {
        &self.queue
    }

    /// Boot a fresh machine for `program` and restore `<program>.state` if
    /// present. Ignored while running. A state file that cannot be restored
    /// is logged and the session starts from power-on.
    pub fn load(&mut self, program: impl AsRef<Path>) -> Result<LoadOutcome, MachineError> {
        let program = program.as_ref();
        if let Some(session) = &self.session {
            debug!(
                "load({:?}) ignored; {:?} already running",
                program, session.program
            );
            return Ok(LoadOutcome::AlreadyRunning);
        }

        let mut machine = self.boot.boot(program)?;
        let restored = match state_store::restore(&mut machine, program) {
            Ok(restored) => restored,
            Err(e) => {
                warn!("Could not restore state: {}", e);
                info!("Starting {:?} from power-on", program);
                // The failed restore may have left the machine half-written.
                machine = self.boot.boot(program)?;
                false
            }
        };

        self.queue.clear();
        self.session = Some(Session {
            machine,
            program: program.to_path_buf(),
            frames: 0,
        });
        info!("Loaded {:?} (restored state: {})", program, restored);
        Ok(LoadOutcome::Started { restored })
    }

    /// One scheduling step: inject at most one queued event, then advance
    /// exactly one frame. An engine fault stops the session and is returned.
    pub fn tick(&mut self) -> Result<TickOutcome, MachineError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(TickOutcome::Idle);
        };

        let injected = self.queue.drain_one();
        if let Some(event) = injected {
            session.machine.send_input(event);
        }

        match session.machine.tick() {
            Ok(Step::Continue) => {
                session.frames += 1;
                Ok(TickOutcome::Advanced { injected })
            }
            Ok(Step::Halted) => {
                info!(
                    "Engine halted {:?} after {} frames",
                    session.program, session.frames
                );
                self.end_session();
                Ok(TickOutcome::Halted)
            }
            Err(e) => {
                error!("Engine fault in {:?}: {}", session.program, e);
                self.end_session();
                Err(e)
            }
        }
    }

    /// Save state to `<program>.state`, then stop. The stop happens even if
    /// the save fails.
    pub fn quit(&mut self) -> Stopped {
        let Some(session) = self.session.as_ref() else {
            debug!("quit ignored; not running");
            return Stopped::NotRunning;
        };

        let outcome = match state_store::save(&session.machine, &session.program) {
            Ok(path) => Stopped::Saved(path),
            Err(e) => {
                error!("✗ Save FAILED, stopping without state: {}", e);
                Stopped::SaveFailed(e)
            }
        };
        self.end_session();
        outcome
    }

    /// Stop without saving.
    pub fn exit(&mut self) -> Stopped {
        if self.session.is_none() {
            debug!("exit ignored; not running");
            return Stopped::NotRunning;
        }
        self.end_session();
        Stopped::Discarded
    }

    /// Queue a press/release pair for injection. No-op while not running.
    pub fn buffer_press_and_release(&mut self, press: InputEvent, release: InputEvent) -> bool {
        if self.session.is_none() {
            debug!("input {}/{} dropped; not running", press, release);
            return false;
        }
        self.queue.enqueue_press_release(press, release);
        true
    }

    pub fn buffer_pair(&mut self, pair: InputPair) -> bool {
        self.buffer_press_and_release(pair.press, pair.release)
    }

    fn end_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.machine.stop();
            info!(
                "Stopped {:?} after {} frames",
                session.program, session.frames
            );
        }
        self.queue.clear();
    }
}

impl<B: Boot + std::fmt::Debug> std::fmt::Debug for Daemon<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("boot", &self.boot)
            .field("state", &self.state())
            .field("program", &self.program_path())
            .field("frames", &self.frames())
            .field("queued", &self.queue.len())
            .finish()
    }
}
