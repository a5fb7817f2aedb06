//! Engine contract.
//!
//! The daemon never looks inside the emulated machine. It needs to inject
//! input codes, advance exactly one frame, serialize and restore the full
//! execution state, and stop the machine. [`Boot`] constructs a machine for a
//! program file; the daemon calls it once per `load`.

use crate::input::InputEvent;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Outcome of advancing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// The engine asked to shut down (window closed, power off, ...).
    Halted,
}

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("failed to read program {path:?}: {source}")]
    Program {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid program {path:?}: {reason}")]
    InvalidProgram { path: PathBuf, reason: String },

    #[error("corrupt state: {0}")]
    CorruptState(String),

    #[error("state i/o: {0}")]
    StateIo(#[from] io::Error),

    #[error("engine fault at frame {frame}: {reason}")]
    Fault { frame: u64, reason: String },
}

pub trait Machine {
    /// Hand one input code to the engine. Takes effect on the next frame.
    fn send_input(&mut self, event: InputEvent);

    /// Advance exactly one frame.
    fn tick(&mut self) -> Result<Step, MachineError>;

    /// Write the full execution state.
    fn save_state(&self, w: &mut dyn Write) -> Result<(), MachineError>;

    /// Replace the execution state with one produced by [`Machine::save_state`].
    fn load_state(&mut self, r: &mut dyn Read) -> Result<(), MachineError>;

    /// Release engine resources. The machine is not ticked afterwards.
    fn stop(&mut self);

    /// Frames advanced since power-on, including frames restored from state.
    fn frame_count(&self) -> u64;
}

/// Constructs machines bound to a program file.
pub trait Boot {
    type Machine: Machine;

    fn boot(&self, program: &Path) -> Result<Self::Machine, MachineError>;
}

impl<B: Boot + ?Sized> Boot for &B {
    type Machine = B::Machine;

    fn boot(&self, program: &Path) -> Result<Self::Machine, MachineError> {
        (**self).boot(program)
    }
}
