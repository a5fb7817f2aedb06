//! Scriptable machine for daemon and dispatcher tests.

use crate::input::InputEvent;
use crate::machine::{Boot, Machine, MachineError, Step};
use crate::storage;
use std::cell::{Cell, RefCell};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Counters shared between a boot factory and every machine it creates.
#[derive(Debug, Default)]
pub struct Tally {
    pub boots: Cell<u32>,
    pub save_attempts: Cell<u32>,
    pub stops: Cell<u32>,
    pub inputs: RefCell<Vec<InputEvent>>,
    pub programs: RefCell<Vec<PathBuf>>,
}

#[derive(Debug, Clone, Default)]
pub struct MockBoot {
    pub tally: Rc<Tally>,
    pub fail_boot: bool,
    pub fail_save: bool,
    pub halt_at: Option<u64>,
    pub fault_at: Option<u64>,
}

#[derive(Debug)]
pub struct MockMachine {
    tally: Rc<Tally>,
    frame: u64,
    fail_save: bool,
    halt_at: Option<u64>,
    fault_at: Option<u64>,
}

impl Boot for MockBoot {
    type Machine = MockMachine;

    fn boot(&self, program: &Path) -> Result<MockMachine, MachineError> {
        if self.fail_boot {
            return Err(MachineError::InvalidProgram {
                path: program.to_path_buf(),
                reason: "scripted boot failure".to_string(),
            });
        }
        self.tally.boots.set(self.tally.boots.get() + 1);
        self.tally.programs.borrow_mut().push(program.to_path_buf());
        Ok(MockMachine {
            tally: Rc::clone(&self.tally),
            frame: 0,
            fail_save: self.fail_save,
            halt_at: self.halt_at,
            fault_at: self.fault_at,
        })
    }
}

impl Machine for MockMachine {
    fn send_input(&mut self, event: InputEvent) {
        self.tally.inputs.borrow_mut().push(event);
    }

    fn tick(&mut self) -> Result<Step, MachineError> {
        if self.fault_at == Some(self.frame) {
            return Err(MachineError::Fault {
                frame: self.frame,
                reason: "scripted fault".to_string(),
            });
        }
        if self.halt_at == Some(self.frame) {
            return Ok(Step::Halted);
        }
        self.frame += 1;
        Ok(Step::Continue)
    }

    fn save_state(&self, w: &mut dyn Write) -> Result<(), MachineError> {
        self.tally
            .save_attempts
            .set(self.tally.save_attempts.get() + 1);
        if self.fail_save {
            return Err(io::Error::new(io::ErrorKind::Other, "scripted save failure").into());
        }
        storage::write_u64_le(w, self.frame)?;
        Ok(())
    }

    fn load_state(&mut self, r: &mut dyn Read) -> Result<(), MachineError> {
        self.frame = storage::read_u64_le(r)?;
        Ok(())
    }

    fn stop(&mut self) {
        self.tally.stops.set(self.tally.stops.get() + 1);
    }

    fn frame_count(&self) -> u64 {
        self.frame
    }
}
