//! Reference engine.
//!
//! `Console` is a small deterministic machine: every frame it fetches the
//! next program byte, mixes it with the joypad latch and folds the result
//! into work RAM. It is enough to make the daemon runnable and to observe
//! that a save/restore cycle reproduces the exact execution state.
//!
//! State blob layout (see [`crate::storage`]):
//! - magic `PLSTATE1`, version `u32`
//! - `HEAD`: rom fingerprint `u64`, frame `u64`, cursor `u32`, joypad `u8`
//! - `WRAM`: LZ4-compressed work RAM

use crate::input::InputEvent;
use crate::machine::{Boot, Machine, MachineError, Step};
use crate::storage;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MAGIC: &[u8; 8] = b"PLSTATE1";
pub const VERSION_V1: u32 = 1;
pub const WRAM_SIZE: usize = 8 * 1024;

const TAG_HEAD: [u8; 4] = *b"HEAD";
const TAG_WRAM: [u8; 4] = *b"WRAM";

const PRESS_BASE: u8 = 2;
const RELEASE_BASE: u8 = 10;
const BUTTONS: u8 = 8;

#[derive(Debug, Clone)]
pub struct Console {
    program: PathBuf,
    rom: Vec<u8>,
    fingerprint: u64,
    frame: u64,
    cursor: u32,
    joypad: u8,
    wram: Vec<u8>,
    halt_after: Option<u64>,
    stopped: bool,
}

impl Console {
    pub fn from_rom(program: impl Into<PathBuf>, rom: Vec<u8>) -> Result<Self, MachineError> {
        let program = program.into();
        if rom.is_empty() {
            return Err(MachineError::InvalidProgram {
                path: program,
                reason: "empty program image".to_string(),
            });
        }
        if u32::try_from(rom.len()).is_err() {
            return Err(MachineError::InvalidProgram {
                path: program,
                reason: "program image too large".to_string(),
            });
        }
        let fingerprint = fingerprint(&rom);
        Ok(Self {
            program,
            rom,
            fingerprint,
            frame: 0,
            cursor: 0,
            joypad: 0,
            wram: vec![0u8; WRAM_SIZE],
            halt_after: None,
            stopped: false,
        })
    }

    /// Report `Step::Halted` once `frames` frames have run.
    pub fn with_halt_after(mut self, frames: Option<u64>) -> Self {
        self.halt_after = frames;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Bit per held control, in press-code order (UP is bit 0).
    pub fn joypad(&self) -> u8 {
        self.joypad
    }

    pub fn wram(&self) -> &[u8] {
        &self.wram
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn decode_state(&self, r: &mut dyn Read) -> Result<DecodedState, MachineError> {
        let magic = storage::read_exact::<8, _>(r)?;
        if &magic != MAGIC {
            return Err(MachineError::CorruptState("bad state magic".to_string()));
        }
        let version = storage::read_u32_le(r)?;
        if version != VERSION_V1 {
            return Err(MachineError::CorruptState(format!(
                "unsupported state version {version}"
            )));
        }

        let mut head: Option<Vec<u8>> = None;
        let mut wram: Option<Vec<u8>> = None;
        loop {
            let (tag, len) = match storage::read_chunk_header(r) {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            };
            let payload = storage::read_chunk_payload(r, len)?;
            if tag == TAG_HEAD {
                head = Some(payload);
            } else if tag == TAG_WRAM {
                wram = Some(storage::inflate_chunk_payload(&payload)?);
            } else {
                debug!("skipping unknown state chunk {:?}", String::from_utf8_lossy(&tag));
            }
        }

        let head = head.ok_or_else(|| MachineError::CorruptState("missing HEAD chunk".into()))?;
        let wram = wram.ok_or_else(|| MachineError::CorruptState("missing WRAM chunk".into()))?;

        let mut h = head.as_slice();
        let fingerprint = storage::read_u64_le(&mut h)?;
        let frame = storage::read_u64_le(&mut h)?;
        let cursor = storage::read_u32_le(&mut h)?;
        let joypad = storage::read_exact::<1, _>(&mut h)?[0];

        if fingerprint != self.fingerprint {
            return Err(MachineError::CorruptState(format!(
                "state belongs to a different program (fingerprint {fingerprint:016x}, loaded {:016x})",
                self.fingerprint
            )));
        }
        if cursor as usize >= self.rom.len() {
            return Err(MachineError::CorruptState(format!(
                "program cursor {cursor} outside image of {} bytes",
                self.rom.len()
            )));
        }
        if wram.len() != WRAM_SIZE {
            return Err(MachineError::CorruptState(format!(
                "work RAM is {} bytes, expected {WRAM_SIZE}",
                wram.len()
            )));
        }

        Ok(DecodedState {
            frame,
            cursor,
            joypad,
            wram,
        })
    }
}

struct DecodedState {
    frame: u64,
    cursor: u32,
    joypad: u8,
    wram: Vec<u8>,
}

impl Machine for Console {
    fn send_input(&mut self, event: InputEvent) {
        let code = event.code();
        if (PRESS_BASE..PRESS_BASE + BUTTONS).contains(&code) {
            self.joypad |= 1 << (code - PRESS_BASE);
        } else if (RELEASE_BASE..RELEASE_BASE + BUTTONS).contains(&code) {
            self.joypad &= !(1 << (code - RELEASE_BASE));
        } else {
            warn!("console ignoring unknown input code {event}");
        }
    }

    fn tick(&mut self) -> Result<Step, MachineError> {
        if self.stopped {
            return Ok(Step::Halted);
        }
        if self.halt_after.is_some_and(|n| self.frame >= n) {
            return Ok(Step::Halted);
        }

        let byte = self.rom[self.cursor as usize];
        // Cursor is bounded by rom.len(), which fits in u32.
        self.cursor = ((self.cursor as usize + 1) % self.rom.len()) as u32;

        let mixed = byte ^ self.joypad;
        let idx = (self.frame.wrapping_mul(31) as usize).wrapping_add(byte as usize) % WRAM_SIZE;
        self.wram[idx] = self.wram[idx].wrapping_add(mixed).rotate_left(1);
        self.frame += 1;

        Ok(Step::Continue)
    }

    fn save_state(&self, w: &mut dyn Write) -> Result<(), MachineError> {
        w.write_all(MAGIC)?;
        storage::write_u32_le(w, VERSION_V1)?;

        let mut head = Vec::with_capacity(21);
        storage::write_u64_le(&mut head, self.fingerprint)?;
        storage::write_u64_le(&mut head, self.frame)?;
        storage::write_u32_le(&mut head, self.cursor)?;
        head.push(self.joypad);
        storage::write_chunk(w, TAG_HEAD, &head)?;
        storage::write_chunk_lz4(w, TAG_WRAM, &self.wram)?;
        Ok(())
    }

    fn load_state(&mut self, r: &mut dyn Read) -> Result<(), MachineError> {
        // Decode fully before touching self so a bad blob leaves the machine intact.
        let state = self.decode_state(r)?;
        self.frame = state.frame;
        self.cursor = state.cursor;
        self.joypad = state.joypad;
        self.wram = state.wram;
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped = true;
    }

    fn frame_count(&self) -> u64 {
        self.frame
    }
}

/// Boots [`Console`] machines from program files on disk.
#[derive(Debug, Clone, Default)]
pub struct ConsoleBoot {
    pub halt_after: Option<u64>,
}

impl Boot for ConsoleBoot {
    type Machine = Console;

    fn boot(&self, program: &Path) -> Result<Console, MachineError> {
        let rom = std::fs::read(program).map_err(|source| MachineError::Program {
            path: program.to_path_buf(),
            source,
        })?;
        Ok(Console::from_rom(program, rom)?.with_halt_after(self.halt_after))
    }
}

/// FNV-1a over the program image.
fn fingerprint(rom: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in rom {
        h ^= u64::from(b);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}
