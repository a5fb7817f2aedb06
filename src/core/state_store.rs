//! Persisted machine state, stored next to the program as `<program>.state`.

use crate::machine::{Machine, MachineError};
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write as _};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const STATE_SUFFIX: &str = ".state";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("state file {path:?}: {source}")]
    Engine {
        path: PathBuf,
        #[source]
        source: MachineError,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn engine(path: &Path, source: MachineError) -> Self {
        Self::Engine {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// `<program>.state`. Pure path arithmetic, no I/O.
pub fn state_path(program: impl AsRef<Path>) -> PathBuf {
    let mut s: OsString = program.as_ref().as_os_str().to_owned();
    s.push(STATE_SUFFIX);
    PathBuf::from(s)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

/// Serialize `machine` to the program's state file, replacing any previous
/// blob. The blob is written to a sibling temp file and renamed into place so
/// a failed save never clobbers the last good state.
pub fn save<M: Machine + ?Sized>(machine: &M, program: &Path) -> Result<PathBuf, StoreError> {
    let path = state_path(program);
    let tmp = temp_path(&path);

    let write = || -> Result<(), StoreError> {
        let file = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        let mut w = BufWriter::new(file);
        machine
            .save_state(&mut w)
            .map_err(|e| StoreError::engine(&tmp, e))?;
        w.flush().map_err(|e| StoreError::io(&tmp, e))?;
        w.get_ref().sync_all().map_err(|e| StoreError::io(&tmp, e))?;
        Ok(())
    };

    if let Err(e) = write() {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(StoreError::io(&path, e));
    }

    info!("State saved to {:?} at frame {}", path, machine.frame_count());
    Ok(path)
}

/// Restore the program's state file into `machine` if one exists.
/// Returns `Ok(false)` when there is nothing to restore.
pub fn restore<M: Machine + ?Sized>(machine: &mut M, program: &Path) -> Result<bool, StoreError> {
    let path = state_path(program);
    let file = match File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(StoreError::io(&path, e)),
    };
    let mut r = BufReader::new(file);
    machine
        .load_state(&mut r)
        .map_err(|e| StoreError::engine(&path, e))?;

    info!("State restored from {:?} at frame {}", path, machine.frame_count());
    Ok(true)
}
