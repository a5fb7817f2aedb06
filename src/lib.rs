//! # padlink
//!
//! Chat-driven control of a running console emulator.
//!
//! Remote users type short commands (`a`, `start`, `<`, `load`, `quit`, ...)
//! into a chat channel. Each command is classified into a [`SymbolicAction`],
//! routed against the daemon's lifecycle state, and either drives the
//! lifecycle (load / save-and-stop / stop / kill) or becomes a press/release
//! pair queued for injection at the next frame boundaries.
//!
//! ## Quick Start
//!
//! ```no_run
//! use padlink::prelude::*;
//!
//! let mut daemon = Daemon::new(ConsoleBoot::default(), DrainPolicy::Fifo);
//! let dispatcher = Dispatcher::new("games/foo.rom");
//!
//! dispatcher.dispatch(&mut daemon, classify("load"));
//! dispatcher.dispatch(&mut daemon, classify("a"));
//! for _ in 0..60 {
//!     daemon.tick().ok();
//! }
//! // Saves to games/foo.rom.state, then stops.
//! dispatcher.dispatch(&mut daemon, classify("quit"));
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): serialization of actions/status and the [`protocol`]
//!   module used by `padlinkd` and `padlink-cli`.
//!
//! ## Modules
//!
//! - [`action`]: command classifier
//! - [`input`]: low-level input codes and the input queue
//! - [`machine`]: engine contract
//! - [`console`]: reference engine
//! - [`storage`]: chunked binary helpers
//! - [`state_store`]: `<program>.state` persistence
//! - [`daemon`]: the emulation control daemon
//! - [`dispatch`]: command routing

#[path = "core/action.rs"]
pub mod action;

#[path = "core/input.rs"]
pub mod input;

#[path = "core/machine.rs"]
pub mod machine;

#[path = "core/console.rs"]
pub mod console;

#[path = "core/storage.rs"]
pub mod storage;

#[path = "core/state_store.rs"]
pub mod state_store;

#[path = "core/daemon.rs"]
pub mod daemon;

#[path = "core/dispatch.rs"]
pub mod dispatch;

#[cfg(feature = "serde")]
pub mod protocol;

#[cfg(test)]
#[path = "core/testing.rs"]
pub(crate) mod testing;

pub use action::{classify, normalize, SymbolicAction};

/// Prelude module for convenient imports.
///
/// ```
/// use padlink::prelude::*;
/// ```
pub mod prelude {
    pub use crate::action::{classify, normalize, Button, Control, SymbolicAction};
    pub use crate::console::{Console, ConsoleBoot};
    pub use crate::daemon::{Daemon, DaemonState, TickOutcome};
    pub use crate::dispatch::{route, Dispatcher, Flow, Route};
    pub use crate::input::{DrainPolicy, InputEvent, InputPair, InputQueue};
    pub use crate::machine::{Boot, Machine, MachineError, Step};
    pub use crate::state_store::{state_path, StoreError};
}
