//! Command routing.
//!
//! [`route`] is the whole routing table: it decides, from the classified
//! action and the daemon's lifecycle state, what should happen. Both the
//! synchronous [`Dispatcher`] and the async runtime in `padlinkd` apply the
//! same routes.

use crate::action::{Control, SymbolicAction};
use crate::daemon::{Daemon, DaemonState, Stopped};
use crate::input::InputPair;
use crate::machine::Boot;
use std::path::PathBuf;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Terminate the host process, saving first when a session is running.
    Kill { save_first: bool },
    Load,
    Quit,
    Exit,
    Press(InputPair),
    /// Not applicable in the current state; drop silently.
    Drop,
}

/// Routing rules, in priority order:
/// 1. KILL always terminates (saving first if running).
/// 2. LOAD only while not running.
/// 3. Everything else only while running; INVALID is always dropped.
pub fn route(action: SymbolicAction, state: DaemonState) -> Route {
    let running = state == DaemonState::Running;
    match action {
        SymbolicAction::Control(Control::Kill) => Route::Kill {
            save_first: running,
        },
        SymbolicAction::Control(Control::Load) if !running => Route::Load,
        SymbolicAction::Control(Control::Load) => Route::Drop,
        _ if !running => Route::Drop,
        SymbolicAction::Control(Control::Quit) => Route::Quit,
        SymbolicAction::Control(Control::Exit) => Route::Exit,
        SymbolicAction::Input(button) => Route::Press(button.pair()),
        SymbolicAction::Invalid => Route::Drop,
    }
}

/// What the host should do after a command was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Terminate the host process. The daemon has already been stopped.
    Terminate,
}

/// Applies routes to a daemon it borrows per call.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    program: PathBuf,
}

impl Dispatcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn dispatch<B: Boot>(&self, daemon: &mut Daemon<B>, action: SymbolicAction) -> Flow {
        let route = route(action, daemon.state());
        debug!("{} -> {:?}", action, route);
        self.apply(daemon, route)
    }

    pub fn apply<B: Boot>(&self, daemon: &mut Daemon<B>, route: Route) -> Flow {
        match route {
            Route::Kill { save_first } => {
                if save_first {
                    // Best effort: the outcome is logged by the daemon and
                    // never blocks termination.
                    let _ = daemon.quit();
                }
                info!("Kill requested; terminating");
                return Flow::Terminate;
            }
            Route::Load => {
                if let Err(e) = daemon.load(&self.program) {
                    error!("Load {:?} failed: {}", self.program, e);
                }
            }
            Route::Quit => {
                if let Stopped::SaveFailed(e) = daemon.quit() {
                    debug!("quit completed without state: {}", e);
                }
            }
            Route::Exit => {
                let _ = daemon.exit();
            }
            Route::Press(pair) => {
                daemon.buffer_pair(pair);
            }
            Route::Drop => {}
        }
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{classify, Button};
    use crate::input::DrainPolicy;
    use crate::state_store::state_path;
    use crate::testing::MockBoot;

    const RUNNING: DaemonState = DaemonState::Running;
    const STOPPED: DaemonState = DaemonState::NotRunning;

    #[test]
    fn routing_table() {
        let a = SymbolicAction::Input(Button::A);
        let cases = [
            ("kill", RUNNING, Route::Kill { save_first: true }),
            ("kill", STOPPED, Route::Kill { save_first: false }),
            ("load", STOPPED, Route::Load),
            ("load", RUNNING, Route::Drop),
            ("quit", RUNNING, Route::Quit),
            ("quit", STOPPED, Route::Drop),
            ("exit", RUNNING, Route::Exit),
            ("exit", STOPPED, Route::Drop),
            ("a", RUNNING, Route::Press(a.input_pair().unwrap())),
            ("a", STOPPED, Route::Drop),
            ("hello", RUNNING, Route::Drop),
            ("hello", STOPPED, Route::Drop),
        ];
        for (text, state, expected) in cases {
            assert_eq!(route(classify(text), state), expected, "{text} while {state:?}");
        }
    }

    #[test]
    fn load_press_quit_session() {
        let boot = MockBoot::default();
        let mut d = Daemon::new(boot.clone(), DrainPolicy::Fifo);
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("foo.rom");
        let dispatcher = Dispatcher::new(&program);

        // Inputs before load are dropped.
        assert_eq!(dispatcher.dispatch(&mut d, classify("a")), Flow::Continue);
        assert!(d.queue().is_empty());

        dispatcher.dispatch(&mut d, classify("load"));
        assert!(d.is_running());
        dispatcher.dispatch(&mut d, classify("<"));
        assert_eq!(d.queue().len(), 2);
        dispatcher.dispatch(&mut d, classify("nonsense"));
        assert_eq!(d.queue().len(), 2);

        dispatcher.dispatch(&mut d, classify("quit"));
        assert!(!d.is_running());
        assert!(state_path(&program).exists());
        assert_eq!(boot.tally.save_attempts.get(), 1);
    }

    #[test]
    fn kill_while_running_saves_once_and_terminates_even_if_save_fails() {
        let boot = MockBoot {
            fail_save: true,
            ..MockBoot::default()
        };
        let mut d = Daemon::new(boot.clone(), DrainPolicy::Fifo);
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(dir.path().join("foo.rom"));
        dispatcher.dispatch(&mut d, classify("load"));

        assert_eq!(dispatcher.dispatch(&mut d, classify("kill")), Flow::Terminate);
        assert_eq!(boot.tally.save_attempts.get(), 1);
        assert_eq!(boot.tally.stops.get(), 1);
        assert!(!d.is_running());
    }

    #[test]
    fn kill_while_stopped_terminates_without_saving() {
        let boot = MockBoot::default();
        let mut d = Daemon::new(boot.clone(), DrainPolicy::Fifo);
        let dispatcher = Dispatcher::new("foo.rom");
        assert_eq!(dispatcher.dispatch(&mut d, classify("kill")), Flow::Terminate);
        assert_eq!(boot.tally.save_attempts.get(), 0);
    }

    #[test]
    fn exit_stops_without_saving() {
        let boot = MockBoot::default();
        let mut d = Daemon::new(boot.clone(), DrainPolicy::Fifo);
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(dir.path().join("foo.rom"));
        dispatcher.dispatch(&mut d, classify("load"));
        dispatcher.dispatch(&mut d, classify("exit"));
        assert!(!d.is_running());
        assert_eq!(boot.tally.save_attempts.get(), 0);
        assert_eq!(boot.tally.stops.get(), 1);
    }

    #[test]
    fn failed_load_keeps_daemon_stopped() {
        let boot = MockBoot {
            fail_boot: true,
            ..MockBoot::default()
        };
        let mut d = Daemon::new(boot, DrainPolicy::Fifo);
        let dispatcher = Dispatcher::new("foo.rom");
        assert_eq!(dispatcher.dispatch(&mut d, classify("load")), Flow::Continue);
        assert!(!d.is_running());
    }
}
