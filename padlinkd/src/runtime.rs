//! The tick task and its handle.
//!
//! One task owns the [`Daemon`] outright: it is the only code that touches
//! the machine or the input queue, so nothing is locked. Every other task
//! talks to it through a [`DaemonHandle`]: classified actions go in over an
//! mpsc channel, lifecycle state comes back through a watch channel.
//!
//! Actions are routed inside the task, against the daemon's current state,
//! in the order they were sent. A `load` sent right after a `quit` therefore
//! sees the stopped daemon. Commands are applied between ticks; command
//! bursts delay the next tick and the frame rate drifts accordingly.

use padlink::action::{Control, SymbolicAction};
use padlink::daemon::{Daemon, DaemonState};
use padlink::dispatch::{Dispatcher, Flow};
use padlink::machine::Boot;
use padlink::protocol::StatusSnapshot;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Command {
    pub action: SymbolicAction,
    /// Receives the flow once the action has been applied and the new
    /// status published.
    pub done: Option<oneshot::Sender<Flow>>,
}

#[derive(Debug, Clone)]
pub struct DaemonHandle {
    tx: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<StatusSnapshot>,
    shutdown: CancellationToken,
}

impl DaemonHandle {
    pub fn status(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    #[cfg(test)]
    pub fn state(&self) -> DaemonState {
        self.status.borrow().state
    }

    /// Queue an action without waiting for it. `false` once the tick task
    /// has exited.
    #[cfg(test)]
    pub fn send(&self, action: SymbolicAction) -> bool {
        self.tx.send(Command { action, done: None }).is_ok()
    }

    /// Apply an action and wait for the outcome.
    ///
    /// KILL terminates even when the tick task is already gone.
    pub async fn dispatch(&self, action: SymbolicAction) -> Flow {
        let (done, rx) = oneshot::channel();
        let sent = self
            .tx
            .send(Command {
                action,
                done: Some(done),
            })
            .is_ok();
        let flow = if sent { rx.await.ok() } else { None };
        match flow {
            Some(flow) => flow,
            None if action == SymbolicAction::Control(Control::Kill) => {
                self.request_shutdown();
                Flow::Terminate
            }
            None => {
                debug!("{} dropped; tick task has exited", action);
                Flow::Continue
            }
        }
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Ask the host process to terminate.
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait until the tick task publishes `state`.
    #[cfg(test)]
    pub async fn wait_for_state(&mut self, state: DaemonState) -> bool {
        self.status.wait_for(|s| s.state == state).await.is_ok()
    }
}

pub struct Runtime<B: Boot> {
    daemon: Daemon<B>,
    dispatcher: Dispatcher,
    rx: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<StatusSnapshot>,
    shutdown: CancellationToken,
    fps: u32,
}

/// Wire a daemon to a new handle. Spawn [`Runtime::run`] to start ticking.
pub fn channel<B: Boot>(
    daemon: Daemon<B>,
    dispatcher: Dispatcher,
    fps: u32,
    shutdown: CancellationToken,
) -> (Runtime<B>, DaemonHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(snapshot(&daemon, fps));
    let runtime = Runtime {
        daemon,
        dispatcher,
        rx,
        status: status_tx,
        shutdown: shutdown.clone(),
        fps,
    };
    let handle = DaemonHandle {
        tx,
        status: status_rx,
        shutdown,
    };
    (runtime, handle)
}

fn snapshot<B: Boot>(daemon: &Daemon<B>, fps: u32) -> StatusSnapshot {
    StatusSnapshot {
        state: daemon.state(),
        program: daemon.program_path().map(|p| p.display().to_string()),
        frames: daemon.frames(),
        queued: daemon.queue().len(),
        policy: daemon.queue().policy(),
        target_fps: fps,
    }
}

impl<B: Boot> Runtime<B> {
    /// Run until shutdown is requested or every handle is dropped. A session
    /// still running at that point is saved.
    pub async fn run(self) {
        let Runtime {
            mut daemon,
            dispatcher,
            mut rx,
            status,
            shutdown,
            fps,
        } = self;

        let period = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Tick task started at {} FPS", fps);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                cmd = rx.recv() => match cmd {
                    Some(Command { action, done }) => {
                        let flow = dispatcher.dispatch(&mut daemon, action);
                        status.send_replace(snapshot(&daemon, fps));
                        if flow == Flow::Terminate {
                            shutdown.cancel();
                        }
                        if let Some(done) = done {
                            let _ = done.send(flow);
                        }
                        continue;
                    }
                    None => {
                        debug!("all daemon handles dropped");
                        break;
                    }
                },
                _ = ticker.tick(), if daemon.is_running() => {
                    if let Err(e) = daemon.tick() {
                        warn!("Session ended by engine fault: {}", e);
                    }
                }
            }
            status.send_replace(snapshot(&daemon, fps));
        }

        if daemon.is_running() {
            info!("Shutdown: saving running session");
            let _ = daemon.quit();
        }
        status.send_replace(snapshot(&daemon, fps));
        info!("Tick task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use padlink::action::classify;
    use padlink::console::ConsoleBoot;
    use padlink::input::{DrainPolicy, InputEvent};
    use padlink::machine::{Machine, MachineError, Step};
    use padlink::state_store::state_path;
    use std::io::{Read, Write};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct Tally {
        boots: AtomicU32,
        save_attempts: AtomicU32,
        stops: AtomicU32,
        inputs: Mutex<Vec<InputEvent>>,
    }

    #[derive(Debug, Clone, Default)]
    struct FlakyBoot {
        tally: Arc<Tally>,
        fail_save: bool,
    }

    #[derive(Debug)]
    struct FlakyMachine {
        tally: Arc<Tally>,
        frame: u64,
        fail_save: bool,
    }

    impl Boot for FlakyBoot {
        type Machine = FlakyMachine;

        fn boot(&self, _program: &Path) -> Result<FlakyMachine, MachineError> {
            self.tally.boots.fetch_add(1, Ordering::SeqCst);
            Ok(FlakyMachine {
                tally: Arc::clone(&self.tally),
                frame: 0,
                fail_save: self.fail_save,
            })
        }
    }

    impl Machine for FlakyMachine {
        fn send_input(&mut self, event: InputEvent) {
            self.tally.inputs.lock().unwrap().push(event);
        }

        fn tick(&mut self) -> Result<Step, MachineError> {
            self.frame += 1;
            Ok(Step::Continue)
        }

        fn save_state(&self, w: &mut dyn Write) -> Result<(), MachineError> {
            self.tally.save_attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_save {
                return Err(MachineError::Fault {
                    frame: self.frame,
                    reason: "disk on fire".to_string(),
                });
            }
            w.write_all(&self.frame.to_le_bytes())?;
            Ok(())
        }

        fn load_state(&mut self, r: &mut dyn Read) -> Result<(), MachineError> {
            let mut buf = [0u8; 8];
            r.read_exact(&mut buf)?;
            self.frame = u64::from_le_bytes(buf);
            Ok(())
        }

        fn stop(&mut self) {
            self.tally.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn frame_count(&self) -> u64 {
            self.frame
        }
    }

    fn start<B: Boot + Send + 'static>(
        boot: B,
        policy: DrainPolicy,
        program: &Path,
    ) -> (DaemonHandle, tokio::task::JoinHandle<()>)
    where
        B::Machine: Send + 'static,
    {
        let (runtime, handle) = channel(
            Daemon::new(boot, policy),
            Dispatcher::new(program),
            60,
            CancellationToken::new(),
        );
        let task = tokio::spawn(runtime.run());
        (handle, task)
    }

    fn program_in(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("foo.rom")
    }

    #[tokio::test(start_paused = true)]
    async fn load_ticks_and_injects_one_event_per_frame_in_order() {
        let boot = FlakyBoot::default();
        let dir = tempfile::tempdir().unwrap();
        let (handle, _task) = start(boot.clone(), DrainPolicy::Fifo, &program_in(&dir));

        assert_eq!(handle.dispatch(classify("a")).await, Flow::Continue);
        assert_eq!(handle.dispatch(classify("load")).await, Flow::Continue);
        assert_eq!(handle.state(), DaemonState::Running);

        handle.dispatch(classify("a")).await;
        handle.dispatch(classify("b")).await;
        time::sleep(Duration::from_millis(500)).await;

        let inputs = boot.tally.inputs.lock().unwrap().clone();
        assert_eq!(
            inputs,
            vec![
                InputEvent::PRESS_BUTTON_A,
                InputEvent::RELEASE_BUTTON_A,
                InputEvent::PRESS_BUTTON_B,
                InputEvent::RELEASE_BUTTON_B,
            ]
        );
        let status = handle.status();
        assert!(status.frames >= 4, "frames {}", status.frames);
        assert_eq!(status.queued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn load_right_after_quit_starts_a_new_session() {
        let boot = FlakyBoot::default();
        let dir = tempfile::tempdir().unwrap();
        let program = program_in(&dir);
        let (handle, _task) = start(boot.clone(), DrainPolicy::Fifo, &program);

        handle.dispatch(classify("load")).await;
        time::sleep(Duration::from_millis(100)).await;

        // No waiting between the two: the load must see the stopped daemon.
        assert!(handle.send(classify("quit")));
        assert_eq!(handle.dispatch(classify("load")).await, Flow::Continue);

        assert_eq!(handle.state(), DaemonState::Running);
        assert_eq!(boot.tally.boots.load(Ordering::SeqCst), 2);
        assert_eq!(boot.tally.save_attempts.load(Ordering::SeqCst), 1);
        assert!(state_path(&program).exists());
    }

    #[tokio::test(start_paused = true)]
    async fn load_right_after_exit_starts_a_new_session() {
        let boot = FlakyBoot::default();
        let dir = tempfile::tempdir().unwrap();
        let (handle, _task) = start(boot.clone(), DrainPolicy::Fifo, &program_in(&dir));

        handle.dispatch(classify("load")).await;
        assert!(handle.send(classify("exit")));
        assert!(handle.send(classify("load")));
        handle.dispatch(classify("start")).await;

        assert_eq!(handle.state(), DaemonState::Running);
        assert_eq!(boot.tally.boots.load(Ordering::SeqCst), 2);
        assert_eq!(boot.tally.stops.load(Ordering::SeqCst), 1);
        assert_eq!(boot.tally.save_attempts.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            *boot.tally.inputs.lock().unwrap(),
            vec![InputEvent::PRESS_BUTTON_START, InputEvent::RELEASE_BUTTON_START]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn kill_while_running_saves_once_then_requests_shutdown_even_if_save_fails() {
        let boot = FlakyBoot {
            fail_save: true,
            ..FlakyBoot::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let (handle, task) = start(boot.clone(), DrainPolicy::Fifo, &program_in(&dir));

        handle.dispatch(classify("load")).await;
        time::sleep(Duration::from_millis(100)).await;

        assert_eq!(handle.dispatch(classify("kill")).await, Flow::Terminate);
        assert!(handle.shutdown_token().is_cancelled());
        task.await.unwrap();

        assert_eq!(boot.tally.save_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(boot.tally.stops.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), DaemonState::NotRunning);
    }

    #[tokio::test(start_paused = true)]
    async fn kill_while_stopped_only_requests_shutdown() {
        let boot = FlakyBoot::default();
        let (handle, task) = start(boot.clone(), DrainPolicy::Fifo, Path::new("foo.rom"));

        assert_eq!(handle.dispatch(classify("kill")).await, Flow::Terminate);
        task.await.unwrap();
        assert_eq!(boot.tally.save_attempts.load(Ordering::SeqCst), 0);

        // The task is gone; a second kill still terminates.
        assert_eq!(handle.dispatch(classify("kill")).await, Flow::Terminate);
        assert_eq!(handle.dispatch(classify("load")).await, Flow::Continue);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_saves_running_session() {
        let dir = tempfile::tempdir().unwrap();
        let program = program_in(&dir);
        std::fs::write(&program, b"\x01\x02\x03\x04").unwrap();

        let (handle, task) = start(ConsoleBoot::default(), DrainPolicy::Fifo, &program);
        handle.dispatch(classify("load")).await;
        assert_eq!(handle.state(), DaemonState::Running);
        time::sleep(Duration::from_millis(250)).await;

        handle.request_shutdown();
        task.await.unwrap();
        assert_eq!(handle.state(), DaemonState::NotRunning);
        assert!(state_path(&program).exists());
    }

    #[tokio::test(start_paused = true)]
    async fn quit_and_exit_stop_the_session() {
        let boot = FlakyBoot::default();
        let dir = tempfile::tempdir().unwrap();
        let program = program_in(&dir);
        let (mut handle, _task) = start(boot.clone(), DrainPolicy::Lifo, &program);

        handle.dispatch(classify("load")).await;
        assert!(handle.send(classify("quit")));
        assert!(handle.wait_for_state(DaemonState::NotRunning).await);
        assert_eq!(boot.tally.save_attempts.load(Ordering::SeqCst), 1);
        assert!(state_path(&program).exists());

        handle.dispatch(classify("load")).await;
        assert_eq!(handle.state(), DaemonState::Running);
        handle.dispatch(classify("exit")).await;
        assert_eq!(handle.state(), DaemonState::NotRunning);
        assert_eq!(boot.tally.save_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(boot.tally.stops.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn lifo_policy_reaches_the_engine_release_first() {
        let boot = FlakyBoot::default();
        let dir = tempfile::tempdir().unwrap();
        let (handle, _task) = start(boot.clone(), DrainPolicy::Lifo, &program_in(&dir));

        handle.dispatch(classify("load")).await;
        handle.dispatch(classify("start")).await;
        time::sleep(Duration::from_millis(200)).await;

        assert_eq!(
            *boot.tally.inputs.lock().unwrap(),
            vec![InputEvent::RELEASE_BUTTON_START, InputEvent::PRESS_BUTTON_START]
        );
        assert_eq!(handle.status().policy, DrainPolicy::Lifo);
    }
}
