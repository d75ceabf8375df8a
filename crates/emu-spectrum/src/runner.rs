//! Runs a `Machine` on its own worker thread.
//!
//! The worker executes instructions in batches under the machine lock and
//! checks the control state between batches. Pausing waits for the current
//! batch to finish, so once `pause` returns nothing else touches the machine
//! until `resume` or `step`. The pacing sleep waits on the same condition
//! variable, so pause and quit cut it short.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use emu_core::Cpu;
use tracing::debug;

use crate::clock::{Pacer, ThreadPacer};
use crate::machine::Machine;
use crate::registers::Registers;
use crate::snapshot::{Snapshot, SnapshotError};

/// Instructions executed between control checks.
const BATCH: u64 = 1_000;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("the machine is running; pause it first")]
    Running,
    #[error("the worker thread panicked")]
    WorkerPanicked,
    #[error("the machine is still shared after the worker stopped")]
    MachineShared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Running,
    Paused,
    Quit,
}

#[derive(Debug)]
struct ControlState {
    mode: Mode,
    /// Single steps requested but not yet started.
    pending_steps: u64,
    /// Single steps finished since spawn.
    steps_done: u64,
    /// A batch or step is executing.
    busy: bool,
}

#[derive(Debug)]
struct Control {
    state: Mutex<ControlState>,
    wake: Condvar,
}

impl Control {
    fn new(mode: Mode) -> Self {
        Self {
            state: Mutex::new(ControlState {
                mode,
                pending_steps: 0,
                steps_done: 0,
                busy: false,
            }),
            wake: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, ControlState>) -> MutexGuard<'a, ControlState> {
        self.wake.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    fn set_mode(&self, mode: Mode) {
        let mut state = self.lock();
        if state.mode != Mode::Quit {
            state.mode = mode;
        }
        drop(state);
        self.wake.notify_all();
    }
}

/// Frame pacing that a pause or quit interrupts.
struct ControlPacer {
    control: Arc<Control>,
}

impl Pacer for ControlPacer {
    fn pause(&mut self, duration: Duration) {
        let state = self.control.lock();
        let _ = self
            .control
            .wake
            .wait_timeout_while(state, duration, |s| s.mode == Mode::Running)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

fn lock_machine<C>(machine: &Mutex<Machine<C>>) -> MutexGuard<'_, Machine<C>> {
    machine.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Runner<C> {
    machine: Arc<Mutex<Machine<C>>>,
    control: Arc<Control>,
    worker: Option<JoinHandle<()>>,
}

impl<C> Runner<C>
where
    C: Cpu<Registers = Registers> + Send + 'static,
{
    /// Start running `machine` immediately.
    #[must_use]
    pub fn spawn(machine: Machine<C>) -> Self {
        Self::start(machine, Mode::Running)
    }

    /// Start the worker with the machine paused.
    #[must_use]
    pub fn spawn_paused(machine: Machine<C>) -> Self {
        Self::start(machine, Mode::Paused)
    }

    fn start(mut machine: Machine<C>, mode: Mode) -> Self {
        let control = Arc::new(Control::new(mode));
        machine.clock_mut().set_pacer(Box::new(ControlPacer {
            control: Arc::clone(&control),
        }));
        let machine = Arc::new(Mutex::new(machine));

        let worker = {
            let machine = Arc::clone(&machine);
            let control = Arc::clone(&control);
            std::thread::spawn(move || work(&machine, &control))
        };
        debug!(?mode, "runner started");
        Self {
            machine,
            control,
            worker: Some(worker),
        }
    }

    /// Stop executing and wait for the current batch to finish.
    pub fn pause(&self) {
        self.control.set_mode(Mode::Paused);
        let mut state = self.control.lock();
        while state.busy {
            state = self.control.wait(state);
        }
    }

    pub fn resume(&self) {
        self.control.set_mode(Mode::Running);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.control.lock().mode == Mode::Paused
    }

    /// Execute exactly one instruction and wait for it.
    ///
    /// # Errors
    ///
    /// `Running` unless the machine is paused.
    pub fn step(&self) -> Result<(), RunnerError> {
        let mut state = self.control.lock();
        if state.mode != Mode::Paused {
            return Err(RunnerError::Running);
        }
        state.pending_steps += 1;
        let target = state.steps_done + state.pending_steps;
        self.control.wake.notify_all();
        while state.steps_done < target && state.mode == Mode::Paused {
            state = self.control.wait(state);
        }
        Ok(())
    }

    /// Lock the machine for direct access.
    ///
    /// # Errors
    ///
    /// `Running` unless the machine is paused.
    pub fn with_machine<R>(&self, f: impl FnOnce(&mut Machine<C>) -> R) -> Result<R, RunnerError> {
        if !self.is_paused() {
            return Err(RunnerError::Running);
        }
        Ok(f(&mut lock_machine(&self.machine)))
    }

    /// Pause, run `f`, then go back to the previous mode.
    fn paused<R>(&self, f: impl FnOnce(&mut Machine<C>) -> R) -> R {
        let was_running = !self.is_paused();
        self.pause();
        let result = f(&mut lock_machine(&self.machine));
        if was_running {
            self.resume();
        }
        result
    }

    #[must_use]
    pub fn capture(&self) -> Snapshot {
        self.paused(|m| m.capture())
    }

    /// # Errors
    ///
    /// `ModelMismatch` if the snapshot is for another model.
    pub fn apply(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        self.paused(|m| m.apply(snapshot))
    }

    /// Stop the worker and hand the machine back.
    ///
    /// # Errors
    ///
    /// `WorkerPanicked` if the worker thread died, `MachineShared` if
    /// something else still holds the machine.
    pub fn quit(mut self) -> Result<Machine<C>, RunnerError> {
        self.shutdown()?;
        let machine = Arc::clone(&self.machine);
        drop(self);
        let mut machine = Arc::try_unwrap(machine)
            .map_err(|_| RunnerError::MachineShared)?
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        machine.clock_mut().set_pacer(Box::new(ThreadPacer));
        Ok(machine)
    }

    fn shutdown(&mut self) -> Result<(), RunnerError> {
        {
            let mut state = self.control.lock();
            state.mode = Mode::Quit;
        }
        self.control.wake.notify_all();
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| RunnerError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl<C> Drop for Runner<C> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.control.lock().mode = Mode::Quit;
            self.control.wake.notify_all();
            let _ = worker.join();
        }
    }
}

fn work<C: Cpu<Registers = Registers>>(machine: &Mutex<Machine<C>>, control: &Control) {
    loop {
        let (count, stepping) = {
            let mut state = control.lock();
            let next = loop {
                let mode = state.mode;
                match mode {
                    Mode::Quit => return,
                    Mode::Running => break (BATCH, false),
                    Mode::Paused if state.pending_steps > 0 => {
                        state.pending_steps -= 1;
                        break (1, true);
                    }
                    Mode::Paused => state = control.wait(state),
                }
            };
            state.busy = true;
            next
        };
        lock_machine(machine).run(count);

        let mut state = control.lock();
        state.busy = false;
        if stepping {
            state.steps_done += 1;
        }
        drop(state);
        control.wake.notify_all();
    }
}
