use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

/// Lifecycle of the sampling loop as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Worker spawned but not yet parked on the start gate.
    Constructed,
    /// Worker parked, waiting for `start` (or `stop`).
    AwaitingStart,
    Running,
    /// Worker has returned; terminal.
    Stopped,
}

/// What the controller wants the worker to do. Moves forward only:
/// `Hold` → `Run` → `Halt`, or `Hold` → `Halt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Hold,
    Run,
    Halt,
}

#[derive(Debug)]
struct State {
    signal: Signal,
    phase: Phase,
}

/// Start gate, stop flag and inter-tick sleep behind one mutex and one
/// condvar, so the worker never has to reconcile two flags.
#[derive(Debug)]
pub(crate) struct Control {
    state: Mutex<State>,
    wake: Condvar,
}

impl Control {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                signal: Signal::Hold,
                phase: Phase::Constructed,
            }),
            wake: Condvar::new(),
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// Opens the start gate. Once open it stays open; a halted loop is not
    /// reopened.
    pub(crate) fn release(&self) {
        let mut state = self.state.lock();
        if state.signal == Signal::Hold {
            state.signal = Signal::Run;
            self.wake.notify_all();
        }
    }

    /// Requests termination. Also releases a worker still parked on the
    /// start gate.
    pub(crate) fn halt(&self) {
        self.state.lock().signal = Signal::Halt;
        self.wake.notify_all();
    }

    pub(crate) fn halted(&self) -> bool {
        self.state.lock().signal == Signal::Halt
    }

    /// Worker side: parks until released or halted. Returns `true` if the
    /// loop should run.
    pub(crate) fn wait_for_start(&self) -> bool {
        let mut state = self.state.lock();
        state.phase = Phase::AwaitingStart;
        while state.signal == Signal::Hold {
            self.wake.wait(&mut state);
        }
        if state.signal == Signal::Run {
            state.phase = Phase::Running;
            true
        } else {
            false
        }
    }

    /// Worker side: sleeps until `deadline` unless halted first. Returns
    /// `true` if halted.
    pub(crate) fn sleep_until(&self, deadline: Instant) -> bool {
        let mut state = self.state.lock();
        while state.signal != Signal::Halt {
            if self.wake.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.signal == Signal::Halt
    }

    /// Worker side: parks until halted, for a loop with no further deadline.
    pub(crate) fn wait_for_halt(&self) {
        let mut state = self.state.lock();
        while state.signal != Signal::Halt {
            self.wake.wait(&mut state);
        }
    }

    pub(crate) fn finish(&self) {
        self.state.lock().phase = Phase::Stopped;
    }
}

/// Marks the loop `Stopped` when the worker returns, including by unwinding
/// out of a panicking tick.
pub(crate) struct FinishGuard<'a>(pub(crate) &'a Control);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}
