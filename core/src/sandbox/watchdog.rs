use super::exception::Exception;
use rustpython_vm::signal::UserSignalSender;
use rustpython_vm::{PyResult, VirtualMachine};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const TICK: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Stop {
    Timeout,
    Cancelled,
}

impl Stop {
    pub(super) fn exception(self) -> Exception {
        match self {
            Self::Timeout => Exception::new("TimeoutError", "execution timed out"),
            Self::Cancelled => Exception::new("CancelledError", "execution cancelled"),
        }
    }
}

#[derive(Debug, Default)]
struct ClockState {
    deadline: Option<Instant>,
    paused_at: Option<Instant>,
    stopped: Option<Stop>,
}

#[derive(Debug)]
pub(super) struct Clock {
    timeout: Option<Duration>,
    cancel: Option<Arc<AtomicBool>>,
    state: Mutex<ClockState>,
}

impl Clock {
    pub(super) fn new(timeout: Option<Duration>, cancel: Option<Arc<AtomicBool>>) -> Self {
        Self {
            timeout,
            cancel,
            state: Mutex::default(),
        }
    }

    pub(super) fn is_limited(&self) -> bool {
        self.timeout.is_some() || self.cancel.is_some()
    }

    pub(super) fn start(&self) {
        self.lock().deadline = self.timeout.map(|timeout| Instant::now() + timeout);
    }

    pub(super) fn stopped(&self) -> Option<Stop> {
        self.lock().stopped
    }

    pub(super) fn paused<T>(&self, f: impl FnOnce() -> T) -> T {
        self.lock().paused_at = Some(Instant::now());
        let out = f();
        let mut state = self.lock();
        if let (Some(paused_at), Some(deadline)) = (state.paused_at.take(), state.deadline) {
            state.deadline = Some(deadline + paused_at.elapsed());
        }
        out
    }

    fn poll(&self) -> Option<Stop> {
        let cancelled = self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed));
        let mut state = self.lock();
        if state.stopped.is_none() {
            let expired = state.paused_at.is_none()
                && state.deadline.is_some_and(|deadline| Instant::now() >= deadline);
            state.stopped = if cancelled {
                Some(Stop::Cancelled)
            } else if expired {
                Some(Stop::Timeout)
            } else {
                None
            };
        }
        state.stopped
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(super) fn watch(clock: &Clock, sender: &UserSignalSender, done: &AtomicBool) {
    let mut reported = false;
    while !done.load(Ordering::Acquire) {
        if let Some(stop) = clock.poll() {
            if !reported {
                debug!(?stop, "interrupting sandbox");
                reported = true;
            }
            if sender.send(Box::new(interrupt)).is_err() {
                break;
            }
        }
        thread::sleep(TICK);
    }
}

// KeyboardInterrupt sits outside `Exception`, so `except Exception` lets it through.
fn interrupt(vm: &VirtualMachine) -> PyResult<()> {
    Err(vm.new_exception_msg(
        vm.ctx.exceptions.keyboard_interrupt.to_owned(),
        "sandbox limit reached".to_owned(),
    ))
}
