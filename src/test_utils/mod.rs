use crate::{Operation, OperationStack};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(crate) const SPIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A manually-opened latch. Gated operations block on `wait_open`, so tests
/// can hold them in flight deterministically.
#[derive(Default)]
pub(crate) struct Gate {
    open: Mutex<bool>,
    cvar: Condvar,
}

impl Gate {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn open(&self) {
        let mut open = self.open.lock();
        *open = true;
        self.cvar.notify_all();
    }

    pub(crate) fn wait_open(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cvar.wait(&mut open);
        }
    }
}

/// An operation that starts and then blocks until the gate opens.
pub(crate) fn gated_op(gate: &Arc<Gate>) -> Arc<Operation> {
    let gate = Arc::clone(gate);
    Operation::new(move |_| gate.wait_open())
}

/// Polls `cond` until it holds or [`SPIN_TIMEOUT`] elapses. Returns whether
/// it held.
pub(crate) fn spin_until(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + SPIN_TIMEOUT;

    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    false
}

/// Number of operations currently executing, per their own state flags.
pub(crate) fn executing_count(ops: &[Arc<Operation>]) -> usize {
    ops.iter().filter(|op| op.is_executing()).count()
}

/// A stack created suspended, so tests can stage submissions before any
/// dispatch happens.
pub(crate) fn suspended_stack(max_concurrent: isize) -> OperationStack {
    OperationStack::builder()
        .max_concurrent_operations(max_concurrent)
        .suspended(true)
        .build()
}
