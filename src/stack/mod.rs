use crate::operation::Operation;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;

// Public API
mod builder;
pub use builder::{Builder, DEFAULT_MAX_CONCURRENT_OPERATIONS};

// Exports
pub(crate) use builder::StackConfig;

mod core;
use self::core::{AddMode, Core};

mod worker;


/// A bounded-concurrency scheduler for [`Operation`]s.
///
/// Submissions normally queue FIFO at the "top" end of the pending sequence;
/// [`OperationStack::add_operation_at_bottom`] inserts at the opposite end,
/// which the dispatcher only drains once no top-end work is pending. The
/// stack supports suspension, global cooperative cancellation and blocking
/// waits for completion.
///
/// Cloning is cheap and every clone drives the same underlying stack.
#[derive(Debug, Clone)]
pub struct OperationStack {
    shared: Arc<Shared>,
}

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) cfg: StackConfig,

    /// Debug label, no behavioral effect.
    name: Mutex<Option<String>>,

    /// The single scheduler-wide critical section.
    core: Mutex<Core>,

    /// Notified on every completion and on cancellation. Waiters re-check
    /// their predicate under `core`, so wakeups are never missed.
    on_change: Condvar,
}

impl OperationStack {
    /// Creates a stack with the default configuration: unbounded concurrency,
    /// not suspended.
    pub fn new() -> Self {
        Builder::new().build()
    }

    /// Returns a [`Builder`] for a configured stack.
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(crate) fn from_config(mut cfg: StackConfig) -> Self {
        let name = cfg.name.take();
        let core = Core::new(cfg.max_concurrent, cfg.suspended);

        Self {
            shared: Arc::new(Shared {
                cfg,
                name: Mutex::new(name),
                core: Mutex::new(core),
                on_change: Condvar::new(),
            }),
        }
    }

    /// Submits an operation at the top end of the pending sequence and
    /// triggers a dispatch pass.
    ///
    /// # Panics
    ///
    /// Panics if the operation was already submitted, to any stack.
    /// Duplicate submission is a contract violation; failing fast beats
    /// corrupting the bookkeeping.
    #[track_caller]
    pub fn add_operation(&self, op: Arc<Operation>) {
        self.add(op, AddMode::Top);
    }

    /// Submits an operation at the bottom end of the pending sequence: it
    /// only becomes a dispatch candidate once every top-end operation,
    /// including ones submitted after it, has been taken.
    ///
    /// # Panics
    ///
    /// Same contract as [`OperationStack::add_operation`].
    #[track_caller]
    pub fn add_operation_at_bottom(&self, op: Arc<Operation>) {
        self.add(op, AddMode::Bottom);
    }

    /// Wraps a closure in a fresh [`Operation`], submits it at the top end
    /// and returns it.
    pub fn add_operation_with_fn<F>(&self, f: F) -> Arc<Operation>
    where
        F: FnOnce(&Operation) + Send + 'static,
    {
        let op = Operation::new(f);
        self.add_operation(Arc::clone(&op));
        op
    }

    /// Submits a batch in order, each with top-end semantics.
    ///
    /// When `wait_until_finished` is true, blocks the calling thread until
    /// every operation in *this batch* has finished; unrelated operations do
    /// not extend the wait.
    #[track_caller]
    pub fn add_operations(&self, ops: Vec<Arc<Operation>>, wait_until_finished: bool) {
        for op in &ops {
            self.add_operation(Arc::clone(op));
        }

        if wait_until_finished {
            let mut core = self.shared.core.lock();
            while !ops.iter().all(|op| op.is_finished()) {
                self.shared.on_change.wait(&mut core);
            }
        }
    }

    /// Sets the cancelled flag on every known operation.
    ///
    /// Pending operations are removed immediately and are guaranteed to never
    /// run; they count as finished from this point on. In-flight bodies are
    /// only signalled: they keep their slot until they return, whether they
    /// observe the flag or run to completion ignoring it.
    pub fn cancel_all_operations(&self) {
        let mut core = self.shared.core.lock();

        let drained = core.drain_pending();
        for op in &drained {
            op.cancel();
            // Cancelled before it ever started: terminal right away.
            op.mark_finished();
        }

        for op in core.in_flight_ops() {
            op.cancel();
        }

        tracing::debug!(
            pending = drained.len(),
            in_flight = core.in_flight_len(),
            "cancelled all operations"
        );

        // The drained operations just reached a terminal state; wake waiters
        // so they re-check.
        self.shared.on_change.notify_all();
    }

    /// Blocks the calling thread until the stack is idle
    /// (`operation_count` == 0). Submissions racing with this call extend
    /// the wait.
    pub fn wait_until_all_operations_are_finished(&self) {
        let mut core = self.shared.core.lock();
        while !core.is_idle() {
            self.shared.on_change.wait(&mut core);
        }
    }

    /// Snapshot of every known operation: pending followed by in-flight, in
    /// no particular order across the two groups.
    pub fn operations(&self) -> Vec<Arc<Operation>> {
        self.shared.core.lock().snapshot()
    }

    /// Number of submitted operations that have not yet finished
    /// (pending + in-flight).
    pub fn operation_count(&self) -> usize {
        self.shared.core.lock().len()
    }

    pub fn name(&self) -> Option<String> {
        self.shared.name.lock().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.shared.name.lock() = Some(name.into());
    }

    pub fn is_suspended(&self) -> bool {
        self.shared.core.lock().is_suspended()
    }

    /// While suspended the dispatcher starts nothing new; running operations
    /// are unaffected and their completions are still accounted. Resuming
    /// immediately re-runs dispatch.
    pub fn set_suspended(&self, val: bool) {
        let mut core = self.shared.core.lock();
        core.set_suspended(val);

        if !val {
            self.shared.dispatch(&mut core);
        }
    }

    pub fn max_concurrent_operation_count(&self) -> isize {
        self.shared.core.lock().max_concurrent()
    }

    /// Changes the concurrency limit. Non-positive values mean unbounded.
    ///
    /// Raising the limit immediately fills the newly available slots;
    /// lowering it only throttles future dispatch and never cancels or
    /// pauses running operations.
    pub fn set_max_concurrent_operation_count(&self, val: isize) {
        let mut core = self.shared.core.lock();
        core.set_max_concurrent(val);
        self.shared.dispatch(&mut core);
    }

    #[track_caller]
    fn add(&self, op: Arc<Operation>, mode: AddMode) {
        assert!(
            op.try_enqueue(),
            "operation {} submitted twice; operations are single-use",
            op.id()
        );

        let mut core = self.shared.core.lock();
        core.add(op, mode);
        self.shared.dispatch(&mut core);
    }
}

impl Default for OperationStack {
    fn default() -> Self {
        Self::new()
    }
}

impl Shared {
    /// Moves pending operations into execution until suspended, out of
    /// capacity or out of work. Invoked under the core lock on every
    /// submission, completion, resume and limit change; bodies themselves
    /// run on their own threads, outside the lock.
    fn dispatch(self: &Arc<Self>, core: &mut MutexGuard<'_, Core>) {
        while core.can_dispatch() {
            let (op, mode) = core.pop_next().expect("can_dispatch implies pending work");

            core.begin_execution(Arc::clone(&op));
            tracing::trace!(
                id = %op.id(),
                in_flight = core.in_flight_len(),
                "dispatching operation"
            );

            if let Err(e) = worker::spawn(self, Arc::clone(&op)) {
                // The operation never started: roll back the bookkeeping and
                // leave it where the next dispatch pass will find it.
                core.finish_execution(&op.id());
                core.requeue_front(op, mode);

                tracing::error!(error = ?e, "dispatch failed");
                break;
            }
        }
    }

    /// Completion protocol, called from the worker thread after the body
    /// returned or unwound and the operation was marked finished.
    pub(crate) fn complete(self: &Arc<Self>, op: &Operation) {
        let mut core = self.core.lock();
        core.finish_execution(&op.id());

        tracing::trace!(id = %op.id(), remaining = core.len(), "operation finished");

        self.on_change.notify_all();

        // The freed slot may make pending work eligible.
        self.dispatch(&mut core);
    }
}
