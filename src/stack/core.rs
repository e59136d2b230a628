use crate::operation::{OpId, Operation};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Which end of the pending sequence an operation is inserted at.
///
/// Top is the default, higher-priority end: the dispatcher always drains it
/// first, FIFO among itself. Bottom is the deliberately-deprioritized end; a
/// bottom operation only becomes a candidate when no top operation is
/// pending, and top operations submitted *after* it still take priority.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum AddMode {
    Top,
    Bottom,
}

/// Scheduler state. Every field is guarded by the single stack-wide lock in
/// `Shared`: submissions, completions, suspension toggles and limit changes
/// all mutate through that lock, which is what keeps the pending/in-flight
/// bookkeeping consistent. Operation bodies run outside the lock.
#[derive(Debug)]
pub(crate) struct Core {
    /// The two ends of the pending sequence, FIFO within each.
    top: VecDeque<Arc<Operation>>,
    bottom: VecDeque<Arc<Operation>>,

    /// Operations whose bodies are currently executing, keyed by identity.
    in_flight: HashMap<OpId, Arc<Operation>>,

    /// Non-positive means unbounded.
    max_concurrent: isize,

    /// While true the dispatcher must not start new operations. Running ones
    /// are unaffected.
    suspended: bool,
}

impl Core {
    pub(crate) fn new(max_concurrent: isize, suspended: bool) -> Self {
        Self {
            top: VecDeque::new(),
            bottom: VecDeque::new(),
            in_flight: HashMap::new(),
            max_concurrent,
            suspended,
        }
    }

    pub(crate) fn add(&mut self, op: Arc<Operation>, mode: AddMode) {
        match mode {
            AddMode::Top => self.top.push_back(op),
            AddMode::Bottom => self.bottom.push_back(op),
        }
    }

    /// Pops the next dispatch candidate, top end first. The mode is returned
    /// so a failed dispatch can be rolled back to the right end.
    pub(crate) fn pop_next(&mut self) -> Option<(Arc<Operation>, AddMode)> {
        if let Some(op) = self.top.pop_front() {
            return Some((op, AddMode::Top));
        }

        self.bottom.pop_front().map(|op| (op, AddMode::Bottom))
    }

    /// Puts an operation back at the front of the end it was popped from.
    /// Only valid when the dispatch itself failed and the operation counts
    /// as never started.
    pub(crate) fn requeue_front(&mut self, op: Arc<Operation>, mode: AddMode) {
        match mode {
            AddMode::Top => self.top.push_front(op),
            AddMode::Bottom => self.bottom.push_front(op),
        }
    }

    pub(crate) fn begin_execution(&mut self, op: Arc<Operation>) {
        let prev = self.in_flight.insert(op.id(), op);
        debug_assert!(prev.is_none(), "operation dispatched twice");
    }

    pub(crate) fn finish_execution(&mut self, id: &OpId) {
        let removed = self.in_flight.remove(id);
        debug_assert!(removed.is_some(), "completed operation not in flight");
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.top.len() + self.bottom.len()
    }

    pub(crate) fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Pending plus in-flight: the number of submitted operations that have
    /// not yet finished.
    pub(crate) fn len(&self) -> usize {
        self.pending_len() + self.in_flight_len()
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub(crate) fn set_suspended(&mut self, val: bool) {
        self.suspended = val;
    }

    pub(crate) fn max_concurrent(&self) -> isize {
        self.max_concurrent
    }

    pub(crate) fn set_max_concurrent(&mut self, val: isize) {
        self.max_concurrent = val;
    }

    fn has_capacity(&self) -> bool {
        self.max_concurrent <= 0 || self.in_flight.len() < self.max_concurrent as usize
    }

    /// True when the dispatcher may move one more pending operation into
    /// execution.
    pub(crate) fn can_dispatch(&self) -> bool {
        !self.suspended && self.has_capacity() && self.pending_len() > 0
    }

    /// Drains both pending ends. Drained operations are guaranteed to never
    /// run.
    pub(crate) fn drain_pending(&mut self) -> Vec<Arc<Operation>> {
        self.top.drain(..).chain(self.bottom.drain(..)).collect()
    }

    pub(crate) fn in_flight_ops(&self) -> impl Iterator<Item = &Arc<Operation>> {
        self.in_flight.values()
    }

    /// Snapshot of every known operation: pending (top end first, then
    /// bottom) followed by in-flight in no particular order.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Operation>> {
        self.top
            .iter()
            .chain(self.bottom.iter())
            .chain(self.in_flight.values())
            .cloned()
            .collect()
    }
}
