use bitflags::bitflags;
use std::sync::atomic::{AtomicU8, Ordering};

bitflags! {
    /// Lifecycle flags of an operation. Flags only ever get set, never
    /// cleared, so the reachable combinations form a small monotone lattice.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct OpFlags: u8 {
        /// Claimed by a stack. Rejects duplicate submission.
        const ENQUEUED = 1 << 0;

        /// The body has been handed to a worker thread.
        const RUNNING = 1 << 1;

        /// Cooperative cancellation was requested. The body is expected to
        /// poll this and bail out early; nothing forces it to.
        const CANCELLED = 1 << 2;

        /// Terminal: the body returned, unwound, or the operation was
        /// cancelled before it ever started.
        const FINISHED = 1 << 3;
    }
}

/// Atomic cell holding the lifecycle flags of one operation.
#[derive(Debug)]
pub(crate) struct OpState(AtomicU8);

impl OpState {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(OpFlags::empty().bits()))
    }

    fn load(&self) -> OpFlags {
        OpFlags::from_bits_truncate(self.0.load(Ordering::Acquire))
    }

    /// Sets `flags`, returning the flags that were set before.
    fn set(&self, flags: OpFlags) -> OpFlags {
        OpFlags::from_bits_truncate(self.0.fetch_or(flags.bits(), Ordering::AcqRel))
    }

    pub(crate) fn contains(&self, flags: OpFlags) -> bool {
        self.load().contains(flags)
    }

    /// Claims the operation for a stack. Returns false if it was already
    /// claimed, which is a violation of the submission contract.
    pub(crate) fn try_enqueue(&self) -> bool {
        !self.set(OpFlags::ENQUEUED).contains(OpFlags::ENQUEUED)
    }

    pub(crate) fn mark_running(&self) {
        self.set(OpFlags::RUNNING);
    }

    pub(crate) fn mark_cancelled(&self) {
        self.set(OpFlags::CANCELLED);
    }

    pub(crate) fn mark_finished(&self) {
        self.set(OpFlags::FINISHED);
    }

    pub(crate) fn is_executing(&self) -> bool {
        let flags = self.load();
        flags.contains(OpFlags::RUNNING) && !flags.contains(OpFlags::FINISHED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_claimed_once() {
        let state = OpState::new();

        assert!(state.try_enqueue());
        assert!(!state.try_enqueue());
        assert!(state.contains(OpFlags::ENQUEUED));
    }

    #[test]
    fn test_flags_accumulate() {
        let state = OpState::new();

        state.mark_running();
        assert!(state.is_executing());

        state.mark_cancelled();
        assert!(state.contains(OpFlags::CANCELLED));
        assert!(state.is_executing());

        state.mark_finished();
        assert!(state.contains(OpFlags::RUNNING | OpFlags::CANCELLED | OpFlags::FINISHED));
        assert!(!state.is_executing());
    }

    #[test]
    fn test_finished_without_running_is_not_executing() {
        // Cancelled-before-start path: FINISHED is set, RUNNING never is.
        let state = OpState::new();

        state.mark_cancelled();
        state.mark_finished();

        assert!(!state.is_executing());
        assert!(state.contains(OpFlags::FINISHED));
    }
}
