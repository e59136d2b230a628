use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

// Exports
mod id;
pub use id::OpId;

mod state;
use state::{OpFlags, OpState};

type Body = Box<dyn FnOnce(&Operation) + Send + 'static>;

/// A single-use unit of deferred work, submitted to an
/// [`OperationStack`](crate::OperationStack).
///
/// The body receives `&Operation` so it can poll [`Operation::is_cancelled`]
/// and bail out early. Cancellation is cooperative: the stack sets the flag
/// but never interrupts a running body.
///
/// An `Operation` may be submitted to exactly one stack, exactly once.
pub struct Operation {
    id: OpId,

    state: OpState,

    // Taken exactly once, which is what guarantees the body runs at most once.
    body: Mutex<Option<Body>>,
}

impl Operation {
    pub fn new<F>(body: F) -> Arc<Self>
    where
        F: FnOnce(&Operation) + Send + 'static,
    {
        Arc::new(Self {
            id: OpId::next(),
            state: OpState::new(),
            body: Mutex::new(Some(Box::new(body))),
        })
    }

    pub fn id(&self) -> OpId {
        self.id
    }

    /// True once cancellation was requested. Bodies should poll this and
    /// return early; the stack never interrupts them.
    pub fn is_cancelled(&self) -> bool {
        self.state.contains(OpFlags::CANCELLED)
    }

    /// True once the operation reached a terminal state: the body returned,
    /// unwound, or the operation was cancelled before it ever started.
    pub fn is_finished(&self) -> bool {
        self.state.contains(OpFlags::FINISHED)
    }

    /// True while the body is running on a worker thread.
    pub fn is_executing(&self) -> bool {
        self.state.is_executing()
    }

    /// Claims this operation for a stack. Each operation may be submitted
    /// exactly once; a second claim is a contract violation the stack turns
    /// into a panic.
    pub(crate) fn try_enqueue(&self) -> bool {
        self.state.try_enqueue()
    }

    pub(crate) fn cancel(&self) {
        self.state.mark_cancelled();
    }

    pub(crate) fn mark_finished(&self) {
        self.state.mark_finished();
    }

    /// Runs the body. Called from exactly one worker thread per operation.
    pub(crate) fn run(&self) {
        self.state.mark_running();

        let body = self.body.lock().take();
        debug_assert!(body.is_some(), "operation body already consumed");

        if let Some(body) = body {
            body(self);
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The body isn't printable.
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fresh_operation_flags() {
        let op = Operation::new(|_| {});

        assert!(!op.is_cancelled());
        assert!(!op.is_finished());
        assert!(!op.is_executing());
    }

    #[test]
    fn test_run_consumes_body_once() {
        let count = Arc::new(AtomicUsize::new(0));

        let counted = Arc::clone(&count);
        let op = Operation::new(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        op.run();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(op.body.lock().is_none());
        assert!(op.is_executing());

        op.mark_finished();
        assert!(!op.is_executing());
    }

    #[test]
    fn test_body_observes_own_cancellation() {
        let op = Operation::new(|op: &Operation| {
            assert!(op.is_cancelled());
        });

        op.cancel();
        op.run();
    }
}
