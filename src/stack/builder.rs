use crate::stack::OperationStack;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default concurrency limit. Any non-positive value means unbounded
/// dispatch, so this sentinel imposes no limit at all.
pub const DEFAULT_MAX_CONCURRENT_OPERATIONS: isize = -1;

#[derive(Clone)]
pub(crate) struct ThreadNameFn(pub(crate) Arc<dyn Fn() -> String + Send + Sync + 'static>);

fn default_thread_name_fn() -> ThreadNameFn {
    let worker_count = Arc::new(AtomicUsize::new(0));

    ThreadNameFn(Arc::new(move || {
        let id = worker_count.fetch_add(1, Ordering::Relaxed);
        format!("opstack-{}", id)
    }))
}

impl fmt::Debug for ThreadNameFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The closure itself isn't printable, print a placeholder.
        f.debug_tuple("ThreadNameFn").field(&"<function>").finish()
    }
}

/// Configures an [`OperationStack`] before construction.
#[derive(Debug)]
pub struct Builder {
    /// Debug label for the stack. No behavioral effect.
    name: Option<String>,

    /// Maximum number of operations executing at once. Non-positive means
    /// unbounded.
    max_concurrent: isize,

    /// Whether the stack starts suspended: submissions queue up but nothing
    /// is dispatched until `set_suspended(false)`.
    suspended: bool,

    /// Name fn used for threads spawned for dispatched operations.
    thread_name: ThreadNameFn,

    /// Stack size used for threads spawned for dispatched operations.
    thread_stack_size: Option<usize>,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            name: None,
            max_concurrent: DEFAULT_MAX_CONCURRENT_OPERATIONS,
            suspended: false,
            thread_name: default_thread_name_fn(),
            thread_stack_size: None,
        }
    }

    /// Sets the stack's debug label. Purely informational.
    pub fn name(mut self, val: impl Into<String>) -> Self {
        self.name = Some(val.into());
        self
    }

    /// Sets the maximum number of operations executing at once.
    ///
    /// Any non-positive value disables the limit entirely. The limit can
    /// also be changed later through
    /// [`OperationStack::set_max_concurrent_operation_count`].
    pub fn max_concurrent_operations(mut self, val: isize) -> Self {
        self.max_concurrent = val;
        self
    }

    /// Starts the stack suspended. Submissions queue up but nothing runs
    /// until [`OperationStack::set_suspended`] flips it back.
    pub fn suspended(mut self, val: bool) -> Self {
        self.suspended = val;
        self
    }

    /// Sets the name of threads spawned for dispatched operations.
    ///
    /// The default name is "opstack-{N}", where N is monotonically
    /// increasing.
    pub fn thread_name(mut self, val: impl Into<String>) -> Self {
        let val = val.into();
        self.thread_name = ThreadNameFn(Arc::new(move || val.clone()));
        self
    }

    /// Sets a function used to generate the name of threads spawned for
    /// dispatched operations.
    pub fn thread_name_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.thread_name = ThreadNameFn(Arc::new(f));
        self
    }

    /// Sets the stack size (in bytes) for threads spawned for dispatched
    /// operations.
    ///
    /// The actual stack size may be greater than this value if the platform
    /// specifies a minimal stack size.
    #[track_caller]
    pub fn thread_stack_size(mut self, val: usize) -> Self {
        assert!(val > 0, "thread_stack_size must be greater than 0");
        self.thread_stack_size = Some(val);
        self
    }

    /// Creates the configured [`OperationStack`], ready to accept
    /// submissions.
    pub fn build(self) -> OperationStack {
        OperationStack::from_config(self.into())
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

// Export the builder as a StackConfig object to be consumed by the stack and
// its workers.
#[derive(Debug, Clone)]
pub(crate) struct StackConfig {
    pub(crate) name: Option<String>,
    pub(crate) max_concurrent: isize,
    pub(crate) suspended: bool,
    pub(crate) thread_name: ThreadNameFn,
    pub(crate) thread_stack_size: Option<usize>,
}

impl From<Builder> for StackConfig {
    fn from(builder: Builder) -> StackConfig {
        StackConfig {
            name: builder.name,
            max_concurrent: builder.max_concurrent,
            suspended: builder.suspended,
            thread_name: builder.thread_name,
            thread_stack_size: builder.thread_stack_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    // Workers capture the config, so it has to cross thread boundaries.
    assert_impl_all!(StackConfig: Send, Sync, Clone);

    #[test]
    fn test_default_thread_names_increment() {
        let f = default_thread_name_fn();

        assert_eq!(f.0(), "opstack-0");
        assert_eq!(f.0(), "opstack-1");
    }

    #[test]
    fn test_builder_defaults() {
        let cfg: StackConfig = Builder::new().into();

        assert!(cfg.name.is_none());
        assert_eq!(cfg.max_concurrent, DEFAULT_MAX_CONCURRENT_OPERATIONS);
        assert!(!cfg.suspended);
        assert!(cfg.thread_stack_size.is_none());
    }

    #[test]
    #[should_panic(expected = "thread_stack_size must be greater than 0")]
    fn test_zero_thread_stack_size_rejected() {
        let _ = Builder::new().thread_stack_size(0);
    }
}
