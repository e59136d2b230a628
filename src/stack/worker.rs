use crate::operation::Operation;
use crate::stack::Shared;
use anyhow::{Context, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// Spawns the thread that executes one dispatched operation.
///
/// On success the thread owns the completion protocol: whatever happens to
/// the body, the operation is marked finished, removed from the in-flight
/// set, waiters are notified and the dispatcher is re-run. On failure the
/// caller must roll back its bookkeeping, the operation never started.
pub(crate) fn spawn(shared: &Arc<Shared>, op: Arc<Operation>) -> Result<()> {
    let mut builder = thread::Builder::new().name(shared.cfg.thread_name.0());

    if let Some(stack_size) = shared.cfg.thread_stack_size {
        builder = builder.stack_size(stack_size);
    }

    let shared = Arc::clone(shared);

    builder
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| op.run()));

            if result.is_err() {
                // The stack does not catch or retry failures beyond freeing
                // the slot; surface it and move on.
                tracing::error!(id = %op.id(), "operation body panicked");
            }

            // Terminal regardless of how the body ended.
            op.mark_finished();

            shared.complete(&op);
        })
        .context("failed to spawn operation thread")?;

    Ok(())
}
