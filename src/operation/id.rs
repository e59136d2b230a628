use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

/// An opaque ID that uniquely identifies an operation relative to every other
/// operation created by this process.
///
/// Identity is per submission: two operations wrapping the same closure are
/// still distinct operations. IDs are never reused for the lifetime of the
/// process.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct OpId(NonZeroU64);

impl OpId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);

        let id = COUNTER.fetch_add(1, Ordering::Relaxed);

        // Safety: this number is unimaginably large, even if a process was
        // creating 1 billion operations/sec, it would take 584 years to wrap
        // around.
        let Some(id) = NonZeroU64::new(id) else {
            Self::exhausted();
        };

        Self(id)
    }

    #[cold]
    fn exhausted() -> ! {
        panic!("failed to generate unique operation ID: bitspace exhausted")
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_op_id_unique() {
        let n = 13;
        let mut all_ids = HashSet::with_capacity(n);

        for _ in 0..n {
            all_ids.insert(OpId::next());
        }

        assert_eq!(all_ids.len(), n);
    }
}
