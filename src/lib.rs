pub mod operation;
pub use operation::{OpId, Operation};

pub mod stack;
pub use stack::{Builder, OperationStack, DEFAULT_MAX_CONCURRENT_OPERATIONS};

#[cfg(test)]
mod test_utils;
