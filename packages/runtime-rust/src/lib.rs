//! `logicbase` runtime: operation pipelines with a transactional `execute` and invocation logging.

pub mod service;
pub mod storage;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use logicbase_core::{AddOptions, Messages, Reason, BASE};
pub use service::{
    ComposeError, Operation, OperationError, OperationRegistry, Outcome, Report, RuntimeConfig,
};
pub use storage::{MemoryStore, StoreError, Transaction, TransactionalStore};
