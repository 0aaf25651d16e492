//! Operation composition and execution framework.
//!
//! This module implements the operation pipeline:
//!
//! 1. **Operations** (`operation`): the `authorize -> validate -> execute` trait
//! 2. **Middleware** (`middleware`): Tower layers (phase chaining, transaction, logging)
//! 3. **Execution** (`executor`): the innermost service that runs `execute`
//! 4. **Registry** (`registry`): composes each operation type exactly once
//! 5. **Domain operations** (`domain`): microposts on top of the pipeline

pub mod config;
pub mod domain;
pub mod executor;
pub mod middleware;
pub mod operation;
pub mod registry;

// Re-export key types for convenient access.
pub use config::RuntimeConfig;
pub use middleware::Pipeline;
pub use operation::{ComposeError, Invocation, Operation, OperationError, Outcome, Phase, Report};
pub use registry::OperationRegistry;
