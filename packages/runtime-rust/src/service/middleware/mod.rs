//! Tower middleware layers for the operation pipeline.
//!
//! - [`chain`]: Runs `authorize` or `validate` and halts on recorded errors
//! - [`transaction`]: Commit/rollback boundary around `execute`
//! - [`logging`]: Start/end invocation events with parameter redaction
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod chain;
pub mod logging;
pub mod pipeline;
pub mod transaction;

pub use chain::ChainLayer;
pub use logging::{InvocationLogLayer, ParameterFilter, FILTERED};
pub use pipeline::{OperationService, Pipeline};
pub use transaction::TransactionLayer;
