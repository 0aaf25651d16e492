//! Pipeline composition: combines the phase, transaction, and logging layers
//! around an operation's `execute` into a single service stack.

use std::sync::Arc;

use parking_lot::Mutex;
use tower::util::BoxCloneService;
use tower::{ServiceBuilder, ServiceExt};

use super::chain::ChainLayer;
use super::logging::InvocationLogLayer;
use super::transaction::TransactionLayer;
use crate::service::config::RuntimeConfig;
use crate::service::executor::ExecuteService;
use crate::service::operation::{Invocation, Operation, OperationError, Outcome};
use crate::storage::TransactionalStore;

/// Type-erased, cloneable pipeline service for one operation type.
pub type OperationService<O> = BoxCloneService<
    Invocation<<O as Operation>::Input>,
    Outcome<<O as Operation>::Output>,
    OperationError,
>;

/// Build the operation pipeline by wrapping `execute` with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `InvocationLogLayer` -- start/end log events around the whole invocation
/// 2. `ChainLayer::authorize` -- halt on authorization errors
/// 3. `ChainLayer::validate` -- halt on validation errors
/// 4. `TransactionLayer` -- commit or roll back around `execute` only
///
/// The returned service implements `tower::Service<Invocation<O::Input>>`.
#[must_use]
pub(crate) fn build_operation_pipeline<O: Operation>(
    op: Arc<O>,
    store: Arc<dyn TransactionalStore>,
    config: &RuntimeConfig,
) -> OperationService<O> {
    let service = ServiceBuilder::new()
        .layer(InvocationLogLayer::new(op.name(), config))
        .layer(ChainLayer::authorize(Arc::clone(&op)))
        .layer(ChainLayer::validate(Arc::clone(&op)))
        .layer(TransactionLayer::new(store))
        .service(ExecuteService::new(op));
    BoxCloneService::new(service)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A composed pipeline shared by every invocation of one operation type.
///
/// Built once by [`OperationRegistry`](crate::service::OperationRegistry).
/// Each invocation clones the service stack and drives its own copy, so
/// concurrent invocations never share a [`Report`](crate::service::Report).
///
/// The registry is the only place a pipeline is composed. Neither the
/// composer nor the layer constructors are reachable from other crates:
///
/// ```compile_fail
/// use logicbase_runtime::service::middleware::pipeline::build_operation_pipeline;
/// ```
///
/// ```compile_fail
/// use logicbase_runtime::service::middleware::InvocationLogLayer;
/// use logicbase_runtime::RuntimeConfig;
///
/// let _layer = InvocationLogLayer::new("CreateMicropost", &RuntimeConfig::default());
/// ```
///
/// ```compile_fail
/// use std::sync::Arc;
/// use logicbase_runtime::service::middleware::TransactionLayer;
/// use logicbase_runtime::MemoryStore;
///
/// let _layer = TransactionLayer::new(Arc::new(MemoryStore::new()));
/// ```
pub struct Pipeline<O: Operation> {
    name: &'static str,
    service: Mutex<OperationService<O>>,
}

impl<O: Operation> Pipeline<O> {
    pub(crate) fn compose(op: O, store: Arc<dyn TransactionalStore>, config: &RuntimeConfig) -> Self {
        let name = op.name();
        Self {
            name,
            service: Mutex::new(build_operation_pipeline(Arc::new(op), store, config)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run `authorize`, `validate`, and `execute` for `input`.
    ///
    /// # Errors
    ///
    /// Returns any failure raised (not recorded) by a phase or by the store.
    pub async fn invoke(&self, input: O::Input) -> Result<Outcome<O::Output>, OperationError> {
        let service = self.service.lock().clone();
        service.oneshot(Invocation::new(input)).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
