//! Innermost service of every pipeline: runs an operation's `execute` phase.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;

use super::operation::{Invocation, Operation, OperationError, Outcome};

/// Calls [`Operation::execute`] with the transaction opened by the
/// surrounding transaction layer.
pub struct ExecuteService<O> {
    op: Arc<O>,
}

impl<O> ExecuteService<O> {
    #[must_use]
    pub(crate) fn new(op: Arc<O>) -> Self {
        Self { op }
    }
}

impl<O> Clone for ExecuteService<O> {
    fn clone(&self) -> Self {
        Self {
            op: Arc::clone(&self.op),
        }
    }
}

impl<O: Operation> Service<Invocation<O::Input>> for ExecuteService<O> {
    type Response = Outcome<O::Output>;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, OperationError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut invocation: Invocation<O::Input>) -> Self::Future {
        let op = Arc::clone(&self.op);
        Box::pin(async move {
            let tx = invocation
                .transaction
                .take()
                .ok_or(OperationError::MissingTransaction)?;
            let value = op
                .execute(&invocation.input, &mut invocation.report, tx.as_ref())
                .await?;

            Ok(match value {
                Some(value) => Outcome::Value(value),
                None => Outcome::Report(invocation.report),
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
