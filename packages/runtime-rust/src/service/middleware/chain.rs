//! Phase chaining middleware.
//!
//! A [`ChainLayer`] runs one guard phase (`authorize` or `validate`) in front
//! of the inner service and short-circuits with the invocation's report when
//! that phase leaves errors behind.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::service::operation::{Invocation, Operation, OperationError, Outcome, Phase};

#[derive(Debug, Clone, Copy)]
enum Guard {
    Authorize,
    Validate,
}

impl Guard {
    fn phase(self) -> Phase {
        match self {
            Self::Authorize => Phase::Authorize,
            Self::Validate => Phase::Validate,
        }
    }
}

// ---------------------------------------------------------------------------
// ChainLayer
// ---------------------------------------------------------------------------

/// Tower layer that inserts a guard phase before the wrapped service.
pub struct ChainLayer<O> {
    op: Arc<O>,
    guard: Guard,
}

impl<O> ChainLayer<O> {
    /// Run `authorize` before the inner service.
    #[must_use]
    pub(crate) fn authorize(op: Arc<O>) -> Self {
        Self {
            op,
            guard: Guard::Authorize,
        }
    }

    /// Run `validate` before the inner service.
    #[must_use]
    pub(crate) fn validate(op: Arc<O>) -> Self {
        Self {
            op,
            guard: Guard::Validate,
        }
    }
}

impl<O> Clone for ChainLayer<O> {
    fn clone(&self) -> Self {
        Self {
            op: Arc::clone(&self.op),
            guard: self.guard,
        }
    }
}

impl<S, O> Layer<S> for ChainLayer<O> {
    type Service = ChainService<S, O>;

    fn layer(&self, inner: S) -> Self::Service {
        ChainService {
            inner,
            op: Arc::clone(&self.op),
            guard: self.guard,
        }
    }
}

// ---------------------------------------------------------------------------
// ChainService
// ---------------------------------------------------------------------------

/// Service wrapper that runs a guard phase and halts on recorded errors.
pub struct ChainService<S, O> {
    inner: S,
    op: Arc<O>,
    guard: Guard,
}

impl<S: Clone, O> Clone for ChainService<S, O> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            op: Arc::clone(&self.op),
            guard: self.guard,
        }
    }
}

impl<S, O> Service<Invocation<O::Input>> for ChainService<S, O>
where
    O: Operation,
    S: Service<Invocation<O::Input>, Response = Outcome<O::Output>, Error = OperationError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = Outcome<O::Output>;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, OperationError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut invocation: Invocation<O::Input>) -> Self::Future {
        // Take the service that was driven to readiness and leave a clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let op = Arc::clone(&self.op);
        let guard = self.guard;

        Box::pin(async move {
            match guard {
                Guard::Authorize => {
                    op.authorize(&invocation.input, &mut invocation.report)
                        .await?;
                }
                Guard::Validate => {
                    op.validate(&invocation.input, &mut invocation.report)
                        .await?;
                }
            }

            if !invocation.report.errors.is_empty() {
                tracing::debug!(
                    operation = op.name(),
                    phase = guard.phase().as_str(),
                    errors = invocation.report.errors.len(),
                    "halted on recorded errors"
                );
                return Ok(Outcome::Report(invocation.report));
            }

            inner.call(invocation).await
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
