//! Transaction middleware.
//!
//! Opens a transaction on the configured store, hands it to the inner service
//! through [`Invocation::transaction`], and commits on success or rolls back
//! when the inner service fails. Only `execute` sits inside this layer.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::service::operation::{Invocation, OperationError};
use crate::storage::TransactionalStore;

// ---------------------------------------------------------------------------
// TransactionLayer
// ---------------------------------------------------------------------------

/// Tower layer that brackets the wrapped service in a store transaction.
#[derive(Clone)]
pub struct TransactionLayer {
    store: Arc<dyn TransactionalStore>,
}

impl TransactionLayer {
    #[must_use]
    pub(crate) fn new(store: Arc<dyn TransactionalStore>) -> Self {
        Self { store }
    }
}

impl<S> Layer<S> for TransactionLayer {
    type Service = TransactionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TransactionService {
            inner,
            store: Arc::clone(&self.store),
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionService
// ---------------------------------------------------------------------------

/// Service wrapper that commits or rolls back around the inner call.
#[derive(Clone)]
pub struct TransactionService<S> {
    inner: S,
    store: Arc<dyn TransactionalStore>,
}

impl<S, I> Service<Invocation<I>> for TransactionService<S>
where
    S: Service<Invocation<I>, Error = OperationError> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    I: Send + 'static,
{
    type Response = S::Response;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, OperationError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut invocation: Invocation<I>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let store = Arc::clone(&self.store);

        Box::pin(async move {
            let tx = store.begin().await?;
            tracing::debug!("transaction begin");
            invocation.transaction = Some(Arc::clone(&tx));

            match inner.call(invocation).await {
                Ok(response) => {
                    tx.commit().await?;
                    tracing::debug!("transaction commit");
                    Ok(response)
                }
                Err(err) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        tracing::warn!(error = %rollback_err, "transaction rollback failed");
                    } else {
                        tracing::debug!(error = %err, "transaction rollback");
                    }
                    Err(err)
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::testing::RecordingStore;

    /// Writes one record through the invocation's transaction, then succeeds
    /// or fails depending on the input.
    #[derive(Clone)]
    struct WriteThrough;

    impl Service<Invocation<bool>> for WriteThrough {
        type Response = &'static str;
        type Error = OperationError;
        type Future =
            Pin<Box<dyn Future<Output = Result<&'static str, OperationError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, invocation: Invocation<bool>) -> Self::Future {
            Box::pin(async move {
                let tx = invocation
                    .transaction
                    .ok_or(OperationError::MissingTransaction)?;
                tx.put("items", "k", json!("v")).await?;
                if invocation.input {
                    Ok("written")
                } else {
                    Err(OperationError::Internal(anyhow::anyhow!("failed after write")))
                }
            })
        }
    }

    #[tokio::test]
    async fn commits_and_returns_response_unchanged() {
        let store = RecordingStore::new();
        let svc = TransactionLayer::new(Arc::new(store.clone())).layer(WriteThrough);

        let resp = svc.oneshot(Invocation::new(true)).await.unwrap();
        assert_eq!(resp, "written");
        assert_eq!(store.begins(), 1);
        assert_eq!(store.commits(), 1);
        assert_eq!(store.rollbacks(), 0);
        assert_eq!(store.inner.len("items"), 1);
    }

    #[tokio::test]
    async fn rolls_back_and_propagates_error_unchanged() {
        let store = RecordingStore::new();
        let svc = TransactionLayer::new(Arc::new(store.clone())).layer(WriteThrough);

        let err = svc.oneshot(Invocation::new(false)).await.unwrap_err();
        assert!(matches!(err, OperationError::Internal(ref e) if e.to_string() == "failed after write"));
        assert_eq!(store.begins(), 1);
        assert_eq!(store.commits(), 0);
        assert_eq!(store.rollbacks(), 1);
        assert_eq!(store.inner.len("items"), 0);
    }
}
