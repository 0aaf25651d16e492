//! Invocation logging middleware.
//!
//! Emits an `info` "start" event carrying the operation name, the method name
//! and a redacted rendering of the input, and an `info` "end" event once the
//! wrapped call returns. A failed call propagates without an "end" event.
//! Both events are emitted inside an `operation` span that records the
//! duration and outcome.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::config::RuntimeConfig;
use crate::service::operation::{Invocation, OperationError, Phase};

/// Replacement for the values of filtered keys.
pub const FILTERED: &str = "[FILTERED]";

// ---------------------------------------------------------------------------
// ParameterFilter
// ---------------------------------------------------------------------------

/// Denylist of input keys whose values must never reach the logs.
#[derive(Debug, Clone, Default)]
pub struct ParameterFilter {
    denylist: HashSet<String>,
}

impl ParameterFilter {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            denylist: keys.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn is_filtered(&self, key: &str) -> bool {
        self.denylist.contains(key)
    }

    /// Redacts the top-level keys of a mapping. Non-mappings yield `None`.
    #[must_use]
    pub fn filter(&self, value: Value) -> Option<Value> {
        let Value::Object(map) = value else {
            return None;
        };
        let filtered = map
            .into_iter()
            .map(|(key, value)| {
                if self.is_filtered(&key) {
                    (key, Value::String(FILTERED.to_string()))
                } else {
                    (key, value)
                }
            })
            .collect();
        Some(Value::Object(filtered))
    }

    /// Renders `input` for a log line: the redacted mapping as JSON, or an
    /// empty string when the input is not a mapping.
    pub fn render<T: Serialize>(&self, input: &T) -> String {
        serde_json::to_value(input)
            .ok()
            .and_then(|value| self.filter(value))
            .map(|value| value.to_string())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// InvocationLogLayer
// ---------------------------------------------------------------------------

/// Tower layer that logs invocation start and end for one operation type.
#[derive(Debug, Clone)]
pub struct InvocationLogLayer {
    operation: &'static str,
    filter: Arc<ParameterFilter>,
    log_arguments: bool,
}

impl InvocationLogLayer {
    #[must_use]
    pub(crate) fn new(operation: &'static str, config: &RuntimeConfig) -> Self {
        Self {
            operation,
            filter: Arc::new(ParameterFilter::new(config.filter_parameters.iter().cloned())),
            log_arguments: config.log_arguments,
        }
    }
}

impl<S> Layer<S> for InvocationLogLayer {
    type Service = InvocationLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InvocationLogService {
            inner,
            operation: self.operation,
            filter: Arc::clone(&self.filter),
            log_arguments: self.log_arguments,
        }
    }
}

// ---------------------------------------------------------------------------
// InvocationLogService
// ---------------------------------------------------------------------------

/// Service wrapper that brackets each call with start/end log events.
#[derive(Debug, Clone)]
pub struct InvocationLogService<S> {
    inner: S,
    operation: &'static str,
    filter: Arc<ParameterFilter>,
    log_arguments: bool,
}

impl<S, I> Service<Invocation<I>> for InvocationLogService<S>
where
    S: Service<Invocation<I>, Error = OperationError> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    I: Serialize + Send + 'static,
{
    type Response = S::Response;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, OperationError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, invocation: Invocation<I>) -> Self::Future {
        let operation = self.operation;
        let method = Phase::Execute.as_str();
        let args = if self.log_arguments {
            self.filter.render(&invocation.input)
        } else {
            String::new()
        };

        let span = info_span!(
            "operation",
            operation = operation,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(
            async move {
                tracing::info!(operation, method, args = %args, "start");
                let start = Instant::now();
                let result = inner.call(invocation).await;

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = start.elapsed().as_millis() as u64;
                let span = tracing::Span::current();
                span.record("duration_ms", duration_ms);

                match &result {
                    Ok(_) => {
                        span.record("outcome", "ok");
                        tracing::info!(operation, method, "end");
                    }
                    Err(_) => {
                        span.record("outcome", "error");
                    }
                }
                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::testing::LogCapture;

    #[test]
    fn filter_replaces_only_denylisted_keys() {
        let filter = ParameterFilter::new(["password"]);
        let filtered = filter
            .filter(json!({"password": "secret", "name": "a", "nested": {"password": "x"}}))
            .unwrap();

        assert_eq!(
            filtered,
            json!({"password": FILTERED, "name": "a", "nested": {"password": "x"}})
        );
    }

    #[test]
    fn non_mapping_input_is_not_rendered() {
        let filter = ParameterFilter::new(["password"]);
        assert!(filter.filter(json!("secret")).is_none());
        assert_eq!(filter.render(&"secret"), "");
        assert_eq!(filter.render(&vec![1, 2, 3]), "");
    }

    #[test]
    fn render_serializes_structs() {
        #[derive(Serialize)]
        struct Login {
            email: String,
            password: String,
        }

        let filter = ParameterFilter::new(["password"]);
        let rendered = filter.render(&Login {
            email: "a@example.com".to_string(),
            password: "hunter22".to_string(),
        });
        assert!(rendered.contains("a@example.com"));
        assert!(rendered.contains(FILTERED));
        assert!(!rendered.contains("hunter22"));
    }

    proptest! {
        #[test]
        fn filtered_values_never_rendered(secret in "[0-9]{8,16}", name in "[A-Z]{1,6}") {
            let filter = ParameterFilter::new(["password", "token"]);
            let rendered = filter.render(&json!({"password": secret, "token": secret, "name": name}));
            prop_assert!(!rendered.contains(&secret));
            prop_assert!(rendered.contains(&name));
        }
    }

    /// Echoes the input back, or fails when the input says so.
    #[derive(Clone)]
    struct Echo;

    impl Service<Invocation<Value>> for Echo {
        type Response = Value;
        type Error = OperationError;
        type Future = Pin<Box<dyn Future<Output = Result<Value, OperationError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, invocation: Invocation<Value>) -> Self::Future {
            Box::pin(async move {
                if invocation.input.get("fail").is_some() {
                    return Err(OperationError::Internal(anyhow::anyhow!("echo failed")));
                }
                Ok(invocation.input)
            })
        }
    }

    fn layer() -> InvocationLogLayer {
        InvocationLogLayer::new("Echo", &RuntimeConfig::default())
    }

    #[tokio::test]
    async fn start_line_redacts_and_end_line_follows() {
        let capture = LogCapture::new();
        let _guard = capture.install();

        let input = json!({"password": "secret", "name": "a"});
        let resp = layer().layer(Echo).oneshot(Invocation::new(input.clone())).await.unwrap();
        assert_eq!(resp, input);

        let events = capture.events();
        let start = events.iter().find(|e| e.message() == "start").unwrap();
        assert_eq!(start.field("operation"), Some("Echo"));
        assert_eq!(start.field("method"), Some("execute"));
        let args: Value = serde_json::from_str(start.field("args").unwrap()).unwrap();
        assert_eq!(args, json!({"password": FILTERED, "name": "a"}));

        assert!(events.iter().any(|e| e.message() == "end"));
        assert!(!capture.raw().contains("secret"));
    }

    #[tokio::test]
    async fn failure_propagates_without_end_line() {
        let capture = LogCapture::new();
        let _guard = capture.install();

        let err = layer()
            .layer(Echo)
            .oneshot(Invocation::new(json!({"fail": true})))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Internal(_)));

        let events = capture.events();
        assert!(events.iter().any(|e| e.message() == "start"));
        assert!(!events.iter().any(|e| e.message() == "end"));
    }

    #[tokio::test]
    async fn arguments_can_be_omitted() {
        let capture = LogCapture::new();
        let _guard = capture.install();

        let config = RuntimeConfig {
            log_arguments: false,
            ..RuntimeConfig::default()
        };
        InvocationLogLayer::new("Echo", &config)
            .layer(Echo)
            .oneshot(Invocation::new(json!({"name": "a"})))
            .await
            .unwrap();

        let events = capture.events();
        let start = events.iter().find(|e| e.message() == "start").unwrap();
        assert_eq!(start.field("args"), Some(""));
    }
}
