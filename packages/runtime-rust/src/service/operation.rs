//! Operation trait and the values that flow through its pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use logicbase_core::{Messages, StrictValidationFailed};
use serde::{Deserialize, Serialize};

use crate::storage::{StoreError, Transaction};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The three lifecycle phases, in invocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Authorize,
    Validate,
    Execute,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authorize => "authorize",
            Self::Validate => "validate",
            Self::Execute => "execute",
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Errors and warnings recorded during a single invocation.
///
/// A fresh report is created for every invocation. The pipeline stops after
/// any phase that leaves `errors` non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub errors: Messages,
    pub warnings: Messages,
}

impl Report {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if no errors have been recorded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Operation trait
// ---------------------------------------------------------------------------

/// A unit of business logic with a fixed `authorize -> validate -> execute`
/// lifecycle.
///
/// Implementations define the three phases; the pipeline chains them, opens a
/// transaction around `execute` only, and logs the invocation. Phases record
/// expected failures in `report.errors` and return `Ok(())`. Returning `Err`
/// is reserved for strict validation failures, store failures, and bugs.
///
/// An operation value is shared by every invocation of its pipeline, so
/// per-invocation state belongs in the [`Report`], never in `self`.
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    /// Argument passed to every phase. Serialized (and redacted) for logging.
    type Input: Serialize + Send + Sync + 'static;
    /// Value produced by a successful `execute`.
    type Output: Send + 'static;

    /// Type name used in log lines and registry lookup (e.g. `"CreateMicropost"`).
    fn name(&self) -> &'static str;

    /// Permission and precondition checks.
    async fn authorize(&self, input: &Self::Input, report: &mut Report)
        -> Result<(), OperationError>;

    /// Input-shape and business-rule validation.
    async fn validate(&self, input: &Self::Input, report: &mut Report)
        -> Result<(), OperationError>;

    /// The effect itself, run inside `tx`.
    ///
    /// Returning `Ok(None)` hands the caller the `{errors, warnings}` report
    /// instead of a value.
    async fn execute(
        &self,
        input: &Self::Input,
        report: &mut Report,
        tx: &dyn Transaction,
    ) -> Result<Option<Self::Output>, OperationError>;
}

// ---------------------------------------------------------------------------
// Invocation / Outcome
// ---------------------------------------------------------------------------

/// Request type threaded through the pipeline layers.
pub struct Invocation<I> {
    pub input: I,
    pub report: Report,
    /// Set by the transaction layer immediately before `execute`.
    pub transaction: Option<Arc<dyn Transaction>>,
}

impl<I> Invocation<I> {
    #[must_use]
    pub fn new(input: I) -> Self {
        Self {
            input,
            report: Report::new(),
            transaction: None,
        }
    }
}

/// Result of a completed pipeline run.
///
/// Serializes untagged: either the value itself or `{"errors": .., "warnings": ..}`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Outcome<T> {
    /// `execute` ran and returned a value.
    Value(T),
    /// The pipeline halted on recorded errors, or `execute` returned no value.
    Report(Report),
}

impl<T> Outcome<T> {
    /// The `execute` value, if there is one.
    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Report(_) => None,
        }
    }

    /// The report, if the pipeline did not produce a value.
    #[must_use]
    pub fn report(&self) -> Option<&Report> {
        match self {
            Self::Value(_) => None,
            Self::Report(report) => Some(report),
        }
    }

    /// Recorded errors, if the pipeline did not produce a value.
    #[must_use]
    pub fn errors(&self) -> Option<&Messages> {
        self.report().map(|report| &report.errors)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures raised (not recorded) by an operation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("strict validation failed: {0}")]
    StrictValidation(#[from] StrictValidationFailed),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("operation is not registered: {name}")]
    NotRegistered { name: &'static str },
    #[error("execute phase reached without an open transaction")]
    MissingTransaction,
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Structural errors raised while composing operation pipelines.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("operation `{name}` is already composed")]
    Duplicate { name: &'static str },
}
