//! Test doubles for pipelines and their logs.
//!
//! Compiled for this crate's unit tests and, with the `testing` feature, for
//! integration tests and downstream crates.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use logicbase_core::{AddOptions, Reason, BASE};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

use crate::service::operation::{Operation, OperationError, Phase, Report};
use crate::storage::{MemoryStore, StoreError, Transaction, TransactionalStore};

// ---------------------------------------------------------------------------
// ScriptedOperation
// ---------------------------------------------------------------------------

/// What a scripted `authorize` or `validate` phase does.
#[derive(Debug, Clone, Copy, Default)]
pub enum Step {
    #[default]
    Pass,
    /// Records `base: "rejected by <phase>"` in the errors.
    RecordError,
    /// Records `base: "noted by <phase>"` in the warnings.
    RecordWarning,
    /// Strict-adds `name: is invalid`, which raises.
    Strict,
    /// Returns an internal error.
    Fail,
}

/// What a scripted `execute` phase does.
#[derive(Debug, Clone, Copy, Default)]
pub enum ExecuteStep {
    /// Writes the input to `items/item-1` and returns `"item-1"`.
    #[default]
    Persist,
    /// Writes the input, then fails with "execute exploded".
    Fail,
    /// Returns no value.
    Nothing,
    /// Records `base: "rejected by execute"` and returns no value.
    RecordError,
    /// Inserts `items/item-1` twice.
    Conflict,
}

/// Operation whose phases follow a script and whose calls are recorded.
#[derive(Debug, Default)]
pub struct ScriptedOperation {
    authorize: Step,
    validate: Step,
    execute: ExecuteStep,
    calls: Arc<Mutex<Vec<Phase>>>,
}

impl ScriptedOperation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn authorize(mut self, step: Step) -> Self {
        self.authorize = step;
        self
    }

    #[must_use]
    pub fn validate(mut self, step: Step) -> Self {
        self.validate = step;
        self
    }

    #[must_use]
    pub fn execute(mut self, step: ExecuteStep) -> Self {
        self.execute = step;
        self
    }

    /// Phases run so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Phase> {
        self.calls.lock().clone()
    }

    /// Shared handle to the call log, usable after the operation is moved.
    #[must_use]
    pub fn call_log(&self) -> Arc<Mutex<Vec<Phase>>> {
        Arc::clone(&self.calls)
    }

    fn run(&self, phase: Phase, step: Step, report: &mut Report) -> Result<(), OperationError> {
        self.calls.lock().push(phase);
        match step {
            Step::Pass => {}
            Step::RecordError => report
                .errors
                .add(BASE, format!("rejected by {}", phase.as_str())),
            Step::RecordWarning => report
                .warnings
                .add(BASE, format!("noted by {}", phase.as_str())),
            Step::Strict => report
                .errors
                .add_with("name", Reason::Invalid, AddOptions::STRICT)?,
            Step::Fail => {
                return Err(OperationError::Internal(anyhow::anyhow!(
                    "{} exploded",
                    phase.as_str()
                )))
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Operation for ScriptedOperation {
    type Input = Value;
    type Output = String;

    fn name(&self) -> &'static str {
        "Scripted"
    }

    async fn authorize(&self, _input: &Value, report: &mut Report) -> Result<(), OperationError> {
        self.run(Phase::Authorize, self.authorize, report)
    }

    async fn validate(&self, _input: &Value, report: &mut Report) -> Result<(), OperationError> {
        self.run(Phase::Validate, self.validate, report)
    }

    async fn execute(
        &self,
        input: &Value,
        report: &mut Report,
        tx: &dyn Transaction,
    ) -> Result<Option<String>, OperationError> {
        self.calls.lock().push(Phase::Execute);
        match self.execute {
            ExecuteStep::Persist => {
                tx.put("items", "item-1", input.clone()).await?;
                Ok(Some("item-1".to_string()))
            }
            ExecuteStep::Fail => {
                tx.put("items", "item-1", input.clone()).await?;
                Err(OperationError::Internal(anyhow::anyhow!("execute exploded")))
            }
            ExecuteStep::Nothing => Ok(None),
            ExecuteStep::RecordError => {
                report.errors.add(BASE, "rejected by execute");
                Ok(None)
            }
            ExecuteStep::Conflict => {
                tx.insert("items", "item-1", input.clone()).await?;
                tx.insert("items", "item-1", input.clone()).await?;
                Ok(Some("item-1".to_string()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Counters {
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

/// [`MemoryStore`] wrapper that counts transaction boundaries.
#[derive(Clone, Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    counters: Arc<Counters>,
}

impl RecordingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn begins(&self) -> usize {
        self.counters.begins.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn commits(&self) -> usize {
        self.counters.commits.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.counters.rollbacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionalStore for RecordingStore {
    async fn begin(&self) -> Result<Arc<dyn Transaction>, StoreError> {
        self.counters.begins.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(RecordingTransaction {
            inner: self.inner.begin().await?,
            counters: Arc::clone(&self.counters),
        }))
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        TransactionalStore::get(&self.inner, collection, key).await
    }

    async fn scan(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        TransactionalStore::scan(&self.inner, collection).await
    }
}

struct RecordingTransaction {
    inner: Arc<dyn Transaction>,
    counters: Arc<Counters>,
}

#[async_trait]
impl Transaction for RecordingTransaction {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(collection, key).await
    }

    async fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.inner.put(collection, key, value).await
    }

    async fn insert(&self, collection: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.inner.insert(collection, key, value).await
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        self.inner.remove(collection, key).await
    }

    async fn scan(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        self.inner.scan(collection).await
    }

    async fn commit(&self) -> Result<(), StoreError> {
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit().await
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.inner.rollback().await
    }
}

// ---------------------------------------------------------------------------
// LogCapture
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = BufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BufferWriter(Arc::clone(&self.0))
    }
}

impl io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Collects JSON-formatted tracing output for the current thread.
#[derive(Clone, Default)]
pub struct LogCapture {
    sink: SharedBuffer,
}

impl LogCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes this thread's events into the capture until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.sink.clone())
            .json()
            .with_max_level(Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Everything written so far.
    #[must_use]
    pub fn raw(&self) -> String {
        String::from_utf8_lossy(&self.sink.0.lock()).into_owned()
    }

    /// One entry per captured event, in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<LogEvent> {
        self.raw()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| LogEvent(serde_json::from_str(line).unwrap_or_else(|_| json!({}))))
            .collect()
    }
}

/// A single parsed JSON log line.
#[derive(Debug, Clone)]
pub struct LogEvent(pub Value);

impl LogEvent {
    #[must_use]
    pub fn message(&self) -> &str {
        self.field("message").unwrap_or_default()
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.0.get("fields")?.get(name)?.as_str()
    }
}
