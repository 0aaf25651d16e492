use std::any::{type_name, Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::config::RuntimeConfig;
use super::middleware::Pipeline;
use super::operation::{ComposeError, Operation, OperationError, Outcome};
use crate::storage::TransactionalStore;

// ---------------------------------------------------------------------------
// OperationRegistry
// ---------------------------------------------------------------------------

/// Registry of composed operation pipelines.
///
/// Provides two lookup mechanisms:
/// - **By type** (`get::<O>`): uses `TypeId` to recover the typed pipeline
/// - **By name** (`contains`): uses the operation's `name()` string
///
/// Every operation type is composed exactly once. Registering the same type
/// twice, or a second type under a name already in use, is rejected.
pub struct OperationRegistry {
    store: Arc<dyn TransactionalStore>,
    config: Arc<RuntimeConfig>,
    /// Name-based lookup: operation name -> `TypeId` of the owning type.
    by_name: DashMap<&'static str, TypeId>,
    /// Type-based lookup: `TypeId` -> `Arc<Pipeline<O>>` as `Any`.
    by_type: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    /// Registration order.
    order: RwLock<Vec<&'static str>>,
}

impl OperationRegistry {
    /// Creates an empty registry whose pipelines write through `store`.
    #[must_use]
    pub fn new(store: Arc<dyn TransactionalStore>, config: RuntimeConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            by_name: DashMap::new(),
            by_type: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Compose the pipeline for `op` and make it invocable.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::Duplicate`] if `O` is already registered or its
    /// name is taken by another operation type.
    pub fn register<O: Operation>(&self, op: O) -> Result<(), ComposeError> {
        let name = op.name();
        let type_id = TypeId::of::<O>();

        // Serializes registrations so the two maps are checked and filled together.
        let mut order = self.order.write();
        if self.by_type.contains_key(&type_id) || self.by_name.contains_key(name) {
            return Err(ComposeError::Duplicate { name });
        }

        let pipeline = Arc::new(Pipeline::compose(op, Arc::clone(&self.store), &self.config));
        self.by_name.insert(name, type_id);
        self.by_type.insert(type_id, pipeline);
        order.push(name);
        tracing::debug!(operation = name, "operation composed");
        Ok(())
    }

    /// Retrieve the pipeline composed for `O`.
    pub fn get<O: Operation>(&self) -> Option<Arc<Pipeline<O>>> {
        self.by_type
            .get(&TypeId::of::<O>())
            .and_then(|entry| entry.value().clone().downcast::<Pipeline<O>>().ok())
    }

    /// True if an operation named `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Registered operation names, in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.order.read().clone()
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn TransactionalStore> {
        &self.store
    }

    /// Invoke the pipeline registered for `O`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::NotRegistered`] if `O` was never registered,
    /// otherwise whatever the pipeline raises.
    pub async fn invoke<O: Operation>(
        &self,
        input: O::Input,
    ) -> Result<Outcome<O::Output>, OperationError> {
        let pipeline = self.get::<O>().ok_or(OperationError::NotRegistered {
            name: type_name::<O>(),
        })?;
        pipeline.invoke(input).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::service::operation::Report;
    use crate::storage::{MemoryStore, Transaction};
    use crate::testing::{LogCapture, RecordingStore, ScriptedOperation, Step};

    fn registry() -> OperationRegistry {
        OperationRegistry::new(Arc::new(MemoryStore::new()), RuntimeConfig::default())
    }

    /// A distinct operation type that claims the scripted operation's name.
    struct Impostor;

    #[async_trait]
    impl Operation for Impostor {
        type Input = Value;
        type Output = ();

        fn name(&self) -> &'static str {
            "Scripted"
        }

        async fn authorize(&self, _: &Value, _: &mut Report) -> Result<(), OperationError> {
            Ok(())
        }

        async fn validate(&self, _: &Value, _: &mut Report) -> Result<(), OperationError> {
            Ok(())
        }

        async fn execute(
            &self,
            _: &Value,
            _: &mut Report,
            _: &dyn Transaction,
        ) -> Result<Option<()>, OperationError> {
            Ok(Some(()))
        }
    }

    #[test]
    fn register_and_lookup() {
        let registry = registry();
        registry.register(ScriptedOperation::new()).unwrap();

        assert!(registry.contains("Scripted"));
        assert!(!registry.contains("Unknown"));
        assert_eq!(registry.names(), vec!["Scripted"]);
        let pipeline = registry.get::<ScriptedOperation>().unwrap();
        assert_eq!(pipeline.name(), "Scripted");
        assert!(registry.get::<Impostor>().is_none());
    }

    #[test]
    fn same_type_cannot_be_composed_twice() {
        let registry = registry();
        registry.register(ScriptedOperation::new()).unwrap();

        let err = registry
            .register(ScriptedOperation::new().validate(Step::RecordError))
            .unwrap_err();
        assert!(matches!(err, ComposeError::Duplicate { name: "Scripted" }));
        assert_eq!(err.to_string(), "operation `Scripted` is already composed");
        assert_eq!(registry.names().len(), 1);
    }

    #[test]
    fn name_collision_across_types_is_rejected() {
        let registry = registry();
        registry.register(ScriptedOperation::new()).unwrap();

        let err = registry.register(Impostor).unwrap_err();
        assert!(matches!(err, ComposeError::Duplicate { name: "Scripted" }));
        assert!(registry.get::<Impostor>().is_none());
    }

    #[tokio::test]
    async fn rejected_duplicate_leaves_a_single_layer_stack() {
        let capture = LogCapture::new();
        let _guard = capture.install();
        let store = RecordingStore::new();
        let registry =
            OperationRegistry::new(Arc::new(store.clone()), RuntimeConfig::default());
        registry.register(ScriptedOperation::new()).unwrap();
        assert!(registry.register(ScriptedOperation::new()).is_err());

        registry
            .invoke::<ScriptedOperation>(json!({"name": "a"}))
            .await
            .unwrap();

        let events = capture.events();
        let starts = events.iter().filter(|e| e.message() == "start").count();
        let ends = events.iter().filter(|e| e.message() == "end").count();
        assert_eq!((starts, ends), (1, 1));
        assert_eq!(store.begins(), 1);
        assert_eq!(store.commits(), 1);
    }

    #[tokio::test]
    async fn invoking_unregistered_operation_fails() {
        let registry = registry();
        let err = registry
            .invoke::<ScriptedOperation>(json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::NotRegistered { name } if name.ends_with("ScriptedOperation")));
    }

    #[tokio::test]
    async fn invoke_runs_the_registered_pipeline() {
        let registry = registry();
        registry.register(ScriptedOperation::new()).unwrap();

        let outcome = registry
            .invoke::<ScriptedOperation>(json!({"name": "a"}))
            .await
            .unwrap();
        assert_eq!(outcome.value().as_deref(), Some("item-1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_invocations_keep_separate_reports() {
        let registry = Arc::new(registry());
        registry
            .register(ScriptedOperation::new().validate(Step::RecordError))
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    registry
                        .invoke::<ScriptedOperation>(json!({ "n": i }))
                        .await
                })
            })
            .collect();

        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            let errors = outcome.errors().unwrap();
            assert_eq!(errors.len(), 1);
            assert!(errors.added("base", "rejected by validate"));
        }
    }
}
