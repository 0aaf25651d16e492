//! In-memory [`TransactionalStore`] implementation.
//!
//! Committed records live behind a single [`RwLock`], so a commit becomes
//! visible to readers all at once. Each [`MemoryTransaction`] buffers its
//! writes and replays them over the committed state for its own reads.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::storage::engine::{StoreError, Transaction, TransactionalStore};

type Collections = HashMap<String, BTreeMap<String, Value>>;

/// In-memory transactional store for development, tests, and the demo binary.
#[derive(Default, Clone)]
pub struct MemoryStore {
    data: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed records in `collection`.
    #[must_use]
    pub fn len(&self, collection: &str) -> usize {
        self.data.read().get(collection).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl TransactionalStore for MemoryStore {
    async fn begin(&self) -> Result<Arc<dyn Transaction>, StoreError> {
        Ok(Arc::new(MemoryTransaction {
            data: Arc::clone(&self.data),
            writes: Mutex::new(Vec::new()),
            finished: AtomicBool::new(false),
        }))
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .data
            .read()
            .get(collection)
            .and_then(|records| records.get(key))
            .cloned())
    }

    async fn scan(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        Ok(self
            .data
            .read()
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MemoryTransaction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Write {
    Put {
        collection: String,
        key: String,
        value: Value,
    },
    Insert {
        collection: String,
        key: String,
        value: Value,
    },
    Remove {
        collection: String,
        key: String,
    },
}

impl Write {
    fn target(&self) -> (&str, &str) {
        match self {
            Self::Put { collection, key, .. }
            | Self::Insert { collection, key, .. }
            | Self::Remove { collection, key } => (collection.as_str(), key.as_str()),
        }
    }

    /// Value left behind by this write, `None` for a removal.
    fn value(&self) -> Option<&Value> {
        match self {
            Self::Put { value, .. } | Self::Insert { value, .. } => Some(value),
            Self::Remove { .. } => None,
        }
    }
}

/// Buffered transaction over a [`MemoryStore`].
pub struct MemoryTransaction {
    data: Arc<RwLock<Collections>>,
    writes: Mutex<Vec<Write>>,
    finished: AtomicBool,
}

impl MemoryTransaction {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.finished.load(Ordering::Acquire) {
            return Err(StoreError::Finished);
        }
        Ok(())
    }

    /// Value of `(collection, key)` as seen from inside this transaction.
    fn visible(&self, collection: &str, key: &str) -> Option<Value> {
        let writes = self.writes.lock();
        if let Some(last) = writes
            .iter()
            .rev()
            .find(|w| w.target() == (collection, key))
        {
            return last.value().cloned();
        }
        drop(writes);

        self.data
            .read()
            .get(collection)
            .and_then(|records| records.get(key))
            .cloned()
    }

    fn constraint(collection: &str, key: &str) -> StoreError {
        StoreError::Constraint {
            collection: collection.to_string(),
            key: key.to_string(),
            reason: "key already exists".to_string(),
        }
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_open()?;
        Ok(self.visible(collection, key))
    }

    async fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.writes.lock().push(Write::Put {
            collection: collection.to_string(),
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    async fn insert(&self, collection: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.ensure_open()?;
        if self.visible(collection, key).is_some() {
            return Err(Self::constraint(collection, key));
        }
        self.writes.lock().push(Write::Insert {
            collection: collection.to_string(),
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_open()?;
        let previous = self.visible(collection, key);
        self.writes.lock().push(Write::Remove {
            collection: collection.to_string(),
            key: key.to_string(),
        });
        Ok(previous)
    }

    async fn scan(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        self.ensure_open()?;
        let mut records = self
            .data
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default();

        for write in self.writes.lock().iter() {
            let (target, key) = write.target();
            if target != collection {
                continue;
            }
            match write.value() {
                Some(value) => {
                    records.insert(key.to_string(), value.clone());
                }
                None => {
                    records.remove(key);
                }
            }
        }
        Ok(records.into_iter().collect())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        if self.finished.swap(true, Ordering::AcqRel) {
            return Err(StoreError::Finished);
        }
        let writes = std::mem::take(&mut *self.writes.lock());
        let mut data = self.data.write();

        // Re-check insert constraints against the state at commit time; a
        // concurrent commit may have taken the key since it was buffered.
        {
            let mut overlay: HashMap<(&str, &str), bool> = HashMap::new();
            for write in &writes {
                let target = write.target();
                if let Write::Insert { .. } = write {
                    let exists = overlay.get(&target).copied().unwrap_or_else(|| {
                        data.get(target.0)
                            .is_some_and(|records| records.contains_key(target.1))
                    });
                    if exists {
                        return Err(Self::constraint(target.0, target.1));
                    }
                }
                overlay.insert(target, write.value().is_some());
            }
        }

        for write in writes {
            match write {
                Write::Put {
                    collection,
                    key,
                    value,
                }
                | Write::Insert {
                    collection,
                    key,
                    value,
                } => {
                    data.entry(collection).or_default().insert(key, value);
                }
                Write::Remove { collection, key } => {
                    if let Some(records) = data.get_mut(&collection) {
                        records.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        if self.finished.swap(true, Ordering::AcqRel) {
            return Err(StoreError::Finished);
        }
        self.writes.lock().clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
