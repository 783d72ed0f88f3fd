//! In-memory storage implementation.
//!
//! Records are kept as BSON documents in insertion-ordered maps behind async-safe
//! read-write locks, one map per namespace.

use std::sync::Arc;

use async_trait::async_trait;
use bson::{Bson, Uuid};
use indexmap::IndexMap;
use mea::rwlock::RwLock;
use tracing::debug;

use docmodel_core::{
    backend::{ID_FIELD, StoreBackend, StoreBackendBuilder},
    document::record_key,
    error::{ModelError, ModelResult},
    query::{Query, SortDirection},
};

use crate::evaluator::{DocumentEvaluator, compare_by};

type NamespaceMap = IndexMap<String, Bson>;
type StoreMap = IndexMap<String, NamespaceMap>;

/// Thread-safe in-memory storage backend.
///
/// Records of a namespace are returned in the order they were first written;
/// rewriting a record keeps its position.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Queries scan every record of the namespace (no indexing).
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel_core::backend::StoreBackend;
/// use bson::{Bson, doc};
///
/// let store = InMemoryStore::new();
///
/// let stored = store.write("tests", Bson::Document(doc! { "title": "foo" })).await?;
/// let id = stored.as_document().unwrap().get_str("id")?;
///
/// assert_eq!(store.read_one("tests", id).await?, stored);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// namespace -> (record id -> record)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// ```ignore
    /// let store = InMemoryStore::builder().build().await?;
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Number of records held in `namespace`.
    pub async fn count(&self, namespace: &str) -> usize {
        self.store
            .read()
            .await
            .get(namespace)
            .map_or(0, IndexMap::len)
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn read_many(&self, namespace: &str, query: Query) -> ModelResult<Vec<Bson>> {
        let store = self.store.read().await;
        let records = match store.get(namespace) {
            Some(records) => records,
            None => return Ok(vec![]),
        };

        let mut matched = match &query.filter {
            Some(filter) => DocumentEvaluator::filter_documents(records.values(), filter)?,
            None => records.values().cloned().collect(),
        };
        drop(store);

        if let Some(sort) = &query.sort {
            matched.sort_by(|a, b| match sort.direction {
                SortDirection::Asc => compare_by(a, b, &sort.field),
                SortDirection::Desc => compare_by(b, a, &sort.field),
            });
        }

        let matched: Vec<Bson> = matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();

        debug!(namespace, count = matched.len(), "read records");
        Ok(matched)
    }

    async fn read_one(&self, namespace: &str, id: &str) -> ModelResult<Bson> {
        self.store
            .read()
            .await
            .get(namespace)
            .and_then(|records| records.get(id))
            .cloned()
            .ok_or_else(|| ModelError::not_found(namespace, id))
    }

    async fn write(&self, namespace: &str, mut record: Bson) -> ModelResult<Bson> {
        let key = match record_key(&record) {
            Some(key) => key,
            None => match record.as_document_mut() {
                Some(document) => {
                    let key = Uuid::new().to_string();
                    document.insert(ID_FIELD, key.clone());
                    key
                }
                None => {
                    return Err(ModelError::InvalidDocument(format!(
                        "cannot write {record} as a record"
                    )));
                }
            },
        };

        self.store
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .insert(key.clone(), record.clone());

        debug!(namespace, id = %key, "wrote record");
        Ok(record)
    }

    async fn delete(&self, namespace: &str, id: &str) -> ModelResult<()> {
        let mut store = self.store.write().await;

        store
            .get_mut(namespace)
            .and_then(|records| records.shift_remove(id))
            .map(|_| ())
            .ok_or_else(|| ModelError::not_found(namespace, id))
    }

    async fn drop_namespace(&self, namespace: &str) -> ModelResult<()> {
        self.store.write().await.shift_remove(namespace);
        Ok(())
    }

    async fn list_namespaces(&self) -> ModelResult<Vec<String>> {
        Ok(self
            .store
            .read()
            .await
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(namespace, _)| namespace.clone())
            .collect())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`]. This always succeeds.
    async fn build(self) -> ModelResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
