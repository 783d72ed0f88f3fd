//! Storage backend abstraction.
//!
//! Models and collections never talk to a concrete store. They go through the narrow
//! [`StoreBackend`] protocol: read many records of a namespace by filter, read one by
//! id, write one, delete one. A namespace is the resolved address of a collection
//! (for example `users/1/tests`), see [`crate::filter::EffectiveFilter::url`].
//!
//! # Records
//!
//! A record is a BSON document. Its identity is the string field named by
//! [`ID_FIELD`]. [`StoreBackend::write`] assigns a fresh id when the record has none
//! and returns the record as stored.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances

use async_trait::async_trait;
use bson::Bson;
use std::{any::Any, fmt::Debug};

use crate::{error::ModelResult, query::Query};

/// Name of the identity field of every record.
pub const ID_FIELD: &str = "id";

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. Bulk operations on a collection issue their store calls concurrently.
///
/// # Error Handling
///
/// Addressing an absent record with [`read_one`](StoreBackend::read_one) or
/// [`delete`](StoreBackend::delete) yields [`ModelError::NotFound`](crate::error::ModelError::NotFound).
/// Transport or engine failures yield [`ModelError::StoreFailure`](crate::error::ModelError::StoreFailure)
/// with the original error as its source. Backends do not retry.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the records of `namespace` matching `query`, in store order.
    ///
    /// An unknown namespace holds no records and yields an empty vector.
    async fn read_many(&self, namespace: &str, query: Query) -> ModelResult<Vec<Bson>>;

    /// Returns the record of `namespace` with the given id.
    async fn read_one(&self, namespace: &str, id: &str) -> ModelResult<Bson>;

    /// Stores `record` in `namespace` and returns it as stored.
    ///
    /// A record without an id is inserted under a newly generated id. A record with an
    /// id replaces any existing record with that id, or is inserted if there is none.
    async fn write(&self, namespace: &str, record: Bson) -> ModelResult<Bson>;

    /// Removes the record of `namespace` with the given id.
    async fn delete(&self, namespace: &str, id: &str) -> ModelResult<()>;

    /// Removes a namespace and all of its records. Unknown namespaces are ignored.
    async fn drop_namespace(&self, namespace: &str) -> ModelResult<()>;

    /// Lists the namespaces that currently hold records.
    async fn list_namespaces(&self) -> ModelResult<Vec<String>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// Backends are shared between every model and collection built from one
    /// [`ModelStore`](crate::store::ModelStore), so shutting down takes `&self`; no
    /// further calls are expected afterwards. The default implementation is a no-op,
    /// but backends with external connections should override this.
    async fn shutdown(&self) -> ModelResult<()> {
        Ok(())
    }
}

/// Object-safe counterpart of [`StoreBackend`], implemented for every backend.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn read_many(&self, namespace: &str, query: Query) -> ModelResult<Vec<Bson>>;
    async fn read_one(&self, namespace: &str, id: &str) -> ModelResult<Bson>;
    async fn write(&self, namespace: &str, record: Bson) -> ModelResult<Bson>;
    async fn delete(&self, namespace: &str, id: &str) -> ModelResult<()>;
    async fn drop_namespace(&self, namespace: &str) -> ModelResult<()>;
    async fn list_namespaces(&self) -> ModelResult<Vec<String>>;
    async fn shutdown(&self) -> ModelResult<()>;

    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn read_many(&self, namespace: &str, query: Query) -> ModelResult<Vec<Bson>> {
        StoreBackend::read_many(self, namespace, query).await
    }

    async fn read_one(&self, namespace: &str, id: &str) -> ModelResult<Bson> {
        StoreBackend::read_one(self, namespace, id).await
    }

    async fn write(&self, namespace: &str, record: Bson) -> ModelResult<Bson> {
        StoreBackend::write(self, namespace, record).await
    }

    async fn delete(&self, namespace: &str, id: &str) -> ModelResult<()> {
        StoreBackend::delete(self, namespace, id).await
    }

    async fn drop_namespace(&self, namespace: &str) -> ModelResult<()> {
        StoreBackend::drop_namespace(self, namespace).await
    }

    async fn list_namespaces(&self) -> ModelResult<Vec<String>> {
        StoreBackend::list_namespaces(self).await
    }

    async fn shutdown(&self) -> ModelResult<()> {
        StoreBackend::shutdown(self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory for a backend, typically holding its connection settings.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> ModelResult<Self::Backend>;
}
