//! The shared store handle models and collections are built from.
//!
//! [`ModelStore`] wraps one backend behind dynamic dispatch so that collection and
//! model types never carry a backend type parameter. Cloning the handle is cheap and
//! every clone talks to the same backend.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//!
//! let store = ModelStore::new(InMemoryStore::builder().build().await?);
//! let tests = store.collection::<TestCollection>(TemplateParams::new());
//! tests.create(attributes).await?;
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    collection::{Collection, CollectionKind},
    document::Attributes,
    error::ModelResult,
    model::{Model, ModelKind},
    template::TemplateParams,
};

/// Cloneable handle to a storage backend.
#[derive(Debug, Clone)]
pub struct ModelStore {
    backend: Arc<dyn DynStoreBackend>,
}

impl ModelStore {
    /// Creates a store handle over the given backend.
    pub fn new<B: StoreBackend + 'static>(backend: B) -> Self {
        Self { backend: Arc::new(backend) }
    }

    /// Creates a store handle over an already type-erased backend.
    pub fn from_dyn(backend: Box<dyn DynStoreBackend>) -> Self {
        Self { backend: Arc::from(backend) }
    }

    /// The backend this handle dispatches to.
    pub fn backend(&self) -> &dyn DynStoreBackend {
        &*self.backend
    }

    /// Returns the backend as its concrete type, if it is a `B`.
    pub fn backend_as<B: StoreBackend + 'static>(&self) -> Option<&B> {
        self.backend.as_any().downcast_ref::<B>()
    }

    /// Builds a collection of type `C` specialised with `params`.
    pub fn collection<C: CollectionKind>(&self, params: TemplateParams) -> Collection<C> {
        Collection::new(self, params)
    }

    /// Builds a collection of type `C` pre-populated with raw attribute objects.
    pub fn collection_with<C, I>(&self, models: I, params: TemplateParams) -> ModelResult<Collection<C>>
    where
        C: CollectionKind,
        I: IntoIterator<Item = Value>,
    {
        Collection::with_models(self, models, params)
    }

    /// Builds a standalone model of kind `K`.
    pub fn model<K: ModelKind>(&self, attributes: Attributes) -> Model<K> {
        Model::new(self, attributes)
    }

    /// Removes every record of a namespace.
    pub async fn drop_namespace(&self, namespace: &str) -> ModelResult<()> {
        self.backend.drop_namespace(namespace).await
    }

    /// Lists the namespaces that currently hold records.
    pub async fn list_namespaces(&self) -> ModelResult<Vec<String>> {
        self.backend.list_namespaces().await
    }

    /// Shuts the backend down. Other clones of this handle must not be used afterwards.
    pub async fn shutdown(self) -> ModelResult<()> {
        self.backend.shutdown().await
    }
}
