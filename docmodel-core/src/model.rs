//! Single-document models.
//!
//! A [`Model`] is an attribute bag with an identity, bound to a namespace of a
//! [`ModelStore`]. Its behaviour is configured by a [`ModelKind`]: the namespace
//! template of standalone models, the pre-save hook, and the default projection.
//!
//! A model that belongs to a [`Collection`](crate::collection::Collection) keeps a
//! non-owning reference to the collection's member list. Destroying it removes it
//! from the collection; saving or fetching it refreshes the collection's entry.

use std::{
    fmt,
    marker::PhantomData,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::{
    backend::ID_FIELD,
    document::{Attributes, from_record, id_key, to_record},
    error::{ModelError, ModelResult},
    projection::{Projectable, ProjectionOptions, project},
    store::ModelStore,
    template::{TemplateParams, resolve_path},
};

/// Member list shared between a collection and the models it holds.
pub(crate) type Members<K> = RwLock<Vec<Model<K>>>;

static NEXT_CID: AtomicU64 = AtomicU64::new(1);

/// Per-type configuration of a model.
///
/// # Example
///
/// ```ignore
/// struct Failing;
///
/// impl ModelKind for Failing {
///     fn namespace() -> &'static str { "failing" }
///
///     fn pre_save(_attributes: &Attributes) -> Result<(), String> {
///         Err("foo reason".to_string())
///     }
/// }
/// ```
pub trait ModelKind: Send + Sync + 'static {
    /// Store address of standalone models. May contain `{name}` path segments,
    /// resolved by [`Model::with_params`].
    fn namespace() -> &'static str;

    /// Runs before every write. An `Err` rejects the write with
    /// [`ModelError::ValidationFailed`] carrying the message verbatim.
    fn pre_save(_attributes: &Attributes) -> Result<(), String> {
        Ok(())
    }

    /// Projection used when no explicit options are given.
    fn default_projection() -> ProjectionOptions {
        ProjectionOptions::include_all()
    }
}

/// A single document of kind `K`.
pub struct Model<K: ModelKind> {
    cid: u64,
    attributes: Attributes,
    namespace: String,
    store: ModelStore,
    owner: Option<Weak<Members<K>>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ModelKind> Model<K> {
    /// Creates a model in the namespace declared by `K`.
    pub fn new(store: &ModelStore, attributes: Attributes) -> Self {
        Self::with_params(store, attributes, &TemplateParams::new())
    }

    /// Creates a model whose namespace template is resolved with `params`.
    pub fn with_params(store: &ModelStore, attributes: Attributes, params: &TemplateParams) -> Self {
        Self::in_namespace(store, resolve_path(K::namespace(), params), attributes)
    }

    pub(crate) fn in_namespace(store: &ModelStore, namespace: String, attributes: Attributes) -> Self {
        Self {
            cid: NEXT_CID.fetch_add(1, Ordering::Relaxed),
            attributes,
            namespace,
            store: store.clone(),
            owner: None,
            _kind: PhantomData,
        }
    }

    pub(crate) fn attach(&mut self, owner: &Arc<Members<K>>, namespace: &str) {
        self.owner = Some(Arc::downgrade(owner));
        self.namespace = namespace.to_string();
    }

    pub(crate) fn adopt_cid(&mut self, cid: u64) {
        self.cid = cid;
    }

    /// Whether `other` is the same collection entry: same client id, or the same
    /// persisted key.
    pub(crate) fn same_entry(&self, other: &Self) -> bool {
        if self.cid == other.cid {
            return true;
        }

        match (self.key(), other.key()) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }

    /// Process-unique client id, stable across clones of this model.
    pub fn cid(&self) -> u64 {
        self.cid
    }

    /// The persisted identity, absent until the model has been saved.
    pub fn id(&self) -> Option<&Value> {
        self.attributes
            .get(ID_FIELD)
            .filter(|id| !id.is_null())
    }

    /// The string key the model's record is addressed by.
    pub fn key(&self) -> Option<String> {
        self.id().and_then(id_key)
    }

    /// Whether the model has never been persisted.
    pub fn is_new(&self) -> bool {
        self.key().is_none()
    }

    /// The namespace the model is stored in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Reads one attribute from memory.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Sets one attribute in memory. Nothing is written until [`save`](Model::save).
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Merges `attributes` into the bag, overwriting existing keys.
    pub fn merge(&mut self, attributes: Attributes) -> &mut Self {
        self.attributes.extend(attributes);
        self
    }

    /// Removes one attribute from memory.
    pub fn unset(&mut self, name: &str) -> Option<Value> {
        self.attributes.shift_remove(name)
    }

    /// Whether the model currently belongs to a live collection.
    pub fn is_attached(&self) -> bool {
        self.owner
            .as_ref()
            .is_some_and(|owner| owner.strong_count() > 0)
    }

    /// Merges `attributes` and saves the model, assigning its id.
    ///
    /// The merged attributes are validated before the model adopts them, so a
    /// rejected create leaves the model unchanged.
    pub async fn create(&mut self, attributes: Attributes) -> ModelResult<()> {
        let mut merged = self.attributes.clone();
        merged.extend(attributes);

        if let Err(reason) = K::pre_save(&merged) {
            warn!(%reason, "pre-save hook rejected the create");
            return Err(ModelError::ValidationFailed(reason));
        }

        self.attributes = merged;
        self.save().await
    }

    /// Validates and writes the model.
    ///
    /// The pre-save hook runs first; if it rejects, the store is not contacted. On
    /// success the model adopts the record as stored, so a new model gains its id.
    #[instrument(skip(self), fields(namespace = %self.namespace, cid = self.cid))]
    pub async fn save(&mut self) -> ModelResult<()> {
        if let Err(reason) = K::pre_save(&self.attributes) {
            warn!(%reason, "pre-save hook rejected the write");
            return Err(ModelError::ValidationFailed(reason));
        }

        let stored = self
            .store
            .backend()
            .write(&self.namespace, to_record(&self.attributes)?)
            .await?;

        self.attributes = from_record(stored)?;
        self.refresh_owner();
        debug!(id = ?self.key(), "model saved");

        Ok(())
    }

    /// Reloads the model's attributes from the store.
    ///
    /// Fails with [`ModelError::MissingId`] for a model without id and with
    /// [`ModelError::NotFound`] when the record no longer exists.
    #[instrument(skip(self), fields(namespace = %self.namespace, cid = self.cid))]
    pub async fn fetch(&mut self) -> ModelResult<()> {
        let key = self.key().ok_or(ModelError::MissingId)?;
        let record = self
            .store
            .backend()
            .read_one(&self.namespace, &key)
            .await?;

        self.attributes = from_record(record)?;
        self.refresh_owner();
        debug!(id = %key, "model fetched");

        Ok(())
    }

    /// Deletes the model's record and removes the model from its collection.
    ///
    /// A model that was never saved has no record, so only the collection entry is
    /// removed.
    #[instrument(skip(self), fields(namespace = %self.namespace, cid = self.cid))]
    pub async fn destroy(&self) -> ModelResult<()> {
        if let Some(key) = self.key() {
            self.store
                .backend()
                .delete(&self.namespace, &key)
                .await?;
            debug!(id = %key, "model destroyed");
        }

        if let Some(owner) = self.owner.as_ref().and_then(Weak::upgrade) {
            owner.write().retain(|member| !member.same_entry(self));
        }

        Ok(())
    }

    /// Renders the model under `options`, or under `K`'s default projection.
    pub fn to_json(&self, options: Option<&ProjectionOptions>) -> Value {
        match options {
            Some(options) => project(&self.attributes, options),
            None => project(&self.attributes, &K::default_projection()),
        }
    }

    fn refresh_owner(&self) {
        let Some(owner) = self.owner.as_ref().and_then(Weak::upgrade) else {
            return;
        };

        let mut members = owner.write();
        if let Some(entry) = members.iter_mut().find(|member| member.same_entry(self)) {
            entry.attributes = self.attributes.clone();
        }
    }
}

impl<K: ModelKind> Clone for Model<K> {
    fn clone(&self) -> Self {
        Self {
            cid: self.cid,
            attributes: self.attributes.clone(),
            namespace: self.namespace.clone(),
            store: self.store.clone(),
            owner: self.owner.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: ModelKind> fmt::Debug for Model<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("cid", &self.cid)
            .field("namespace", &self.namespace)
            .field("attributes", &self.attributes)
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl<K: ModelKind> Projectable for Model<K> {
    fn project(&self, options: Option<&ProjectionOptions>) -> Value {
        self.to_json(options)
    }
}

impl<K: ModelKind> Serialize for Model<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json(None).serialize(serializer)
    }
}
