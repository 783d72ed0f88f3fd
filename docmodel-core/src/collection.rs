//! Ordered collections of models over a templated default filter.
//!
//! A [`CollectionKind`] declares a model kind, a default filter and a store address.
//! Both the filter and the address may contain placeholder tokens which are resolved
//! once, when a [`Collection`] is built with its [`TemplateParams`]:
//!
//! ```ignore
//! struct UserTests;
//!
//! impl CollectionKind for UserTests {
//!     type Model = Test;
//!
//!     fn default_filter() -> Value {
//!         json!({ "users": "{user_id}" })
//!     }
//! }
//!
//! let tests = store.collection::<UserTests>(TemplateParams::new().with("user_id", 1));
//! assert_eq!(tests.filter().filter()["users"], json!(1));
//!
//! // `users` is set from the filter before the model is saved.
//! let model = tests.create(attributes).await?;
//! assert_eq!(model.get("users"), Some(&json!(1)));
//! ```
//!
//! # Membership
//!
//! Models are held in order and are unique by id, or by client id before they have
//! one. [`Collection::at`] and friends return clones; a clone still belongs to the
//! collection, so destroying it removes the collection's entry.
//!
//! A collection is meant to have a single writer: no ordering is guaranteed between a
//! [`fetch`](Collection::fetch) or [`apply_to_all`](Collection::apply_to_all) in
//! flight and other mutations of the same instance.

use std::{fmt, sync::Arc};

use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::{
    document::{Attributes, from_record, id_key},
    error::{ModelError, ModelResult},
    filter::{EffectiveFilter, FilterOptionsBuilder},
    model::{Members, Model, ModelKind},
    projection::{Projectable, ProjectionOptions},
    query::{Sort, SortDirection},
    store::ModelStore,
    template::TemplateParams,
};

/// Per-type configuration of a collection.
pub trait CollectionKind: Send + Sync + 'static {
    /// Kind of the models held by the collection.
    type Model: ModelKind;

    /// Filter object applied by [`Collection::fetch`]. May contain placeholders.
    ///
    /// Defaults to `{}`, which matches every record of the namespace.
    fn default_filter() -> Value {
        Value::Object(Map::new())
    }

    /// Store address of the collection. May contain `{name}` path segments.
    ///
    /// Defaults to the namespace of the model kind.
    fn url() -> &'static str {
        <Self::Model as ModelKind>::namespace()
    }

    /// Builder combining this type's declared filter and address.
    fn filter_options() -> FilterOptionsBuilder {
        FilterOptionsBuilder::new(Self::default_filter(), Self::url())
    }
}

/// Operations [`Collection::apply_to_all`] can run on every member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOperation {
    /// [`Model::destroy`]
    Destroy,
    /// [`Model::save`]
    Save,
    /// [`Model::fetch`]
    Fetch,
}

/// Ordering and windowing applied on top of the effective filter by
/// [`Collection::fetch_with`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl FetchOptions {
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(Sort { field: field.into(), direction });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// An ordered, id-unique set of models of kind `C::Model`.
pub struct Collection<C: CollectionKind> {
    store: ModelStore,
    effective: EffectiveFilter,
    projection: ProjectionOptions,
    members: Arc<Members<C::Model>>,
}

impl<C: CollectionKind> Collection<C> {
    /// Builds an empty collection, resolving `C`'s filter and address with `params`.
    pub fn new(store: &ModelStore, params: TemplateParams) -> Self {
        let effective = C::filter_options().build(&params);
        debug!(url = effective.url(), filter = %effective.filter(), "collection built");

        Self {
            store: store.clone(),
            effective,
            projection: <C::Model as ModelKind>::default_projection(),
            members: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Builds a collection holding the given raw attribute objects.
    ///
    /// Each value must be a JSON object; entries sharing an id are merged.
    pub fn with_models<I>(store: &ModelStore, models: I, params: TemplateParams) -> ModelResult<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        let collection = Self::new(store, params);

        for raw in models {
            match raw {
                Value::Object(attributes) => {
                    collection.add_attributes(attributes);
                }
                other => {
                    return Err(ModelError::InvalidDocument(format!(
                        "collection members must be objects, found {other}"
                    )));
                }
            }
        }

        Ok(collection)
    }

    /// Replaces the projection used by [`to_json`](Collection::to_json) without options.
    pub fn with_default_projection(mut self, projection: ProjectionOptions) -> Self {
        self.projection = projection;
        self
    }

    /// The resolved filter and address of this collection.
    pub fn filter(&self) -> &EffectiveFilter {
        &self.effective
    }

    /// The resolved store address.
    pub fn url(&self) -> &str {
        self.effective.url()
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Number of models currently held.
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// The model at `index`, in store/insertion order.
    pub fn at(&self, index: usize) -> Option<Model<C::Model>> {
        self.members.read().get(index).cloned()
    }

    /// The model with the given id.
    pub fn get(&self, id: &Value) -> Option<Model<C::Model>> {
        let key = id_key(id)?;

        self.members
            .read()
            .iter()
            .find(|member| member.key().as_deref() == Some(key.as_str()))
            .cloned()
    }

    /// Snapshot of the held models, in order.
    pub fn models(&self) -> Vec<Model<C::Model>> {
        self.members.read().clone()
    }

    /// Ids of the held models that have one, in order.
    pub fn ids(&self) -> Vec<Value> {
        self.members
            .read()
            .iter()
            .filter_map(|member| member.id().cloned())
            .collect()
    }

    /// Builds a model in this collection's namespace without adding it.
    pub fn build_model(&self, attributes: Attributes) -> Model<C::Model> {
        Model::in_namespace(&self.store, self.url().to_string(), attributes)
    }

    /// Adds `model`, moving it into this collection's namespace.
    ///
    /// If a member with the same id, or the same client id, is already held, its
    /// attributes are replaced and its position kept. Returns the held model.
    pub fn add(&self, mut model: Model<C::Model>) -> Model<C::Model> {
        model.attach(&self.members, self.effective.url());
        insert_member(&mut self.members.write(), model)
    }

    /// Wraps `attributes` as a model and adds it.
    pub fn add_attributes(&self, attributes: Attributes) -> Model<C::Model> {
        self.add(self.build_model(attributes))
    }

    /// Creates and saves a model, then appends it.
    ///
    /// Values the filter binds from construction params (such as `users` for a
    /// declared `{ "users": "{user_id}" }`) are set on the model before saving and take
    /// precedence over `attributes`. If saving fails, nothing is added.
    #[instrument(skip(self, attributes), fields(url = %self.url()))]
    pub async fn create(&self, attributes: Attributes) -> ModelResult<Model<C::Model>> {
        let mut model = self.build_model(attributes);
        model.merge(self.effective.bound_attributes().clone());

        model.save().await?;

        let model = self.add(model);
        debug!(id = ?model.key(), len = self.len(), "model created");

        Ok(model)
    }

    /// Replaces the held models with the records matching the effective filter.
    pub async fn fetch(&self) -> ModelResult<&Self> {
        self.fetch_with(FetchOptions::default()).await
    }

    /// Like [`fetch`](Collection::fetch), with ordering and windowing.
    ///
    /// Models held before the call and absent from the result are dropped.
    #[instrument(skip(self), fields(url = %self.url()))]
    pub async fn fetch_with(&self, options: FetchOptions) -> ModelResult<&Self> {
        let mut query = self.effective.to_query()?;
        query.sort = options.sort;
        query.limit = options.limit;
        query.offset = options.offset;

        let records = self
            .store
            .backend()
            .read_many(self.url(), query)
            .await?;

        // Handles taken before the fetch keep addressing their entry.
        let held: Vec<(String, u64)> = self
            .members
            .read()
            .iter()
            .filter_map(|member| member.key().map(|key| (key, member.cid())))
            .collect();

        let mut fetched = Vec::with_capacity(records.len());
        for record in records {
            let mut model = self.build_model(from_record(record)?);
            if let Some((_, cid)) = model
                .key()
                .and_then(|key| held.iter().find(|(held_key, _)| *held_key == key))
            {
                model.adopt_cid(*cid);
            }
            model.attach(&self.members, self.effective.url());
            insert_member(&mut fetched, model);
        }

        debug!(len = fetched.len(), "collection fetched");
        *self.members.write() = fetched;

        Ok(self)
    }

    /// Runs `operation` on every held model concurrently.
    ///
    /// All operations are awaited. If any failed, the first failure in member order
    /// is returned wrapped in [`ModelError::AggregateFailure`]; operations that
    /// succeeded are not rolled back. Destroyed models leave the collection, so after
    /// a fully successful [`BulkOperation::Destroy`] the collection is empty.
    #[instrument(skip(self), fields(url = %self.url(), len = self.len()))]
    pub async fn apply_to_all(&self, operation: BulkOperation) -> ModelResult<()> {
        let results = join_all(self.models().into_iter().map(|mut model| async move {
            match operation {
                BulkOperation::Destroy => model.destroy().await,
                BulkOperation::Save => model.save().await,
                BulkOperation::Fetch => model.fetch().await,
            }
        }))
        .await;

        let failed = results.iter().filter(|result| result.is_err()).count();

        match results.into_iter().find_map(Result::err) {
            Some(first) => {
                warn!(failed, error = %first, "bulk operation failed");
                Err(ModelError::AggregateFailure(Box::new(first)))
            }
            None => Ok(()),
        }
    }

    /// The declared projection of the model kind.
    pub fn default_projection_options(&self) -> ProjectionOptions {
        <C::Model as ModelKind>::default_projection()
    }

    /// Renders every model, in order, under `options` or the collection default.
    pub fn to_json(&self, options: Option<&ProjectionOptions>) -> Vec<Value> {
        let options = options.unwrap_or(&self.projection);

        self.members
            .read()
            .iter()
            .map(|member| member.to_json(Some(options)))
            .collect()
    }
}

/// Inserts `model` into `members`, merging into an existing entry with the same id or
/// client id.
fn insert_member<K: ModelKind>(members: &mut Vec<Model<K>>, model: Model<K>) -> Model<K> {
    let key = model.key();
    let existing = members.iter_mut().find(|member| {
        member.cid() == model.cid() || (key.is_some() && member.key() == key)
    });

    match existing {
        Some(entry) => {
            entry.merge(model.attributes().clone());
            entry.clone()
        }
        None => {
            members.push(model.clone());
            model
        }
    }
}

impl<C: CollectionKind> fmt::Debug for Collection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("url", &self.effective.url())
            .field("filter", self.effective.filter())
            .field("len", &self.len())
            .finish()
    }
}

impl<C: CollectionKind> Projectable for Collection<C> {
    fn project(&self, options: Option<&ProjectionOptions>) -> Value {
        Value::Array(self.to_json(options))
    }
}

impl<C: CollectionKind> Serialize for Collection<C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json(None).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Item;

    impl ModelKind for Item {
        fn namespace() -> &'static str {
            "items"
        }
    }

    struct Scoped;

    impl CollectionKind for Scoped {
        type Model = Item;

        fn default_filter() -> Value {
            json!({ "owner": "{owner}", "kind": { "$in": "{kinds}" } })
        }

        fn url() -> &'static str {
            "owners/{owner}/items"
        }
    }

    #[derive(Debug)]
    struct NoBackend;

    #[async_trait::async_trait]
    impl crate::backend::StoreBackend for NoBackend {
        async fn read_many(&self, _: &str, _: crate::query::Query) -> ModelResult<Vec<bson::Bson>> {
            Err(ModelError::store("offline"))
        }

        async fn read_one(&self, namespace: &str, id: &str) -> ModelResult<bson::Bson> {
            Err(ModelError::not_found(namespace, id))
        }

        async fn write(&self, _: &str, _: bson::Bson) -> ModelResult<bson::Bson> {
            Err(ModelError::store("offline"))
        }

        async fn delete(&self, namespace: &str, id: &str) -> ModelResult<()> {
            Err(ModelError::not_found(namespace, id))
        }

        async fn drop_namespace(&self, _: &str) -> ModelResult<()> {
            Ok(())
        }

        async fn list_namespaces(&self) -> ModelResult<Vec<String>> {
            Ok(vec![])
        }
    }

    fn attributes(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn resolves_filter_and_url_on_construction() {
        let store = ModelStore::new(NoBackend);
        let params = TemplateParams::new()
            .with("owner", 3)
            .with("kinds", json!(["a", "b"]));
        let collection = store.collection::<Scoped>(params);

        assert_eq!(collection.url(), "owners/3/items");
        assert_eq!(collection.filter().filter()["owner"], json!(3));
        assert_eq!(collection.filter().filter()["kind"]["$in"], json!(["a", "b"]));
        assert_eq!(Scoped::default_filter()["owner"], json!("{owner}"));
    }

    #[test]
    fn initial_models_are_deduplicated_by_id() {
        let store = ModelStore::new(NoBackend);
        let collection = store
            .collection_with::<Scoped, _>(
                vec![
                    json!({ "id": "a", "n": 1 }),
                    json!({ "id": "b", "n": 2 }),
                    json!({ "id": "a", "n": 3 }),
                    json!({ "n": 4 }),
                ],
                TemplateParams::new(),
            )
            .unwrap();

        assert_eq!(collection.len(), 3);
        assert_eq!(collection.at(0).unwrap().get("n"), Some(&json!(3)));
        assert_eq!(collection.get(&json!("b")).unwrap().get("n"), Some(&json!(2)));
        assert!(collection.at(2).unwrap().is_new());
        assert_eq!(collection.ids(), vec![json!("a"), json!("b")]);
    }

    #[test]
    fn rejects_non_object_members() {
        let store = ModelStore::new(NoBackend);
        let result = store.collection_with::<Scoped, _>(vec![json!(1)], TemplateParams::new());

        assert!(matches!(result, Err(ModelError::InvalidDocument(_))));
    }

    #[test]
    fn adding_the_same_model_twice_keeps_one_entry() {
        let store = ModelStore::new(NoBackend);
        let collection = store.collection::<Scoped>(TemplateParams::new());
        let model = collection.build_model(attributes(json!({ "n": 1 })));

        collection.add(model.clone());
        collection.add(model);

        assert_eq!(collection.len(), 1);
        assert!(collection.at(0).unwrap().is_attached());
    }

    #[tokio::test]
    async fn failed_create_leaves_collection_unchanged() {
        let store = ModelStore::new(NoBackend);
        let collection = store.collection::<Scoped>(TemplateParams::new());

        let err = collection.create(attributes(json!({ "n": 1 }))).await.unwrap_err();

        assert!(matches!(err, ModelError::StoreFailure(_)));
        assert!(collection.is_empty());
    }

    #[tokio::test]
    async fn bulk_failure_wraps_first_error_and_keeps_members() {
        let store = ModelStore::new(NoBackend);
        let collection = store
            .collection_with::<Scoped, _>(
                vec![json!({ "id": "a" }), json!({ "id": "b" }), json!({ "n": 1 })],
                TemplateParams::new(),
            )
            .unwrap();

        let err = collection.apply_to_all(BulkOperation::Destroy).await.unwrap_err();

        match err {
            ModelError::AggregateFailure(inner) => {
                assert!(matches!(*inner, ModelError::NotFound { ref id, .. } if id == "a"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        // The unsaved model has no record, so only it leaves the collection.
        assert_eq!(collection.len(), 2);
    }

    #[tokio::test]
    async fn fetch_failure_propagates() {
        let store = ModelStore::new(NoBackend);
        let collection = store.collection::<Scoped>(TemplateParams::new());

        assert!(matches!(collection.fetch().await, Err(ModelError::StoreFailure(_))));
    }
}
