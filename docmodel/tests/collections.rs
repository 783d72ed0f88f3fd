use docmodel::{memory::InMemoryStore, prelude::*};
use serde_json::{Value, json};

struct TestModel;

impl ModelKind for TestModel {
    fn namespace() -> &'static str {
        "tests"
    }
}

struct TestCollection;

impl CollectionKind for TestCollection {
    type Model = TestModel;
}

struct TemplatedCollection;

impl CollectionKind for TemplatedCollection {
    type Model = TestModel;

    fn default_filter() -> Value {
        json!({ "users": "{user_id}" })
    }
}

struct PlatformCollection;

impl CollectionKind for PlatformCollection {
    type Model = TestModel;

    fn default_filter() -> Value {
        json!({ "foo": false, "platforms": { "$in": "{platforms}" } })
    }
}

struct TestModel2;

impl ModelKind for TestModel2 {
    fn namespace() -> &'static str {
        "tests2"
    }

    fn default_projection() -> ProjectionOptions {
        ProjectionOptions::only(["title", "test"])
    }
}

struct TestCollection2;

impl CollectionKind for TestCollection2 {
    type Model = TestModel2;
}

struct FailingModel;

impl ModelKind for FailingModel {
    fn namespace() -> &'static str {
        "failing"
    }

    fn pre_save(_attributes: &Attributes) -> Result<(), String> {
        Err("foo reason".to_string())
    }
}

struct FailingCollection;

impl CollectionKind for FailingCollection {
    type Model = FailingModel;
}

struct UserScoped;

impl ModelKind for UserScoped {
    fn namespace() -> &'static str {
        "users/{user_id}/tests"
    }
}

fn attrs(value: Value) -> Attributes {
    value.as_object().cloned().unwrap()
}

async fn new_store() -> ModelStore {
    ModelStore::new(InMemoryStore::builder().build().await.unwrap())
}

#[test]
fn replaces_templated_properties() {
    let store = ModelStore::new(InMemoryStore::new());

    assert_eq!(TemplatedCollection::default_filter()["users"], json!("{user_id}"));

    let collection = store.collection::<TemplatedCollection>(TemplateParams::new().with("user_id", 1));
    assert_eq!(collection.filter().filter()["users"], json!(1));
    assert!(collection.is_empty());
}

#[test]
fn sets_up_default_filtering_options() {
    let store = ModelStore::new(InMemoryStore::new());

    let collection = store.collection::<PlatformCollection>(
        TemplateParams::new().with("platforms", json!(["android"])),
    );

    assert_eq!(collection.filter().filter()["platforms"]["$in"][0], json!("android"));
    assert_eq!(collection.filter().filter()["foo"], json!(false));
    assert_eq!(collection.url(), "tests");
}

#[tokio::test]
async fn collection_crud_lifecycle() {
    let store = new_store().await;
    let collection = store.collection::<TestCollection>(TemplateParams::new());
    assert_eq!(collection.len(), 0);

    let model = collection
        .create(attrs(json!({ "test": "1", "title": "foo1" })))
        .await
        .unwrap();
    assert!(model.id().is_some());
    assert_eq!(collection.len(), 1);

    let templated = store.collection::<TemplatedCollection>(TemplateParams::new().with("user_id", 1));
    let model = templated
        .create(attrs(json!({ "test": "1", "title": "foo1" })))
        .await
        .unwrap();
    assert!(model.id().is_some());
    assert_eq!(model.get("users"), Some(&json!(1)));

    let model = collection
        .create(attrs(json!({ "test": "2", "title": "foo2" })))
        .await
        .unwrap();
    assert!(model.id().is_some());
    assert_eq!(collection.len(), 2);

    // The templated collection shares the namespace, so all three records match.
    collection.fetch().await.unwrap();
    assert_eq!(collection.len(), 3);
    let third = collection.at(2).unwrap();
    let test_id = third.id().cloned().unwrap();
    assert_eq!(third.get("test"), Some(&json!("2")));

    let mut loaded = store.model::<TestModel>(attrs(json!({ "id": test_id.clone() })));
    loaded.fetch().await.unwrap();
    assert_eq!(loaded.id(), Some(&test_id));
    assert_eq!(loaded.get("title"), Some(&json!("foo2")));

    let second = collection.at(1).unwrap();
    let destroyed_id = second.id().cloned().unwrap();
    second.destroy().await.unwrap();
    assert_eq!(collection.len(), 2);

    let mut gone = store.model::<TestModel>(attrs(json!({ "id": destroyed_id })));
    let err = gone.fetch().await.unwrap_err();
    assert!(matches!(err, ModelError::NotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    collection.apply_to_all(BulkOperation::Destroy).await.unwrap();
    assert_eq!(collection.len(), 0);

    collection.fetch().await.unwrap();
    assert_eq!(collection.len(), 0);
}

#[tokio::test]
async fn templated_fetch_only_matches_bound_values() {
    let store = new_store().await;
    let all = store.collection::<TestCollection>(TemplateParams::new());
    all.create(attrs(json!({ "title": "a", "users": 1 }))).await.unwrap();
    all.create(attrs(json!({ "title": "b", "users": 2 }))).await.unwrap();

    let scoped = store.collection::<TemplatedCollection>(TemplateParams::new().with("user_id", 2));
    scoped.fetch().await.unwrap();

    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped.at(0).unwrap().get("title"), Some(&json!("b")));
}

#[tokio::test]
async fn platform_filter_matches_any_listed_platform() {
    let store = new_store().await;
    let all = store.collection::<TestCollection>(TemplateParams::new());
    all.create(attrs(json!({ "n": 1, "foo": false, "platforms": ["ios", "android"] })))
        .await
        .unwrap();
    all.create(attrs(json!({ "n": 2, "foo": false, "platforms": ["web"] })))
        .await
        .unwrap();
    all.create(attrs(json!({ "n": 3, "foo": true, "platforms": ["android"] })))
        .await
        .unwrap();
    all.create(attrs(json!({ "n": 4, "foo": false, "platforms": "android" })))
        .await
        .unwrap();

    let android = store.collection::<PlatformCollection>(
        TemplateParams::new().with("platforms", json!(["android"])),
    );
    android.fetch().await.unwrap();

    let matched: Vec<Value> = android
        .models()
        .iter()
        .filter_map(|model| model.get("n").cloned())
        .collect();
    assert_eq!(matched, vec![json!(1), json!(4)]);
}

#[tokio::test]
async fn collection_to_json_uses_default_projection() {
    let store = new_store().await;
    let collection = store.collection::<TestCollection2>(TemplateParams::new());
    collection.add(store.model::<TestModel2>(attrs(json!({ "title": "foo", "test": "abc", "id": 1 }))));

    let options = collection.default_projection_options();
    assert!(options.only_fields.is_some());

    let rendered = collection.to_json(Some(&options));
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].get("id").is_none());
    assert_eq!(rendered[0], json!({ "title": "foo", "test": "abc" }));

    assert_eq!(
        serde_json::to_value(&collection).unwrap(),
        json!([{ "title": "foo", "test": "abc" }])
    );
    assert_eq!(
        collection.to_json(Some(&ProjectionOptions::include_all()))[0]["id"],
        json!(1)
    );
}

#[tokio::test]
async fn failing_pre_save_rejects_create() {
    let store = new_store().await;
    let collection = store.collection::<FailingCollection>(TemplateParams::new());

    let err = collection.create(Attributes::new()).await.unwrap_err();

    assert_eq!(err.to_string(), "foo reason");
    assert!(matches!(err, ModelError::ValidationFailed(_)));
    assert_eq!(collection.len(), 0);
    assert!(store.list_namespaces().await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_model_create_keeps_previous_attributes() {
    let store = new_store().await;
    let mut model = store.model::<FailingModel>(attrs(json!({ "title": "kept" })));

    let err = model.create(attrs(json!({ "title": "rejected", "extra": 1 }))).await.unwrap_err();

    assert!(matches!(err, ModelError::ValidationFailed(_)));
    assert_eq!(model.get("title"), Some(&json!("kept")));
    assert!(model.get("extra").is_none());
}

#[tokio::test]
async fn handles_taken_before_fetch_still_destroy_their_entry() {
    let store = new_store().await;
    let collection = store.collection::<TestCollection>(TemplateParams::new());
    let created = collection.create(attrs(json!({ "n": 1 }))).await.unwrap();
    collection.create(attrs(json!({ "n": 2 }))).await.unwrap();

    collection.fetch().await.unwrap();
    assert_eq!(collection.get(created.id().unwrap()).unwrap().cid(), created.cid());

    created.destroy().await.unwrap();

    assert_eq!(collection.len(), 1);
    assert!(collection.get(created.id().unwrap()).is_none());
    let mut gone = store.model::<TestModel>(attrs(json!({ "id": created.id().cloned().unwrap() })));
    assert!(matches!(gone.fetch().await, Err(ModelError::NotFound { .. })));
}

#[tokio::test]
async fn handles_taken_before_fetch_still_refresh_their_entry() {
    let store = new_store().await;
    let collection = store.collection::<TestCollection>(TemplateParams::new());
    let mut created = collection.create(attrs(json!({ "title": "old" }))).await.unwrap();

    collection.fetch().await.unwrap();
    created.set("title", "new");
    created.save().await.unwrap();

    assert_eq!(collection.len(), 1);
    assert_eq!(
        collection.get(created.id().unwrap()).unwrap().get("title"),
        Some(&json!("new"))
    );
}

#[tokio::test]
async fn failed_bulk_destroy_keeps_failed_members() {
    let store = new_store().await;
    let collection = store.collection::<TestCollection>(TemplateParams::new());
    collection.create(attrs(json!({ "n": 1 }))).await.unwrap();
    let doomed = collection.create(attrs(json!({ "n": 2 }))).await.unwrap();

    // Remove one record behind the collection's back.
    let mut stale = store.model::<TestModel>(doomed.attributes().clone());
    stale.fetch().await.unwrap();
    stale.destroy().await.unwrap();
    assert_eq!(collection.len(), 2);

    let err = collection.apply_to_all(BulkOperation::Destroy).await.unwrap_err();

    assert!(matches!(err, ModelError::AggregateFailure(_)));
    assert_eq!(err.root().kind(), ErrorKind::NotFound);
    assert_eq!(err.status_code(), 404);
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.at(0).unwrap().id(), doomed.id());
}

#[tokio::test]
async fn saving_a_member_refreshes_the_collection() {
    let store = new_store().await;
    let collection = store.collection::<TestCollection>(TemplateParams::new());
    let mut model = collection.create(attrs(json!({ "title": "old" }))).await.unwrap();

    model.set("title", "new");
    model.save().await.unwrap();

    assert_eq!(collection.len(), 1);
    assert_eq!(collection.at(0).unwrap().get("title"), Some(&json!("new")));

    collection.fetch().await.unwrap();
    assert_eq!(collection.len(), 1);
    assert_eq!(collection.get(model.id().unwrap()).unwrap().get("title"), Some(&json!("new")));
}

#[tokio::test]
async fn bulk_save_and_fetch() {
    let store = new_store().await;
    let collection = store
        .collection_with::<TestCollection, _>(
            vec![json!({ "n": 1 }), json!({ "n": 2 })],
            TemplateParams::new(),
        )
        .unwrap();
    assert!(collection.ids().is_empty());

    collection.apply_to_all(BulkOperation::Save).await.unwrap();
    assert_eq!(collection.ids().len(), 2);

    collection.apply_to_all(BulkOperation::Fetch).await.unwrap();
    assert_eq!(collection.len(), 2);

    let fresh = store.collection::<TestCollection>(TemplateParams::new());
    fresh.fetch().await.unwrap();
    assert_eq!(fresh.len(), 2);
}

#[tokio::test]
async fn fetch_with_sorts_and_windows() {
    let store = new_store().await;
    let collection = store.collection::<TestCollection>(TemplateParams::new());
    for n in [2, 5, 1, 4, 3] {
        collection.create(attrs(json!({ "n": n }))).await.unwrap();
    }

    collection
        .fetch_with(
            FetchOptions::default()
                .sort("n", SortDirection::Desc)
                .offset(1)
                .limit(2),
        )
        .await
        .unwrap();

    let values: Vec<Value> = collection
        .models()
        .iter()
        .filter_map(|model| model.get("n").cloned())
        .collect();
    assert_eq!(values, vec![json!(4), json!(3)]);
}

#[tokio::test]
async fn standalone_models_resolve_their_namespace() {
    let store = new_store().await;
    let mut model = Model::<UserScoped>::with_params(
        &store,
        attrs(json!({ "title": "scoped" })),
        &TemplateParams::new().with("user_id", 7),
    );
    assert_eq!(model.namespace(), "users/7/tests");

    model.save().await.unwrap();

    assert_eq!(store.list_namespaces().await.unwrap(), vec!["users/7/tests".to_string()]);

    let err = store
        .model::<TestModel>(Attributes::new())
        .fetch()
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::MissingId));
}

#[tokio::test]
async fn drop_namespace_clears_records() {
    let store = new_store().await;
    let collection = store.collection::<TestCollection>(TemplateParams::new());
    collection.create(attrs(json!({ "n": 1 }))).await.unwrap();

    store.drop_namespace("tests").await.unwrap();
    collection.fetch().await.unwrap();

    assert!(collection.is_empty());
    store.shutdown().await.unwrap();
}
