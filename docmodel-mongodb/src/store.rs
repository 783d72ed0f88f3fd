use async_trait::async_trait;
use bson::{Bson, Document, Uuid, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    options::{ClientOptions, FindOptions},
};
use tracing::{debug, instrument};

use docmodel_core::{
    backend::{ID_FIELD, StoreBackend, StoreBackendBuilder},
    document::record_key,
    error::{ModelError, ModelResult},
    query::{Query, QueryVisitor, SortDirection},
};

use crate::{query::MongoQueryTranslator, sanitizer::ValueSanitizer};

/// MongoDB storage backend.
///
/// Each namespace maps to one MongoDB collection. A record is stored under `_id`
/// equal to its string key, and keeps its own `id` field.
#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, namespace: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&ValueSanitizer::sanitize_string(namespace))
    }

    fn prepare_document(key: &str, record: &Bson) -> ModelResult<Document> {
        let mut document = record
            .as_document()
            .map(ValueSanitizer::sanitize_document)
            .ok_or_else(|| ModelError::InvalidDocument(format!("cannot write {record} as a record")))?;

        document.insert("_id", key);
        Ok(document)
    }

    fn restore_document(mut document: Document) -> Bson {
        document.remove("_id");
        ValueSanitizer::restore_value(&Bson::Document(document))
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    #[instrument(skip(self, query))]
    async fn read_many(&self, namespace: &str, query: Query) -> ModelResult<Vec<Bson>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        if let Some(sort) = &query.sort {
            let field = ValueSanitizer::sanitize_string(&sort.field);
            options.sort = Some(doc! {
                field: match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                }
            })
        }

        let filter = match &query.filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr)?,
            None => doc! {},
        };
        debug!(%filter, "querying collection");

        Ok(self
            .get_collection(namespace)
            .find(filter)
            .with_options(options)
            .await
            .map_err(ModelError::store)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(ModelError::store)?
            .into_iter()
            .map(Self::restore_document)
            .collect())
    }

    async fn read_one(&self, namespace: &str, id: &str) -> ModelResult<Bson> {
        self.get_collection(namespace)
            .find_one(doc! { "_id": id })
            .await
            .map_err(ModelError::store)?
            .map(Self::restore_document)
            .ok_or_else(|| ModelError::not_found(namespace, id))
    }

    #[instrument(skip(self, record))]
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

        self.get_collection(namespace)
            .replace_one(doc! { "_id": key.as_str() }, Self::prepare_document(&key, &record)?)
            .upsert(true)
            .await
            .map_err(ModelError::store)?;

        debug!(id = %key, "wrote record");
        Ok(record)
    }

    async fn delete(&self, namespace: &str, id: &str) -> ModelResult<()> {
        let result = self
            .get_collection(namespace)
            .delete_one(doc! { "_id": id })
            .await
            .map_err(ModelError::store)?;

        match result.deleted_count {
            0 => Err(ModelError::not_found(namespace, id)),
            _ => Ok(()),
        }
    }

    async fn drop_namespace(&self, namespace: &str) -> ModelResult<()> {
        self.get_collection(namespace)
            .drop()
            .await
            .map_err(ModelError::store)
    }

    async fn list_namespaces(&self) -> ModelResult<Vec<String>> {
        Ok(self
            .client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(ModelError::store)?
            .iter()
            .map(|name| ValueSanitizer::restore_string(name))
            .collect())
    }

    async fn shutdown(&self) -> ModelResult<()> {
        self.client.clone().shutdown().await;

        Ok(())
    }
}

/// Connects a [`MongoDbStore`] from a connection string and database name.
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> ModelResult<Self::Backend> {
        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| ModelError::Initialization(e.to_string()))?;
        let client = Client::with_options(options)
            .map_err(|e| ModelError::Initialization(e.to_string()))?;

        debug!(database = %self.database, "connected to mongodb");
        Ok(MongoDbStore::new(client, self.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepared_documents_are_keyed_and_restorable() {
        let record = Bson::Document(doc! { "id": "abc", "a.b": 1 });
        let prepared = MongoDbStore::prepare_document("abc", &record).unwrap();

        assert_eq!(prepared.get_str("_id").unwrap(), "abc");
        assert!(prepared.contains_key("a__dot__b"));
        assert_eq!(MongoDbStore::restore_document(prepared), record);
    }

    #[test]
    fn prepare_rejects_non_documents() {
        assert!(matches!(
            MongoDbStore::prepare_document("abc", &Bson::Int32(1)),
            Err(ModelError::InvalidDocument(_))
        ));
    }
}
