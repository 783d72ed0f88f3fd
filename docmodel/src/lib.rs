//! Main docmodel crate: models and collections with templated default filters over
//! pluggable document stores.
//!
//! This crate is the primary entry point. It re-exports the core types from
//! `docmodel-core` and provides access to the storage backends.
//!
//! # Features
//!
//! - **Templated default filters** - Collections declare filters with `{placeholder}` tokens resolved per instance
//! - **Model CRUD** - Create, save, fetch and destroy, with a pre-save validation hook
//! - **Bulk operations** - Run destroy, save or fetch on every member concurrently
//! - **Projection** - Control which fields are rendered for output
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use serde_json::{Value, json};
//!
//! struct Test;
//!
//! impl ModelKind for Test {
//!     fn namespace() -> &'static str { "tests" }
//!
//!     fn default_projection() -> ProjectionOptions {
//!         ProjectionOptions::only(["title", "test"])
//!     }
//! }
//!
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
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     docmodel::init_tracing();
//!
//!     let store = ModelStore::new(InMemoryStore::builder().build().await?);
//!     let tests = store.collection::<UserTests>(TemplateParams::new().with("user_id", 1));
//!
//!     // The new model gets `users: 1` from the filter.
//!     let attributes = json!({ "title": "foo", "test": "1" });
//!     tests.create(attributes.as_object().cloned().unwrap_or_default()).await?;
//!
//!     tests.fetch().await?;
//!     println!("{}", serde_json::to_string(&tests)?);
//!
//!     tests.apply_to_all(BulkOperation::Destroy).await?;
//!     store.shutdown().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Responses
//!
//! Handlers put the loaded resource in the response locals and finish with
//! [`response::send_json`], or report failures with [`response::send_error`]:
//!
//! ```ignore
//! let mut reply = JsonReply::with_resource(tests);
//! send_json(&RequestContext::new(), &mut reply);
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)
//!
//! [`config::BackendConfig`] selects one from the environment.

pub mod config;
pub mod prelude;

mod logging;

pub use docmodel_core::{
    backend, collection, document, error, filter, model, projection, query, response, store,
    template,
};
pub use logging::init_tracing;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
