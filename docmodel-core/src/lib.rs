//! Core of docmodel: models and collections persisted through a pluggable store.
//!
//! This crate provides:
//!
//! - **Templates** ([`template`]) - Placeholder resolution for filters and store addresses
//! - **Filters** ([`filter`]) - Per-collection default filters and their parsing into queries
//! - **Query AST** ([`query`]) - The expression tree backends evaluate
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Models** ([`model`]) - Single documents with save, fetch and destroy
//! - **Collections** ([`collection`]) - Ordered, id-unique sets of models with bulk operations
//! - **Projection** ([`projection`]) - Field-level rendering of models for output
//! - **Responses** ([`response`]) - Sending resources and errors as JSON
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//! use serde_json::{Value, json};
//!
//! struct Test;
//!
//! impl ModelKind for Test {
//!     fn namespace() -> &'static str {
//!         "tests"
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
//! let tests = store.collection::<UserTests>(TemplateParams::new().with("user_id", 1));
//! tests.fetch().await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod filter;
pub mod model;
pub mod projection;
pub mod query;
pub mod response;
pub mod store;
pub mod template;
