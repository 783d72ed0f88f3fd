//! Convenient re-exports of commonly used types from docmodel.
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```
//!
//! This provides access to:
//! - Model and collection traits and types
//! - Store handle, backends and builders
//! - Template params and projection options
//! - Response utilities
//! - Error types

pub use docmodel_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    collection::{BulkOperation, Collection, CollectionKind, FetchOptions},
    document::Attributes,
    error::{ErrorKind, ModelError, ModelResult},
    filter::{EffectiveFilter, FilterOptionsBuilder},
    model::{Model, ModelKind},
    projection::{Projectable, ProjectionOptions},
    query::{Sort, SortDirection},
    response::{JsonReply, RequestContext, ResponseLocals, ResponseSink, send_error, send_json},
    store::ModelStore,
    template::TemplateParams,
};

pub use crate::config::BackendConfig;
