//! Backend selection from configuration.
//!
//! ```ignore
//! // DOCMODEL_BACKEND=mongodb
//! // DOCMODEL_MONGODB_URI=mongodb://localhost:27017
//! // DOCMODEL_MONGODB_DATABASE=app
//! let store = BackendConfig::from_env()?.connect().await?;
//! ```

use serde::{Deserialize, Serialize};
use tracing::info;

use docmodel_core::{
    backend::StoreBackendBuilder,
    error::{ModelError, ModelResult},
    store::ModelStore,
};
use docmodel_memory::InMemoryStore;

/// Selects the backend kind.
pub const BACKEND_VAR: &str = "DOCMODEL_BACKEND";
/// Connection string of the MongoDB backend.
pub const MONGODB_URI_VAR: &str = "DOCMODEL_MONGODB_URI";
/// Database of the MongoDB backend.
pub const MONGODB_DATABASE_VAR: &str = "DOCMODEL_MONGODB_DATABASE";

/// Which backend a [`ModelStore`] is built over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BackendConfig {
    #[default]
    Memory,
    Mongodb {
        uri: String,
        database: String,
    },
}

impl BackendConfig {
    /// Reads the configuration from the process environment.
    ///
    /// An unset `DOCMODEL_BACKEND` selects the in-memory backend.
    pub fn from_env() -> ModelResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps variable names to values.
    pub fn from_lookup<F>(lookup: F) -> ModelResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name).ok_or_else(|| ModelError::Initialization(format!("{name} is not set")))
        };

        match lookup(BACKEND_VAR).as_deref().map(str::trim) {
            None | Some("") | Some("memory") => Ok(BackendConfig::Memory),
            Some("mongodb") => Ok(BackendConfig::Mongodb {
                uri: required(MONGODB_URI_VAR)?,
                database: required(MONGODB_DATABASE_VAR)?,
            }),
            Some(other) => Err(ModelError::Initialization(format!(
                "unknown backend {other:?} in {BACKEND_VAR}"
            ))),
        }
    }

    /// Builds the configured backend and wraps it in a [`ModelStore`].
    ///
    /// Selecting `mongodb` fails with [`ModelError::Initialization`] unless the
    /// `mongodb` feature is enabled.
    pub async fn connect(&self) -> ModelResult<ModelStore> {
        match self {
            BackendConfig::Memory => {
                info!("using in-memory backend");
                Ok(ModelStore::new(InMemoryStore::builder().build().await?))
            }
            BackendConfig::Mongodb { uri, database } => connect_mongodb(uri, database).await,
        }
    }
}

#[cfg(feature = "mongodb")]
async fn connect_mongodb(uri: &str, database: &str) -> ModelResult<ModelStore> {
    info!(database, "using mongodb backend");
    let backend = docmodel_mongodb::MongoDbStore::builder(uri, database)
        .build()
        .await?;

    Ok(ModelStore::new(backend))
}

#[cfg(not(feature = "mongodb"))]
async fn connect_mongodb(_uri: &str, _database: &str) -> ModelResult<ModelStore> {
    Err(ModelError::Initialization(
        "the mongodb backend requires the `mongodb` feature".to_string(),
    ))
}
