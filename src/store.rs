use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::{ApplicationFilter, JobApplication, NewApplication};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("application '{0}' not found")]
    NotFound(String),

    #[error("database not initialized. Run 'apptrack init' first.")]
    NotInitialized,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Records matching `filter`, in the order the filter asks for.
    async fn list(&self, filter: &ApplicationFilter) -> StoreResult<Vec<JobApplication>>;

    async fn get(&self, id: &str) -> StoreResult<Option<JobApplication>>;

    async fn create(&self, fields: &NewApplication) -> StoreResult<JobApplication>;

    /// Replaces the editable fields and refreshes `updated_at`.
    ///
    /// Fails with [`StoreError::NotFound`] for an unknown id.
    async fn update(&self, id: &str, fields: &NewApplication) -> StoreResult<JobApplication>;

    /// Returns `false` when there was nothing to delete.
    async fn delete(&self, id: &str) -> StoreResult<bool>;

    /// Raw suggestions payload. Callers run it through
    /// [`crate::suggestions::normalize_payload`] before use.
    async fn suggestions(&self) -> StoreResult<Value>;
}
