//! Database gateway for the denormalized resource store.
//!
//! # Purpose
//! Thin, typed access to the `search.resources` and `search.edges` tables.
//! The planner produces SQL text; this layer only executes it and maps rows
//! into the small set of shapes the resolvers consume.
//!
//! # Notes
//! The service never writes to the store. Backends: `PgDatabase` for
//! production, `MockDatabase` for tests and offline development (responses
//! are keyed by the exact SQL text, which is how the planner tests pin the
//! generated queries byte-for-byte).
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod mock;
pub mod postgres;

/// One row of `search.resources`.
#[derive(Debug, Clone)]
pub struct ResourceRow {
    pub uid: String,
    pub cluster: String,
    pub data: Value,
}

/// One row of the relationship projection (`data`, `destid`, `destkind`).
#[derive(Debug, Clone)]
pub struct RelatedRow {
    pub data: Value,
    pub dest_id: String,
    pub dest_kind: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database query failed: {0}")]
    Query(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Database: Send + Sync {
    /// Single-row COUNT query.
    async fn query_count(&self, sql: &str) -> StoreResult<i64>;

    /// Rows of (uid, cluster, data).
    async fn query_resources(&self, sql: &str) -> StoreResult<Vec<ResourceRow>>;

    /// Rows of a single uid column.
    async fn query_uids(&self, sql: &str) -> StoreResult<Vec<String>>;

    /// Rows of a single nullable text column (schema and autocomplete).
    async fn query_values(&self, sql: &str) -> StoreResult<Vec<Option<String>>>;

    /// Rows of two text columns (apigroup, kind_plural discovery).
    async fn query_kind_pairs(&self, sql: &str) -> StoreResult<Vec<(String, String)>>;

    /// Relationship traversal; `seeds` binds the uid array parameter.
    async fn query_related(&self, sql: &str, seeds: &[String]) -> StoreResult<Vec<RelatedRow>>;

    async fn ping(&self) -> StoreResult<()>;
}
