//! Postgres-backed implementation of the database gateway.
//!
//! # What this module is
//! Executes planner-generated SQL against the `search` schema through a
//! `sqlx::PgPool` and maps rows into the gateway shapes.
//!
//! # What this module is NOT
//! It does not own the schema. The resource indexer writes
//! `search.resources` and `search.edges`; this service only reads them, so
//! there are no migrations here.
//!
//! # Operational notes
//! - Pool timeouts are configured explicitly because hanging on an
//!   unhealthy database is unacceptable for an interactive search service.
//! - Every statement the planner emits inlines its literals; only the
//!   relationship traversal binds a parameter (the seed uid array).
use super::{Database, RelatedRow, ResourceRow, StoreError, StoreResult};
use crate::config::Config;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use std::time::Duration;

pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn connect(config: &Config) -> StoreResult<Self> {
        let options = PgConnectOptions::new()
            .host(&config.db_host)
            .port(config.db_port)
            .database(&config.db_name)
            .username(&config.db_user)
            .password(&config.db_pass);
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_conns)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        tracing::info!(
            host = %config.db_host,
            port = config.db_port,
            database = %config.db_name,
            "connected to database"
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_err(sql: &str, err: sqlx::Error) -> StoreError {
    tracing::error!(error = %err, sql, "database query failed");
    StoreError::Query(err.to_string())
}

#[async_trait]
impl Database for PgDatabase {
    async fn query_count(&self, sql: &str) -> StoreResult<i64> {
        let row = sqlx::query(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| query_err(sql, e))?;
        row.try_get::<i64, _>(0)
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn query_resources(&self, sql: &str) -> StoreResult<Vec<ResourceRow>> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_err(sql, e))?;
        rows.into_iter()
            .map(|row| {
                Ok(ResourceRow {
                    uid: row.try_get(0).map_err(|e| StoreError::Query(e.to_string()))?,
                    cluster: row.try_get(1).map_err(|e| StoreError::Query(e.to_string()))?,
                    data: row.try_get(2).map_err(|e| StoreError::Query(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn query_uids(&self, sql: &str) -> StoreResult<Vec<String>> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_err(sql, e))?;
        rows.into_iter()
            .map(|row| row.try_get(0).map_err(|e| StoreError::Query(e.to_string())))
            .collect()
    }

    async fn query_values(&self, sql: &str) -> StoreResult<Vec<Option<String>>> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_err(sql, e))?;
        rows.into_iter()
            .map(|row| row.try_get(0).map_err(|e| StoreError::Query(e.to_string())))
            .collect()
    }

    async fn query_kind_pairs(&self, sql: &str) -> StoreResult<Vec<(String, String)>> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_err(sql, e))?;
        rows.into_iter()
            .map(|row| {
                let apigroup = row.try_get(0).map_err(|e| StoreError::Query(e.to_string()))?;
                let kind = row.try_get(1).map_err(|e| StoreError::Query(e.to_string()))?;
                Ok((apigroup, kind))
            })
            .collect()
    }

    async fn query_related(&self, sql: &str, seeds: &[String]) -> StoreResult<Vec<RelatedRow>> {
        let rows = sqlx::query(sql)
            .bind(seeds)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_err(sql, e))?;
        rows.into_iter()
            .map(|row| {
                Ok(RelatedRow {
                    data: row.try_get(0).map_err(|e| StoreError::Query(e.to_string()))?,
                    dest_id: row.try_get(1).map_err(|e| StoreError::Query(e.to_string()))?,
                    dest_kind: row.try_get(2).map_err(|e| StoreError::Query(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }
}
