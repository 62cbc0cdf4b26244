//! In-memory database gateway with canned, SQL-keyed responses.
//!
//! Responses are registered against the exact SQL text the planner is
//! expected to emit. A lookup miss is an error that echoes the offending
//! statement, which makes planner drift visible in test failures. The mock
//! also records every executed statement so tests can assert that a cached
//! code path performed no database work.
use super::{Database, RelatedRow, ResourceRow, StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MockDatabase {
    counts: Mutex<HashMap<String, i64>>,
    resources: Mutex<HashMap<String, Vec<ResourceRow>>>,
    uids: Mutex<HashMap<String, Vec<String>>>,
    values: Mutex<HashMap<String, Vec<Option<String>>>>,
    kind_pairs: Mutex<HashMap<String, Vec<(String, String)>>>,
    related: Mutex<HashMap<String, Vec<RelatedRow>>>,
    executed: Mutex<Vec<String>>,
    fail_all: Mutex<Option<String>>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_count(&self, sql: &str, count: i64) {
        self.counts.lock().unwrap().insert(sql.to_string(), count);
    }

    pub fn expect_resources(&self, sql: &str, rows: Vec<ResourceRow>) {
        self.resources.lock().unwrap().insert(sql.to_string(), rows);
    }

    pub fn expect_uids(&self, sql: &str, rows: Vec<String>) {
        self.uids.lock().unwrap().insert(sql.to_string(), rows);
    }

    pub fn expect_values(&self, sql: &str, rows: Vec<Option<String>>) {
        self.values.lock().unwrap().insert(sql.to_string(), rows);
    }

    pub fn expect_kind_pairs(&self, sql: &str, rows: Vec<(String, String)>) {
        self.kind_pairs.lock().unwrap().insert(sql.to_string(), rows);
    }

    pub fn expect_related(&self, sql: &str, rows: Vec<RelatedRow>) {
        self.related.lock().unwrap().insert(sql.to_string(), rows);
    }

    /// Make every query fail with the given message.
    pub fn fail_with(&self, message: &str) {
        *self.fail_all.lock().unwrap() = Some(message.to_string());
    }

    /// Every statement executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn record(&self, sql: &str) -> StoreResult<()> {
        self.executed.lock().unwrap().push(sql.to_string());
        if let Some(message) = self.fail_all.lock().unwrap().as_ref() {
            return Err(StoreError::Query(message.clone()));
        }
        Ok(())
    }

    fn miss(&self, sql: &str) -> StoreError {
        StoreError::Query(format!("unexpected query: {sql}"))
    }
}

#[async_trait]
impl Database for MockDatabase {
    async fn query_count(&self, sql: &str) -> StoreResult<i64> {
        self.record(sql)?;
        self.counts
            .lock()
            .unwrap()
            .get(sql)
            .copied()
            .ok_or_else(|| self.miss(sql))
    }

    async fn query_resources(&self, sql: &str) -> StoreResult<Vec<ResourceRow>> {
        self.record(sql)?;
        self.resources
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .ok_or_else(|| self.miss(sql))
    }

    async fn query_uids(&self, sql: &str) -> StoreResult<Vec<String>> {
        self.record(sql)?;
        self.uids
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .ok_or_else(|| self.miss(sql))
    }

    async fn query_values(&self, sql: &str) -> StoreResult<Vec<Option<String>>> {
        self.record(sql)?;
        self.values
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .ok_or_else(|| self.miss(sql))
    }

    async fn query_kind_pairs(&self, sql: &str) -> StoreResult<Vec<(String, String)>> {
        self.record(sql)?;
        self.kind_pairs
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .ok_or_else(|| self.miss(sql))
    }

    async fn query_related(&self, sql: &str, _seeds: &[String]) -> StoreResult<Vec<RelatedRow>> {
        self.record(sql)?;
        self.related
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .ok_or_else(|| self.miss(sql))
    }

    async fn ping(&self) -> StoreResult<()> {
        if let Some(message) = self.fail_all.lock().unwrap().as_ref() {
            return Err(StoreError::Query(message.clone()));
        }
        Ok(())
    }
}
