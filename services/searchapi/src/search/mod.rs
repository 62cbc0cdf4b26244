//! Query planner and resolvers.
//!
//! # Purpose and responsibility
//! Compiles structured search inputs into SQL (pure, deterministic) and
//! resolves them against the database gateway: count, items, uid-only,
//! relationship expansion, schema introspection, and autocomplete.
//!
//! # Where it fits
//! Handlers construct a [`SearchResolver`] per input with the caller's
//! access snapshot; the snapshot is baked into every generated statement as
//! a WHERE-clause predicate, so authorization is enforced by filtering, not
//! by post-processing rows.
pub mod access;
pub mod builder;
pub mod complete;
pub mod format;
pub mod related;
pub mod schema;

use crate::api::types::{Item, SearchInput, SearchRelatedResult, SearchResult};
use crate::rbac::UserData;
use crate::store::{Database, StoreResult};
use builder::{QueryMode, build_search_sql};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct SearchResolver {
    input: SearchInput,
    user: UserData,
    db: Arc<dyn Database>,
    default_limit: i64,
}

impl SearchResolver {
    pub fn new(
        input: SearchInput,
        user: UserData,
        db: Arc<dyn Database>,
        default_limit: i64,
    ) -> Self {
        Self {
            input,
            user,
            db,
            default_limit,
        }
    }

    pub async fn count(&self, now: DateTime<Utc>) -> StoreResult<i64> {
        let sql = build_search_sql(
            &self.input,
            &self.user,
            QueryMode::Count,
            self.default_limit,
            now,
        );
        self.db.query_count(&sql).await
    }

    /// Shaped items plus the matched uids (seeds for the relationship
    /// traversal).
    pub async fn items(&self, now: DateTime<Utc>) -> StoreResult<(Vec<Item>, Vec<String>)> {
        let sql = build_search_sql(
            &self.input,
            &self.user,
            QueryMode::Items,
            self.default_limit,
            now,
        );
        let rows = self.db.query_resources(&sql).await?;
        let mut items = Vec::with_capacity(rows.len());
        let mut uids = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(format::format_row(&row.uid, &row.cluster, &row.data));
            uids.push(row.uid);
        }
        Ok((items, uids))
    }

    /// Matched uids without fetching row data.
    pub async fn uids(&self, now: DateTime<Utc>) -> StoreResult<Vec<String>> {
        let sql = build_search_sql(
            &self.input,
            &self.user,
            QueryMode::Uids,
            self.default_limit,
            now,
        );
        self.db.query_uids(&sql).await
    }

    /// Resources one hop from the seed uids, grouped by kind.
    pub async fn related(&self, seeds: &[String]) -> StoreResult<Vec<SearchRelatedResult>> {
        if seeds.is_empty() {
            return Ok(Vec::new());
        }
        let kinds = self.input.related_kinds.clone().unwrap_or_default();
        let sql = related::build_related_sql(&kinds);
        let rows = self.db.query_related(&sql, seeds).await?;
        Ok(related::group_related(rows))
    }

    /// Items plus (when requested) the relationship expansion.
    pub async fn resolve(&self, now: DateTime<Utc>) -> StoreResult<SearchResult> {
        let (items, uids) = self.items(now).await?;
        let related = match &self.input.related_kinds {
            Some(_) => Some(self.related(&uids).await?),
            None => None,
        };
        Ok(SearchResult {
            count: items.len() as i64,
            items,
            related,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::SearchFilter;
    use crate::store::mock::MockDatabase;
    use crate::store::{RelatedRow, ResourceRow};
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 16, 13, 11, 12).unwrap()
    }

    fn kind_input(value: &str) -> SearchInput {
        SearchInput {
            filters: vec![SearchFilter {
                property: "kind".to_string(),
                values: vec![value.to_string()],
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn count_resolves_through_gateway() {
        let db = Arc::new(MockDatabase::new());
        db.expect_count(
            r#"SELECT COUNT("uid") FROM "search"."resources" WHERE ("data"->>'kind' ILIKE ANY ('{"pod"}')) AND (("cluster" = ANY (NULL)) OR ((data->>'_hubClusterResource' = 'true') AND NULL))"#,
            10,
        );
        let resolver = SearchResolver::new(kind_input("pod"), UserData::default(), db, 1000);
        assert_eq!(resolver.count(now()).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn items_shape_rows_and_collect_uids() {
        let db = Arc::new(MockDatabase::new());
        db.expect_resources(
            r#"SELECT DISTINCT "uid", "cluster", "data" FROM "search"."resources" WHERE ("data"->>'kind' ILIKE ANY ('{"template"}')) AND (("cluster" = ANY (NULL)) OR ((data->>'_hubClusterResource' = 'true') AND NULL)) LIMIT 1000"#,
            vec![ResourceRow {
                uid: "c1/1234".to_string(),
                cluster: "c1".to_string(),
                data: json!({"kind": "Template", "name": "App-Sample"}),
            }],
        );
        let resolver = SearchResolver::new(kind_input("template"), UserData::default(), db, 1000);
        let (items, uids) = resolver.items(now()).await.unwrap();
        assert_eq!(uids, vec!["c1/1234"]);
        assert_eq!(items[0]["kind"], json!("template"));
        assert_eq!(items[0]["name"], json!("app-sample"));
        assert_eq!(items[0]["_uid"], json!("c1/1234"));
        assert_eq!(items[0]["cluster"], json!("c1"));
    }

    #[tokio::test]
    async fn related_groups_by_kind() {
        let db = Arc::new(MockDatabase::new());
        let input = SearchInput {
            related_kinds: Some(vec!["ConfigMap".to_string()]),
            ..kind_input("pod")
        };
        db.expect_related(
            &related::build_related_sql(&["ConfigMap".to_string()]),
            vec![RelatedRow {
                data: json!({"name": "cm-one"}),
                dest_id: "c1/9".to_string(),
                dest_kind: "ConfigMap".to_string(),
            }],
        );
        let resolver = SearchResolver::new(input, UserData::default(), db, 1000);
        let related = resolver
            .related(&["c1/1".to_string(), "c1/2".to_string()])
            .await
            .unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].kind, "ConfigMap");
        assert_eq!(related[0].count, 1);
    }

    #[tokio::test]
    async fn uids_resolve_without_row_data() {
        let db = Arc::new(MockDatabase::new());
        db.expect_uids(
            r#"SELECT "uid" FROM "search"."resources" WHERE ("data"->>'kind' ILIKE ANY ('{"pod"}')) AND (("cluster" = ANY (NULL)) OR ((data->>'_hubClusterResource' = 'true') AND NULL)) LIMIT 1000"#,
            vec!["c1/1".to_string(), "c1/2".to_string()],
        );
        let resolver = SearchResolver::new(kind_input("pod"), UserData::default(), db, 1000);
        assert_eq!(resolver.uids(now()).await.unwrap(), vec!["c1/1", "c1/2"]);
    }

    #[tokio::test]
    async fn related_with_no_seeds_skips_the_query() {
        let db = Arc::new(MockDatabase::new());
        let resolver = SearchResolver::new(kind_input("pod"), UserData::default(), db.clone(), 1000);
        let related = resolver.related(&[]).await.unwrap();
        assert!(related.is_empty());
        assert!(db.executed().is_empty());
    }
}
