//! One-hop relationship traversal.
//!
//! The statement is a recursive CTE: the seed term joins the matched uids
//! to their edges at level 1, and the step term exists for deeper
//! traversal but is bounded to `level = 1`. The `path` accumulator excludes
//! cycles, which matters on graphs with back-edges. Edges are treated as
//! undirected at this depth.
use crate::api::types::{Item, SearchRelatedResult};
use crate::search::builder::quote_literal;
use crate::search::format::format_data_map;
use crate::store::RelatedRow;
use std::collections::BTreeMap;

/// Build the traversal statement. `$1` binds the seed uid array.
pub fn build_related_sql(related_kinds: &[String]) -> String {
    let mut projection_filter = String::new();
    if !related_kinds.is_empty() {
        let kinds = related_kinds
            .iter()
            .map(|kind| quote_literal(kind))
            .collect::<Vec<_>>()
            .join(", ");
        projection_filter = format!("destkind IN ({kinds}) AND ");
    }
    format!(
        "WITH RECURSIVE search_graph(uid, data, sourcekind, destkind, sourceid, destid, path, level) AS \
         (SELECT r.uid, r.data, e.sourcekind, e.destkind, e.sourceid, e.destid, ARRAY[r.uid] AS path, 1 AS level \
         FROM search.resources r INNER JOIN search.edges e ON (r.uid = e.sourceid) OR (r.uid = e.destid) \
         WHERE r.uid = ANY($1) \
         UNION \
         SELECT r.uid, r.data, e.sourcekind, e.destkind, e.sourceid, e.destid, path||r.uid, level+1 AS level \
         FROM search.resources r INNER JOIN search.edges e ON (r.uid = e.sourceid), search_graph sg \
         WHERE (e.sourceid = sg.destid OR e.destid = sg.sourceid) AND r.uid <> ALL(sg.path) AND level = 1) \
         SELECT DISTINCT ON (destid) data, destid, destkind FROM search_graph WHERE {projection_filter}level = 1"
    )
}

/// Group traversal rows by destination kind, kinds sorted ascending.
pub fn group_related(rows: Vec<RelatedRow>) -> Vec<SearchRelatedResult> {
    let mut by_kind: BTreeMap<String, Vec<Item>> = BTreeMap::new();
    for row in rows {
        by_kind
            .entry(row.dest_kind)
            .or_default()
            .push(format_data_map(&row.data));
    }
    by_kind
        .into_iter()
        .map(|(kind, items)| SearchRelatedResult {
            kind,
            count: items.len() as i64,
            items,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn traversal_filters_kind_and_level() {
        let sql = build_related_sql(&["ConfigMap".to_string()]);
        assert!(sql.ends_with("WHERE destkind IN ('ConfigMap') AND level = 1"));
        assert!(sql.starts_with("WITH RECURSIVE search_graph"));
    }

    #[test]
    fn traversal_without_kind_filter() {
        let sql = build_related_sql(&[]);
        assert!(sql.ends_with("WHERE level = 1"));
        assert!(!sql.contains("destkind IN"));
    }

    #[test]
    fn traversal_excludes_cycles_via_path() {
        let sql = build_related_sql(&[]);
        assert!(sql.contains("r.uid <> ALL(sg.path)"));
        assert!(sql.contains("ARRAY[r.uid] AS path"));
    }

    #[test]
    fn related_rows_group_by_kind_sorted() {
        let rows = vec![
            RelatedRow {
                data: json!({"name": "Two"}),
                dest_id: "c/2".to_string(),
                dest_kind: "Pod".to_string(),
            },
            RelatedRow {
                data: json!({"name": "One"}),
                dest_id: "c/1".to_string(),
                dest_kind: "ConfigMap".to_string(),
            },
            RelatedRow {
                data: json!({"name": "Three"}),
                dest_id: "c/3".to_string(),
                dest_kind: "Pod".to_string(),
            },
        ];
        let grouped = group_related(rows);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].kind, "ConfigMap");
        assert_eq!(grouped[0].count, 1);
        assert_eq!(grouped[1].kind, "Pod");
        assert_eq!(grouped[1].count, 2);
        assert_eq!(grouped[1].items[0]["name"], json!("two"));
    }
}
