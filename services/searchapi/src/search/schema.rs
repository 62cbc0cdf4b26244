//! Search schema introspection: the set of queryable properties.
use crate::config::SCHEMA_LIMIT_FACTOR;
use crate::rbac::UserData;
use crate::search::access::rbac_clause;
use crate::store::{Database, StoreResult};

/// Properties that are always present and listed first.
const DEFAULT_PROPERTIES: [&str; 6] = ["cluster", "kind", "label", "name", "namespace", "status"];

/// Distinct jsonb keys over the caller-visible rows. The inner LIMIT keeps
/// the scan bounded while still covering effectively every property.
pub fn build_schema_sql(user: &UserData, query_limit: i64) -> String {
    format!(
        "SELECT DISTINCT \"prop\" FROM (SELECT jsonb_object_keys(jsonb_strip_nulls(\"data\")) AS \"prop\" \
         FROM \"search\".\"resources\" WHERE {} LIMIT {}) AS \"schema\"",
        rbac_clause(user).render(),
        query_limit * SCHEMA_LIMIT_FACTOR
    )
}

/// Resolve the property list: canonical properties first, then every
/// observed key except the internal ones (leading underscore).
pub async fn resolve_schema(
    db: &dyn Database,
    user: &UserData,
    query_limit: i64,
) -> StoreResult<Vec<String>> {
    let sql = build_schema_sql(user, query_limit);
    let mut properties: Vec<String> = DEFAULT_PROPERTIES.iter().map(|p| p.to_string()).collect();
    for value in db.query_values(&sql).await? {
        let Some(prop) = value else { continue };
        if prop.starts_with('_') {
            continue;
        }
        if !properties.contains(&prop) {
            properties.push(prop);
        }
    }
    Ok(properties)
}
